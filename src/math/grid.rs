//! Grid helpers: linear spacing and Cartesian products of per-axis values.

use nalgebra::DMatrix;

/// `n` evenly spaced values from `start` to `stop` (both inclusive).
///
/// `n == 1` yields `[start]`; `n == 0` yields an empty vector.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Cartesian product of per-axis values, one row per combination.
///
/// The first axis varies slowest, the last fastest.
pub fn cartesian_product(axes: &[Vec<f64>]) -> DMatrix<f64> {
    let dim = axes.len();
    let rows: usize = if dim == 0 {
        0
    } else {
        axes.iter().map(Vec::len).product()
    };

    let mut out = DMatrix::<f64>::zeros(rows, dim);
    for row in 0..rows {
        let mut rest = row;
        for col in (0..dim).rev() {
            let len = axes[col].len();
            out[(row, col)] = axes[col][rest % len];
            rest /= len;
        }
    }
    out
}

/// Stack `bottom` under `top`. Both must have the same column count.
pub(crate) fn vstack(top: &DMatrix<f64>, bottom: &DMatrix<f64>) -> DMatrix<f64> {
    debug_assert_eq!(top.ncols(), bottom.ncols());
    let rows = top.nrows() + bottom.nrows();
    DMatrix::from_fn(rows, top.ncols(), |r, c| {
        if r < top.nrows() {
            top[(r, c)]
        } else {
            bottom[(r - top.nrows(), c)]
        }
    })
}
