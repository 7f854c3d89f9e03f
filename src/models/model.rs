//! Quadratic response-surface model.
//!
//! The matrix element of a process with Wilson coefficients `c_1..c_d` is
//! linear in the coefficients:
//!
//! ```text
//! M = M_0 + c_1 M_1 + ... + c_d M_d
//! ```
//!
//! so the cross section `σ ~ |M|²` is a second-order polynomial in them:
//!
//! ```text
//! σ(c) ~ s_0 + Σ s_i c_i + Σ s_ii c_i² + Σ_{i<j} s_ij c_i c_j
//! ```
//!
//! For `d` coefficients that is `1 + 2d + d(d-1)/2` terms, which is also the
//! minimum number of points needed to determine a fit.

use nalgebra::{DMatrix, DVector};

/// Number of polynomial terms for `dim` coefficients.
pub fn term_count(dim: usize) -> usize {
    1 + 2 * dim + dim * dim.saturating_sub(1) / 2
}

/// Build the design matrix `[1 | c | c² | c_i c_j (i<j)]` for a point matrix.
///
/// Pairs are enumerated in combinatorial order: `(0,1), (0,2), .., (1,2), ..`.
pub fn design_matrix(points: &DMatrix<f64>) -> DMatrix<f64> {
    let (rows, dim) = points.shape();
    let mut out = DMatrix::<f64>::zeros(rows, term_count(dim));
    let mut row = vec![0.0; term_count(dim)];
    let mut point = vec![0.0; dim];
    for r in 0..rows {
        for (c, v) in point.iter_mut().enumerate() {
            *v = points[(r, c)];
        }
        fill_design_row(&point, &mut row);
        for (c, &v) in row.iter().enumerate() {
            out[(r, c)] = v;
        }
    }
    out
}

/// Fill one design row for a point.
///
/// # Panics
/// Panics if `out` does not have length `term_count(point.len())`.
pub fn fill_design_row(point: &[f64], out: &mut [f64]) {
    let dim = point.len();
    out[0] = 1.0;
    for i in 0..dim {
        out[1 + i] = point[i];
        out[1 + dim + i] = point[i] * point[i];
    }
    let mut k = 1 + 2 * dim;
    for i in 0..dim {
        for j in (i + 1)..dim {
            out[k] = point[i] * point[j];
            k += 1;
        }
    }
}

/// Apply fitted constants to a point matrix.
///
/// # Panics
/// Panics if `constants` does not have `term_count(points.ncols())` entries.
pub fn predict(points: &DMatrix<f64>, constants: &DVector<f64>) -> DVector<f64> {
    design_matrix(points) * constants
}
