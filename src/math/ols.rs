//! Weighted least squares solver.
//!
//! The fitter solves small, overdetermined linear problems of the form:
//!
//! ```text
//! minimize Σ (w_i y_i - w_i x_i^T β)^2
//! ```
//!
//! Rows are multiplied by their weight `w_i` (not `sqrt(w_i)`): a weight of
//! 1e5 pins the SM row so the fit passes through it almost exactly.
//!
//! We use SVD so that tall and rank-deficient design matrices both yield a
//! least-squares (minimum norm) solution. Nalgebra's `QR::solve` is intended
//! for square systems and panics on non-square input.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `W X β = W y` for a diagonal weight matrix `W = diag(weights)`.
///
/// # Panics
/// Panics if `weights` or `y` do not have one entry per row of `x`.
pub fn solve_weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    weights: &[f64],
) -> Option<DVector<f64>> {
    assert_eq!(weights.len(), x.nrows());
    assert_eq!(y.len(), x.nrows());

    let mut xw = x.clone();
    let mut yw = y.clone();
    for (i, &w) in weights.iter().enumerate() {
        xw.row_mut(i).scale_mut(w);
        yw[i] *= w;
    }
    solve_least_squares(&xw, &yw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn heavy_weight_pins_a_row() {
        // Fit y = a + b x through noisy points; the heavily weighted row at x=0
        // must be reproduced almost exactly.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 2.5, 2.8, 4.4]);
        let weights = [1e5, 1.0, 1.0, 1.0];

        let beta = solve_weighted_least_squares(&x, &y, &weights).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-6, "intercept {}", beta[0]);

        let unweighted = solve_least_squares(&x, &y).unwrap();
        assert!((unweighted[0] - 1.0).abs() > 1e-3);
    }
}
