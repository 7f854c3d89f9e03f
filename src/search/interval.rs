//! Fixed-interval grids and bounded random sampling.
//!
//! Both generators put the SM point (all zeros) in row 0, so index 0 is always
//! the reference calculation when a job picks rows by index.

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::domain::CoefficientBounds;
use crate::error::ScanError;
use crate::math::{cartesian_product, linspace, vstack};

/// SM row followed by the Cartesian grid `[low, high]^n` with `numvalues` per axis.
pub fn interval_points(n_coefficients: usize, low: f64, high: f64, numvalues: usize) -> Result<DMatrix<f64>, ScanError> {
    if n_coefficients == 0 || numvalues == 0 {
        return Err(ScanError::InvalidInput(
            "an interval grid needs at least one coefficient and one value".to_string(),
        ));
    }
    if !(low.is_finite() && high.is_finite()) || low > high {
        return Err(ScanError::InvalidInput(format!("invalid interval [{low}, {high}]")));
    }
    let axes = vec![linspace(low, high, numvalues); n_coefficients];
    let sm = DMatrix::<f64>::zeros(1, n_coefficients);
    Ok(vstack(&sm, &cartesian_product(&axes)))
}

/// SM row followed by `count` points drawn uniformly inside `bounds`.
pub fn sample_uniform<R: Rng + ?Sized>(
    bounds: &[CoefficientBounds],
    count: usize,
    rng: &mut R,
) -> Result<DMatrix<f64>, ScanError> {
    if bounds.is_empty() {
        return Err(ScanError::InvalidInput("no coefficient bounds to sample".to_string()));
    }
    let mut axes = Vec::with_capacity(bounds.len());
    for b in bounds {
        if !(b.min.is_finite() && b.max.is_finite()) || b.min > b.max {
            return Err(ScanError::InvalidInput(format!(
                "invalid bounds for {}: [{}, {}]",
                b.coefficient, b.min, b.max
            )));
        }
        axes.push(Uniform::new_inclusive(b.min, b.max));
    }

    let mut points = DMatrix::<f64>::zeros(count + 1, bounds.len());
    for i in 1..=count {
        for (j, axis) in axes.iter().enumerate() {
            points[(i, j)] = axis.sample(rng);
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn interval_grid_starts_at_sm_point() {
        let points = interval_points(2, -1.0, 1.0, 3).unwrap();
        assert_eq!(points.shape(), (10, 2));
        assert_eq!(points[(0, 0)], 0.0);
        assert_eq!(points[(0, 1)], 0.0);
        // first axis is slowest
        assert_eq!((points[(1, 0)], points[(1, 1)]), (-1.0, -1.0));
        assert_eq!((points[(2, 0)], points[(2, 1)]), (-1.0, 0.0));
        assert_eq!((points[(9, 0)], points[(9, 1)]), (1.0, 1.0));
    }

    #[test]
    fn interval_grid_rejects_inverted_limits() {
        assert!(interval_points(1, 2.0, -2.0, 5).is_err());
        assert!(interval_points(0, -1.0, 1.0, 5).is_err());
    }

    #[test]
    fn uniform_samples_stay_inside_bounds() {
        let bounds = vec![
            CoefficientBounds {
                coefficient: "cHq".to_string(),
                min: -3.0,
                max: 1.0,
            },
            CoefficientBounds {
                coefficient: "cuW".to_string(),
                min: 0.5,
                max: 0.75,
            },
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let points = sample_uniform(&bounds, 200, &mut rng).unwrap();
        assert_eq!(points.shape(), (201, 2));
        assert!(points.row(0).iter().all(|v| *v == 0.0));
        for row in points.row_iter().skip(1) {
            assert!((-3.0..=1.0).contains(&row[0]));
            assert!((0.5..=0.75).contains(&row[1]));
        }
    }

    #[test]
    fn uniform_samples_are_reproducible_with_a_seed() {
        let bounds = vec![CoefficientBounds {
            coefficient: "c".to_string(),
            min: -1.0,
            max: 1.0,
        }];
        let a = sample_uniform(&bounds, 5, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = sample_uniform(&bounds, 5, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }
}
