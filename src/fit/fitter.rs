//! Weighted least-squares fit of scale factors per scan entry.
//!
//! For every `(coefficients, process)` entry we:
//! - compute scales `σ / σ_SM` if they are missing
//! - shuffle the rows and optionally hold some out (`max_points`)
//! - fit the quadratic model to the training rows, pinning the SM point
//! - record the percent error of the fit on the held-out rows
//!
//! The MG cross section calculation is noisy, so it helps to overconstrain the
//! fit with more than the `1 + 2d + d(d-1)/2` points it strictly needs.

use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{FitOptions, ScanKey};
use crate::error::ScanError;
use crate::math::solve_weighted_least_squares;
use crate::models::{design_matrix, predict};
use crate::scan::ScanStore;

/// Weight of the SM row; the fit must go through the SM point.
pub const SM_WEIGHT: f64 = 100_000.0;

impl ScanStore {
    /// Fit every entry in the store, overwriting earlier fits.
    pub fn fit(&mut self, opts: &FitOptions) -> Result<(), ScanError> {
        let mut rng = match opts.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let keys: Vec<ScanKey> = self.points.keys().cloned().collect();
        for key in keys {
            self.fit_entry(&key, opts.max_points, &mut rng)?;
        }
        Ok(())
    }

    fn fit_entry(
        &mut self,
        key: &ScanKey,
        max_points: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<(), ScanError> {
        if !self.scales.contains_key(key) {
            self.update_scales(key)?;
        }
        let points = self.points.get(key).ok_or_else(|| key.missing())?;
        let scales = self.scales.get(key).ok_or_else(|| key.missing())?;

        let n = points.nrows();
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);

        let split = max_points.filter(|&m| m < n).unwrap_or(n);
        let (train, test) = indices.split_at(split);
        tracing::debug!("found {} points for {}", train.len(), key);

        let matrix = design_matrix(&points.select_rows(train));
        let targets = DVector::from_iterator(train.len(), train.iter().map(|&i| scales[i]));
        let weights: Vec<f64> = matrix
            .row_iter()
            .map(|row| {
                let is_sm = row[0] == 1.0 && row.iter().skip(1).all(|&v| v == 0.0);
                if is_sm { SM_WEIGHT } else { 1.0 }
            })
            .collect();

        let constants = solve_weighted_least_squares(&matrix, &targets, &weights).ok_or_else(|| {
            ScanError::SingularFit {
                coefficients: key.coefficients.to_string(),
                process: key.process.clone(),
            }
        })?;

        let errs = if test.is_empty() {
            None
        } else {
            let predicted = predict(&points.select_rows(test), &constants);
            let errs: Vec<f64> = test
                .iter()
                .zip(predicted.iter())
                .map(|(&i, &p)| (scales[i] - p) / scales[i] * 100.0)
                .collect();
            Some(DVector::from_vec(errs))
        };

        self.fit_constants.insert(key.clone(), constants);
        match errs {
            Some(errs) => {
                self.fit_errs.insert(key.clone(), errs);
            }
            None => {
                self.fit_errs.remove(key);
            }
        }
        Ok(())
    }
}
