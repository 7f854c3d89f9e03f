//! Apply fitted constants to new points.

use nalgebra::DVector;

use crate::domain::{CoefficientTuple, FitOptions, PointsInput, ScanKey};
use crate::error::ScanError;
use crate::models::predict;
use crate::scan::ScanStore;

impl ScanStore {
    /// Predicted scale factor for each point.
    ///
    /// `coefficients` may be a single name (`"cuW"`) or a canonical tuple. For a
    /// single coefficient, a flat list of values (`Row` or `Column`) is read as
    /// one point per value. If the entry has not been fit yet, the whole store
    /// is fit with default options.
    pub fn evaluate<C: Into<CoefficientTuple>>(
        &mut self,
        coefficients: C,
        points: PointsInput<'_>,
        process: &str,
    ) -> Result<DVector<f64>, ScanError> {
        let key = ScanKey::new(coefficients.into(), process);
        if !self.fit_constants.contains_key(&key) {
            if !self.contains(&key) {
                return Err(key.missing());
            }
            self.fit(&FitOptions::default())?;
        }
        self.predict(&key, points)
    }

    /// Like [`ScanStore::evaluate`], but never fits: the entry must already
    /// have fit constants.
    pub fn predict(&self, key: &ScanKey, points: PointsInput<'_>) -> Result<DVector<f64>, ScanError> {
        let constants = self.fit_constants.get(key).ok_or_else(|| key.missing())?;
        let mut matrix = points.to_matrix();
        if key.coefficients.len() == 1 && matrix.nrows() == 1 {
            matrix = matrix.transpose();
        }
        if matrix.ncols() != key.coefficients.len() {
            return Err(ScanError::ShapeMismatch(format!(
                "points have {} columns but {} has {} coefficients",
                matrix.ncols(),
                key.coefficients,
                key.coefficients.len()
            )));
        }
        Ok(predict(&matrix, constants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn quadratic_store() -> ScanStore {
        let mut store = ScanStore::new();
        store
            .add(PointsInput::Column(&[-1.0, 0.0, 1.0]), &[2.0, 1.0, 4.0], "ttZ", &["c"])
            .unwrap();
        store
    }

    #[test]
    fn evaluate_fits_on_demand() {
        let mut store = quadratic_store();
        assert!(!store.is_fitted());
        let scales = store
            .evaluate("c", PointsInput::Column(&[2.0, -2.0]), "ttZ")
            .unwrap();
        assert!(store.is_fitted());
        assert!((scales[0] - 11.0).abs() < 1e-6);
        assert!((scales[1] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn evaluate_refits_after_new_samples_arrive() {
        let mut store = quadratic_store();
        let before = store.evaluate("c", PointsInput::Column(&[2.0]), "ttZ").unwrap();
        assert!((before[0] - 11.0).abs() < 1e-6);

        // New samples follow 1 + 10c², far from the first fit.
        store
            .add(PointsInput::Column(&[2.0, -2.0, 3.0]), &[41.0, 41.0, 91.0], "ttZ", &["c"])
            .unwrap();
        assert!(!store.is_fitted());

        let after = store.evaluate("c", PointsInput::Column(&[2.0]), "ttZ").unwrap();
        assert!((after[0] - 41.0).abs() < 1.0, "{after}");
    }

    #[test]
    fn evaluate_accepts_matrix_and_tuple() {
        let mut store = quadratic_store();
        let tuple = CoefficientTuple::single("c");
        let points = DMatrix::from_column_slice(2, 1, &[0.0, 0.5]);
        let scales = store.evaluate(&tuple, (&points).into(), "ttZ").unwrap();
        assert!((scales[0] - 1.0).abs() < 1e-6);
        assert!((scales[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn evaluate_unknown_entry_is_an_error() {
        let mut store = quadratic_store();
        let err = store
            .evaluate("c", PointsInput::Column(&[1.0]), "ttW")
            .unwrap_err();
        assert!(matches!(err, ScanError::MissingEntry { .. }));
    }

    #[test]
    fn evaluate_reshapes_flat_single_coefficient_values() {
        let mut store = quadratic_store();
        let scales = store
            .evaluate("c", PointsInput::Row(&[1.0, 0.0]), "ttZ")
            .unwrap();
        assert_eq!(scales.len(), 2);
        assert!((scales[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn evaluate_rejects_wrong_width() {
        let mut store = quadratic_store();
        let points = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let err = store.evaluate("c", (&points).into(), "ttZ").unwrap_err();
        assert!(matches!(err, ScanError::ShapeMismatch(_)));
    }
}
