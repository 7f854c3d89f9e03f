//! Collect cross sections from an external calculator into a scan.
//!
//! The calculator (a MadGraph run in production) sits behind
//! [`CrossSectionSource`]. It can fail when coefficient values are too large;
//! [`collect_samples`] then halves every point and retries the whole batch.

use nalgebra::DMatrix;

use crate::domain::{CoefficientTuple, PointsInput};
use crate::error::ScanError;
use crate::scan::ScanStore;

/// Attempts made by [`collect_samples`] before giving up.
pub const DEFAULT_ATTEMPTS: usize = 5;

/// Something that computes the cross section of a process at a point.
///
/// `point` is in the canonical order of `coefficients`. Return
/// [`ScanError::SampleFailed`] for failures that smaller coefficient values may
/// avoid; any other error aborts the collection.
pub trait CrossSectionSource {
    fn cross_section(&mut self, coefficients: &CoefficientTuple, point: &[f64]) -> Result<f64, ScanError>;
}

impl<F> CrossSectionSource for F
where
    F: FnMut(&CoefficientTuple, &[f64]) -> Result<f64, ScanError>,
{
    fn cross_section(&mut self, coefficients: &CoefficientTuple, point: &[f64]) -> Result<f64, ScanError> {
        self(coefficients, point)
    }
}

/// Calculate the rows `indices` of `points` and add them to `store`.
///
/// Columns of `points` follow `coefficients` as given. Nothing is stored until
/// a whole batch succeeds. Returns the number of samples added.
pub fn collect_samples<C, S>(
    source: &mut C,
    store: &mut ScanStore,
    coefficients: &[S],
    process: &str,
    points: &DMatrix<f64>,
    indices: &[usize],
    attempts: usize,
) -> Result<usize, ScanError>
where
    C: CrossSectionSource + ?Sized,
    S: AsRef<str>,
{
    let (tuple, permutation) = CoefficientTuple::canonicalize(coefficients)?;
    if points.ncols() != tuple.len() {
        return Err(ScanError::ShapeMismatch(format!(
            "points have {} columns but {} coefficients were given",
            points.ncols(),
            tuple.len()
        )));
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= points.nrows()) {
        return Err(ScanError::InvalidInput(format!(
            "index {bad} out of range for {} points",
            points.nrows()
        )));
    }
    if attempts == 0 {
        return Err(ScanError::InvalidInput("need at least one attempt".to_string()));
    }

    let mut current = points.select_rows(indices).select_columns(&permutation);
    let mut last_failure = String::new();
    'attempts: for attempt in 1..=attempts {
        let mut cross_sections = Vec::with_capacity(indices.len());
        for row in current.row_iter() {
            let point: Vec<f64> = row.iter().copied().collect();
            match source.cross_section(&tuple, &point) {
                Ok(xs) => cross_sections.push(xs),
                Err(ScanError::SampleFailed(reason)) => {
                    tracing::warn!(
                        "attempt {attempt}/{attempts} for {tuple} / {process}: {reason}: halving coefficient values and trying again"
                    );
                    last_failure = reason;
                    current *= 0.5;
                    continue 'attempts;
                }
                Err(e) => return Err(e),
            }
        }

        if cross_sections.is_empty() {
            return Ok(0);
        }
        store.add(PointsInput::Matrix(&current), &cross_sections, process, tuple.names())?;
        tracing::info!("calculated {} points for {tuple} / {process}", cross_sections.len());
        return Ok(cross_sections.len());
    }

    Err(ScanError::SampleFailed(format!(
        "failed to calculate any points for {tuple} / {process} after {attempts} attempts: {last_failure}"
    )))
}
