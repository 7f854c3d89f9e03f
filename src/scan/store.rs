//! In-memory container for cross section scans over Wilson coefficients.
//!
//! Every entry is keyed by a [`ScanKey`] (canonical coefficient tuple plus
//! process name) and holds:
//!
//! - the sampled points (rows) in canonical column order
//! - one cross section per point
//! - the scale factors `σ / σ_SM` (computed lazily)
//! - fitted polynomial constants and held-out percent errors
//!
//! The SM cross section of each process is kept separately, keyed by process.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::domain::{CoefficientTuple, PointsInput, ScanKey};
use crate::error::ScanError;
use crate::math::vstack;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStore {
    pub(crate) points: BTreeMap<ScanKey, DMatrix<f64>>,
    pub(crate) cross_sections: BTreeMap<ScanKey, DVector<f64>>,
    pub(crate) scales: BTreeMap<ScanKey, DVector<f64>>,
    pub(crate) sm_cross_sections: BTreeMap<String, f64>,
    pub(crate) fit_constants: BTreeMap<ScanKey, DVector<f64>>,
    pub(crate) fit_errs: BTreeMap<ScanKey, DVector<f64>>,
}

impl ScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add samples for `process`, computed with `coefficients` in the given order.
    ///
    /// The coefficients are sorted and the point columns permuted to match, so
    /// the same samples added with permuted names land in the same entry. A
    /// `Row` input is a single point. Samples are appended to an existing entry;
    /// duplicates are kept (see [`ScanStore::deduplicate`]).
    ///
    /// Appending invalidates the entry's scales and fit; both are recomputed
    /// on the next fit.
    pub fn add<S: AsRef<str>>(
        &mut self,
        points: PointsInput<'_>,
        cross_sections: &[f64],
        process: &str,
        coefficients: &[S],
    ) -> Result<ScanKey, ScanError> {
        let (tuple, permutation) = CoefficientTuple::canonicalize(coefficients)?;
        let raw = points.to_matrix();

        if raw.nrows() == 0 {
            return Err(ScanError::InvalidInput(format!(
                "no points given for {tuple} / {process}"
            )));
        }
        if raw.ncols() != tuple.len() {
            return Err(ScanError::ShapeMismatch(format!(
                "points have {} columns but {} coefficients were given",
                raw.ncols(),
                tuple.len()
            )));
        }
        if raw.nrows() != cross_sections.len() {
            return Err(ScanError::ShapeMismatch(format!(
                "{} points but {} cross sections",
                raw.nrows(),
                cross_sections.len()
            )));
        }

        let canonical = raw.select_columns(&permutation);
        let key = ScanKey::new(tuple, process);

        match (self.points.get(&key), self.cross_sections.get(&key)) {
            (Some(existing_points), Some(existing_xs)) => {
                let stacked = vstack(existing_points, &canonical);
                let xs: Vec<f64> = existing_xs
                    .iter()
                    .chain(cross_sections.iter())
                    .copied()
                    .collect();
                self.points.insert(key.clone(), stacked);
                self.cross_sections
                    .insert(key.clone(), DVector::from_vec(xs));
            }
            _ => {
                self.points.insert(key.clone(), canonical);
                self.cross_sections
                    .insert(key.clone(), DVector::from_row_slice(cross_sections));
            }
        }
        self.invalidate(&key);

        Ok(key)
    }

    /// Add a single point with a scalar cross section.
    pub fn add_point<S: AsRef<str>>(
        &mut self,
        point: &[f64],
        cross_section: f64,
        process: &str,
        coefficients: &[S],
    ) -> Result<ScanKey, ScanError> {
        self.add(PointsInput::Row(point), &[cross_section], process, coefficients)
    }

    /// Merge duplicated points into one, averaging their cross sections.
    ///
    /// Rows are left sorted lexicographically (last column most significant).
    /// The average is unweighted: samples computed with different event counts
    /// are not weighted by those counts. Duplicates are only expected when
    /// points were split across jobs for parallelization.
    pub fn deduplicate(&mut self, key: &ScanKey) -> Result<(), ScanError> {
        let points = self.points.get(key).ok_or_else(|| key.missing())?;
        let xs = self.cross_sections.get(key).ok_or_else(|| key.missing())?;

        let mut order: Vec<usize> = (0..points.nrows()).collect();
        order.sort_by(|&a, &b| compare_rows_last_major(points, a, b));

        let mut unique_rows: Vec<usize> = Vec::new();
        let mut averages: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for &idx in &order {
            let same = unique_rows
                .last()
                .is_some_and(|&prev| rows_equal(points, prev, idx));
            if same {
                let last = averages.len() - 1;
                averages[last] += xs[idx];
                counts[last] += 1;
            } else {
                unique_rows.push(idx);
                averages.push(xs[idx]);
                counts.push(1);
            }
        }
        for (sum, &n) in averages.iter_mut().zip(&counts) {
            *sum /= n as f64;
        }

        let deduplicated = points.select_rows(&unique_rows);
        self.points.insert(key.clone(), deduplicated);
        self.cross_sections
            .insert(key.clone(), DVector::from_vec(averages));
        self.invalidate(key);
        Ok(())
    }

    /// Drop everything derived from the entry's samples.
    fn invalidate(&mut self, key: &ScanKey) {
        self.scales.remove(key);
        self.fit_constants.remove(key);
        self.fit_errs.remove(key);
    }

    /// Normalize the entry's cross sections to its SM point.
    ///
    /// Several SM rows are averaged. The SM cross section is also recorded for
    /// the process (see [`ScanStore::sm_cross_section`]).
    pub fn update_scales(&mut self, key: &ScanKey) -> Result<(), ScanError> {
        let points = self.points.get(key).ok_or_else(|| key.missing())?;
        let xs = self.cross_sections.get(key).ok_or_else(|| key.missing())?;

        let sm_rows: Vec<usize> = (0..points.nrows())
            .filter(|&r| points.row(r).iter().all(|&c| c == 0.0))
            .collect();
        if sm_rows.is_empty() {
            return Err(ScanError::MissingSmPoint {
                coefficients: key.coefficients.to_string(),
                process: key.process.clone(),
            });
        }

        let sm_cross_section = sm_rows.iter().map(|&r| xs[r]).sum::<f64>() / sm_rows.len() as f64;
        let scales = xs / sm_cross_section;

        self.scales.insert(key.clone(), scales);
        self.sm_cross_sections
            .insert(key.process.clone(), sm_cross_section);
        Ok(())
    }

    /// Remove one process from a coefficient tuple, leaving sibling processes untouched.
    pub fn prune(&mut self, process: &str, coefficients: &CoefficientTuple) {
        let key = ScanKey::new(coefficients.clone(), process);
        self.points.remove(&key);
        self.cross_sections.remove(&key);
        self.scales.remove(&key);
        self.fit_constants.remove(&key);
        self.fit_errs.remove(&key);
    }

    /// Keep only the listed processes, for every coefficient tuple.
    pub fn retain_processes<S: AsRef<str>>(&mut self, processes: &[S]) {
        let keep = |key: &ScanKey| processes.iter().any(|p| p.as_ref() == key.process);
        self.points.retain(|k, _| keep(k));
        self.cross_sections.retain(|k, _| keep(k));
        self.scales.retain(|k, _| keep(k));
        self.fit_constants.retain(|k, _| keep(k));
        self.fit_errs.retain(|k, _| keep(k));
        self.sm_cross_sections
            .retain(|p, _| processes.iter().any(|q| q.as_ref() == p));
    }

    /// All keys with sampled points, in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = &ScanKey> {
        self.points.keys()
    }

    /// Processes sampled for a coefficient tuple.
    pub fn processes<'a>(&'a self, coefficients: &'a CoefficientTuple) -> impl Iterator<Item = &'a str> {
        self.points
            .keys()
            .filter(move |k| &k.coefficients == coefficients)
            .map(|k| k.process.as_str())
    }

    pub fn contains(&self, key: &ScanKey) -> bool {
        self.points.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self, key: &ScanKey) -> Option<&DMatrix<f64>> {
        self.points.get(key)
    }

    pub fn cross_sections(&self, key: &ScanKey) -> Option<&DVector<f64>> {
        self.cross_sections.get(key)
    }

    pub fn scales(&self, key: &ScanKey) -> Option<&DVector<f64>> {
        self.scales.get(key)
    }

    pub fn fit_constants(&self, key: &ScanKey) -> Option<&DVector<f64>> {
        self.fit_constants.get(key)
    }

    pub fn fit_errs(&self, key: &ScanKey) -> Option<&DVector<f64>> {
        self.fit_errs.get(key)
    }

    pub fn sm_cross_section(&self, process: &str) -> Option<f64> {
        self.sm_cross_sections.get(process).copied()
    }

    /// True when every sampled entry has fit constants.
    pub fn is_fitted(&self) -> bool {
        self.points.keys().all(|k| self.fit_constants.contains_key(k))
    }
}

fn compare_rows_last_major(m: &DMatrix<f64>, a: usize, b: usize) -> Ordering {
    for c in (0..m.ncols()).rev() {
        let ord = m[(a, c)]
            .partial_cmp(&m[(b, c)])
            .unwrap_or(Ordering::Equal);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn rows_equal(m: &DMatrix<f64>, a: usize, b: usize) -> bool {
    (0..m.ncols()).all(|c| m[(a, c)] == m[(b, c)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(names: &[&str], process: &str) -> ScanKey {
        let (tuple, _) = CoefficientTuple::canonicalize(names).unwrap();
        ScanKey::new(tuple, process)
    }

    #[test]
    fn add_keeps_rows_and_cross_sections_parallel() {
        let mut store = ScanStore::new();
        let pts = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 2.0]);
        store.add((&pts).into(), &[1.0, 2.0], "ttZ", &["a", "b"]).unwrap();
        store.add_point(&[3.0, 4.0], 5.0, "ttZ", &["a", "b"]).unwrap();

        let k = key(&["a", "b"], "ttZ");
        assert_eq!(store.points(&k).unwrap().nrows(), 3);
        assert_eq!(store.cross_sections(&k).unwrap().len(), 3);
        assert_eq!(store.cross_sections(&k).unwrap()[2], 5.0);
    }

    #[test]
    fn add_is_commutative_in_coefficient_order() {
        let mut forward = ScanStore::new();
        forward.add_point(&[1.0, 2.0, 3.0], 7.0, "ttH", &["a", "b", "c"]).unwrap();

        let mut permuted = ScanStore::new();
        permuted.add_point(&[3.0, 1.0, 2.0], 7.0, "ttH", &["c", "a", "b"]).unwrap();

        let k = key(&["a", "b", "c"], "ttH");
        assert_eq!(forward.points(&k), permuted.points(&k));
        assert_eq!(forward.cross_sections(&k), permuted.cross_sections(&k));
        let row: Vec<f64> = permuted.points(&k).unwrap().row(0).iter().copied().collect();
        assert_eq!(row, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn add_rejects_mismatched_shapes() {
        let mut store = ScanStore::new();
        assert!(matches!(
            store.add_point(&[1.0], 1.0, "ttZ", &["a", "b"]),
            Err(ScanError::ShapeMismatch(_))
        ));
        let pts = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        assert!(matches!(
            store.add((&pts).into(), &[1.0], "ttZ", &["a"]),
            Err(ScanError::ShapeMismatch(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn deduplicate_averages_and_is_idempotent() {
        let mut store = ScanStore::new();
        let pts = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        );
        store
            .add((&pts).into(), &[2.0, 1.0, 4.0, 3.0, 3.0], "ttW", &["a", "b"])
            .unwrap();
        let k = key(&["a", "b"], "ttW");

        store.deduplicate(&k).unwrap();
        let once = store.clone();
        assert_eq!(store.points(&k).unwrap().nrows(), 3);

        // Sorted with the last column most significant: (0,0), (1,0), (0,1).
        let p = store.points(&k).unwrap();
        assert_eq!((p[(0, 0)], p[(0, 1)]), (0.0, 0.0));
        assert_eq!((p[(1, 0)], p[(1, 1)]), (1.0, 0.0));
        assert_eq!((p[(2, 0)], p[(2, 1)]), (0.0, 1.0));
        assert_eq!(store.cross_sections(&k).unwrap().as_slice(), &[2.0, 3.0, 3.0]);

        store.deduplicate(&k).unwrap();
        assert_eq!(store, once);
    }

    #[test]
    fn new_samples_drop_the_stale_fit() {
        let mut store = ScanStore::new();
        for process in ["ttZ", "ttH"] {
            store
                .add(PointsInput::Column(&[-1.0, 0.0, 1.0]), &[2.0, 1.0, 4.0], process, &["c"])
                .unwrap();
        }
        let opts = crate::domain::FitOptions {
            max_points: Some(2),
            seed: Some(1),
        };
        store.fit(&opts).unwrap();
        let k = key(&["c"], "ttZ");
        let sibling = key(&["c"], "ttH");

        store.deduplicate(&k).unwrap();
        assert!(store.fit_constants(&k).is_none());
        assert!(store.fit_errs(&k).is_none());
        assert!(store.fit_constants(&sibling).is_some());

        store.fit(&opts).unwrap();
        store.add_point(&[2.0], 11.0, "ttZ", &["c"]).unwrap();
        assert!(store.scales(&k).is_none());
        assert!(store.fit_constants(&k).is_none());
        assert!(store.fit_errs(&k).is_none());
        assert!(store.fit_errs(&sibling).is_some());
        assert!(!store.is_fitted());
    }

    #[test]
    fn update_scales_requires_sm_point() {
        let mut store = ScanStore::new();
        store.add_point(&[1.0], 2.0, "ttZ", &["a"]).unwrap();
        let k = key(&["a"], "ttZ");
        assert!(matches!(
            store.update_scales(&k),
            Err(ScanError::MissingSmPoint { .. })
        ));
        assert!(store.scales(&k).is_none());
    }

    #[test]
    fn update_scales_normalizes_to_mean_sm_cross_section() {
        let mut store = ScanStore::new();
        let pts = DMatrix::from_column_slice(4, 1, &[0.0, 1.0, 0.0, -1.0]);
        store.add((&pts).into(), &[0.9, 4.0, 1.1, 3.0], "ttZ", &["a"]).unwrap();
        let k = key(&["a"], "ttZ");

        store.update_scales(&k).unwrap();
        let scales = store.scales(&k).unwrap();
        assert!((store.sm_cross_section("ttZ").unwrap() - 1.0).abs() < 1e-12);
        assert!((scales[1] - 4.0).abs() < 1e-12);
        assert!((scales[0] + scales[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn update_scales_sets_sm_row_to_one() {
        let mut store = ScanStore::new();
        let pts = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        store.add((&pts).into(), &[0.25, 1.0], "tZq", &["a", "b"]).unwrap();
        let k = key(&["a", "b"], "tZq");
        store.update_scales(&k).unwrap();
        assert_eq!(store.scales(&k).unwrap()[0], 1.0);
        assert_eq!(store.scales(&k).unwrap()[1], 4.0);
    }

    #[test]
    fn prune_leaves_siblings() {
        let mut store = ScanStore::new();
        store.add_point(&[0.0], 1.0, "ttZ", &["a"]).unwrap();
        store.add_point(&[0.0], 1.0, "ttW", &["a"]).unwrap();
        let tuple = CoefficientTuple::single("a");

        store.prune("ttZ", &tuple);
        let processes: Vec<&str> = store.processes(&tuple).collect();
        assert_eq!(processes, vec!["ttW"]);
    }

    #[test]
    fn retain_processes_filters_every_tuple() {
        let mut store = ScanStore::new();
        store.add_point(&[0.0], 1.0, "ttZ", &["a"]).unwrap();
        store.add_point(&[0.0], 1.0, "ttW", &["a"]).unwrap();
        store.add_point(&[0.0], 1.0, "ttW", &["b"]).unwrap();

        store.retain_processes(&["ttW"]);
        assert_eq!(store.len(), 2);
        assert!(store.keys().all(|k| k.process == "ttW"));
    }
}
