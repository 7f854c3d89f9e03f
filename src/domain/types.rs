//! Shared domain types.
//!
//! These types are kept small and strongly typed so the store, fitter and range
//! search can share them without stringly-typed lookups:
//!
//! - `CoefficientTuple`: a canonical (sorted) set of Wilson coefficient names
//! - `ScanKey`: the composite `(coefficients, process)` key of every scan entry
//! - `PointsInput`: the accepted point shapes (single row, single-coefficient column, matrix)
//! - option structs for fitting and range search, with their documented defaults

use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// A sorted tuple of Wilson coefficient names.
///
/// Two tuples built from permutations of the same names are equal. The only way
/// to build one is through [`CoefficientTuple::canonicalize`] (or the sorted
/// constructors below), so a stored tuple is always in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoefficientTuple(Vec<String>);

impl CoefficientTuple {
    /// Sort `names` lexicographically.
    ///
    /// Returns the tuple together with the permutation that maps canonical column
    /// `k` to original column `permutation[k]`, so callers can reorder point
    /// columns identically.
    pub fn canonicalize<S: AsRef<str>>(names: &[S]) -> Result<(Self, Vec<usize>), ScanError> {
        if names.is_empty() {
            return Err(ScanError::InvalidInput(
                "a coefficient tuple needs at least one name".to_string(),
            ));
        }
        if let Some(bad) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|n| n.is_empty() || n.contains(','))
        {
            return Err(ScanError::InvalidInput(format!(
                "invalid coefficient name {bad:?}"
            )));
        }
        let mut permutation: Vec<usize> = (0..names.len()).collect();
        permutation.sort_by(|&a, &b| names[a].as_ref().cmp(names[b].as_ref()));

        let sorted: Vec<String> = permutation
            .iter()
            .map(|&i| names[i].as_ref().to_string())
            .collect();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(ScanError::InvalidInput(format!(
                "duplicate coefficient in {sorted:?}"
            )));
        }
        Ok((Self(sorted), permutation))
    }

    /// Build a tuple from names that must already be in canonical order.
    pub fn from_sorted(names: Vec<String>) -> Result<Self, ScanError> {
        let (tuple, permutation) = Self::canonicalize(&names)?;
        if permutation.iter().enumerate().any(|(k, &i)| k != i) {
            return Err(ScanError::InvalidInput(format!(
                "coefficients {names:?} are not in canonical order"
            )));
        }
        Ok(tuple)
    }

    /// Parse the comma-joined form produced by [`CoefficientTuple::joined`].
    pub fn from_joined(joined: &str) -> Result<Self, ScanError> {
        Self::from_sorted(joined.split(',').map(str::to_string).collect())
    }

    /// Names joined by commas (`"cHq,cuW"`), used as a key in archives.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    /// Tuple holding a single coefficient.
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CoefficientTuple {
    fn from(name: &str) -> Self {
        Self::single(name)
    }
}

impl From<&CoefficientTuple> for CoefficientTuple {
    fn from(tuple: &CoefficientTuple) -> Self {
        tuple.clone()
    }
}

impl fmt::Display for CoefficientTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Composite key of a scan entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanKey {
    pub coefficients: CoefficientTuple,
    pub process: String,
}

impl ScanKey {
    pub fn new(coefficients: CoefficientTuple, process: impl Into<String>) -> Self {
        Self {
            coefficients,
            process: process.into(),
        }
    }

    pub(crate) fn missing(&self) -> ScanError {
        ScanError::MissingEntry {
            coefficients: self.coefficients.to_string(),
            process: self.process.clone(),
        }
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.coefficients, self.process)
    }
}

/// Points handed to `add` or `evaluate`.
///
/// A `Row` is one point (one value per coefficient); a `Column` is many values
/// of a single coefficient. Both are reshaped to a matrix rather than rejected.
#[derive(Debug, Clone, Copy)]
pub enum PointsInput<'a> {
    Row(&'a [f64]),
    Column(&'a [f64]),
    Matrix(&'a DMatrix<f64>),
}

impl PointsInput<'_> {
    pub fn to_matrix(self) -> DMatrix<f64> {
        match self {
            PointsInput::Row(values) => DMatrix::from_row_slice(1, values.len(), values),
            PointsInput::Column(values) => DMatrix::from_column_slice(values.len(), 1, values),
            PointsInput::Matrix(m) => m.clone(),
        }
    }
}

impl<'a> From<&'a DMatrix<f64>> for PointsInput<'a> {
    fn from(m: &'a DMatrix<f64>) -> Self {
        PointsInput::Matrix(m)
    }
}

/// Fit options.
#[derive(Debug, Clone, Default)]
pub struct FitOptions {
    /// Train on at most this many (shuffled) rows; the rest are held out to
    /// estimate the percent error of the fit.
    pub max_points: Option<usize>,
    /// Seed for the train/test shuffle. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

/// Options for the coefficient range search.
#[derive(Debug, Clone)]
pub struct RangeSearchOptions {
    /// Maximum allowed ratio of NP to SM cross section.
    pub scale: f64,
    /// Number of probe values per coefficient while searching.
    pub interpolate_numvalues: usize,
    /// Number of grid values per coefficient in the final grid.
    pub calculate_numvalues: usize,
    /// Relative growth per iteration in the fine zoom-out phase.
    pub step: f64,
    /// Magnitude floor below which the contraction phase gives up.
    pub min_value: f64,
    /// Iteration guard for each phase.
    pub max_iterations: usize,
}

impl Default for RangeSearchOptions {
    fn default() -> Self {
        Self {
            scale: 10.0,
            interpolate_numvalues: 100,
            calculate_numvalues: 10,
            step: 0.2,
            min_value: 1e-11,
            max_iterations: 10_000,
        }
    }
}

/// Allowed range of one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientBounds {
    pub coefficient: String,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_sorts_and_reports_permutation() {
        let (tuple, perm) = CoefficientTuple::canonicalize(&["cuW", "cHq", "ctG"]).unwrap();
        assert_eq!(tuple.names(), &["cHq", "ctG", "cuW"]);
        assert_eq!(perm, vec![1, 2, 0]);
    }

    #[test]
    fn permutations_share_a_key() {
        let (a, _) = CoefficientTuple::canonicalize(&["b", "a"]).unwrap();
        let (b, _) = CoefficientTuple::canonicalize(&["a", "b"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(a, b)");
    }

    #[test]
    fn duplicate_and_unsorted_names_are_rejected() {
        assert!(CoefficientTuple::canonicalize(&["a", "a"]).is_err());
        assert!(CoefficientTuple::from_sorted(vec!["b".into(), "a".into()]).is_err());
        assert!(CoefficientTuple::from_sorted(vec!["a".into(), "b".into()]).is_ok());
        assert!(CoefficientTuple::canonicalize(&["a,b"]).is_err());
        assert!(CoefficientTuple::canonicalize(&[""]).is_err());
    }

    #[test]
    fn joined_form_round_trips() {
        let (tuple, _) = CoefficientTuple::canonicalize(&["cuW", "cHq"]).unwrap();
        assert_eq!(tuple.joined(), "cHq,cuW");
        assert_eq!(CoefficientTuple::from_joined("cHq,cuW").unwrap(), tuple);
    }

    #[test]
    fn points_input_reshapes() {
        let row = PointsInput::Row(&[1.0, 2.0]).to_matrix();
        assert_eq!(row.shape(), (1, 2));
        let col = PointsInput::Column(&[1.0, 2.0, 3.0]).to_matrix();
        assert_eq!(col.shape(), (3, 1));
        assert_eq!(col[(2, 0)], 3.0);
    }
}
