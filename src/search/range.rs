//! Coefficient range search.
//!
//! Given a coarse scan with single-coefficient samples, find for each
//! coefficient the range over which the predicted scale `σ_NP / σ_SM` stays
//! below a threshold for every process, then build the calculation grid.
//!
//! For each coefficient and process the positive and negative probe values are
//! moved independently through three phases:
//!
//! 1. `Expand`: double while the largest scale is below the threshold
//!    (processes barely affected by the coefficient reach the endpoint quickly)
//! 2. `Contract`: halve while the largest scale is above the threshold
//! 3. `Refine`: grow by `1 + step` until the threshold is crossed again
//!
//! Growth stops before magnitudes pass `(4π)²`: convergence of the loop
//! expansion requires `c < (4π)²` (section 7 of arXiv:1205.4231).

use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    CoefficientBounds, CoefficientTuple, FitOptions, PointsInput, RangeSearchOptions, ScanKey,
};
use crate::error::ScanError;
use crate::math::{cartesian_product, linspace, vstack};
use crate::scan::ScanStore;

/// Largest coefficient magnitude for which the polynomial model is trusted.
pub const LOOP_CUTOFF: f64 = (4.0 * std::f64::consts::PI) * (4.0 * std::f64::consts::PI);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Expand,
    Contract,
    Refine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Positive,
    Negative,
}

impl Side {
    fn contains(self, v: f64) -> bool {
        match self {
            Side::Positive => v > 0.0,
            Side::Negative => v < 0.0,
        }
    }
}

/// Probe values for one coefficient and process, with their predicted scales.
struct Probe<'a> {
    scan: &'a ScanStore,
    key: ScanKey,
    values: Vec<f64>,
    scales: DVector<f64>,
}

impl<'a> Probe<'a> {
    fn new(scan: &'a ScanStore, key: ScanKey, values: Vec<f64>) -> Result<Self, ScanError> {
        let scales = scan.predict(&key, PointsInput::Column(&values))?;
        Ok(Self {
            scan,
            key,
            values,
            scales,
        })
    }

    /// Largest scale among the probes on `side`, `None` if the side is empty.
    fn max_scale(&self, side: Side) -> Option<f64> {
        self.values
            .iter()
            .zip(self.scales.iter())
            .filter(|(v, _)| side.contains(**v))
            .map(|(_, s)| *s)
            .reduce(f64::max)
    }

    fn max_magnitude(&self, side: Side) -> f64 {
        self.values
            .iter()
            .filter(|v| side.contains(**v))
            .fold(0.0, |acc, v| acc.max(v.abs()))
    }

    fn rescale(&mut self, side: Side, factor: f64) -> Result<(), ScanError> {
        for v in self.values.iter_mut().filter(|v| side.contains(**v)) {
            *v *= factor;
        }
        self.scales = self.scan.predict(&self.key, PointsInput::Column(&self.values))?;
        Ok(())
    }

    fn not_converged(&self, reason: impl Into<String>) -> ScanError {
        ScanError::NotConverged {
            coefficient: self.key.coefficients.to_string(),
            process: self.key.process.clone(),
            reason: reason.into(),
        }
    }

    fn run(&mut self, phase: Phase, side: Side, opts: &RangeSearchOptions) -> Result<(), ScanError> {
        let factor = match phase {
            Phase::Expand => 2.0,
            Phase::Contract => 0.5,
            Phase::Refine => 1.0 + opts.step,
        };

        for iteration in 0..=opts.max_iterations {
            let Some(max_scale) = self.max_scale(side) else {
                return Ok(());
            };
            let magnitude = self.max_magnitude(side);
            match phase {
                Phase::Expand | Phase::Refine => {
                    if max_scale >= opts.scale || magnitude * factor > LOOP_CUTOFF {
                        return Ok(());
                    }
                }
                Phase::Contract => {
                    if max_scale <= opts.scale {
                        return Ok(());
                    }
                    if magnitude < opts.min_value {
                        return Err(self.not_converged(format!(
                            "magnitudes fell below {:e} with scale still above {}",
                            opts.min_value, opts.scale
                        )));
                    }
                }
            }
            if iteration == opts.max_iterations {
                break;
            }
            self.rescale(side, factor)?;
        }

        Err(self.not_converged(format!(
            "{phase:?} phase on the {side:?} side exceeded {} iterations",
            opts.max_iterations
        )))
    }

    fn range(&self) -> (f64, f64) {
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }
}

fn validate(opts: &RangeSearchOptions) -> Result<(), ScanError> {
    if !(opts.scale.is_finite() && opts.scale > 0.0) {
        return Err(ScanError::InvalidInput(format!("scale must be positive, got {}", opts.scale)));
    }
    if opts.interpolate_numvalues < 2 || opts.calculate_numvalues < 1 {
        return Err(ScanError::InvalidInput(
            "need at least 2 probe values and 1 grid value per coefficient".to_string(),
        ));
    }
    if !(opts.step.is_finite() && opts.step > 0.0) {
        return Err(ScanError::InvalidInput(format!("step must be positive, got {}", opts.step)));
    }
    Ok(())
}

/// Per-coefficient ranges over which every process stays under `opts.scale`.
///
/// The coarse scan is fit first if any of its entries lack fit constants.
pub fn find_bounds<S: AsRef<str>>(
    coefficients: &[S],
    coarse_scan: &mut ScanStore,
    opts: &RangeSearchOptions,
) -> Result<Vec<CoefficientBounds>, ScanError> {
    validate(opts)?;
    if !coarse_scan.is_fitted() {
        coarse_scan.fit(&FitOptions::default())?;
    }
    let scan: &ScanStore = coarse_scan;

    let start = Instant::now();
    let mut bounds = Vec::with_capacity(coefficients.len());
    for coefficient in coefficients {
        let coefficient = coefficient.as_ref();
        let tuple = CoefficientTuple::single(coefficient);
        let processes: Vec<&str> = scan.processes(&tuple).collect();
        if processes.is_empty() {
            return Err(ScanError::MissingCoefficient(coefficient.to_string()));
        }

        let mut column: Option<(f64, f64)> = None;
        for process in processes {
            let key = ScanKey::new(tuple.clone(), process);
            let sampled = scan.points(&key).ok_or_else(|| key.missing())?;
            let values = linspace(sampled.min(), sampled.max(), opts.interpolate_numvalues);

            let mut probe = Probe::new(scan, key, values)?;
            for phase in [Phase::Expand, Phase::Contract, Phase::Refine] {
                for side in [Side::Positive, Side::Negative] {
                    probe.run(phase, side, opts)?;
                }
                tracing::debug!(
                    "{coefficient} / {process}: after {phase:?} range {:?}",
                    probe.range()
                );
            }

            let (lo, hi) = probe.range();
            column = Some(match column {
                Some((min, max)) => (min.max(lo), max.min(hi)),
                None => (lo, hi),
            });
        }

        if let Some((min, max)) = column {
            tracing::info!("{coefficient}: [{min:.6}, {max:.6}]");
            bounds.push(CoefficientBounds {
                coefficient: coefficient.to_string(),
                min,
                max,
            });
        }
    }
    tracing::info!("got values in {:.1} seconds", start.elapsed().as_secs_f64());
    Ok(bounds)
}

/// Calculation grid spanning the allowed range of every coefficient.
///
/// Each axis has `opts.calculate_numvalues` evenly spaced values; the grid is
/// their Cartesian product followed by the SM point, which every scale
/// calculation needs as its reference.
pub fn get_points<S: AsRef<str>>(
    coefficients: &[S],
    coarse_scan: &mut ScanStore,
    opts: &RangeSearchOptions,
) -> Result<DMatrix<f64>, ScanError> {
    let bounds = find_bounds(coefficients, coarse_scan, opts)?;
    Ok(grid_from_bounds(&bounds, opts.calculate_numvalues))
}

/// Cartesian grid over `bounds` with the SM point appended.
pub fn grid_from_bounds(bounds: &[CoefficientBounds], numvalues: usize) -> DMatrix<f64> {
    let axes: Vec<Vec<f64>> = bounds
        .iter()
        .map(|b| linspace(b.min, b.max, numvalues))
        .collect();
    let sm = DMatrix::<f64>::zeros(1, bounds.len());
    vstack(&cartesian_product(&axes), &sm)
}
