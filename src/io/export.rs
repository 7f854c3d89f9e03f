//! Export calculation grids and coefficient bounds.
//!
//! The grid CSV is meant to be consumed by the job that runs the external
//! simulator: one header row with the coefficient names, then one row per point.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::CoefficientBounds;
use crate::error::AppError;

/// Write a grid of points to a CSV file.
pub fn write_grid_csv(path: &Path, coefficients: &[String], grid: &DMatrix<f64>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create grid CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_grid(&mut out, coefficients, grid)
        .and_then(|()| out.flush())
        .map_err(|e| AppError::new(2, format!("Failed to write grid CSV '{}': {e}", path.display())))
}

/// Write a grid as CSV to any writer (stdout when no output file is given).
pub fn write_grid<W: Write>(out: &mut W, coefficients: &[String], grid: &DMatrix<f64>) -> std::io::Result<()> {
    writeln!(out, "{}", coefficients.join(","))?;
    for row in grid.row_iter() {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.10e}")).collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    Ok(())
}

/// Write coefficient bounds to a JSON file.
pub fn write_bounds_json(path: &Path, bounds: &[CoefficientBounds]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create bounds JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, bounds)
        .map_err(|e| AppError::new(2, format!("Failed to write bounds JSON: {e}")))?;
    Ok(())
}
