//! Error types.
//!
//! - `ScanError` is returned by the library (store, fit, search, archive I/O).
//! - `AppError` is what the `xsec` binary reports: a message plus a process exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the scan container and its algorithms.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan does not contain the SM point for coefficients {coefficients} and process {process}")]
    MissingSmPoint { coefficients: String, process: String },

    #[error("no scan entry for coefficients {coefficients} and process {process}")]
    MissingEntry { coefficients: String, process: String },

    #[error("coarse scan is missing {0}")]
    MissingCoefficient(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("least squares fit failed for coefficients {coefficients} and process {process}")]
    SingularFit { coefficients: String, process: String },

    #[error("range search did not converge for {coefficient} ({process}): {reason}")]
    NotConverged {
        coefficient: String,
        process: String,
        reason: String,
    },

    #[error("cross section calculation failed: {0}")]
    SampleFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: Box<ScanError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    /// Process exit code used by the binary for this failure category.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanError::InvalidInput(_)
            | ScanError::ShapeMismatch(_)
            | ScanError::Archive { .. }
            | ScanError::Io(_)
            | ScanError::Json(_) => 2,
            ScanError::MissingSmPoint { .. }
            | ScanError::MissingEntry { .. }
            | ScanError::MissingCoefficient(_) => 3,
            ScanError::SingularFit { .. }
            | ScanError::NotConverged { .. }
            | ScanError::SampleFailed(_) => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_errors_map_to_exit_codes() {
        let missing = ScanError::MissingSmPoint {
            coefficients: "(cuW)".to_string(),
            process: "ttZ".to_string(),
        };
        let app: AppError = missing.into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("SM point"));

        let diverged = ScanError::NotConverged {
            coefficient: "cuW".to_string(),
            process: "ttZ".to_string(),
            reason: "floor".to_string(),
        };
        assert_eq!(AppError::from(diverged).exit_code(), 4);
    }
}
