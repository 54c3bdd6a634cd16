//! Error types for the ganomaly core crate.
//!
//! Configuration errors are fatal and raised before any training step runs.
//! Data errors are fatal during training except for held-out shortages, which
//! the trainer treats as a skipped validation interval.

use std::path::PathBuf;

use crate::data::Split;

/// Top-level error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while resolving the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} parameter '{value}' is not valid, expected one of: {allowed}")]
    InvalidChoice {
        key: &'static str,
        value: String,
        allowed: String,
    },

    #[error("{key} must be {requirement}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: String,
        requirement: &'static str,
    },

    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

/// Errors from the data source.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("{split} split is empty")]
    EmptySplit { split: Split },

    #[error("{split} split exhausted: requested {requested} samples, {available} available")]
    Exhausted {
        split: Split,
        requested: usize,
        available: usize,
    },

    #[error("inconsistent feature width: expected {expected}, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },
}

impl DataError {
    /// Whether the error only means a split holds too few samples.
    pub fn is_shortage(&self) -> bool {
        matches!(self, Self::EmptySplit { .. } | Self::Exhausted { .. })
    }
}

/// Errors from the metrics history.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("record step {step} precedes the last recorded step {last}")]
    NonMonotonicStep { step: u64, last: u64 },

    #[error("metric '{name}' is not finite ({value})")]
    NonFinite { name: String, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortage_classification() {
        let exhausted = DataError::Exhausted {
            split: Split::Validation,
            requested: 100,
            available: 12,
        };
        assert!(exhausted.is_shortage());
        assert!(DataError::EmptySplit { split: Split::Test }.is_shortage());
        assert!(!DataError::FeatureWidth { expected: 9, actual: 4 }.is_shortage());
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::InvalidChoice {
            key: "method",
            value: "bogus".into(),
            allowed: "classical, quantum".into(),
        };
        assert_eq!(
            err.to_string(),
            "method parameter 'bogus' is not valid, expected one of: classical, quantum"
        );

        let err = DataError::Exhausted {
            split: Split::Validation,
            requested: 100,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "validation split exhausted: requested 100 samples, 12 available"
        );
    }
}
