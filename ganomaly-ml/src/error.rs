//! Error types for the ganomaly-ml crate.

use std::path::PathBuf;

use ganomaly_core::{ConfigError, CoreError, DataError, HistoryError};
use thiserror::Error;

/// Top-level error type for network and training operations.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Checkpoint not found at {0}")]
    CheckpointNotFound(PathBuf),

    #[error("Checkpoint mismatch: {0}")]
    CheckpointMismatch(String),

    #[error("Numerical instability at step {step}: {quantity} = {value}")]
    NumericalInstability {
        step: u64,
        quantity: &'static str,
        value: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::CheckpointMismatch(msg.into())
    }

    /// Whether the error only means a held-out split was too small.
    pub fn is_data_shortage(&self) -> bool {
        match self {
            Self::Data(e) => e.is_shortage(),
            _ => false,
        }
    }
}
