//! # ganomaly-ml: networks, adversarial training, and evaluation
//!
//! Builds the encoder/decoder/critic triple for the selected backend and runs
//! the critic-heavy, gradient-penalized adversarial loop over it. Both
//! backends share one training loop and one metric path; they differ only in
//! how the decoder is realized:
//!
//! 1. **Classical** - dense decoder
//! 2. **Quantum** - simulated parameterized circuit, differentiated by parameter shift

// Numerics
pub mod matrix;
pub mod nn;
pub mod optim;
pub mod quantum;

// Backends
pub mod backend;
pub mod registry;

// Training & evaluation
pub mod metrics;
pub mod report;
pub mod runner;
pub mod training;

pub mod error;

// Re-exports
pub use backend::{ComponentKind, GanBackend, ParameterSet};
pub use error::MlError;
pub use matrix::Matrix;
pub use registry::{BackendBundle, bundle};
pub use report::Reporter;
pub use runner::{Run, RunOutcome, run};
pub use training::{Trainer, TrainerOptions, TrainerState};
