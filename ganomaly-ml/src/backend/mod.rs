//! The network backend abstraction the adversarial trainer drives.
//!
//! A backend owns three differentiable components: an encoder (features to
//! latent), a decoder (latent to features) and a critic (features to a scalar
//! realness score). The trainer only sees [`GanBackend`]; which decoder sits
//! behind it is decided once by the backend registry.

pub mod checkpoint;
pub mod classical;
pub mod networks;
pub mod quantum;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ganomaly_core::Method;

use crate::error::MlError;
use crate::matrix::Matrix;
use crate::nn::Penalty;

pub use checkpoint::{CheckpointManifest, NetworkSnapshot};
pub use classical::ClassicalDenseNetworks;
pub use networks::GanNetworks;
pub use quantum::QuantumDecoderNetworks;

/// Gradients from one backward pass.
#[derive(Debug, Clone)]
pub struct Backward {
    /// Flattened parameter gradient, in [`Component::parameters`] order.
    pub parameters: Vec<f64>,
    /// Gradient with respect to the component input.
    pub input: Matrix,
}

/// A differentiable function of a batch with a flat parameter vector.
pub trait Component {
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize;

    /// Apply the component to a batch (rows are samples).
    ///
    /// Takes `&mut self` because sampled components advance their RNG.
    fn forward(&mut self, input: &Matrix) -> Result<Matrix, MlError>;

    /// Gradients of `sum(forward(input) ⊙ grad_output)`.
    fn backward(&mut self, input: &Matrix, grad_output: &Matrix) -> Result<Backward, MlError>;

    fn parameters(&self) -> Vec<f64>;

    fn set_parameters(&mut self, params: &[f64]) -> Result<(), MlError>;

    fn parameter_count(&self) -> usize;

    /// One line per layer for the run summary.
    fn describe(&self) -> Vec<String>;

    /// Everything besides the parameters that determines the function the
    /// component computes. Checkpoints only load into an equal architecture.
    fn architecture(&self) -> String;
}

/// The three trainable parts of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Encoder,
    Decoder,
    Critic,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [Self::Encoder, Self::Decoder, Self::Critic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encoder => "encoder",
            Self::Decoder => "decoder",
            Self::Critic => "critic",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every trainable parameter, by component.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub encoder: Vec<f64>,
    pub decoder: Vec<f64>,
    pub critic: Vec<f64>,
}

impl ParameterSet {
    pub fn get(&self, kind: ComponentKind) -> &[f64] {
        match kind {
            ComponentKind::Encoder => &self.encoder,
            ComponentKind::Decoder => &self.decoder,
            ComponentKind::Critic => &self.critic,
        }
    }

    pub fn len(&self) -> usize {
        self.encoder.len() + self.decoder.len() + self.critic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoder, decoder and critic behind one interface, independent of how the
/// decoder is realized.
pub trait GanBackend {
    fn method(&self) -> Method;

    fn feature_dim(&self) -> usize;

    fn latent_dim(&self) -> usize;

    /// Features to latent codes, `latent_dimensions` wide.
    fn encode(&mut self, batch: &Matrix) -> Result<Matrix, MlError>;

    /// Latent codes back to feature space.
    fn decode(&mut self, latent: &Matrix) -> Result<Matrix, MlError>;

    /// One realness score per sample, as a single-column matrix.
    fn discriminate(&mut self, batch: &Matrix) -> Result<Matrix, MlError>;

    fn backward(
        &mut self,
        kind: ComponentKind,
        input: &Matrix,
        grad_output: &Matrix,
    ) -> Result<Backward, MlError>;

    /// Critic gradient penalty on `interpolated` with its parameter gradient.
    fn gradient_penalty(&self, interpolated: &Matrix) -> Result<Penalty, MlError>;

    /// One optimizer step on `kind` with the given flat gradient.
    fn apply_update(&mut self, kind: ComponentKind, grads: &[f64]) -> Result<(), MlError>;

    fn parameters(&self) -> ParameterSet;

    fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    /// Persist all three components under `dir`, returning the weights file.
    fn save(&self, dir: &Path) -> Result<PathBuf, MlError>;

    /// Restore all three components from `dir`.
    ///
    /// Fails with [`MlError::CheckpointNotFound`] when nothing was saved there
    /// and with [`MlError::CheckpointMismatch`] when the checkpoint belongs to
    /// a differently shaped backend or does not match its digest.
    fn load(&mut self, dir: &Path) -> Result<(), MlError>;

    fn summarize(&self) -> String;
}
