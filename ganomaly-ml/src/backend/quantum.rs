//! Hybrid backend: dense encoder and critic around a simulated circuit decoder.

use ganomaly_core::{GanConfig, Method, SeedManager};

use super::classical::{dense_critic, dense_encoder};
use super::networks::GanNetworks;
use crate::error::MlError;
use crate::quantum::QuantumDecoder;

pub type QuantumDecoderNetworks = GanNetworks<QuantumDecoder>;

impl GanNetworks<QuantumDecoder> {
    pub fn quantum(config: &GanConfig, feature_dim: usize) -> Result<Self, MlError> {
        let mut seeds = SeedManager::new(config.seed);
        let latent = config.latent_dimensions;
        let encoder = dense_encoder(feature_dim, latent, &mut seeds.rng_for("encoder"))?;
        let decoder = QuantumDecoder::new(
            latent,
            feature_dim,
            config.quantum_depth,
            config.quantum_circuit_type,
            config.shots,
            &mut seeds.rng_for("decoder"),
            seeds.rng_for("shots"),
        )?;
        let critic = dense_critic(feature_dim, &mut seeds.rng_for("critic"))?;
        Self::new(Method::Quantum, encoder, decoder, critic, config)
    }
}
