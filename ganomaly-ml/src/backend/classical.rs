//! Fully classical backend: dense encoder, dense decoder, dense critic.

use rand::rngs::StdRng;

use ganomaly_core::{GanConfig, Method, SeedManager};

use super::networks::GanNetworks;
use crate::error::MlError;
use crate::nn::{Activation, Mlp};

pub type ClassicalDenseNetworks = GanNetworks<Mlp>;

/// Hidden widths shared by the encoder and critic, mirrored by the decoder.
pub const HIDDEN: [usize; 2] = [16, 8];

/// `F → 16 → 8 → latent`, tanh-bounded codes.
pub fn dense_encoder(feature_dim: usize, latent_dim: usize, rng: &mut StdRng) -> Result<Mlp, MlError> {
    Mlp::new(
        &[feature_dim, HIDDEN[0], HIDDEN[1], latent_dim],
        Activation::LEAKY,
        Activation::Tanh,
        rng,
    )
}

/// `latent → 8 → 16 → F`, sigmoid outputs in `[0, 1]`.
pub fn dense_decoder(latent_dim: usize, feature_dim: usize, rng: &mut StdRng) -> Result<Mlp, MlError> {
    Mlp::new(
        &[latent_dim, HIDDEN[1], HIDDEN[0], feature_dim],
        Activation::LEAKY,
        Activation::Sigmoid,
        rng,
    )
}

/// `F → 16 → 8 → 1` with a linear output, as a Wasserstein critic needs.
pub fn dense_critic(feature_dim: usize, rng: &mut StdRng) -> Result<Mlp, MlError> {
    Mlp::new(
        &[feature_dim, HIDDEN[0], HIDDEN[1], 1],
        Activation::LEAKY,
        Activation::Identity,
        rng,
    )
}

impl GanNetworks<Mlp> {
    pub fn classical(config: &GanConfig, feature_dim: usize) -> Result<Self, MlError> {
        let mut seeds = SeedManager::new(config.seed);
        let latent = config.latent_dimensions;
        let encoder = dense_encoder(feature_dim, latent, &mut seeds.rng_for("encoder"))?;
        let decoder = dense_decoder(latent, feature_dim, &mut seeds.rng_for("decoder"))?;
        let critic = dense_critic(feature_dim, &mut seeds.rng_for("critic"))?;
        Self::new(Method::Classical, encoder, decoder, critic, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ComponentKind, GanBackend};
    use crate::matrix::Matrix;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config() -> GanConfig {
        GanConfig {
            latent_dimensions: 3,
            ..GanConfig::default()
        }
    }

    #[test]
    fn test_shapes() {
        let mut nets = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        let x = Matrix::from_elem((4, 9), 0.5);
        let z = nets.encode(&x).unwrap();
        assert_eq!(z.dim(), (4, 3));
        assert!(z.iter().all(|v| v.abs() <= 1.0));
        let x_hat = nets.decode(&z).unwrap();
        assert_eq!(x_hat.dim(), (4, 9));
        assert_eq!(nets.discriminate(&x_hat).unwrap().dim(), (4, 1));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        let b = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        assert_eq!(a.parameters(), b.parameters());
        // Encoder and critic open with the same 9 -> 16 shape but draw from separate streams.
        assert_ne!(a.parameters().encoder[..16], a.parameters().critic[..16]);
    }

    #[test]
    fn test_apply_update_changes_only_target() {
        let mut nets = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        let before = nets.parameters();
        let grads = vec![1.0; before.critic.len()];
        nets.apply_update(ComponentKind::Critic, &grads).unwrap();
        let after = nets.parameters();
        assert_eq!(after.encoder, before.encoder);
        assert_eq!(after.decoder, before.decoder);
        assert_ne!(after.critic, before.critic);
        assert!(nets.apply_update(ComponentKind::Encoder, &[1.0]).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut trained = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        let grads = vec![0.5; trained.parameters().decoder.len()];
        trained.apply_update(ComponentKind::Decoder, &grads).unwrap();
        trained.save(dir.path()).unwrap();

        let other = GanConfig { seed: 7, ..config() };
        let mut fresh = ClassicalDenseNetworks::classical(&other, 9).unwrap();
        assert_ne!(fresh.parameters(), trained.parameters());
        fresh.load(dir.path()).unwrap();
        assert_eq!(fresh.parameters(), trained.parameters());
        assert_eq!(fresh.summarize(), trained.summarize());
    }

    #[test]
    fn test_load_rejects_other_shape() {
        let dir = TempDir::new().unwrap();
        ClassicalDenseNetworks::classical(&config(), 9).unwrap().save(dir.path()).unwrap();
        let wider = GanConfig { latent_dimensions: 4, ..config() };
        let mut nets = ClassicalDenseNetworks::classical(&wider, 9).unwrap();
        assert!(matches!(nets.load(dir.path()), Err(MlError::CheckpointMismatch(_))));
    }

    #[test]
    fn test_summary_lists_components() {
        let nets = ClassicalDenseNetworks::classical(&config(), 9).unwrap();
        let summary = nets.summarize();
        assert!(summary.starts_with("Method: classical"));
        for name in ["encoder (9 -> 3)", "decoder (3 -> 9)", "critic (9 -> 1)", "Total trainable parameters"] {
            assert!(summary.contains(name), "missing {name} in\n{summary}");
        }
    }
}
