//! Typed backend registry: one bundle of factories per [`Method`].

use ganomaly_core::{GanConfig, Method};

use crate::backend::{ClassicalDenseNetworks, GanBackend, QuantumDecoderNetworks};
use crate::error::MlError;
use crate::report::{ClassicalReporter, QuantumReporter, Reporter};
use crate::training::TrainerOptions;

/// Generator-side gradient bound for the circuit decoder, whose
/// parameter-shift estimates are noisy under finite shots.
pub const QUANTUM_GENERATOR_CLIP_NORM: f64 = 1.0;

pub type NetworksFactory = fn(&GanConfig, usize) -> Result<Box<dyn GanBackend>, MlError>;
pub type TrainerFactory = fn(&GanConfig) -> TrainerOptions;
pub type ReporterFactory = fn(&GanConfig) -> Box<dyn Reporter>;

/// Everything that differs between backends, chosen once per run.
#[derive(Clone, Copy)]
pub struct BackendBundle {
    pub method: Method,
    /// Builds the networks for a data set of the given feature width.
    pub networks: NetworksFactory,
    pub trainer: TrainerFactory,
    pub reporter: ReporterFactory,
}

impl std::fmt::Debug for BackendBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBundle")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

pub fn bundle(method: Method) -> BackendBundle {
    match method {
        Method::Classical => BackendBundle {
            method,
            networks: classical_networks,
            trainer: classical_trainer,
            reporter: classical_reporter,
        },
        Method::Quantum => BackendBundle {
            method,
            networks: quantum_networks,
            trainer: quantum_trainer,
            reporter: quantum_reporter,
        },
    }
}

fn classical_networks(
    config: &GanConfig,
    feature_dim: usize,
) -> Result<Box<dyn GanBackend>, MlError> {
    Ok(Box::new(ClassicalDenseNetworks::classical(config, feature_dim)?))
}

fn classical_trainer(_config: &GanConfig) -> TrainerOptions {
    TrainerOptions::new("classical")
}

fn classical_reporter(config: &GanConfig) -> Box<dyn Reporter> {
    Box::new(ClassicalReporter::new(config))
}

fn quantum_networks(
    config: &GanConfig,
    feature_dim: usize,
) -> Result<Box<dyn GanBackend>, MlError> {
    Ok(Box::new(QuantumDecoderNetworks::quantum(config, feature_dim)?))
}

fn quantum_trainer(_config: &GanConfig) -> TrainerOptions {
    TrainerOptions::new("quantum").with_generator_clip_norm(QUANTUM_GENERATOR_CLIP_NORM)
}

fn quantum_reporter(config: &GanConfig) -> Box<dyn Reporter> {
    Box::new(QuantumReporter::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_method_has_a_bundle() {
        for method in Method::ALL {
            let b = bundle(method);
            assert_eq!(b.method, method);
            let config = GanConfig {
                method,
                latent_dimensions: 2,
                quantum_depth: 1,
                ..GanConfig::default()
            };
            let networks = (b.networks)(&config, 4).unwrap();
            assert_eq!(networks.method(), method);
            assert_eq!((b.reporter)(&config).name(), method.as_str());
            assert_eq!((b.trainer)(&config).name, method.as_str());
        }
    }

    #[test]
    fn test_only_quantum_clips() {
        let config = GanConfig::default();
        assert_eq!((bundle(Method::Classical).trainer)(&config).generator_clip_norm, None);
        assert_eq!(
            (bundle(Method::Quantum).trainer)(&config).generator_clip_norm,
            Some(QUANTUM_GENERATOR_CLIP_NORM)
        );
    }
}
