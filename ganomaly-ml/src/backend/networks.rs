//! Encoder/decoder/critic triple generic over the decoder implementation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use ganomaly_core::{GanConfig, Method};

use super::checkpoint::{self, ComponentSnapshot, NetworkSnapshot};
use super::{Backward, Component, ComponentKind, GanBackend, ParameterSet};
use crate::error::MlError;
use crate::matrix::Matrix;
use crate::nn::{Mlp, Penalty};
use crate::optim::Adam;

/// Dense encoder and critic around a pluggable decoder `D`.
///
/// The critic is optimized at `discriminator_training_rate`, the encoder and
/// decoder at `generator_training_rate`, each with its own Adam state.
#[derive(Debug, Clone)]
pub struct GanNetworks<D> {
    method: Method,
    encoder: Mlp,
    decoder: D,
    critic: Mlp,
    encoder_opt: Adam,
    decoder_opt: Adam,
    critic_opt: Adam,
}

impl<D: Component> GanNetworks<D> {
    pub fn new(
        method: Method,
        encoder: Mlp,
        decoder: D,
        critic: Mlp,
        config: &GanConfig,
    ) -> Result<Self, MlError> {
        let feature_dim = encoder.input_dim();
        let latent_dim = encoder.output_dim();
        if decoder.input_dim() != latent_dim || decoder.output_dim() != feature_dim {
            return Err(MlError::model(format!(
                "decoder maps {} -> {}, expected {latent_dim} -> {feature_dim}",
                decoder.input_dim(),
                decoder.output_dim()
            )));
        }
        if critic.input_dim() != feature_dim || critic.output_dim() != 1 {
            return Err(MlError::model(format!(
                "critic maps {} -> {}, expected {feature_dim} -> 1",
                critic.input_dim(),
                critic.output_dim()
            )));
        }
        Ok(Self {
            method,
            encoder,
            decoder,
            critic,
            encoder_opt: Adam::for_gan(config.generator_training_rate),
            decoder_opt: Adam::for_gan(config.generator_training_rate),
            critic_opt: Adam::for_gan(config.discriminator_training_rate),
        })
    }

    pub fn encoder(&self) -> &Mlp {
        &self.encoder
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn critic(&self) -> &Mlp {
        &self.critic
    }

    fn component(&self, kind: ComponentKind) -> &dyn Component {
        match kind {
            ComponentKind::Encoder => &self.encoder,
            ComponentKind::Decoder => &self.decoder,
            ComponentKind::Critic => &self.critic,
        }
    }

    fn component_mut(&mut self, kind: ComponentKind) -> (&mut dyn Component, &mut Adam) {
        match kind {
            ComponentKind::Encoder => (&mut self.encoder, &mut self.encoder_opt),
            ComponentKind::Decoder => (&mut self.decoder, &mut self.decoder_opt),
            ComponentKind::Critic => (&mut self.critic, &mut self.critic_opt),
        }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            method: self.method,
            feature_dim: self.feature_dim(),
            latent_dim: self.latent_dim(),
            components: ComponentKind::ALL
                .into_iter()
                .map(|kind| {
                    let c = self.component(kind);
                    ComponentSnapshot {
                        kind,
                        input_dim: c.input_dim(),
                        output_dim: c.output_dim(),
                        architecture: c.architecture(),
                        parameters: c.parameters(),
                    }
                })
                .collect(),
        }
    }

    /// Overwrite every parameter from `snapshot` after checking it was taken
    /// from a backend of the same method, shape and architecture.
    pub fn restore(&mut self, snapshot: &NetworkSnapshot) -> Result<(), MlError> {
        if snapshot.method != self.method {
            return Err(MlError::mismatch(format!(
                "checkpoint was written by the {} backend, this run uses {}",
                snapshot.method, self.method
            )));
        }
        for kind in ComponentKind::ALL {
            let saved = snapshot.component(kind)?;
            let current = self.component(kind);
            if saved.input_dim != current.input_dim()
                || saved.output_dim != current.output_dim()
                || saved.parameters.len() != current.parameter_count()
            {
                return Err(MlError::mismatch(format!(
                    "{kind} shape {} -> {} with {} parameters does not match {} -> {} with {}",
                    saved.input_dim,
                    saved.output_dim,
                    saved.parameters.len(),
                    current.input_dim(),
                    current.output_dim(),
                    current.parameter_count()
                )));
            }
            let architecture = current.architecture();
            if saved.architecture != architecture {
                return Err(MlError::mismatch(format!(
                    "{kind} was trained as `{}`, this run builds `{architecture}`",
                    saved.architecture
                )));
            }
        }
        for kind in ComponentKind::ALL {
            let saved = snapshot.component(kind)?;
            self.component_mut(kind).0.set_parameters(&saved.parameters)?;
        }
        Ok(())
    }
}

impl<D: Component> GanBackend for GanNetworks<D> {
    fn method(&self) -> Method {
        self.method
    }

    fn feature_dim(&self) -> usize {
        self.encoder.input_dim()
    }

    fn latent_dim(&self) -> usize {
        self.encoder.output_dim()
    }

    fn encode(&mut self, batch: &Matrix) -> Result<Matrix, MlError> {
        self.encoder.predict(batch)
    }

    fn decode(&mut self, latent: &Matrix) -> Result<Matrix, MlError> {
        self.decoder.forward(latent)
    }

    fn discriminate(&mut self, batch: &Matrix) -> Result<Matrix, MlError> {
        self.critic.predict(batch)
    }

    fn backward(
        &mut self,
        kind: ComponentKind,
        input: &Matrix,
        grad_output: &Matrix,
    ) -> Result<Backward, MlError> {
        self.component_mut(kind).0.backward(input, grad_output)
    }

    fn gradient_penalty(&self, interpolated: &Matrix) -> Result<Penalty, MlError> {
        self.critic.gradient_penalty(interpolated)
    }

    fn apply_update(&mut self, kind: ComponentKind, grads: &[f64]) -> Result<(), MlError> {
        let (component, optimizer) = self.component_mut(kind);
        let mut params = component.parameters();
        optimizer.step(&mut params, grads)?;
        component.set_parameters(&params)
    }

    fn parameters(&self) -> ParameterSet {
        ParameterSet {
            encoder: self.encoder.parameters(),
            decoder: self.decoder.parameters(),
            critic: self.critic.parameters(),
        }
    }

    fn save(&self, dir: &Path) -> Result<PathBuf, MlError> {
        checkpoint::write(dir, &self.snapshot())
    }

    fn load(&mut self, dir: &Path) -> Result<(), MlError> {
        let (manifest, snapshot) = checkpoint::read(dir)?;
        self.restore(&snapshot)?;
        info!(
            checkpoint_id = %manifest.id,
            method = %self.method,
            parameters = self.parameter_count(),
            "Networks restored"
        );
        Ok(())
    }

    fn summarize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Method: {}", self.method);
        for kind in ComponentKind::ALL {
            let c = self.component(kind);
            let _ = writeln!(
                out,
                "{kind} ({} -> {})  params: {}",
                c.input_dim(),
                c.output_dim(),
                c.parameter_count()
            );
            for line in c.describe() {
                let _ = writeln!(out, "  {line}");
            }
        }
        let _ = write!(out, "Total trainable parameters: {}", self.parameter_count());
        out
    }
}
