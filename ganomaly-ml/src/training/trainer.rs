//! Critic-heavy adversarial training with a Wasserstein gradient penalty.

use ndarray::{Array1, Axis};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use ganomaly_core::{
    DataSource, GanConfig, History, HistoryRecord, Phase, SampleBatch, SeedManager, Split,
};

use super::state::{TrainerOptions, TrainerState};
use crate::backend::{ComponentKind, GanBackend};
use crate::error::MlError;
use crate::matrix::{Matrix, difference, ensure_same_shape, from_rows, mse, sum};
use crate::optim::clip_grad_norm;

/// Keys of every training record, in no particular order.
pub const STEP_KEYS: [&str; 8] = [
    "discriminator_loss",
    "gradient_penalty",
    "real_score",
    "fake_score",
    "generator_loss",
    "adversarial_loss",
    "reconstruction_loss",
    "encoding_loss",
];

/// Drives one backend through training or evaluation.
pub struct Trainer<'a> {
    pub(super) config: &'a GanConfig,
    pub(super) data: &'a dyn DataSource,
    pub(super) backend: Box<dyn GanBackend>,
    options: TrainerOptions,
    rng: StdRng,
    pub(super) state: TrainerState,
    history: History,
}

#[derive(Debug, Default, Clone, Copy)]
struct CriticLosses {
    loss: f64,
    penalty: f64,
    real_score: f64,
    fake_score: f64,
}

#[derive(Debug, Clone, Copy)]
struct GeneratorLosses {
    total: f64,
    adversarial: f64,
    reconstruction: f64,
    encoding: f64,
}

impl<'a> Trainer<'a> {
    pub fn new(
        config: &'a GanConfig,
        data: &'a dyn DataSource,
        backend: Box<dyn GanBackend>,
        options: TrainerOptions,
    ) -> Result<Self, MlError> {
        if backend.feature_dim() != data.feature_dim() {
            return Err(MlError::model(format!(
                "backend expects {} features, data provides {}",
                backend.feature_dim(),
                data.feature_dim()
            )));
        }
        if backend.latent_dim() != config.latent_dimensions {
            return Err(MlError::model(format!(
                "backend latent width {} differs from latent_dimensions = {}",
                backend.latent_dim(),
                config.latent_dimensions
            )));
        }
        let rng = SeedManager::new(config.seed).rng_for("trainer");
        Ok(Self {
            config,
            data,
            backend,
            options,
            rng,
            state: TrainerState::Idle,
            history: History::new(),
        })
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn options(&self) -> &TrainerOptions {
        &self.options
    }

    /// Everything recorded so far, including a partially completed run.
    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn backend(&self) -> &dyn GanBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn GanBackend {
        self.backend.as_mut()
    }

    pub fn into_backend(self) -> Box<dyn GanBackend> {
        self.backend
    }

    /// Run `training_steps` steps, validating every `validation_interval`.
    ///
    /// Errors inside a step propagate; records appended before the failure
    /// stay in [`Trainer::history`].
    pub fn train(&mut self) -> Result<&History, MlError> {
        let steps = self.config.training_steps as u64;
        let interval = self.config.validation_interval as u64;
        info!(
            trainer = %self.options.name,
            steps,
            batch_size = self.config.batch_size,
            discriminator_iterations = self.config.discriminator_iterations,
            validation_interval = interval,
            "Training started"
        );

        for step in 1..=steps {
            self.state = TrainerState::Training { step };
            let record = self.train_step(step)?;
            debug!(
                step,
                discriminator_loss = record.get("discriminator_loss"),
                generator_loss = record.get("generator_loss"),
                "Step complete"
            );
            self.history.append(record)?;

            if interval > 0 && step % interval == 0 {
                self.validate(step)?;
            }
        }

        self.state = TrainerState::Done;
        info!(
            trainer = %self.options.name,
            records = self.history.len(),
            "Training finished"
        );
        Ok(&self.history)
    }

    /// Evaluate the current networks on the whole test split.
    ///
    /// The result is a one-record history at step 0 so it serializes exactly
    /// like the training history.
    pub fn evaluate(&mut self) -> Result<History, MlError> {
        self.state = TrainerState::Evaluating;
        let metrics = self.calculate_metrics(Split::Test)?;
        self.state = TrainerState::Done;
        info!(
            auc = metrics.get("auc").copied(),
            f1 = metrics.get("f1").copied(),
            "Evaluation finished"
        );
        Ok(History::single(HistoryRecord::with_metrics(
            0,
            Phase::Test,
            metrics,
        )))
    }

    fn validate(&mut self, step: u64) -> Result<(), MlError> {
        self.state = TrainerState::Validating { step };
        match self.calculate_metrics(Split::Validation) {
            Ok(metrics) => {
                info!(
                    step,
                    reconstruction_error = metrics.get("reconstruction_error").copied(),
                    auc = metrics.get("auc").copied(),
                    "Validation"
                );
                self.history
                    .append(HistoryRecord::with_metrics(step, Phase::Validation, metrics))?;
            }
            Err(e) if e.is_data_shortage() => {
                warn!(step, error = %e, "Skipping validation");
            }
            Err(e) => return Err(e),
        }
        self.state = TrainerState::Training { step };
        Ok(())
    }

    /// `discriminator_iterations` critic updates followed by one joint
    /// encoder/decoder update. Critic quantities are averaged over the
    /// iterations.
    pub fn train_step(&mut self, step: u64) -> Result<HistoryRecord, MlError> {
        let iterations = self.config.discriminator_iterations;
        let mut critic = CriticLosses::default();
        for _ in 0..iterations {
            let c = self.critic_update(step)?;
            critic.loss += c.loss;
            critic.penalty += c.penalty;
            critic.real_score += c.real_score;
            critic.fake_score += c.fake_score;
        }
        let n = iterations.max(1) as f64;
        let generator = self.generator_update(step)?;

        let mut record = HistoryRecord::new(step, Phase::Train);
        record.insert("discriminator_loss", critic.loss / n);
        record.insert("gradient_penalty", critic.penalty / n);
        record.insert("real_score", critic.real_score / n);
        record.insert("fake_score", critic.fake_score / n);
        record.insert("generator_loss", generator.total);
        record.insert("adversarial_loss", generator.adversarial);
        record.insert("reconstruction_loss", generator.reconstruction);
        record.insert("encoding_loss", generator.encoding);
        Ok(record)
    }

    /// Minimise `mean D(fake) − mean D(real) + λ · mean (‖∇D(x̂)‖ − 1)²`.
    fn critic_update(&mut self, step: u64) -> Result<CriticLosses, MlError> {
        let batch_size = self.config.batch_size;
        let real = self.train_batch()?;
        let latent = self.sample_latent(batch_size);
        let fake = self.backend.decode(&latent)?;

        let real_score = column_mean(&self.backend.discriminate(&real)?);
        let fake_score = column_mean(&self.backend.discriminate(&fake)?);

        let interpolated = self.interpolate(&real, &fake)?;
        let penalty = self.backend.gradient_penalty(&interpolated)?;
        let penalty_mean = penalty.mean();

        let lambda = self.config.gradient_penalty_weight;
        let loss = fake_score - real_score + lambda * penalty_mean;
        check_finite(step, "discriminator_loss", loss)?;

        let b = real.nrows() as f64;
        let d_fake = self.backend.backward(
            ComponentKind::Critic,
            &fake,
            &Matrix::from_elem((fake.nrows(), 1), 1.0 / b),
        )?;
        let d_real = self.backend.backward(
            ComponentKind::Critic,
            &real,
            &Matrix::from_elem((real.nrows(), 1), -1.0 / b),
        )?;
        let grads: Vec<f64> = d_fake
            .parameters
            .iter()
            .zip(&d_real.parameters)
            .zip(&penalty.gradient)
            .map(|((f, r), p)| f + r + lambda * p)
            .collect();
        self.backend.apply_update(ComponentKind::Critic, &grads)?;

        Ok(CriticLosses {
            loss,
            penalty: penalty_mean,
            real_score,
            fake_score,
        })
    }

    /// Minimise `adv_w · (−mean D(x̂)) + con_w · MSE(x, x̂) + enc_w · MSE(z, ẑ)`
    /// with `z = E(x)`, `x̂ = G(z)`, `ẑ = E(x̂)`.
    fn generator_update(&mut self, step: u64) -> Result<GeneratorLosses, MlError> {
        let cfg = self.config;
        let x = self.train_batch()?;
        let z = self.backend.encode(&x)?;
        let x_hat = self.backend.decode(&z)?;
        let z_hat = self.backend.encode(&x_hat)?;
        let scores = self.backend.discriminate(&x_hat)?;

        let adversarial = -column_mean(&scores);
        let reconstruction = mse(&x, &x_hat)?;
        let encoding = mse(&z, &z_hat)?;
        let total = cfg.adv_loss_weight * adversarial
            + cfg.con_loss_weight * reconstruction
            + cfg.enc_loss_weight * encoding;
        check_finite(step, "generator_loss", total)?;

        let b = x.nrows() as f64;
        let x_cells = x.len() as f64;
        let z_cells = z.len() as f64;

        // ∂/∂x̂ through the critic; the critic itself is not updated here.
        let adv_grad = Matrix::from_elem((x.nrows(), 1), -cfg.adv_loss_weight / b);
        let through_critic = self
            .backend
            .backward(ComponentKind::Critic, &x_hat, &adv_grad)?
            .input;
        let con_grad = difference(&x_hat, &x)? * (2.0 * cfg.con_loss_weight / x_cells);
        let enc_grad = difference(&z_hat, &z)? * (2.0 * cfg.enc_loss_weight / z_cells);
        let second_pass = self
            .backend
            .backward(ComponentKind::Encoder, &x_hat, &enc_grad)?;

        let x_hat_grad = sum(&sum(&through_critic, &con_grad)?, &second_pass.input)?;
        let decoder = self
            .backend
            .backward(ComponentKind::Decoder, &z, &x_hat_grad)?;
        let z_grad = difference(&decoder.input, &enc_grad)?;
        let first_pass = self.backend.backward(ComponentKind::Encoder, &x, &z_grad)?;

        let mut encoder_grads: Vec<f64> = first_pass
            .parameters
            .iter()
            .zip(&second_pass.parameters)
            .map(|(a, b)| a + b)
            .collect();
        let mut decoder_grads = decoder.parameters;

        if let Some(max_norm) = self.options.generator_clip_norm {
            let split = encoder_grads.len();
            let mut joint = encoder_grads;
            joint.extend_from_slice(&decoder_grads);
            let norm = clip_grad_norm(&mut joint, max_norm);
            if norm > max_norm {
                debug!(step, norm, max_norm, "Clipped generator gradient");
            }
            decoder_grads = joint.split_off(split);
            encoder_grads = joint;
        }

        self.backend
            .apply_update(ComponentKind::Encoder, &encoder_grads)?;
        self.backend
            .apply_update(ComponentKind::Decoder, &decoder_grads)?;

        Ok(GeneratorLosses {
            total,
            adversarial,
            reconstruction,
            encoding,
        })
    }

    fn train_batch(&mut self) -> Result<Matrix, MlError> {
        let batch = self
            .data
            .sample_batch(Split::Train, self.config.batch_size, &mut self.rng)?;
        batch_matrix(&batch)
    }

    /// Latent codes drawn uniformly from `[-1, 1]`, the range of the encoder.
    fn sample_latent(&mut self, rows: usize) -> Matrix {
        let rng = &mut self.rng;
        Matrix::from_shape_simple_fn((rows, self.config.latent_dimensions), || {
            rng.gen_range(-1.0..=1.0)
        })
    }

    /// `ε · real + (1 − ε) · fake` with one `ε ~ U[0, 1)` per row.
    fn interpolate(&mut self, real: &Matrix, fake: &Matrix) -> Result<Matrix, MlError> {
        ensure_same_shape(real, fake)?;
        let eps: Array1<f64> = (0..real.nrows())
            .map(|_| self.rng.gen_range(0.0..1.0))
            .collect();
        let eps = eps.insert_axis(Axis(1));
        Ok(real * &eps + fake * &(1.0 - &eps))
    }
}

pub(super) fn batch_matrix(batch: &SampleBatch) -> Result<Matrix, MlError> {
    from_rows(batch.features())
}

/// Mean of a score column; an empty batch scores zero.
fn column_mean(scores: &Matrix) -> f64 {
    scores.mean().unwrap_or(0.0)
}

pub(super) fn check_finite(step: u64, quantity: &'static str, value: f64) -> Result<(), MlError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MlError::NumericalInstability {
            step,
            quantity,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ClassicalDenseNetworks;
    use ganomaly_core::DataStorage;
    use rand::SeedableRng;

    fn config(steps: usize, interval: usize) -> GanConfig {
        GanConfig {
            training_steps: steps,
            validation_interval: interval,
            batch_size: 8,
            discriminator_iterations: 2,
            validation_samples: 20,
            latent_dimensions: 3,
            ..GanConfig::default()
        }
    }

    fn data() -> DataStorage {
        DataStorage::synthetic(3, &mut StdRng::seed_from_u64(0))
    }

    fn trainer<'a>(cfg: &'a GanConfig, data: &'a DataStorage) -> Trainer<'a> {
        let backend = ClassicalDenseNetworks::classical(cfg, data.feature_dim()).unwrap();
        Trainer::new(cfg, data, Box::new(backend), TrainerOptions::new("classical")).unwrap()
    }

    #[test]
    fn test_validation_cadence() {
        let cfg = config(20, 10);
        let data = data();
        let mut t = trainer(&cfg, &data);
        let history = t.train().unwrap();
        assert_eq!(history.training_records().count(), 20);
        let steps: Vec<u64> = history.validation_records().map(|r| r.step).collect();
        assert_eq!(steps, vec![10, 20]);
        assert!(t.state().is_done());
    }

    #[test]
    fn test_zero_interval_disables_validation() {
        let cfg = config(5, 0);
        let data = data();
        let mut t = trainer(&cfg, &data);
        assert_eq!(t.train().unwrap().validation_records().count(), 0);
    }

    #[test]
    fn test_step_record_keys() {
        let cfg = config(1, 0);
        let data = data();
        let mut t = trainer(&cfg, &data);
        let record = t.train_step(1).unwrap();
        let mut expected = STEP_KEYS.to_vec();
        expected.sort_unstable();
        assert_eq!(record.keys(), expected);
        assert!(record.get("gradient_penalty").unwrap() >= 0.0);
        assert!(record.metrics.values().all(|v| v.is_finite()));
    }

    #[test]
    fn test_oversized_validation_is_skipped() {
        let cfg = GanConfig {
            validation_samples: 10_000,
            ..config(4, 2)
        };
        let data = data();
        let mut t = trainer(&cfg, &data);
        let history = t.train().unwrap();
        assert_eq!(history.training_records().count(), 4);
        assert_eq!(history.validation_records().count(), 0);
    }

    #[test]
    fn test_training_reduces_reconstruction() {
        let cfg = GanConfig {
            generator_training_rate: 0.01,
            ..config(60, 0)
        };
        let data = data();
        let mut t = trainer(&cfg, &data);
        let before = t.calculate_metrics(Split::Validation).unwrap()["reconstruction_error"];
        t.train().unwrap();
        let after = t.calculate_metrics(Split::Validation).unwrap()["reconstruction_error"];
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn test_rejects_mismatched_backend() {
        let cfg = config(1, 0);
        let data = data();
        let backend = ClassicalDenseNetworks::classical(&cfg, 4).unwrap();
        assert!(Trainer::new(&cfg, &data, Box::new(backend), TrainerOptions::new("x")).is_err());
    }

    #[test]
    fn test_non_finite_is_fatal() {
        assert!(check_finite(3, "generator_loss", 1.0).is_ok());
        let err = check_finite(3, "generator_loss", f64::NAN).unwrap_err();
        assert!(matches!(
            err,
            MlError::NumericalInstability {
                step: 3,
                quantity: "generator_loss",
                ..
            }
        ));
    }
}
