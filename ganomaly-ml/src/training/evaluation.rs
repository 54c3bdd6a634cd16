//! Held-out metrics, shared by periodic validation and predict mode.

use std::collections::BTreeMap;

use tracing::debug;

use ganomaly_core::{SeedManager, Split};

use super::trainer::{Trainer, batch_matrix, check_finite};
use crate::error::MlError;
use crate::matrix::row_mse;
use crate::metrics::{Confusion, class_mean, contamination_threshold, mean, roc_auc};

/// Keys of every validation and test record.
pub const METRIC_KEYS: [&str; 11] = [
    "reconstruction_error",
    "encoding_error",
    "critic_score",
    "anomaly_score_normal",
    "anomaly_score_anomalous",
    "auc",
    "accuracy",
    "precision",
    "recall",
    "f1",
    "threshold",
];

impl Trainer<'_> {
    /// Score a held-out split without touching any parameter.
    ///
    /// The anomaly score of a sample is its reconstruction MSE. Validation
    /// uses the first `validation_samples` samples, test the whole split. The
    /// decision threshold flags the same fraction of samples as the split's
    /// anomalous fraction.
    pub fn calculate_metrics(&mut self, split: Split) -> Result<BTreeMap<String, f64>, MlError> {
        let size = match split {
            Split::Validation => self.config.validation_samples,
            Split::Test | Split::Train => self.data.split_len(split),
        };
        // Held-out batches are fixed prefixes; this generator is never advanced
        // for them, and it keeps the training stream untouched either way.
        let mut rng = SeedManager::new(self.config.seed).rng_for("evaluation");
        let batch = self.data.sample_batch(split, size, &mut rng)?;
        let flags = batch.anomaly_flags();
        let x = batch_matrix(&batch)?;

        let z = self.backend.encode(&x)?;
        let x_hat = self.backend.decode(&z)?;
        let z_hat = self.backend.encode(&x_hat)?;
        let critic = self.backend.discriminate(&x)?;

        let scores = row_mse(&x, &x_hat)?;
        let encoding = row_mse(&z, &z_hat)?;
        let anomalous_fraction = flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64;
        let threshold = contamination_threshold(&scores, anomalous_fraction);
        let confusion = Confusion::at_threshold(&scores, &flags, threshold);

        let values = [
            mean(&scores),
            mean(&encoding),
            critic.mean().unwrap_or(0.0),
            class_mean(&scores, &flags, false),
            class_mean(&scores, &flags, true),
            roc_auc(&scores, &flags),
            confusion.accuracy(),
            confusion.precision(),
            confusion.recall(),
            confusion.f1(),
            threshold,
        ];
        let step = self.state.step();
        for (key, value) in METRIC_KEYS.into_iter().zip(values) {
            check_finite(step, key, value)?;
        }
        debug!(%split, samples = flags.len(), anomalous_fraction, "Metrics calculated");

        Ok(METRIC_KEYS
            .iter()
            .map(|k| k.to_string())
            .zip(values)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ClassicalDenseNetworks;
    use crate::training::TrainerOptions;
    use ganomaly_core::{DataSource, DataStorage, GanConfig, Phase};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup() -> (GanConfig, DataStorage) {
        let cfg = GanConfig {
            latent_dimensions: 3,
            validation_samples: 40,
            ..GanConfig::default()
        };
        let data = DataStorage::synthetic(3, &mut StdRng::seed_from_u64(9));
        (cfg, data)
    }

    #[test]
    fn test_metric_keys_and_ranges() {
        let (cfg, data) = setup();
        let backend = ClassicalDenseNetworks::classical(&cfg, data.feature_dim()).unwrap();
        let mut t = Trainer::new(&cfg, &data, Box::new(backend), TrainerOptions::new("classical")).unwrap();
        let metrics = t.calculate_metrics(Split::Validation).unwrap();

        let mut expected: Vec<&str> = METRIC_KEYS.to_vec();
        expected.sort_unstable();
        assert_eq!(metrics.keys().map(String::as_str).collect::<Vec<_>>(), expected);
        for key in ["auc", "accuracy", "precision", "recall", "f1"] {
            assert!((0.0..=1.0).contains(&metrics[key]), "{key} = {}", metrics[key]);
        }
        assert!(metrics["reconstruction_error"] >= 0.0);
    }

    #[test]
    fn test_metrics_are_repeatable() {
        let (cfg, data) = setup();
        let backend = ClassicalDenseNetworks::classical(&cfg, data.feature_dim()).unwrap();
        let mut t = Trainer::new(&cfg, &data, Box::new(backend), TrainerOptions::new("classical")).unwrap();
        let a = t.calculate_metrics(Split::Test).unwrap();
        let b = t.calculate_metrics(Split::Test).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluate_is_single_test_record() {
        let (cfg, data) = setup();
        let backend = ClassicalDenseNetworks::classical(&cfg, data.feature_dim()).unwrap();
        let mut t = Trainer::new(&cfg, &data, Box::new(backend), TrainerOptions::new("classical")).unwrap();
        let result = t.evaluate().unwrap();
        assert_eq!(result.len(), 1);
        let record = result.last().unwrap();
        assert_eq!(record.step, 0);
        assert_eq!(record.phase, Phase::Test);
        assert_eq!(record.metrics.len(), METRIC_KEYS.len());
    }

    #[test]
    fn test_validation_shortage_error() {
        let (cfg, data) = setup();
        let cfg = GanConfig {
            validation_samples: data.split_len(Split::Validation) + 1,
            ..cfg
        };
        let backend = ClassicalDenseNetworks::classical(&cfg, data.feature_dim()).unwrap();
        let mut t = Trainer::new(&cfg, &data, Box::new(backend), TrainerOptions::new("classical")).unwrap();
        let err = t.calculate_metrics(Split::Validation).unwrap_err();
        assert!(err.is_data_shortage());
    }
}
