//! Data source: normal/anomalous samples split into train, validation and test.
//!
//! Training only ever sees normal samples; the held-out splits mix normal and
//! anomalous samples so anomaly-detection quality can be measured on them.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GanConfig;
use crate::error::DataError;
use crate::reproducibility::{SeedManager, standard_normal};

const TRAIN_FRACTION: f64 = 0.70;
const VALIDATION_FRACTION: f64 = 0.15;

const SYNTHETIC_TRAIN: usize = 512;
const SYNTHETIC_HELD_OUT_NORMAL: usize = 120;
const SYNTHETIC_HELD_OUT_ANOMALOUS: usize = 40;

/// Which partition of the data set to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Validation => "validation",
            Self::Test => "test",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Anomalous,
}

/// One feature vector with its ground-truth label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub features: Vec<f64>,
    pub label: Label,
}

/// A fixed-size ordered collection of samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleBatch {
    samples: Vec<Sample>,
}

impl SampleBatch {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Feature rows in batch order.
    pub fn features(&self) -> impl Iterator<Item = &[f64]> {
        self.samples.iter().map(|s| s.features.as_slice())
    }

    /// `true` for anomalous samples, in batch order.
    pub fn anomaly_flags(&self) -> Vec<bool> {
        self.samples
            .iter()
            .map(|s| s.label == Label::Anomalous)
            .collect()
    }
}

/// Provider of fixed-shape sample batches.
pub trait DataSource {
    /// Width of every feature vector.
    fn feature_dim(&self) -> usize;

    /// Number of samples available in `split`.
    fn split_len(&self, split: Split) -> usize;

    /// Draw `size` samples from `split`.
    ///
    /// Train batches are drawn uniformly with replacement. Validation and test
    /// batches are the deterministic first `size` samples of the split and fail
    /// with [`DataError::Exhausted`] when the split is smaller than `size`.
    fn sample_batch(
        &self,
        split: Split,
        size: usize,
        rng: &mut StdRng,
    ) -> Result<SampleBatch, DataError>;
}

/// On-disk data file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFile {
    pub normal: Vec<Vec<f64>>,
    #[serde(default)]
    pub anomalous: Vec<Vec<f64>>,
}

/// In-memory data set partitioned into the three splits.
#[derive(Debug, Clone)]
pub struct DataStorage {
    feature_dim: usize,
    train: Vec<Sample>,
    validation: Vec<Sample>,
    test: Vec<Sample>,
}

impl DataStorage {
    /// Open the data set named by the configuration.
    ///
    /// An empty `data_filepath` selects the built-in synthetic pixel data set.
    pub fn open(config: &GanConfig) -> Result<Self, DataError> {
        let mut seeds = SeedManager::new(config.seed);
        let mut rng = seeds.rng_for("data");
        if config.data_filepath.trim().is_empty() {
            debug!(pix = config.pix_num_one_side, "Using synthetic data set");
            Ok(Self::synthetic(config.pix_num_one_side, &mut rng))
        } else {
            Self::from_file(Path::new(&config.data_filepath), &mut rng)
        }
    }

    /// Load a JSON data file of the form `{"normal": [[..]], "anomalous": [[..]]}`.
    pub fn from_file(path: &Path, rng: &mut StdRng) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: DataFile =
            serde_json::from_str(&content).map_err(|e| DataError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::from_samples(file.normal, file.anomalous, rng).map_err(|e| match e {
            DataError::FeatureWidth { expected, actual } => DataError::Malformed {
                path: PathBuf::from(path),
                message: format!("feature width {actual} does not match {expected}"),
            },
            other => other,
        })
    }

    /// Partition raw feature vectors into train/validation/test.
    ///
    /// Normal samples are shuffled and split 70/15/15; anomalous samples are
    /// split evenly between validation and test.
    pub fn from_samples(
        mut normal: Vec<Vec<f64>>,
        mut anomalous: Vec<Vec<f64>>,
        rng: &mut StdRng,
    ) -> Result<Self, DataError> {
        let feature_dim = normal
            .first()
            .map(Vec::len)
            .ok_or(DataError::EmptySplit { split: Split::Train })?;
        for row in normal.iter().chain(anomalous.iter()) {
            if row.len() != feature_dim {
                return Err(DataError::FeatureWidth {
                    expected: feature_dim,
                    actual: row.len(),
                });
            }
        }

        normal.shuffle(rng);
        anomalous.shuffle(rng);

        let n = normal.len();
        let n_train = ((n as f64) * TRAIN_FRACTION).round() as usize;
        let n_validation = ((n as f64) * VALIDATION_FRACTION).round() as usize;
        let n_train = n_train.max(1).min(n);
        let n_validation = n_validation.min(n - n_train);

        let mut normal = normal.into_iter();
        let train: Vec<Sample> = normal.by_ref().take(n_train).map(normal_sample).collect();
        let mut validation: Vec<Sample> =
            normal.by_ref().take(n_validation).map(normal_sample).collect();
        let mut test: Vec<Sample> = normal.map(normal_sample).collect();

        let half = anomalous.len() / 2;
        let mut anomalous = anomalous.into_iter();
        validation.extend(anomalous.by_ref().take(half).map(anomalous_sample));
        test.extend(anomalous.map(anomalous_sample));

        // Interleave labels so prefixes of the held-out splits stay mixed.
        validation.shuffle(rng);
        test.shuffle(rng);

        debug!(
            feature_dim,
            train = train.len(),
            validation = validation.len(),
            test = test.len(),
            "Data set partitioned"
        );

        Ok(Self {
            feature_dim,
            train,
            validation,
            test,
        })
    }

    /// Synthetic `side x side` pixel images in `[0, 1]`.
    ///
    /// Normal images are a left-to-right brightness ramp with small noise;
    /// anomalous images carry a bright blob on a dark background.
    pub fn synthetic(side: usize, rng: &mut StdRng) -> Self {
        let normal: Vec<Vec<f64>> = (0..SYNTHETIC_TRAIN + SYNTHETIC_HELD_OUT_NORMAL * 2)
            .map(|_| ramp_image(side, rng))
            .collect();
        let anomalous: Vec<Vec<f64>> = (0..SYNTHETIC_HELD_OUT_ANOMALOUS * 2)
            .map(|_| blob_image(side, rng))
            .collect();

        let mut normal = normal.into_iter();
        let train = normal.by_ref().take(SYNTHETIC_TRAIN).map(normal_sample).collect();
        let mut validation: Vec<Sample> = normal
            .by_ref()
            .take(SYNTHETIC_HELD_OUT_NORMAL)
            .map(normal_sample)
            .collect();
        let mut test: Vec<Sample> = normal.map(normal_sample).collect();

        let mut anomalous = anomalous.into_iter();
        validation.extend(
            anomalous
                .by_ref()
                .take(SYNTHETIC_HELD_OUT_ANOMALOUS)
                .map(anomalous_sample),
        );
        test.extend(anomalous.map(anomalous_sample));
        validation.shuffle(rng);
        test.shuffle(rng);

        Self {
            feature_dim: side * side,
            train,
            validation,
            test,
        }
    }

    fn split(&self, split: Split) -> &[Sample] {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }
}

impl DataSource for DataStorage {
    fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn split_len(&self, split: Split) -> usize {
        self.split(split).len()
    }

    fn sample_batch(
        &self,
        split: Split,
        size: usize,
        rng: &mut StdRng,
    ) -> Result<SampleBatch, DataError> {
        let samples = self.split(split);
        if samples.is_empty() {
            return Err(DataError::EmptySplit { split });
        }
        match split {
            Split::Train => Ok(SampleBatch::new(
                (0..size)
                    .map(|_| samples[rng.gen_range(0..samples.len())].clone())
                    .collect(),
            )),
            Split::Validation | Split::Test => {
                if size > samples.len() {
                    return Err(DataError::Exhausted {
                        split,
                        requested: size,
                        available: samples.len(),
                    });
                }
                Ok(SampleBatch::new(samples[..size].to_vec()))
            }
        }
    }
}

fn normal_sample(features: Vec<f64>) -> Sample {
    Sample {
        features,
        label: Label::Normal,
    }
}

fn anomalous_sample(features: Vec<f64>) -> Sample {
    Sample {
        features,
        label: Label::Anomalous,
    }
}

fn ramp_image(side: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut pixels = Vec::with_capacity(side * side);
    for _row in 0..side {
        for col in 0..side {
            let base = 0.1 + 0.8 * (col as f64 + 0.5) / side as f64;
            pixels.push((base + 0.03 * standard_normal(rng)).clamp(0.0, 1.0));
        }
    }
    pixels
}

fn blob_image(side: usize, rng: &mut StdRng) -> Vec<f64> {
    let centre_row = rng.gen_range(0..side) as f64;
    let centre_col = rng.gen_range(0..side) as f64;
    let mut pixels = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            let dist_sq = (row as f64 - centre_row).powi(2) + (col as f64 - centre_col).powi(2);
            let value = 0.05 + 0.9 * (-dist_sq).exp();
            pixels.push((value + 0.03 * standard_normal(rng)).clamp(0.0, 1.0));
        }
    }
    pixels
}
