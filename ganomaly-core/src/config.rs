//! Run configuration for the GAN classifier.
//!
//! Uses `figment` for layered configuration: built-in defaults -> JSON params
//! file -> environment variables. The environment uses the bare parameter
//! names (`BATCH_SIZE`, `method`, ...) as recognized keys; anything else in the
//! environment is ignored.
//!
//! Resolution produces a [`GanConfig`], an immutable value that is passed by
//! reference into every component that needs it. Nothing reads configuration
//! from ambient global state.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use figment::{
    Figment, Provider,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Every key the resolver recognizes, in declaration order.
pub const CONFIG_KEYS: &[&str] = &[
    "method",
    "train_or_predict",
    "data_filepath",
    "training_steps",
    "quantum_circuit_type",
    "quantum_depth",
    "batch_size",
    "discriminator_iterations",
    "validation_interval",
    "validation_samples",
    "discriminator_training_rate",
    "generator_training_rate",
    "gradient_penalty_weight",
    "shots",
    "latent_dimensions",
    "adv_loss_weight",
    "con_loss_weight",
    "enc_loss_weight",
    "seed",
    "model_dir",
    "pix_num_one_side",
];

/// Network backend selected by the `method` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Classical,
    Quantum,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::Classical, Method::Quantum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classical => "classical",
            Self::Quantum => "quantum",
        }
    }
}

/// Operating mode selected by the `train_or_predict` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Train,
    Predict,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Train, Mode::Predict];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Predict => "predict",
        }
    }
}

/// Entangling layout of the quantum decoder circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitType {
    /// CNOT ring after every rotation layer.
    Standard,
    /// Rotation layers only.
    NoEntanglement,
}

impl CircuitType {
    pub const ALL: [CircuitType; 2] = [CircuitType::Standard, CircuitType::NoEntanglement];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::NoEntanglement => "no_entanglement",
        }
    }
}

macro_rules! choice_impls {
    ($ty:ty, $key:literal) => {
        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase();
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == normalized)
                    .ok_or_else(|| ConfigError::InvalidChoice {
                        key: $key,
                        value: s.to_string(),
                        allowed: <$ty>::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_impls!(Method, "method");
choice_impls!(Mode, "train_or_predict");
choice_impls!(CircuitType, "quantum_circuit_type");

/// The flat key-value parameter mapping, before categorical validation.
///
/// `Parameters::default()` holds the built-in defaults. Each field's type is
/// the type an override for that key is read as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub method: String,
    pub train_or_predict: String,
    pub data_filepath: String,
    pub training_steps: usize,
    pub quantum_circuit_type: String,
    pub quantum_depth: usize,
    pub batch_size: usize,
    pub discriminator_iterations: usize,
    pub validation_interval: usize,
    pub validation_samples: usize,
    pub discriminator_training_rate: f64,
    pub generator_training_rate: f64,
    pub gradient_penalty_weight: f64,
    pub shots: usize,
    pub latent_dimensions: usize,
    pub adv_loss_weight: f64,
    pub con_loss_weight: f64,
    pub enc_loss_weight: f64,
    pub seed: u64,
    pub model_dir: String,
    pub pix_num_one_side: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            method: "classical".to_string(),
            train_or_predict: "train".to_string(),
            data_filepath: String::new(),
            training_steps: 300,
            quantum_circuit_type: "standard".to_string(),
            quantum_depth: 3,
            batch_size: 16,
            discriminator_iterations: 5,
            validation_interval: 10,
            validation_samples: 100,
            discriminator_training_rate: 0.02,
            generator_training_rate: 0.02,
            gradient_penalty_weight: 10.0,
            shots: 100,
            latent_dimensions: 6,
            adv_loss_weight: 1.0,
            con_loss_weight: 50.0,
            enc_loss_weight: 1.0,
            seed: 42,
            model_dir: "model".to_string(),
            pix_num_one_side: 3,
        }
    }
}

/// A single configuration value as exposed by [`GanConfig::get`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl ConfigValue {
    fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Str(s)),
            serde_json::Value::Number(n) if n.is_f64() => n.as_f64().map(Self::Float),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Str(_) => None,
        }
    }
}

/// The validated, immutable run configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanConfig {
    pub method: Method,
    pub train_or_predict: Mode,
    pub data_filepath: String,
    pub training_steps: usize,
    pub quantum_circuit_type: CircuitType,
    pub quantum_depth: usize,
    pub batch_size: usize,
    pub discriminator_iterations: usize,
    pub validation_interval: usize,
    pub validation_samples: usize,
    pub discriminator_training_rate: f64,
    pub generator_training_rate: f64,
    pub gradient_penalty_weight: f64,
    pub shots: usize,
    pub latent_dimensions: usize,
    pub adv_loss_weight: f64,
    pub con_loss_weight: f64,
    pub enc_loss_weight: f64,
    pub seed: u64,
    pub model_dir: String,
    pub pix_num_one_side: usize,
}

impl GanConfig {
    /// Look up a parameter by its key.
    ///
    /// Categorical values come back as their canonical strings, so the mapping
    /// mirrors the one that was resolved.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(self).ok()? else {
            return None;
        };
        map.remove(key).and_then(ConfigValue::from_json)
    }

    /// Directory the trained networks are checkpointed to.
    pub fn checkpoint_dir(&self) -> std::path::PathBuf {
        Path::new(&self.model_dir).join("checkpoint")
    }
}

impl Default for GanConfig {
    fn default() -> Self {
        let p = Parameters::default();
        Self {
            method: Method::Classical,
            train_or_predict: Mode::Train,
            data_filepath: p.data_filepath,
            training_steps: p.training_steps,
            quantum_circuit_type: CircuitType::Standard,
            quantum_depth: p.quantum_depth,
            batch_size: p.batch_size,
            discriminator_iterations: p.discriminator_iterations,
            validation_interval: p.validation_interval,
            validation_samples: p.validation_samples,
            discriminator_training_rate: p.discriminator_training_rate,
            generator_training_rate: p.generator_training_rate,
            gradient_penalty_weight: p.gradient_penalty_weight,
            shots: p.shots,
            latent_dimensions: p.latent_dimensions,
            adv_loss_weight: p.adv_loss_weight,
            con_loss_weight: p.con_loss_weight,
            enc_loss_weight: p.enc_loss_weight,
            seed: p.seed,
            model_dir: p.model_dir,
            pix_num_one_side: p.pix_num_one_side,
        }
    }
}

impl TryFrom<Parameters> for GanConfig {
    type Error = ConfigError;

    fn try_from(p: Parameters) -> Result<Self, Self::Error> {
        let method = p.method.parse::<Method>()?;
        let train_or_predict = p.train_or_predict.parse::<Mode>()?;
        let quantum_circuit_type = p.quantum_circuit_type.parse::<CircuitType>()?;

        positive("batch_size", p.batch_size)?;
        positive("discriminator_iterations", p.discriminator_iterations)?;
        positive("validation_samples", p.validation_samples)?;
        positive("latent_dimensions", p.latent_dimensions)?;
        positive("pix_num_one_side", p.pix_num_one_side)?;
        positive_rate("discriminator_training_rate", p.discriminator_training_rate)?;
        positive_rate("generator_training_rate", p.generator_training_rate)?;
        for (key, weight) in [
            ("gradient_penalty_weight", p.gradient_penalty_weight),
            ("adv_loss_weight", p.adv_loss_weight),
            ("con_loss_weight", p.con_loss_weight),
            ("enc_loss_weight", p.enc_loss_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::OutOfRange {
                    key,
                    value: weight.to_string(),
                    requirement: "a finite non-negative number",
                });
            }
        }

        Ok(Self {
            method,
            train_or_predict,
            data_filepath: p.data_filepath,
            training_steps: p.training_steps,
            quantum_circuit_type,
            quantum_depth: p.quantum_depth,
            batch_size: p.batch_size,
            discriminator_iterations: p.discriminator_iterations,
            validation_interval: p.validation_interval,
            validation_samples: p.validation_samples,
            discriminator_training_rate: p.discriminator_training_rate,
            generator_training_rate: p.generator_training_rate,
            gradient_penalty_weight: p.gradient_penalty_weight,
            shots: p.shots,
            latent_dimensions: p.latent_dimensions,
            adv_loss_weight: p.adv_loss_weight,
            con_loss_weight: p.con_loss_weight,
            enc_loss_weight: p.enc_loss_weight,
            seed: p.seed,
            model_dir: p.model_dir,
            pix_num_one_side: p.pix_num_one_side,
        })
    }
}

fn positive(key: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
            requirement: "greater than zero",
        });
    }
    Ok(())
}

fn positive_rate(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
            requirement: "a finite positive number",
        });
    }
    Ok(())
}

/// Resolve a configuration from defaults and an override provider.
///
/// Every key of `defaults` takes the override value when one is present.
/// Override keys the resolver does not know are accepted and ignored.
pub fn resolve<P: Provider>(defaults: &Parameters, overrides: P) -> Result<GanConfig, ConfigError> {
    let params: Parameters = Figment::from(Serialized::defaults(defaults))
        .merge(overrides)
        .extract()
        .map_err(Box::new)?;
    GanConfig::try_from(params)
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables named after the parameter keys
/// 2. JSON params file, if given
/// 3. Built-in defaults
pub fn load_config(params_file: Option<&Path>) -> Result<GanConfig, ConfigError> {
    let mut overrides = Figment::new();
    if let Some(path) = params_file {
        overrides = overrides.merge(Json::file(path));
    }
    overrides = overrides.merge(Env::raw().only(CONFIG_KEYS));
    resolve(&Parameters::default(), overrides)
}
