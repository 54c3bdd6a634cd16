//! # ganomaly-core: configuration, data access, and run history
//!
//! Foundation crate for the ganomaly classifier. It owns everything the
//! adversarial trainer consumes but does not compute itself:
//!
//! - [`config`] resolves the immutable run configuration from defaults and overrides
//! - [`data`] exposes the normal/anomalous sample splits through [`DataSource`]
//! - [`history`] aggregates per-step and per-validation metric records
//! - [`persistence`] writes the JSON artifacts atomically
//! - [`reproducibility`] derives per-component seeds from the run seed

pub mod config;
pub mod data;
pub mod error;
pub mod history;
pub mod persistence;
pub mod reproducibility;

pub use config::{CircuitType, ConfigValue, GanConfig, Method, Mode, Parameters};
pub use data::{DataSource, DataStorage, Label, Sample, SampleBatch, Split};
pub use error::{ConfigError, CoreError, DataError, HistoryError};
pub use history::{History, HistoryRecord, Phase};
pub use reproducibility::SeedManager;
