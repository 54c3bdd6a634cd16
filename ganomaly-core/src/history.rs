//! Metrics history: an append-only sequence of flat scalar records.
//!
//! The same structure carries the by-step training history and the single-shot
//! evaluation result, so both serialize to the same JSON shape: an array of
//! flat objects `{"step": .., "phase": .., "<metric>": <number>, ..}`.
//!
//! The trainer stops with a numerical-instability error before a non-finite
//! loss reaches a record. [`History::append`] still rejects NaN and infinity
//! as a second safety net for other producers, since JSON has no encoding for
//! them and a saved history must load back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, HistoryError};
use crate::persistence;

/// Which part of a run produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Train,
    Validation,
    Test,
}

/// One logged step or validation interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub step: u64,
    pub phase: Phase,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl HistoryRecord {
    pub fn new(step: u64, phase: Phase) -> Self {
        Self {
            step,
            phase,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metrics(step: u64, phase: Phase, metrics: BTreeMap<String, f64>) -> Self {
        Self {
            step,
            phase,
            metrics,
        }
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Metric names in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.metrics.keys().map(String::as_str).collect()
    }
}

/// Ordered, append-only record sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history of exactly one record, used for evaluation results.
    pub fn single(record: HistoryRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Append a record.
    ///
    /// Steps never decrease (a validation record shares the step index of the
    /// training record before it) and every metric must be finite.
    pub fn append(&mut self, record: HistoryRecord) -> Result<(), HistoryError> {
        if let Some(last) = self.records.last() {
            if record.step < last.step {
                return Err(HistoryError::NonMonotonicStep {
                    step: record.step,
                    last: last.step,
                });
            }
        }
        if let Some((name, value)) = record.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(HistoryError::NonFinite {
                name: name.clone(),
                value: *value,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn to_sequence(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    pub fn records_in(&self, phase: Phase) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    pub fn training_records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records_in(Phase::Train)
    }

    pub fn validation_records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records_in(Phase::Validation)
    }

    /// The validation record with the best value of `metric`.
    pub fn best_validation(&self, metric: &str, lower_is_better: bool) -> Option<&HistoryRecord> {
        self.validation_records()
            .filter(|r| r.metrics.contains_key(metric))
            .min_by(|a, b| {
                let (a, b) = (a.metrics[metric], b.metrics[metric]);
                let ord = a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
                if lower_is_better { ord } else { ord.reverse() }
            })
    }

    /// Values of one metric across a phase, in step order.
    pub fn series(&self, phase: Phase, metric: &str) -> Vec<(u64, f64)> {
        self.records_in(phase)
            .filter_map(|r| r.get(metric).map(|v| (r.step, v)))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        persistence::save_json(path, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        Ok(persistence::load_json(path)?)
    }
}
