//! Trainer lifecycle and per-backend trainer options.

use serde::{Deserialize, Serialize};

/// Where the trainer is in a run.
///
/// Train mode walks `Idle → Training → (Validating ↔ Training) → Done`;
/// predict mode goes `Idle → Evaluating → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TrainerState {
    Idle,
    Training { step: u64 },
    Validating { step: u64 },
    Evaluating,
    Done,
}

impl TrainerState {
    /// Step index the trainer is working on, 0 outside the training loop.
    pub fn step(&self) -> u64 {
        match self {
            Self::Training { step } | Self::Validating { step } => *step,
            Self::Idle | Self::Evaluating | Self::Done => 0,
        }
    }

    pub fn is_done(&self) -> bool {
        *self == Self::Done
    }
}

/// Knobs a backend bundle sets on the shared training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerOptions {
    pub name: String,
    /// Global L2 bound on the joint encoder+decoder gradient, if any.
    pub generator_clip_norm: Option<f64>,
}

impl TrainerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generator_clip_norm: None,
        }
    }

    pub fn with_generator_clip_norm(mut self, max_norm: f64) -> Self {
        self.generator_clip_norm = Some(max_norm);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_step() {
        assert_eq!(TrainerState::Idle.step(), 0);
        assert_eq!(TrainerState::Training { step: 7 }.step(), 7);
        assert_eq!(TrainerState::Validating { step: 10 }.step(), 10);
        assert!(TrainerState::Done.is_done());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(TrainerState::Validating { step: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "validating", "step": 3}));
    }

    #[test]
    fn test_options_builder() {
        let opts = TrainerOptions::new("quantum").with_generator_clip_norm(1.0);
        assert_eq!(opts.generator_clip_norm, Some(1.0));
        assert_eq!(TrainerOptions::new("classical").generator_clip_norm, None);
    }
}
