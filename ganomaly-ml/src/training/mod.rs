//! The adversarial training loop and the shared evaluation path.

pub mod evaluation;
pub mod state;
pub mod trainer;

pub use evaluation::METRIC_KEYS;
pub use state::{TrainerOptions, TrainerState};
pub use trainer::{STEP_KEYS, Trainer};
