//! Element-wise activation functions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    Identity,
    LeakyRelu { slope: f64 },
    Sigmoid,
    Tanh,
}

impl Activation {
    /// Leaky ReLU with the slope used throughout the critic and encoder.
    pub const LEAKY: Activation = Activation::LeakyRelu { slope: 0.2 };

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::LeakyRelu { slope } => {
                if x > 0.0 {
                    x
                } else {
                    slope * x
                }
            }
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
        }
    }

    /// Derivative given the pre-activation and the activation output.
    pub fn derivative(self, pre: f64, out: f64) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::LeakyRelu { slope } => {
                if pre > 0.0 {
                    1.0
                } else {
                    slope
                }
            }
            Self::Sigmoid => out * (1.0 - out),
            Self::Tanh => 1.0 - out * out,
        }
    }

    /// Whether the derivative is locally constant, which the analytic
    /// gradient-penalty backward pass relies on.
    pub fn is_piecewise_linear(self) -> bool {
        matches!(self, Self::Identity | Self::LeakyRelu { .. })
    }

    pub fn label(self) -> String {
        match self {
            Self::Identity => "linear".to_string(),
            Self::LeakyRelu { slope } => format!("leaky_relu({slope})"),
            Self::Sigmoid => "sigmoid".to_string(),
            Self::Tanh => "tanh".to_string(),
        }
    }
}
