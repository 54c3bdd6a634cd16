//! Dense network building blocks with analytic gradients.

pub mod activation;
pub mod dense;
pub mod mlp;

pub use activation::Activation;
pub use dense::Dense;
pub use mlp::{Mlp, Penalty};
