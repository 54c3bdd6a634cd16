//! Simulated parameterized quantum circuits.

pub mod decoder;
pub mod statevector;

pub use decoder::QuantumDecoder;
pub use statevector::{Complex, StateVector};
