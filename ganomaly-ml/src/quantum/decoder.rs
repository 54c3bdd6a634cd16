//! Variational-circuit decoder.
//!
//! Each latent component is angle-encoded with `RY(π·zᵢ)` onto its own qubit.
//! `depth` trainable layers follow, each an `RY`/`RZ` pair on every qubit and
//! then, for [`CircuitType::Standard`], a CNOT ring. Output feature `i` is the
//! probability of reading `|1⟩` on qubit `i`, either exact or estimated from
//! `shots` measurements.
//!
//! Every gate angle enters through a Pauli rotation, so derivatives come from
//! the parameter-shift rule `∂f/∂θ = (f(θ + π/2) − f(θ − π/2)) / 2`, both for
//! the trainable angles and for the encoded latent inputs.

use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::ArrayView1;
use rand::Rng;
use rand::rngs::StdRng;

use ganomaly_core::CircuitType;

use super::statevector::StateVector;
use crate::backend::{Backward, Component};
use crate::error::MlError;
use crate::matrix::Matrix;

/// Latent values in `[-1, 1]` map onto rotations in `[-π, π]`.
pub const ENCODING_SCALE: f64 = PI;

#[derive(Debug, Clone)]
pub struct QuantumDecoder {
    latent_dim: usize,
    feature_dim: usize,
    n_qubits: usize,
    depth: usize,
    circuit: CircuitType,
    shots: usize,
    /// `[layer][qubit][ry, rz]`, flattened.
    angles: Vec<f64>,
    shot_rng: StdRng,
}

impl QuantumDecoder {
    pub fn new(
        latent_dim: usize,
        feature_dim: usize,
        depth: usize,
        circuit: CircuitType,
        shots: usize,
        init_rng: &mut StdRng,
        shot_rng: StdRng,
    ) -> Result<Self, MlError> {
        if latent_dim == 0 || feature_dim == 0 {
            return Err(MlError::model("quantum decoder needs non-empty latent and feature spaces"));
        }
        let n_qubits = latent_dim.max(feature_dim);
        // Validates the register width up front.
        StateVector::zero(n_qubits)?;
        let angles = (0..depth * n_qubits * 2)
            .map(|_| init_rng.gen_range(-PI..PI))
            .collect();
        Ok(Self {
            latent_dim,
            feature_dim,
            n_qubits,
            depth,
            circuit,
            shots,
            angles,
            shot_rng,
        })
    }

    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn circuit_type(&self) -> CircuitType {
        self.circuit
    }

    pub fn shots(&self) -> usize {
        self.shots
    }

    fn prepare(&self, encoding: &[f64], angles: &[f64]) -> Result<StateVector, MlError> {
        let mut state = StateVector::zero(self.n_qubits)?;
        for (q, theta) in encoding.iter().enumerate() {
            state.ry(q, *theta);
        }
        for layer in angles.chunks_exact(self.n_qubits * 2) {
            for (q, pair) in layer.chunks_exact(2).enumerate() {
                state.ry(q, pair[0]);
                state.rz(q, pair[1]);
            }
            if self.circuit == CircuitType::Standard && self.n_qubits > 1 {
                for q in 0..self.n_qubits {
                    state.cnot(q, (q + 1) % self.n_qubits);
                }
            }
        }
        Ok(state)
    }

    fn measure(&mut self, encoding: &[f64], angles: &[f64]) -> Result<Vec<f64>, MlError> {
        let state = self.prepare(encoding, angles)?;
        let mut probs = if self.shots == 0 {
            state.excitation_probabilities()
        } else {
            state.sample_excitations(self.shots, &mut self.shot_rng)
        };
        probs.truncate(self.feature_dim);
        Ok(probs)
    }

    /// `Σᵢ gᵢ · ∂fᵢ/∂θ` by parameter shift, `θ` being the angle named by `target`.
    fn shifted(
        &mut self,
        encoding: &mut [f64],
        angles: &mut [f64],
        target: ShiftTarget,
        grad: &[f64],
    ) -> Result<f64, MlError> {
        let mut evaluate = |this: &mut Self, delta: f64| -> Result<Vec<f64>, MlError> {
            match target {
                ShiftTarget::Input(j) => {
                    encoding[j] += delta;
                    let out = this.measure(encoding, angles);
                    encoding[j] -= delta;
                    out
                }
                ShiftTarget::Angle(k) => {
                    angles[k] += delta;
                    let out = this.measure(encoding, angles);
                    angles[k] -= delta;
                    out
                }
            }
        };
        let plus = evaluate(self, FRAC_PI_2)?;
        let minus = evaluate(self, -FRAC_PI_2)?;
        Ok(plus
            .iter()
            .zip(&minus)
            .zip(grad)
            .map(|((p, m), g)| g * (p - m) / 2.0)
            .sum())
    }

    fn encoding(row: ArrayView1<'_, f64>) -> Vec<f64> {
        row.iter().map(|z| z * ENCODING_SCALE).collect()
    }

    fn check_input(&self, input: &Matrix) -> Result<(), MlError> {
        if input.ncols() != self.latent_dim {
            return Err(MlError::model(format!(
                "quantum decoder expects {} latent inputs, got {}",
                self.latent_dim,
                input.ncols()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum ShiftTarget {
    Input(usize),
    Angle(usize),
}

impl Component for QuantumDecoder {
    fn input_dim(&self) -> usize {
        self.latent_dim
    }

    fn output_dim(&self) -> usize {
        self.feature_dim
    }

    fn forward(&mut self, input: &Matrix) -> Result<Matrix, MlError> {
        self.check_input(input)?;
        let angles = self.angles.clone();
        let mut out = Matrix::zeros((input.nrows(), self.feature_dim));
        for (z, mut row) in input.outer_iter().zip(out.outer_iter_mut()) {
            let probs = self.measure(&Self::encoding(z), &angles)?;
            row.assign(&ArrayView1::from(&probs[..]));
        }
        Ok(out)
    }

    fn backward(&mut self, input: &Matrix, grad_output: &Matrix) -> Result<Backward, MlError> {
        self.check_input(input)?;
        if grad_output.dim() != (input.nrows(), self.feature_dim) {
            return Err(MlError::model(format!(
                "quantum decoder gradient has shape {:?}, expected {:?}",
                grad_output.dim(),
                (input.nrows(), self.feature_dim)
            )));
        }
        let mut angles = self.angles.clone();
        let mut d_angles = vec![0.0; angles.len()];
        let mut d_input = Matrix::zeros((input.nrows(), self.latent_dim));

        for (r, z) in input.outer_iter().enumerate() {
            let grad = grad_output.row(r).to_vec();
            let mut encoding = Self::encoding(z);
            for (k, slot) in d_angles.iter_mut().enumerate() {
                *slot += self.shifted(&mut encoding, &mut angles, ShiftTarget::Angle(k), &grad)?;
            }
            for j in 0..self.latent_dim {
                let d = self.shifted(&mut encoding, &mut angles, ShiftTarget::Input(j), &grad)?;
                d_input[(r, j)] = d * ENCODING_SCALE;
            }
        }

        Ok(Backward {
            parameters: d_angles,
            input: d_input,
        })
    }

    fn parameters(&self) -> Vec<f64> {
        self.angles.clone()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<(), MlError> {
        if params.len() != self.angles.len() {
            return Err(MlError::model(format!(
                "quantum decoder has {} angles, got {}",
                self.angles.len(),
                params.len()
            )));
        }
        self.angles.copy_from_slice(params);
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.angles.len()
    }

    /// Shots only change the readout noise, so they are not part of it.
    fn architecture(&self) -> String {
        format!(
            "circuit[{}, depth {}, {} qubits, {} -> {}]",
            self.circuit, self.depth, self.n_qubits, self.latent_dim, self.feature_dim
        )
    }

    fn describe(&self) -> Vec<String> {
        let readout = if self.shots == 0 {
            "exact".to_string()
        } else {
            format!("{} shots", self.shots)
        };
        vec![
            format!(
                "AngleEncoding(RY(pi*z) on {} of {} qubits)",
                self.latent_dim, self.n_qubits
            ),
            format!(
                "VariationalCircuit(depth {}, {})  params: {}",
                self.depth,
                self.circuit,
                self.angles.len()
            ),
            format!("Readout(P(|1>) on {} qubits, {readout})", self.feature_dim),
        ]
    }
}
