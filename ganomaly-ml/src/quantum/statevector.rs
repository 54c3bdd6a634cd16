//! Dense statevector simulator for the handful of gates the decoder uses.

use std::ops::{Add, Mul};

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::MlError;

/// Simulations above this width are refused; the statevector doubles per qubit.
pub const MAX_QUBITS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };
    pub const ONE: Complex = Complex { re: 1.0, im: 0.0 };

    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// `e^{iθ}`
    pub fn from_phase(theta: f64) -> Self {
        Self::new(theta.cos(), theta.sin())
    }

    pub fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl Mul<f64> for Complex {
    type Output = Complex;

    fn mul(self, rhs: f64) -> Complex {
        Complex::new(self.re * rhs, self.im * rhs)
    }
}

/// `2^n` amplitudes, qubit `q` is bit `q` of the basis index.
#[derive(Debug, Clone)]
pub struct StateVector {
    n_qubits: usize,
    amplitudes: Vec<Complex>,
}

impl StateVector {
    /// The all-zero state `|0…0⟩`.
    pub fn zero(n_qubits: usize) -> Result<Self, MlError> {
        if n_qubits == 0 || n_qubits > MAX_QUBITS {
            return Err(MlError::model(format!(
                "cannot simulate {n_qubits} qubits (supported: 1..={MAX_QUBITS})"
            )));
        }
        let mut amplitudes = vec![Complex::ZERO; 1 << n_qubits];
        amplitudes[0] = Complex::ONE;
        Ok(Self {
            n_qubits,
            amplitudes,
        })
    }

    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    pub fn amplitudes(&self) -> &[Complex] {
        &self.amplitudes
    }

    fn apply_single(&mut self, qubit: usize, gate: [[Complex; 2]; 2]) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask != 0 {
                continue;
            }
            let a0 = self.amplitudes[i];
            let a1 = self.amplitudes[i | mask];
            self.amplitudes[i] = gate[0][0] * a0 + gate[0][1] * a1;
            self.amplitudes[i | mask] = gate[1][0] * a0 + gate[1][1] * a1;
        }
    }

    /// `RY(θ) = exp(-iθY/2)`
    pub fn ry(&mut self, qubit: usize, theta: f64) {
        let (s, c) = (theta / 2.0).sin_cos();
        self.apply_single(
            qubit,
            [
                [Complex::new(c, 0.0), Complex::new(-s, 0.0)],
                [Complex::new(s, 0.0), Complex::new(c, 0.0)],
            ],
        );
    }

    /// `RZ(θ) = exp(-iθZ/2)`
    pub fn rz(&mut self, qubit: usize, theta: f64) {
        self.apply_single(
            qubit,
            [
                [Complex::from_phase(-theta / 2.0), Complex::ZERO],
                [Complex::ZERO, Complex::from_phase(theta / 2.0)],
            ],
        );
    }

    pub fn cnot(&mut self, control: usize, target: usize) {
        let c = 1 << control;
        let t = 1 << target;
        for i in 0..self.amplitudes.len() {
            if i & c != 0 && i & t == 0 {
                self.amplitudes.swap(i, i | t);
            }
        }
    }

    /// Probability of measuring `|1⟩` on each qubit.
    pub fn excitation_probabilities(&self) -> Vec<f64> {
        let mut probs = vec![0.0; self.n_qubits];
        for (index, amp) in self.amplitudes.iter().enumerate() {
            let p = amp.norm_sqr();
            for (q, slot) in probs.iter_mut().enumerate() {
                if index & (1 << q) != 0 {
                    *slot += p;
                }
            }
        }
        probs
    }

    /// Per-qubit `|1⟩` frequencies over `shots` full-register measurements.
    pub fn sample_excitations(&self, shots: usize, rng: &mut StdRng) -> Vec<f64> {
        let mut cumulative = Vec::with_capacity(self.amplitudes.len());
        let mut acc = 0.0;
        for amp in &self.amplitudes {
            acc += amp.norm_sqr();
            cumulative.push(acc);
        }
        let mut counts = vec![0usize; self.n_qubits];
        for _ in 0..shots {
            let u = rng.gen_range(0.0..acc);
            let index = cumulative
                .partition_point(|&c| c <= u)
                .min(cumulative.len() - 1);
            for (q, count) in counts.iter_mut().enumerate() {
                if index & (1 << q) != 0 {
                    *count += 1;
                }
            }
        }
        counts
            .into_iter()
            .map(|c| c as f64 / shots as f64)
            .collect()
    }
}
