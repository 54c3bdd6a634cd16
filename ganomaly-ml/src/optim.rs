//! Adam over flat parameter vectors, plus global-norm gradient clipping.

use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};
use serde::{Deserialize, Serialize};

use crate::error::MlError;

/// Adam with the GAN-friendly moment decay rates `β₁ = 0.5`, `β₂ = 0.9`.
///
/// `θ ← θ − lr · m̂ / (√v̂ + ε)` with bias-corrected moments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: u64,
    m: Array1<f64>,
    v: Array1<f64>,
}

impl Adam {
    pub fn new(lr: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Array1::zeros(0),
            v: Array1::zeros(0),
        }
    }

    pub fn for_gan(lr: f64) -> Self {
        Self::new(lr, 0.5, 0.9, 1e-8)
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Apply one update to `params` in place.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<(), MlError> {
        if params.len() != grads.len() {
            return Err(MlError::model(format!(
                "optimizer got {} gradients for {} parameters",
                grads.len(),
                params.len()
            )));
        }
        if self.m.len() != params.len() {
            self.m = Array1::zeros(params.len());
            self.v = Array1::zeros(params.len());
            self.t = 0;
        }
        self.t += 1;
        let t = self.t as i32;
        let (beta1, beta2) = (self.beta1, self.beta2);
        let bias1 = 1.0 - beta1.powi(t);
        let bias2 = 1.0 - beta2.powi(t);
        let (lr, epsilon) = (self.lr, self.epsilon);

        let grads = ArrayView1::from(grads);
        // m_t = β1 m + (1 − β1) g,  v_t = β2 v + (1 − β2) g²
        self.m = &self.m * beta1 + &grads * (1.0 - beta1);
        self.v = &self.v * beta2 + &grads.mapv(|g| g * g) * (1.0 - beta2);

        Zip::from(ArrayViewMut1::from(params))
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| {
                *p -= lr * (m / bias1) / ((v / bias2).sqrt() + epsilon);
            });
        Ok(())
    }
}

/// Scale `grads` so their L2 norm is at most `max_norm`. Returns the norm
/// before clipping.
pub fn clip_grad_norm(grads: &mut [f64], max_norm: f64) -> f64 {
    let mut grads = ArrayViewMut1::from(grads);
    let norm = grads.dot(&grads).sqrt();
    if norm > max_norm && norm > 0.0 {
        grads *= max_norm / norm;
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adam_minimizes_quadratic() {
        let mut opt = Adam::for_gan(0.1);
        let mut x = vec![3.0, -2.0];
        for _ in 0..500 {
            let grads: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
            opt.step(&mut x, &grads).unwrap();
        }
        assert!(x.iter().all(|v| v.abs() < 0.05), "{x:?}");
        assert_eq!(opt.step_count(), 500);
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        let mut opt = Adam::for_gan(0.01);
        let mut x = vec![1.0];
        opt.step(&mut x, &[5.0]).unwrap();
        assert!((x[0] - 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_length_mismatch() {
        let mut opt = Adam::for_gan(0.01);
        assert!(opt.step(&mut [0.0, 1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_clip_grad_norm() {
        let mut grads = vec![3.0, 4.0];
        let norm = clip_grad_norm(&mut grads, 1.0);
        assert_eq!(norm, 5.0);
        assert!((grads[0] - 0.6).abs() < 1e-12);
        assert!((grads[1] - 0.8).abs() < 1e-12);

        let mut small = vec![0.1, 0.1];
        clip_grad_norm(&mut small, 1.0);
        assert_eq!(small, vec![0.1, 0.1]);
    }
}
