//! Multi-layer perceptron with analytic first and second-order critic gradients.

use ndarray::{Array1, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::activation::Activation;
use super::dense::{Dense, DenseCache};
use crate::backend::{Backward, Component};
use crate::error::MlError;
use crate::matrix::{Matrix, l2_norm};

/// Stack of dense layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
}

/// Gradient-penalty value and its parameter gradient, averaged over a batch.
#[derive(Debug, Clone)]
pub struct Penalty {
    /// `(‖∇ₓD(x)‖ − 1)²` per sample.
    pub per_sample: Vec<f64>,
    /// Gradient of the batch-mean penalty with respect to the parameters.
    pub gradient: Vec<f64>,
}

impl Penalty {
    pub fn mean(&self) -> f64 {
        if self.per_sample.is_empty() {
            return 0.0;
        }
        self.per_sample.iter().sum::<f64>() / self.per_sample.len() as f64
    }
}

impl Mlp {
    /// Build an MLP through `dims` (input, hidden..., output).
    pub fn new(
        dims: &[usize],
        hidden: Activation,
        output: Activation,
        rng: &mut StdRng,
    ) -> Result<Self, MlError> {
        if dims.len() < 2 || dims.contains(&0) {
            return Err(MlError::model(format!("invalid layer dimensions {dims:?}")));
        }
        let last = dims.len() - 2;
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let act = if i == last { output } else { hidden };
                Dense::new(w[0], w[1], act, rng)
            })
            .collect();
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn predict(&self, input: &Matrix) -> Result<Matrix, MlError> {
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x)?.output;
        }
        Ok(x)
    }

    fn forward_cached(&self, input: &Matrix) -> Result<Vec<DenseCache>, MlError> {
        let mut caches: Vec<DenseCache> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let x = caches.last().map_or(input, |c| &c.output);
            let cache = layer.forward(x)?;
            caches.push(cache);
        }
        Ok(caches)
    }

    /// Gradients of `sum(output ⊙ grad_output)` with respect to parameters and input.
    pub fn gradients(&self, input: &Matrix, grad_output: &Matrix) -> Result<Backward, MlError> {
        let caches = self.forward_cached(input)?;
        let mut grad = grad_output.clone();
        let mut per_layer = Vec::with_capacity(self.layers.len());
        for (layer, cache) in self.layers.iter().zip(&caches).rev() {
            let (d_w, d_b, d_in) = layer.backward(cache, &grad)?;
            per_layer.push((d_w, d_b));
            grad = d_in;
        }
        let mut parameters = Vec::with_capacity(self.parameter_count());
        for (d_w, d_b) in per_layer.into_iter().rev() {
            parameters.extend(d_w.iter().copied());
            parameters.extend(d_b.iter().copied());
        }
        Ok(Backward {
            parameters,
            input: grad,
        })
    }

    /// Gradient of the scalar output with respect to each input row.
    pub fn input_gradient(&self, input: &Matrix) -> Result<Matrix, MlError> {
        self.require_scalar_output()?;
        let ones = Matrix::ones((input.nrows(), 1));
        Ok(self.gradients(input, &ones)?.input)
    }

    /// Wasserstein gradient penalty `mean((‖∇ₓD(x)‖ − 1)²)` and its exact
    /// parameter gradient.
    ///
    /// With piecewise-linear activations the input gradient is
    /// `g = W₀ᵀ D₀ W₁ᵀ … D_{L-2} W_{L-1}ᵀ` for fixed activation masks `Dₖ`, so
    /// `∂(u·g)/∂Wₖ = δₖ rₖ₋₁ᵀ`, where `δₖ` is the backward vector at layer
    /// `k` and `rₖ₋₁` is `u = ∂P/∂g` propagated forward through the masks.
    /// Biases do not enter `g` and get zero gradient.
    pub fn gradient_penalty(&self, input: &Matrix) -> Result<Penalty, MlError> {
        self.require_scalar_output()?;
        let n_layers = self.layers.len();
        let output_linear = self.layers[n_layers - 1].activation() == Activation::Identity;
        if !output_linear
            || self.layers[..n_layers - 1]
                .iter()
                .any(|l| !l.activation().is_piecewise_linear())
        {
            return Err(MlError::model(
                "gradient penalty needs piecewise-linear hidden layers and a linear output",
            ));
        }

        let caches = self.forward_cached(input)?;
        let batch = input.nrows();
        let mut weight_grads: Vec<Matrix> = self
            .layers
            .iter()
            .map(|l| Matrix::zeros(l.weights().raw_dim()))
            .collect();
        let mut per_sample = Vec::with_capacity(batch);

        for row in 0..batch {
            let masks: Vec<Array1<f64>> = self.layers[..n_layers - 1]
                .iter()
                .zip(&caches)
                .map(|(layer, cache)| {
                    let act = layer.activation();
                    cache.pre.row(row).mapv(|z| act.derivative(z, act.apply(z)))
                })
                .collect();

            // Backward vectors δₖ at each layer's pre-activation.
            let mut deltas: Vec<Array1<f64>> = vec![Array1::zeros(0); n_layers];
            deltas[n_layers - 1] = Array1::ones(1);
            for k in (0..n_layers - 1).rev() {
                deltas[k] = self.layers[k + 1].weights().t().dot(&deltas[k + 1]) * &masks[k];
            }
            let g = self.layers[0].weights().t().dot(&deltas[0]);
            let norm = l2_norm(g.view());
            per_sample.push((norm - 1.0).powi(2));

            let coeff = if norm > 1e-12 {
                2.0 * (norm - 1.0) / norm / batch as f64
            } else {
                0.0
            };
            let mut r = g * coeff;

            for (k, layer) in self.layers.iter().enumerate() {
                let outer = deltas[k]
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&r.view().insert_axis(Axis(0)));
                weight_grads[k] += &outer;
                if k + 1 < n_layers {
                    r = layer.weights().dot(&r) * &masks[k];
                }
            }
        }

        let mut gradient = Vec::with_capacity(self.parameter_count());
        for (layer, d_w) in self.layers.iter().zip(weight_grads) {
            gradient.extend(d_w.iter().copied());
            gradient.extend(std::iter::repeat_n(0.0, layer.outputs()));
        }

        Ok(Penalty {
            per_sample,
            gradient,
        })
    }

    fn require_scalar_output(&self) -> Result<(), MlError> {
        let out = self.output_dim();
        if out != 1 {
            return Err(MlError::model(format!(
                "expected a scalar-output network, got {out} outputs"
            )));
        }
        Ok(())
    }
}

impl Component for Mlp {
    fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, Dense::inputs)
    }

    fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, Dense::outputs)
    }

    fn forward(&mut self, input: &Matrix) -> Result<Matrix, MlError> {
        self.predict(input)
    }

    fn backward(&mut self, input: &Matrix, grad_output: &Matrix) -> Result<Backward, MlError> {
        self.gradients(input, grad_output)
    }

    fn parameters(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.parameter_count());
        for layer in &self.layers {
            layer.write_parameters(&mut out);
        }
        out
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<(), MlError> {
        if params.len() != self.parameter_count() {
            return Err(MlError::model(format!(
                "expected {} parameters, got {}",
                self.parameter_count(),
                params.len()
            )));
        }
        let mut rest = params;
        for layer in &mut self.layers {
            rest = layer.read_parameters(rest)?;
        }
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.layers.iter().map(Dense::parameter_count).sum()
    }

    fn describe(&self) -> Vec<String> {
        self.layers.iter().map(Dense::describe).collect()
    }

    fn architecture(&self) -> String {
        let layers: Vec<String> = self
            .layers
            .iter()
            .map(|l| format!("{}->{} {}", l.inputs(), l.outputs(), l.activation().label()))
            .collect();
        format!("mlp[{}]", layers.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn critic(seed: u64) -> Mlp {
        let mut rng = StdRng::seed_from_u64(seed);
        Mlp::new(&[4, 6, 5, 1], Activation::LEAKY, Activation::Identity, &mut rng).unwrap()
    }

    fn batch() -> Matrix {
        array![
            [0.1, 0.9, 0.3, 0.5],
            [0.7, 0.2, 0.8, 0.4],
            [0.5, 0.5, 0.1, 0.0],
        ]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-5 + 1e-4 * a.abs().max(b.abs())
    }

    #[test]
    fn test_shapes_and_counts() {
        let net = critic(1);
        assert_eq!(net.input_dim(), 4);
        assert_eq!(net.output_dim(), 1);
        assert_eq!(net.parameter_count(), (4 * 6 + 6) + (6 * 5 + 5) + (5 + 1));
        assert_eq!(net.predict(&batch()).unwrap().dim(), (3, 1));
        assert!(Mlp::new(&[4], Activation::LEAKY, Activation::Identity, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_parameter_roundtrip() {
        let mut a = critic(1);
        let b = critic(2);
        a.set_parameters(&b.parameters()).unwrap();
        assert_eq!(a, b);
        assert!(a.set_parameters(&[0.0; 3]).is_err());
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = Mlp::new(&[4, 5, 3], Activation::Tanh, Activation::Sigmoid, &mut rng).unwrap();
        let x = batch();
        let upstream = array![[0.3, -1.0, 0.5], [0.2, 0.1, -0.4], [1.0, 0.0, 0.7]];
        let objective = |net: &Mlp, x: &Matrix| -> f64 {
            let y = net.predict(x).unwrap();
            (&y * &upstream).sum()
        };
        let analytic = net.gradients(&x, &upstream).unwrap();

        let params = net.parameters();
        let h = 1e-6;
        for i in (0..params.len()).step_by(3) {
            let mut plus = net.clone();
            let mut p = params.clone();
            p[i] += h;
            plus.set_parameters(&p).unwrap();
            let mut minus = net.clone();
            p[i] -= 2.0 * h;
            minus.set_parameters(&p).unwrap();
            let numeric = (objective(&plus, &x) - objective(&minus, &x)) / (2.0 * h);
            assert!(close(numeric, analytic.parameters[i]), "param {i}: {numeric} vs {}", analytic.parameters[i]);
        }

        for (idx, _) in x.indexed_iter() {
            let mut xp = x.clone();
            xp[idx] += h;
            let mut xm = x.clone();
            xm[idx] -= h;
            let numeric = (objective(&net, &xp) - objective(&net, &xm)) / (2.0 * h);
            assert!(close(numeric, analytic.input[idx]), "input {idx:?}");
        }
    }

    #[test]
    fn test_gradient_penalty_matches_finite_differences() {
        let net = critic(3);
        let x = batch();
        let penalty_of = |net: &Mlp| -> f64 {
            let g = net.input_gradient(&x).unwrap();
            g.outer_iter()
                .map(|row| (l2_norm(row) - 1.0).powi(2))
                .sum::<f64>()
                / x.nrows() as f64
        };
        let analytic = net.gradient_penalty(&x).unwrap();
        assert!(close(analytic.mean(), penalty_of(&net)));

        let params = net.parameters();
        let h = 1e-6;
        for i in 0..params.len() {
            let mut p = params.clone();
            p[i] += h;
            let mut plus = net.clone();
            plus.set_parameters(&p).unwrap();
            p[i] -= 2.0 * h;
            let mut minus = net.clone();
            minus.set_parameters(&p).unwrap();
            let numeric = (penalty_of(&plus) - penalty_of(&minus)) / (2.0 * h);
            assert!(
                close(numeric, analytic.gradient[i]),
                "param {i}: {numeric} vs {}",
                analytic.gradient[i]
            );
        }
    }

    #[test]
    fn test_gradient_penalty_requires_linear_critic() {
        let mut rng = StdRng::seed_from_u64(0);
        let net = Mlp::new(&[4, 3, 1], Activation::Tanh, Activation::Identity, &mut rng).unwrap();
        assert!(net.gradient_penalty(&batch()).is_err());
    }
}
