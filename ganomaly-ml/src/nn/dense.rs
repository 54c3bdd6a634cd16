//! Fully connected layer.

use ndarray::{Array1, Axis, Zip};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use ganomaly_core::reproducibility::standard_normal;

use super::activation::Activation;
use crate::error::MlError;
use crate::matrix::{Matrix, ensure_same_shape};

/// `y = act(x W^T + b)` with `W` stored as `out x in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    weights: Matrix,
    bias: Array1<f64>,
    activation: Activation,
}

/// Intermediate values of one forward pass, kept for the backward pass.
#[derive(Debug, Clone)]
pub struct DenseCache {
    pub input: Matrix,
    pub pre: Matrix,
    pub output: Matrix,
}

impl Dense {
    /// Xavier-normal weights, zero bias.
    pub fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let std = (2.0 / (inputs + outputs) as f64).sqrt();
        let weights = Matrix::from_shape_simple_fn((outputs, inputs), || standard_normal(rng) * std);
        Self {
            weights,
            bias: Array1::zeros(outputs),
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, input: &Matrix) -> Result<DenseCache, MlError> {
        if input.ncols() != self.inputs() {
            return Err(MlError::model(format!(
                "dense layer expects {} inputs, got {}",
                self.inputs(),
                input.ncols()
            )));
        }
        let pre = input.dot(&self.weights.t()) + &self.bias;
        let act = self.activation;
        let output = pre.mapv(|v| act.apply(v));
        Ok(DenseCache {
            input: input.clone(),
            pre,
            output,
        })
    }

    /// Returns `(dW, db, d_input)` for the upstream gradient `grad_output`.
    pub fn backward(
        &self,
        cache: &DenseCache,
        grad_output: &Matrix,
    ) -> Result<(Matrix, Array1<f64>, Matrix), MlError> {
        ensure_same_shape(grad_output, &cache.pre)?;
        let act = self.activation;
        let d_pre = Zip::from(grad_output)
            .and(&cache.pre)
            .and(&cache.output)
            .map_collect(|&g, &pre, &out| g * act.derivative(pre, out));
        let d_weights = d_pre.t().dot(&cache.input);
        let d_bias = d_pre.sum_axis(Axis(0));
        let d_input = d_pre.dot(&self.weights);
        Ok((d_weights, d_bias, d_input))
    }

    /// Append weights (row-major) then bias to `out`.
    pub fn write_parameters(&self, out: &mut Vec<f64>) {
        out.extend(self.weights.iter().copied());
        out.extend(self.bias.iter().copied());
    }

    /// Read parameters in [`Dense::write_parameters`] order, returning the rest.
    pub fn read_parameters<'a>(&mut self, params: &'a [f64]) -> Result<&'a [f64], MlError> {
        let n_weights = self.weights.len();
        let needed = n_weights + self.bias.len();
        if params.len() < needed {
            return Err(MlError::model(format!(
                "dense layer needs {needed} parameters, {} left",
                params.len()
            )));
        }
        self.weights = Matrix::from_shape_vec(self.weights.raw_dim(), params[..n_weights].to_vec())?;
        self.bias = Array1::from(params[n_weights..needed].to_vec());
        Ok(&params[needed..])
    }

    pub fn describe(&self) -> String {
        format!(
            "Dense({} -> {}, {})  params: {}",
            self.inputs(),
            self.outputs(),
            self.activation.label(),
            self.parameter_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_forward_adds_bias_per_row() {
        let mut layer = Dense::new(2, 2, Activation::Identity, &mut StdRng::seed_from_u64(0));
        layer
            .read_parameters(&[1.0, 0.0, 0.0, 2.0, 0.5, -0.5])
            .unwrap();
        let cache = layer.forward(&array![[1.0, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(cache.output, array![[1.5, 1.5], [2.5, 5.5]]);
        assert!(layer.forward(&Matrix::zeros((1, 3))).is_err());
    }

    #[test]
    fn test_backward_rejects_misshaped_gradient() {
        let layer = Dense::new(3, 2, Activation::LEAKY, &mut StdRng::seed_from_u64(1));
        let cache = layer.forward(&Matrix::zeros((4, 3))).unwrap();
        assert!(layer.backward(&cache, &Matrix::zeros((4, 3))).is_err());
        let (d_w, d_b, d_in) = layer.backward(&cache, &Matrix::ones((4, 2))).unwrap();
        assert_eq!(d_w.dim(), (2, 3));
        assert_eq!(d_b.len(), 2);
        assert_eq!(d_in.dim(), (4, 3));
    }
}
