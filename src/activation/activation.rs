use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

use crate::math::matrix::Matrix;
use crate::math::special::sigmoid;

/// Element-wise non-linearity used between the discriminator's hidden layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    LeakyReLU { alpha: f64 },
    Sigmoid,
    Tanh,
    /// tanh approximation of GELU.
    Gelu,
    Identity,
}

impl Default for ActivationFunction {
    /// LeakyReLU with the usual 0.01 negative slope.
    fn default() -> Self {
        ActivationFunction::LeakyReLU { alpha: 0.01 }
    }
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative evaluated at the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Sigmoid => {
                let fx = sigmoid(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                let inner = c * (x + 0.044715 * x.powi(3));
                let tanh_inner = inner.tanh();
                let sech2 = 1.0 - tanh_inner * tanh_inner;
                let d_inner = c * (1.0 + 3.0 * 0.044715 * x.powi(2));
                0.5 * tanh_inner + 0.5 * x * sech2 * d_inner + 0.5
            }
            ActivationFunction::Identity => 1.0,
        }
    }

    pub fn forward(&self, pre: &Matrix) -> Matrix {
        pre.map(|x| self.function(x))
    }

    /// δ = grad ⊙ σ'(pre)
    pub fn backward(&self, pre: &Matrix, grad: &Matrix) -> Matrix {
        pre.zip_map(grad, |x, g| g * self.derivative(x))
    }
}
