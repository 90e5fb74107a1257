use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

/// Gradient-reversal layer: identity in the forward pass, `−λ · grad` in the
/// backward pass. Placed between an encoder and a domain discriminator it
/// makes the encoder maximise the discriminator's loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradReverse {
    pub lambda: f64,
}

impl GradReverse {
    pub fn new(lambda: f64) -> GradReverse {
        GradReverse { lambda }
    }

    pub fn forward(&self, x: &Matrix) -> Matrix {
        x.clone()
    }

    pub fn backward(&self, grad: &Matrix) -> Matrix {
        grad.scale(-self.lambda)
    }
}

impl Default for GradReverse {
    fn default() -> Self {
        GradReverse { lambda: 1.0 }
    }
}

/// Forward half of gradient reversal; pair with `GradReverse::backward`.
pub fn grad_reverse(x: &Matrix, lambda: f64) -> Matrix {
    GradReverse::new(lambda).forward(x)
}
