use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// Fully connected layer `y = xW + b` over a batch of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    /// Shape (input_size, output_size).
    pub weights: Matrix,
    /// Shape (1, output_size), broadcast over the batch.
    pub biases: Matrix,
    #[serde(skip)]
    input: Matrix,  // last forward input, needed for the weight gradient
}

/// Gradients produced by `Linear::backward`.
#[derive(Debug, Clone)]
pub struct LinearGradients {
    pub weights: Matrix,
    pub biases: Matrix,
    /// ∂L/∂x, handed to the previous layer.
    pub input: Matrix,
}

impl Linear {
    pub fn new(input_size: usize, output_size: usize) -> Linear {
        Linear::with_rng(input_size, output_size, &mut rand::thread_rng())
    }

    /// Initialises weights and biases from U(-1/√fan_in, 1/√fan_in).
    pub fn with_rng<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Linear {
        let bound = 1.0 / (input_size.max(1) as f64).sqrt();
        Linear {
            weights: Matrix::uniform(input_size, output_size, bound, rng),
            biases: Matrix::uniform(1, output_size, bound, rng),
            input: Matrix::default(),
        }
    }

    pub fn from_parts(weights: Matrix, biases: Matrix) -> Linear {
        assert_eq!(biases.shape(), (1, weights.cols), "bias must be a single row matching the output width");
        Linear { weights, biases, input: Matrix::default() }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn output_size(&self) -> usize {
        self.weights.cols
    }

    pub fn forward(&mut self, x: &Matrix) -> Matrix {
        let mut z = x * &self.weights;
        for row in z.data.iter_mut() {
            for (v, b) in row.iter_mut().zip(self.biases.data[0].iter()) {
                *v += b;
            }
        }
        self.input = x.clone();
        z
    }

    /// `grad` is ∂L/∂y for the batch seen by the last `forward`.
    pub fn backward(&self, grad: &Matrix) -> LinearGradients {
        LinearGradients {
            weights: &self.input.transpose() * grad,
            biases: grad.sum_rows(),
            input: grad * &self.weights.transpose(),
        }
    }

    pub fn apply_gradients(&mut self, grads: &LinearGradients, optimizer: &Sgd) {
        optimizer.step(&mut self.weights, &grads.weights);
        optimizer.step(&mut self.biases, &grads.biases);
    }
}
