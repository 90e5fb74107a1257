use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

pub const LAYER_NORM_EPS: f64 = 1e-5;

/// Normalises each row over its features, then applies a learned
/// per-feature scale (`gamma`) and shift (`beta`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNorm {
    pub gamma: Matrix,
    pub beta: Matrix,
    pub eps: f64,
    #[serde(skip)]
    normalized: Matrix,
    #[serde(skip)]
    inv_std: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LayerNormGradients {
    pub gamma: Matrix,
    pub beta: Matrix,
    pub input: Matrix,
}

impl LayerNorm {
    pub fn new(size: usize) -> LayerNorm {
        LayerNorm {
            gamma: Matrix::filled(1, size, 1.0),
            beta: Matrix::zeros(1, size),
            eps: LAYER_NORM_EPS,
            normalized: Matrix::default(),
            inv_std: Vec::new(),
        }
    }

    pub fn forward(&mut self, x: &Matrix) -> Matrix {
        let n = x.cols as f64;
        let mut normalized = Matrix::zeros(x.rows, x.cols);
        let mut inv_std = Vec::with_capacity(x.rows);
        for (i, row) in x.data.iter().enumerate() {
            let mean = row.iter().sum::<f64>() / n;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let s = 1.0 / (var + self.eps).sqrt();
            for (j, v) in row.iter().enumerate() {
                normalized.data[i][j] = (v - mean) * s;
            }
            inv_std.push(s);
        }
        let out = Matrix::from_fn(x.rows, x.cols, |i, j| {
            normalized.data[i][j] * self.gamma.data[0][j] + self.beta.data[0][j]
        });
        self.normalized = normalized;
        self.inv_std = inv_std;
        out
    }

    /// dx = inv_std / N · (N·dx̂ − Σdx̂ − x̂·Σ(dx̂·x̂)), with dx̂ = dy·γ
    pub fn backward(&self, grad: &Matrix) -> LayerNormGradients {
        let n = grad.cols as f64;
        let xhat = &self.normalized;
        let d_gamma = grad.hadamard(xhat).sum_rows();
        let d_beta = grad.sum_rows();
        let mut d_input = Matrix::zeros(grad.rows, grad.cols);
        for i in 0..grad.rows {
            let dxhat: Vec<f64> = (0..grad.cols)
                .map(|j| grad.data[i][j] * self.gamma.data[0][j])
                .collect();
            let sum_dxhat: f64 = dxhat.iter().sum();
            let sum_dxhat_xhat: f64 = dxhat.iter().zip(xhat.data[i].iter()).map(|(d, x)| d * x).sum();
            for j in 0..grad.cols {
                d_input.data[i][j] = self.inv_std[i] / n
                    * (n * dxhat[j] - sum_dxhat - xhat.data[i][j] * sum_dxhat_xhat);
            }
        }
        LayerNormGradients { gamma: d_gamma, beta: d_beta, input: d_input }
    }

    pub fn apply_gradients(&mut self, grads: &LayerNormGradients, optimizer: &Sgd) {
        optimizer.step(&mut self.gamma, &grads.gamma);
        optimizer.step(&mut self.beta, &grads.beta);
    }
}
