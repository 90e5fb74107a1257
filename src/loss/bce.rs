use crate::error::{LossError, Result};
use crate::math::matrix::{ensure_same_shape, Matrix};
use crate::math::special::sigmoid;

/// Weighted binary cross-entropy on raw logits, mean-reduced over every entry
/// (zero-weight entries still count in the denominator).
pub struct BceWithLogitsLoss;

impl BceWithLogitsLoss {
    /// mean(w · (max(x, 0) − x·y + ln(1 + e^{−|x|})))
    pub fn loss(logits: &Matrix, targets: &Matrix, weights: &Matrix) -> Result<f64> {
        ensure_same_shape("binary_cross_entropy_with_logits", logits, targets)?;
        ensure_same_shape("binary_cross_entropy_with_logits", logits, weights)?;
        if logits.is_empty() {
            return Err(LossError::EmptyInput { operation: "binary_cross_entropy_with_logits" });
        }
        let n = (logits.rows * logits.cols) as f64;
        let mut total = 0.0;
        for i in 0..logits.rows {
            for j in 0..logits.cols {
                let w = weights.data[i][j];
                if w == 0.0 {
                    continue;
                }
                total += w * element(logits.data[i][j], targets.data[i][j]);
            }
        }
        Ok(total / n)
    }

    /// ∂L/∂x = w · (σ(x) − y) / N
    pub fn derivative(logits: &Matrix, targets: &Matrix, weights: &Matrix) -> Result<Matrix> {
        ensure_same_shape("binary_cross_entropy_with_logits", logits, targets)?;
        ensure_same_shape("binary_cross_entropy_with_logits", logits, weights)?;
        if logits.is_empty() {
            return Err(LossError::EmptyInput { operation: "binary_cross_entropy_with_logits" });
        }
        let n = (logits.rows * logits.cols) as f64;
        Ok(Matrix::from_fn(logits.rows, logits.cols, |i, j| {
            let w = weights.data[i][j];
            if w == 0.0 {
                0.0
            } else {
                w * (sigmoid(logits.data[i][j]) - targets.data[i][j]) / n
            }
        }))
    }
}

fn element(x: f64, y: f64) -> f64 {
    x.max(0.0) - x * y + (-x.abs()).exp().ln_1p()
}
