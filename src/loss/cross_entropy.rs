use crate::error::{LossError, Result};
use crate::math::matrix::Matrix;
use crate::math::special::{logsumexp, softmax};

/// Targets equal to this are skipped and excluded from the mean.
pub const IGNORE_INDEX: i64 = -100;

/// Softmax cross-entropy over raw logits `[batch, n_classes]` with class-index
/// targets, averaged over the non-ignored rows.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// L = mean_i(logsumexp(z_i) − z_i[t_i])
    pub fn loss(logits: &Matrix, targets: &[i64]) -> Result<f64> {
        let valid = valid_rows(logits, targets)?;
        let total: f64 = valid.iter()
            .map(|&(i, t)| logsumexp(&logits.data[i]) - logits.data[i][t])
            .sum();
        Ok(total / valid.len() as f64)
    }

    /// ∂L/∂z = (softmax(z) − onehot(t)) / n_valid; ignored rows get zero.
    pub fn derivative(logits: &Matrix, targets: &[i64]) -> Result<Matrix> {
        let valid = valid_rows(logits, targets)?;
        let n = valid.len() as f64;
        let mut grad = Matrix::zeros(logits.rows, logits.cols);
        for (i, t) in valid {
            let probs = softmax(&logits.data[i]);
            for (j, p) in probs.into_iter().enumerate() {
                let onehot = if j == t { 1.0 } else { 0.0 };
                grad.data[i][j] = (p - onehot) / n;
            }
        }
        Ok(grad)
    }
}

fn valid_rows(logits: &Matrix, targets: &[i64]) -> Result<Vec<(usize, usize)>> {
    if targets.len() != logits.rows {
        return Err(LossError::ShapeMismatch {
            operation: "cross_entropy",
            expected: (logits.rows, 1),
            got: (targets.len(), 1),
        });
    }
    let mut valid = Vec::with_capacity(targets.len());
    for (i, &t) in targets.iter().enumerate() {
        if t == IGNORE_INDEX {
            continue;
        }
        if t < 0 || t as usize >= logits.cols {
            return Err(LossError::InvalidLabel { operation: "cross_entropy", label: t });
        }
        valid.push((i, t as usize));
    }
    if valid.is_empty() {
        return Err(LossError::EmptyInput { operation: "cross_entropy" });
    }
    Ok(valid)
}

/// Cross-entropy between predicted logits and class targets.
pub fn classifier_loss(pred: &Matrix, target: &[i64]) -> Result<f64> {
    CrossEntropyLoss::loss(pred, target)
}
