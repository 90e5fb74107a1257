use crate::error::{LossError, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;

/// Norm floor for cosine similarity.
pub const COSINE_EPS: f64 = 1e-8;

/// Contrastive loss between two views of the same cells: row `i` of `x` should
/// be most similar to row `i` of `y` under cosine similarity scaled by
/// `1 / temperature`.
pub struct SimilarityLoss;

struct Forward {
    x_normed: Matrix,
    x_norms: Vec<f64>,
    y_normed: Matrix,
    y_norms: Vec<f64>,
    logits: Matrix,
    labels: Vec<i64>,
}

impl SimilarityLoss {
    pub fn loss(x: &Matrix, y: &Matrix, temperature: f64) -> Result<f64> {
        let fwd = forward(x, y, temperature)?;
        CrossEntropyLoss::loss(&fwd.logits, &fwd.labels)
    }

    /// Gradients with respect to `(x, y)`.
    pub fn derivative(x: &Matrix, y: &Matrix, temperature: f64) -> Result<(Matrix, Matrix)> {
        let fwd = forward(x, y, temperature)?;
        let d_logits = CrossEntropyLoss::derivative(&fwd.logits, &fwd.labels)?.scale(1.0 / temperature);
        // S = X̂ Ŷᵀ
        let d_x_normed = &d_logits * &fwd.y_normed;
        let d_y_normed = &d_logits.transpose() * &fwd.x_normed;
        Ok((
            normalize_rows_backward(&fwd.x_normed, &fwd.x_norms, &d_x_normed, COSINE_EPS),
            normalize_rows_backward(&fwd.y_normed, &fwd.y_norms, &d_y_normed, COSINE_EPS),
        ))
    }
}

fn forward(x: &Matrix, y: &Matrix, temperature: f64) -> Result<Forward> {
    if x.cols != y.cols {
        return Err(LossError::ShapeMismatch {
            operation: "similarity",
            expected: (y.rows, x.cols),
            got: y.shape(),
        });
    }
    if x.rows == 0 {
        return Err(LossError::EmptyInput { operation: "similarity" });
    }
    if x.rows > y.rows {
        return Err(LossError::invalid("similarity", "x has more rows than y has candidates"));
    }
    if temperature <= 0.0 {
        return Err(LossError::invalid("similarity", "temperature must be positive"));
    }
    let (x_normed, x_norms) = x.l2_normalize_rows(COSINE_EPS);
    let (y_normed, y_norms) = y.l2_normalize_rows(COSINE_EPS);
    let logits = (&x_normed * &y_normed.transpose()).scale(1.0 / temperature);
    let labels = (0..x.rows as i64).collect();
    Ok(Forward { x_normed, x_norms, y_normed, y_norms, logits, labels })
}

/// Backward of `x / max(||x||, eps)` row by row.
pub(crate) fn normalize_rows_backward(normed: &Matrix, norms: &[f64], grad: &Matrix, eps: f64) -> Matrix {
    let mut res = Matrix::zeros(grad.rows, grad.cols);
    for i in 0..grad.rows {
        let n = norms[i];
        if n > eps {
            let dot: f64 = normed.data[i].iter().zip(grad.data[i].iter()).map(|(u, g)| u * g).sum();
            for j in 0..grad.cols {
                res.data[i][j] = (grad.data[i][j] - normed.data[i][j] * dot) / n;
            }
        } else {
            for j in 0..grad.cols {
                res.data[i][j] = grad.data[i][j] / eps;
            }
        }
    }
    res
}

/// Cosine-similarity cross-entropy between paired embeddings.
pub fn similarity(x: &Matrix, y: &Matrix, temperature: f64) -> Result<f64> {
    SimilarityLoss::loss(x, y, temperature)
}
