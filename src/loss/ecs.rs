use crate::error::{LossError, Result};
use crate::loss::similarity::normalize_rows_backward;
use crate::math::matrix::Matrix;

pub const DEFAULT_ECS_THRESHOLD: f64 = 0.5;
const NORMALIZE_EPS: f64 = 1e-12;

/// Elastic cell similarity. Positive pairwise cosine similarities between
/// distinct cells are pulled toward `threshold`.
///
/// The value is `mean(1 − (relu(C) − threshold)²)` over the full `n × n`
/// matrix, with the diagonal held at 0. The cosine matrix is built from
/// explicitly normalised rows, so `|C| ≤ 1` up to rounding.
pub struct EcsLoss;

impl EcsLoss {
    pub fn loss(cell_emb: &Matrix, threshold: f64) -> Result<f64> {
        let cos = positive_off_diagonal(cell_emb)?.0;
        Ok(cos.map(|c| 1.0 - (c - threshold).powi(2)).mean())
    }

    pub fn derivative(cell_emb: &Matrix, threshold: f64) -> Result<Matrix> {
        let (cos, normed, norms) = positive_off_diagonal(cell_emb)?;
        let n = cell_emb.rows;
        let scale = 1.0 / (n * n) as f64;
        let d_cos = Matrix::from_fn(n, n, |i, j| {
            let c = cos.data[i][j];
            if i == j || c <= 0.0 { 0.0 } else { -2.0 * (c - threshold) * scale }
        });
        // C = N Nᵀ  ⇒  dN = (G + Gᵀ) N
        let sym = d_cos.clone() + d_cos.transpose();
        let d_normed = &sym * &normed;
        Ok(normalize_rows_backward(&normed, &norms, &d_normed, NORMALIZE_EPS))
    }
}

/// relu of the cosine matrix with its diagonal zeroed, plus the normalised
/// rows and norms for backprop.
fn positive_off_diagonal(cell_emb: &Matrix) -> Result<(Matrix, Matrix, Vec<f64>)> {
    if cell_emb.is_empty() {
        return Err(LossError::EmptyInput { operation: "ecs" });
    }
    let (normed, norms) = cell_emb.l2_normalize_rows(NORMALIZE_EPS);
    let mut cos = &normed * &normed.transpose();
    for i in 0..cos.rows {
        for j in 0..cos.cols {
            if i == j || cos.data[i][j] < 0.0 {
                cos.data[i][j] = 0.0;
            }
        }
    }
    Ok((cos, normed, norms))
}

pub fn ecs(cell_emb: &Matrix, threshold: f64) -> Result<f64> {
    EcsLoss::loss(cell_emb, threshold)
}
