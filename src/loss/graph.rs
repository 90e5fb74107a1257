//! Losses over generated gene-gene graphs (adjacency matrices).

use crate::error::Result;
use crate::loss::mask_sum;
use crate::loss::mse::MaskedMseLoss;
use crate::math::matrix::{ensure_same_shape, Matrix};

/// Masked squared distance between two generated graphs.
pub struct GraphSimilarityLoss;

impl GraphSimilarityLoss {
    pub fn loss(first: &Matrix, second: &Matrix, mask: &Matrix) -> Result<f64> {
        MaskedMseLoss::loss(first, second, mask)
    }

    /// Gradients with respect to `(first, second)`; the second is the
    /// negation of the first.
    pub fn derivative(first: &Matrix, second: &Matrix, mask: &Matrix) -> Result<(Matrix, Matrix)> {
        let d_first = MaskedMseLoss::derivative(first, second, mask)?;
        let d_second = d_first.scale(-1.0);
        Ok((d_first, d_second))
    }
}

/// Masked mean of squared edge weights; pushes a graph toward zero.
pub struct GraphSparsityLoss;

impl GraphSparsityLoss {
    /// Σ((g·m)²) / Σm
    pub fn loss(graph: &Matrix, mask: &Matrix) -> Result<f64> {
        ensure_same_shape("graph_sparsity_loss", graph, mask)?;
        let total = mask_sum("graph_sparsity_loss", mask)?;
        Ok(graph.hadamard(mask).map(|x| x * x).sum() / total)
    }

    pub fn derivative(graph: &Matrix, mask: &Matrix) -> Result<Matrix> {
        ensure_same_shape("graph_sparsity_loss", graph, mask)?;
        let total = mask_sum("graph_sparsity_loss", mask)?;
        Ok(graph.zip_map(mask, |g, m| 2.0 * m * m * g / total))
    }
}

pub fn graph_similarity_loss(first: &Matrix, second: &Matrix, mask: &Matrix) -> Result<f64> {
    GraphSimilarityLoss::loss(first, second, mask)
}

pub fn graph_sparsity_loss(graph: &Matrix, mask: &Matrix) -> Result<f64> {
    GraphSparsityLoss::loss(graph, mask)
}
