pub mod mse;
pub mod mae;
pub mod relative;
pub mod graph;
pub mod bce;
pub mod bernoulli;
pub mod nb;
pub mod zinb;
pub mod cross_entropy;
pub mod classification;
pub mod similarity;
pub mod ecs;
pub mod loss_type;
pub mod breakdown;

pub use mse::{masked_mse_loss, MaskedMseLoss};
pub use mae::{masked_mae_loss, MaskedMaeLoss};
pub use relative::{masked_relative_error, MaskedRelativeError};
pub use graph::{graph_similarity_loss, graph_sparsity_loss, GraphSimilarityLoss, GraphSparsityLoss};
pub use bce::BceWithLogitsLoss;
pub use bernoulli::{criterion_neg_log_bernoulli, NegLogBernoulliLoss};
pub use nb::{masked_nb_loss, nb, nb_dist, MaskedNbLoss, NbGradients, NbLoss};
pub use zinb::{zinb, ZinbGradients, ZinbLoss};
pub use cross_entropy::{classifier_loss, CrossEntropyLoss};
pub use classification::{classification, HierarchicalClassificationLoss};
pub use similarity::{similarity, SimilarityLoss};
pub use ecs::{ecs, EcsLoss};
pub use loss_type::{ExpressionOutput, LossType};
pub use breakdown::{LossBreakdown, LossTerm};

use crate::error::{LossError, Result};
use crate::math::matrix::Matrix;

/// Σm, rejecting masks that select nothing.
pub(crate) fn mask_sum(operation: &'static str, mask: &Matrix) -> Result<f64> {
    let total = mask.sum();
    if total == 0.0 {
        return Err(LossError::EmptyMask { operation });
    }
    Ok(total)
}
