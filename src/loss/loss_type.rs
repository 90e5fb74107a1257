use serde::{Serialize, Deserialize};

use crate::distributions::negative_binomial::NB_EPS;
use crate::distributions::zero_inflated::ZINB_EPS;
use crate::error::{LossError, Result};
use crate::loss::mae::MaskedMaeLoss;
use crate::loss::mse::MaskedMseLoss;
use crate::loss::nb::NbLoss;
use crate::loss::zinb::ZinbLoss;
use crate::math::matrix::Matrix;

/// The expression decoder's heads for one batch, each `[cells, genes]`.
///
/// `dispersion` may also be a single row of per-gene values.
#[derive(Debug, Clone)]
pub struct ExpressionOutput {
    pub mean: Matrix,
    pub dispersion: Option<Matrix>,
    pub zero_logits: Option<Matrix>,
}

impl ExpressionOutput {
    pub fn mean_only(mean: Matrix) -> Self {
        ExpressionOutput { mean, dispersion: None, zero_logits: None }
    }
}

/// Selects which reconstruction loss scores the expression decoder.
///
/// - `Mse` : masked MSE on the mean head.
/// - `Mae` : masked MAE on the mean head.
/// - `Nb`  : negated NB log-likelihood; needs `dispersion`.
/// - `Zinb`: negated ZINB log-likelihood; needs `dispersion` and `zero_logits`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Mse,
    Mae,
    Nb,
    #[default]
    Zinb,
}

impl LossType {
    /// Scalar loss to minimise. `mask` selects the genes that count.
    pub fn compute(&self, output: &ExpressionOutput, target: &Matrix, mask: &Matrix) -> Result<f64> {
        match self {
            LossType::Mse => MaskedMseLoss::loss(&output.mean, target, mask),
            LossType::Mae => MaskedMaeLoss::loss(&output.mean, target, mask),
            LossType::Nb => {
                let theta = require(output.dispersion.as_ref(), "dispersion")?;
                Ok(-NbLoss::log_likelihood(target, &output.mean, theta, Some(mask), NB_EPS)?)
            }
            LossType::Zinb => {
                let theta = require(output.dispersion.as_ref(), "dispersion")?;
                let pi = require(output.zero_logits.as_ref(), "zero_logits")?;
                ZinbLoss::loss(target, &output.mean, theta, pi, ZINB_EPS, Some(mask))
            }
        }
    }

    pub fn needs_dispersion(&self) -> bool {
        matches!(self, LossType::Nb | LossType::Zinb)
    }
}

fn require<'a>(head: Option<&'a Matrix>, name: &str) -> Result<&'a Matrix> {
    head.ok_or_else(|| LossError::invalid("LossType::compute", format!("missing `{name}` head")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mse_uses_only_the_mean_head() {
        let output = ExpressionOutput::mean_only(Matrix::from_data(vec![vec![1.0, 2.0]]));
        let target = Matrix::from_data(vec![vec![0.0, 2.0]]);
        let mask = Matrix::filled(1, 2, 1.0);
        assert_relative_eq!(LossType::Mse.compute(&output, &target, &mask).unwrap(), 0.5);
    }

    #[test]
    fn likelihood_losses_require_their_heads() {
        let output = ExpressionOutput::mean_only(Matrix::filled(1, 2, 1.0));
        let target = Matrix::filled(1, 2, 1.0);
        let mask = Matrix::filled(1, 2, 1.0);
        assert!(matches!(LossType::Zinb.compute(&output, &target, &mask), Err(LossError::InvalidParameter { .. })));
        assert!(LossType::Nb.needs_dispersion());
    }

    #[test]
    fn serde_names_are_snake_case() {
        assert_eq!(serde_json::to_string(&LossType::Zinb).unwrap(), "\"zinb\"");
        let parsed: LossType = serde_json::from_str("\"mae\"").unwrap();
        assert_eq!(parsed, LossType::Mae);
    }
}
