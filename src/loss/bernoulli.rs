use crate::error::Result;
use crate::loss::mask_sum;
use crate::math::matrix::{ensure_same_shape, Matrix};

/// Probabilities are clamped into `[PROB_EPS, 1 - PROB_EPS]` before taking logs.
pub const PROB_EPS: f64 = f64::EPSILON;

/// Masked negative log-likelihood of "is expressed" (`target > 0`) under a
/// Bernoulli with success probability `input`.
pub struct NegLogBernoulliLoss;

impl NegLogBernoulliLoss {
    /// −Σ m·(y ln p + (1 − y) ln(1 − p)) / Σm
    pub fn loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
        ensure_same_shape("criterion_neg_log_bernoulli", input, target)?;
        ensure_same_shape("criterion_neg_log_bernoulli", input, mask)?;
        let total = mask_sum("criterion_neg_log_bernoulli", mask)?;
        let mut log_lik = 0.0;
        for i in 0..input.rows {
            for j in 0..input.cols {
                let m = mask.data[i][j];
                if m == 0.0 {
                    continue;
                }
                let p = clamp_prob(input.data[i][j]);
                let lp = if target.data[i][j] > 0.0 { p.ln() } else { (1.0 - p).ln() };
                log_lik += m * lp;
            }
        }
        Ok(-log_lik / total)
    }

    /// ∂L/∂p; zero where `p` was clamped.
    pub fn derivative(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Matrix> {
        ensure_same_shape("criterion_neg_log_bernoulli", input, target)?;
        ensure_same_shape("criterion_neg_log_bernoulli", input, mask)?;
        let total = mask_sum("criterion_neg_log_bernoulli", mask)?;
        Ok(Matrix::from_fn(input.rows, input.cols, |i, j| {
            let m = mask.data[i][j];
            let p = input.data[i][j];
            if m == 0.0 || is_clamped(p) {
                return 0.0;
            }
            let d_lp = if target.data[i][j] > 0.0 { 1.0 / p } else { -1.0 / (1.0 - p) };
            -m * d_lp / total
        }))
    }
}

pub(crate) fn clamp_prob(p: f64) -> f64 {
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

pub(crate) fn is_clamped(p: f64) -> bool {
    p < PROB_EPS || p > 1.0 - PROB_EPS
}

pub fn criterion_neg_log_bernoulli(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
    NegLogBernoulliLoss::loss(input, target, mask)
}
