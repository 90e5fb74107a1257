use crate::distributions::negative_binomial::{self, NegativeBinomial, NB_EPS};
use crate::error::{LossError, Result};
use crate::loss::bernoulli::{clamp_prob, is_clamped};
use crate::loss::mask_sum;
use crate::math::matrix::{ensure_same_shape, Matrix};
use crate::math::special::{digamma, ln_gamma};

/// Negative binomial with `total_count = target` and success probability
/// `input`, evaluated at `target`. Returns `−Σ(log p · m) / Σm`.
pub struct MaskedNbLoss;

impl MaskedNbLoss {
    pub fn loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
        ensure_same_shape("masked_nb_loss", input, target)?;
        ensure_same_shape("masked_nb_loss", input, mask)?;
        let total = mask_sum("masked_nb_loss", mask)?;
        let mut log_lik = 0.0;
        for i in 0..input.rows {
            for j in 0..input.cols {
                let m = mask.data[i][j];
                if m == 0.0 {
                    continue;
                }
                log_lik += m * count_log_prob(input.data[i][j], target.data[i][j]);
            }
        }
        Ok(-log_lik / total)
    }

    /// ∂L/∂p. With `r = x`, ∂log p/∂p = x/p − x/(1 − p).
    pub fn derivative(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Matrix> {
        ensure_same_shape("masked_nb_loss", input, target)?;
        ensure_same_shape("masked_nb_loss", input, mask)?;
        let total = mask_sum("masked_nb_loss", mask)?;
        Ok(Matrix::from_fn(input.rows, input.cols, |i, j| {
            let (m, p, x) = (mask.data[i][j], input.data[i][j], target.data[i][j]);
            if m == 0.0 || is_clamped(p) {
                return 0.0;
            }
            -m * (x / p - x / (1.0 - p)) / total
        }))
    }
}

/// log NB(x; r = x, p). The normaliser vanishes when r + x = 0, where the
/// probability is exactly one.
fn count_log_prob(p: f64, x: f64) -> f64 {
    let p = clamp_prob(p);
    let r = x;
    let unnormalized = r * (1.0 - p).ln() + x * p.ln();
    if r + x == 0.0 {
        return unnormalized;
    }
    unnormalized + ln_gamma(r + x) - ln_gamma(1.0 + x) - ln_gamma(r)
}

/// Gradients of the NB log-likelihood with respect to its two parameters.
#[derive(Debug, Clone)]
pub struct NbGradients {
    pub mu: Matrix,
    /// Same shape as the `theta` that was passed in (one row if broadcast).
    pub theta: Matrix,
}

/// NB log-likelihood with mean/inverse-dispersion parameters, summed over
/// genes and averaged over cells. This is a log-likelihood (higher is
/// better); negate it to minimise.
pub struct NbLoss;

impl NbLoss {
    pub fn log_likelihood(
        x: &Matrix,
        mu: &Matrix,
        theta: &Matrix,
        mask: Option<&Matrix>,
        eps: f64,
    ) -> Result<f64> {
        let theta_full = prepare("nb", x, mu, theta, mask)?;
        let mut total = 0.0;
        for i in 0..x.rows {
            for j in 0..x.cols {
                let m = mask.map_or(1.0, |m| m.data[i][j]);
                if m == 0.0 {
                    continue;
                }
                total += m * negative_binomial::log_prob(x.data[i][j], mu.data[i][j], theta_full.data[i][j], eps);
            }
        }
        Ok(total / x.rows as f64)
    }

    pub fn derivative(
        x: &Matrix,
        mu: &Matrix,
        theta: &Matrix,
        mask: Option<&Matrix>,
        eps: f64,
    ) -> Result<NbGradients> {
        let theta_full = prepare("nb", x, mu, theta, mask)?;
        let n = x.rows as f64;
        let mut d_mu = Matrix::zeros(x.rows, x.cols);
        let mut d_theta = Matrix::zeros(x.rows, x.cols);
        for i in 0..x.rows {
            for j in 0..x.cols {
                let m = mask.map_or(1.0, |m| m.data[i][j]);
                if m == 0.0 {
                    continue;
                }
                let (xv, mv, tv) = (x.data[i][j], mu.data[i][j], theta_full.data[i][j]);
                let (g_mu, g_theta) = nb_partials(xv, mv, tv, eps);
                d_mu.data[i][j] = m * g_mu / n;
                d_theta.data[i][j] = m * g_theta / n;
            }
        }
        let theta_grad = if theta.rows == 1 && x.rows != 1 { d_theta.sum_rows() } else { d_theta };
        Ok(NbGradients { mu: d_mu, theta: theta_grad })
    }
}

/// (∂/∂μ, ∂/∂θ) of the scalar NB log-likelihood.
pub(crate) fn nb_partials(x: f64, mu: f64, theta: f64, eps: f64) -> (f64, f64) {
    let tme = theta + mu + eps;
    let d_mu = x / (mu + eps) - (theta + x) / tme;
    let d_theta = (theta + eps).ln() - tme.ln() + theta / (theta + eps) - (theta + x) / tme
        + digamma(x + theta)
        - digamma(theta);
    (d_mu, d_theta)
}

fn prepare(
    operation: &'static str,
    x: &Matrix,
    mu: &Matrix,
    theta: &Matrix,
    mask: Option<&Matrix>,
) -> Result<Matrix> {
    ensure_same_shape(operation, x, mu)?;
    if x.is_empty() {
        return Err(LossError::EmptyInput { operation });
    }
    if let Some(m) = mask {
        ensure_same_shape(operation, x, m)?;
    }
    let theta_full = theta.broadcast_rows(x.rows)?;
    ensure_same_shape(operation, x, &theta_full)?;
    Ok(theta_full)
}

pub fn masked_nb_loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
    MaskedNbLoss::loss(input, target, mask)
}

/// `Σ_genes log NB(x; mu, theta)` averaged over cells.
pub fn nb(x: &Matrix, mu: &Matrix, theta: &Matrix, eps: f64) -> Result<f64> {
    NbLoss::log_likelihood(x, mu, theta, None, eps)
}

/// Element-wise negative log-likelihood under the NB distribution.
pub fn nb_dist(x: &Matrix, mu: &Matrix, theta: &Matrix) -> Result<Matrix> {
    let dist = NegativeBinomial::new(mu.clone(), theta.clone())?.with_eps(NB_EPS);
    Ok(dist.log_prob(x)?.scale(-1.0))
}
