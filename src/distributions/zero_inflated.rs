use rand::Rng;

use crate::distributions::negative_binomial::sample_one;
use crate::error::{LossError, Result};
use crate::math::matrix::{ensure_same_shape, Matrix};
use crate::math::special::{ln_gamma, sigmoid, softplus};

pub const ZINB_EPS: f64 = 1e-6;

/// Negative binomial mixed with a point mass at zero. `zi_logits` are the
/// logits of the dropout probability (real support).
#[derive(Debug, Clone)]
pub struct ZeroInflatedNegativeBinomial {
    pub mu: Matrix,
    pub theta: Matrix,
    pub zi_logits: Matrix,
    pub eps: f64,
}

impl ZeroInflatedNegativeBinomial {
    pub fn new(mu: Matrix, theta: Matrix, zi_logits: Matrix) -> Result<ZeroInflatedNegativeBinomial> {
        let theta = theta.broadcast_rows(mu.rows)?;
        ensure_same_shape("ZeroInflatedNegativeBinomial::new", &mu, &theta)?;
        ensure_same_shape("ZeroInflatedNegativeBinomial::new", &mu, &zi_logits)?;
        if theta.data.iter().flatten().any(|&t| t <= 0.0) {
            return Err(LossError::invalid("ZeroInflatedNegativeBinomial::new", "theta must be positive"));
        }
        Ok(ZeroInflatedNegativeBinomial { mu, theta, zi_logits, eps: ZINB_EPS })
    }

    pub fn with_eps(mut self, eps: f64) -> ZeroInflatedNegativeBinomial {
        self.eps = eps;
        self
    }

    /// Element-wise log-likelihood. Entries exactly equal to `eps` fall in
    /// neither case and contribute 0.
    pub fn log_prob(&self, x: &Matrix) -> Result<Matrix> {
        ensure_same_shape("ZeroInflatedNegativeBinomial::log_prob", &self.mu, x)?;
        Ok(Matrix::from_fn(x.rows, x.cols, |i, j| {
            log_prob(
                x.data[i][j],
                self.mu.data[i][j],
                self.theta.data[i][j],
                self.zi_logits.data[i][j],
                self.eps,
            )
        }))
    }

    /// Probability that an entry is a structural (dropout) zero.
    pub fn dropout_probs(&self) -> Matrix {
        self.zi_logits.map(sigmoid)
    }

    pub fn mean(&self) -> Matrix {
        self.mu.zip_map(&self.zi_logits, |m, pi| (1.0 - sigmoid(pi)) * m)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Matrix {
        Matrix::from_fn(self.mu.rows, self.mu.cols, |i, j| {
            let dropout = sigmoid(self.zi_logits.data[i][j]);
            if rng.gen::<f64>() < dropout {
                0.0
            } else {
                sample_one(self.mu.data[i][j], self.theta.data[i][j], rng)
            }
        })
    }
}

pub fn log_prob(x: f64, mu: f64, theta: f64, pi: f64, eps: f64) -> f64 {
    // log(sigmoid(pi)) = -softplus(-pi)
    let softplus_pi = softplus(-pi);
    let log_theta_eps = (theta + eps).ln();
    let log_theta_mu_eps = (theta + mu + eps).ln();
    let pi_theta_log = -pi + theta * (log_theta_eps - log_theta_mu_eps);

    if x < eps {
        softplus(pi_theta_log) - softplus_pi
    } else if x > eps {
        -softplus_pi
            + pi_theta_log
            + x * ((mu + eps).ln() - log_theta_mu_eps)
            + ln_gamma(x + theta)
            - ln_gamma(theta)
            - ln_gamma(x + 1.0)
    } else {
        0.0
    }
}
