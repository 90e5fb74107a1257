use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::error::{LossError, Result};
use crate::math::matrix::{ensure_same_shape, Matrix};
use crate::math::special::ln_gamma;

pub const NB_EPS: f64 = 1e-8;

/// Negative binomial parameterised by its mean `mu` and inverse dispersion
/// `theta`, the form used for UMI counts (variance `mu + mu^2 / theta`).
#[derive(Debug, Clone)]
pub struct NegativeBinomial {
    pub mu: Matrix,
    pub theta: Matrix,
    pub eps: f64,
}

impl NegativeBinomial {
    /// `theta` may be a single row of per-gene dispersions; it is broadcast
    /// over the cells of `mu`.
    pub fn new(mu: Matrix, theta: Matrix) -> Result<NegativeBinomial> {
        let theta = theta.broadcast_rows(mu.rows)?;
        ensure_same_shape("NegativeBinomial::new", &mu, &theta)?;
        if theta.data.iter().flatten().any(|&t| t <= 0.0) {
            return Err(LossError::invalid("NegativeBinomial::new", "theta must be positive"));
        }
        if mu.data.iter().flatten().any(|&m| m < 0.0) {
            return Err(LossError::invalid("NegativeBinomial::new", "mu must be non-negative"));
        }
        Ok(NegativeBinomial { mu, theta, eps: NB_EPS })
    }

    pub fn with_eps(mut self, eps: f64) -> NegativeBinomial {
        self.eps = eps;
        self
    }

    /// Element-wise log-likelihood of the counts `x`.
    pub fn log_prob(&self, x: &Matrix) -> Result<Matrix> {
        ensure_same_shape("NegativeBinomial::log_prob", &self.mu, x)?;
        Ok(Matrix::from_fn(x.rows, x.cols, |i, j| {
            log_prob(x.data[i][j], self.mu.data[i][j], self.theta.data[i][j], self.eps)
        }))
    }

    pub fn mean(&self) -> Matrix {
        self.mu.clone()
    }

    pub fn variance(&self) -> Matrix {
        self.mu.zip_map(&self.theta, |m, t| m + m * m / t)
    }

    /// Draws counts through the Gamma-Poisson mixture:
    /// `lambda ~ Gamma(theta, mu / theta)`, `x ~ Poisson(lambda)`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Matrix {
        Matrix::from_fn(self.mu.rows, self.mu.cols, |i, j| {
            sample_one(self.mu.data[i][j], self.theta.data[i][j], rng)
        })
    }
}

/// Scalar NB log-likelihood:
/// `θ(ln(θ+ε) − ln(θ+μ+ε)) + x(ln(μ+ε) − ln(θ+μ+ε)) + lnΓ(x+θ) − lnΓ(θ) − lnΓ(x+1)`
pub fn log_prob(x: f64, mu: f64, theta: f64, eps: f64) -> f64 {
    let log_theta_mu_eps = (theta + mu + eps).ln();
    theta * ((theta + eps).ln() - log_theta_mu_eps)
        + x * ((mu + eps).ln() - log_theta_mu_eps)
        + ln_gamma(x + theta)
        - ln_gamma(theta)
        - ln_gamma(x + 1.0)
}

pub(crate) fn sample_one<R: Rng + ?Sized>(mu: f64, theta: f64, rng: &mut R) -> f64 {
    if mu <= 0.0 {
        return 0.0;
    }
    let rate = match Gamma::new(theta, mu / theta) {
        Ok(gamma) => gamma.sample(rng),
        Err(_) => return 0.0,
    };
    if rate <= 0.0 {
        return 0.0;
    }
    match Poisson::new(rate) {
        Ok(poisson) => poisson.sample(rng),
        Err(_) => 0.0,
    }
}
