use crate::distributions::zero_inflated::{self, ZINB_EPS};
use crate::error::{LossError, Result};
use crate::loss::nb::nb_partials;
use crate::math::matrix::{ensure_same_shape, Matrix};
use crate::math::special::sigmoid;

#[derive(Debug, Clone)]
pub struct ZinbGradients {
    pub mu: Matrix,
    /// One row if `theta` was broadcast.
    pub theta: Matrix,
    pub pi: Matrix,
}

/// Negative ZINB log-likelihood, summed over genes and averaged over cells.
pub struct ZinbLoss;

impl ZinbLoss {
    pub fn loss(
        target: &Matrix,
        mu: &Matrix,
        theta: &Matrix,
        pi: &Matrix,
        eps: f64,
        mask: Option<&Matrix>,
    ) -> Result<f64> {
        let theta_full = prepare(target, mu, theta, pi, mask)?;
        let mut total = 0.0;
        for i in 0..target.rows {
            for j in 0..target.cols {
                let m = mask.map_or(1.0, |m| m.data[i][j]);
                if m == 0.0 {
                    continue;
                }
                total += m * zero_inflated::log_prob(
                    target.data[i][j],
                    mu.data[i][j],
                    theta_full.data[i][j],
                    pi.data[i][j],
                    eps,
                );
            }
        }
        Ok(-total / target.rows as f64)
    }

    pub fn derivative(
        target: &Matrix,
        mu: &Matrix,
        theta: &Matrix,
        pi: &Matrix,
        eps: f64,
        mask: Option<&Matrix>,
    ) -> Result<ZinbGradients> {
        let theta_full = prepare(target, mu, theta, pi, mask)?;
        let n = target.rows as f64;
        let mut d_mu = Matrix::zeros(target.rows, target.cols);
        let mut d_theta = Matrix::zeros(target.rows, target.cols);
        let mut d_pi = Matrix::zeros(target.rows, target.cols);
        for i in 0..target.rows {
            for j in 0..target.cols {
                let m = mask.map_or(1.0, |m| m.data[i][j]);
                if m == 0.0 {
                    continue;
                }
                let (gm, gt, gp) = zinb_partials(
                    target.data[i][j],
                    mu.data[i][j],
                    theta_full.data[i][j],
                    pi.data[i][j],
                    eps,
                );
                // loss is the negated mean log-likelihood
                d_mu.data[i][j] = -m * gm / n;
                d_theta.data[i][j] = -m * gt / n;
                d_pi.data[i][j] = -m * gp / n;
            }
        }
        let theta_grad = if theta.rows == 1 && target.rows != 1 { d_theta.sum_rows() } else { d_theta };
        Ok(ZinbGradients { mu: d_mu, theta: theta_grad, pi: d_pi })
    }
}

/// (∂/∂μ, ∂/∂θ, ∂/∂π) of the scalar ZINB log-likelihood.
fn zinb_partials(x: f64, mu: f64, theta: f64, pi: f64, eps: f64) -> (f64, f64, f64) {
    let tme = theta + mu + eps;
    let log_ratio = (theta + eps).ln() - tme.ln();
    let d_ptl_mu = -theta / tme;
    let d_ptl_theta = log_ratio + theta * (1.0 / (theta + eps) - 1.0 / tme);

    if x < eps {
        let pi_theta_log = -pi + theta * log_ratio;
        let s = sigmoid(pi_theta_log);
        (s * d_ptl_mu, s * d_ptl_theta, sigmoid(-pi) - s)
    } else if x > eps {
        let (nb_mu, nb_theta) = nb_partials(x, mu, theta, eps);
        (nb_mu, nb_theta, -sigmoid(pi))
    } else {
        (0.0, 0.0, 0.0)
    }
}

fn prepare(
    target: &Matrix,
    mu: &Matrix,
    theta: &Matrix,
    pi: &Matrix,
    mask: Option<&Matrix>,
) -> Result<Matrix> {
    ensure_same_shape("zinb", target, mu)?;
    ensure_same_shape("zinb", target, pi)?;
    if target.is_empty() {
        return Err(LossError::EmptyInput { operation: "zinb" });
    }
    if let Some(m) = mask {
        ensure_same_shape("zinb", target, m)?;
    }
    let theta_full = theta.broadcast_rows(target.rows)?;
    ensure_same_shape("zinb", target, &theta_full)?;
    Ok(theta_full)
}

/// `zinb(target, mu, theta, pi)` with the default eps and no mask.
pub fn zinb(target: &Matrix, mu: &Matrix, theta: &Matrix, pi: &Matrix) -> Result<f64> {
    ZinbLoss::loss(target, mu, theta, pi, ZINB_EPS, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs() -> (Matrix, Matrix, Matrix, Matrix) {
        let target = Matrix::from_data(vec![vec![0.0, 4.0, 1.0], vec![2.0, 0.0, 0.0]]);
        let mu = Matrix::from_data(vec![vec![0.5, 3.0, 1.2], vec![1.5, 0.2, 2.0]]);
        let theta = Matrix::row_vector(vec![1.0, 2.0, 0.5]);
        let pi = Matrix::from_data(vec![vec![0.2, -1.0, 0.0], vec![-0.5, 1.5, 0.3]]);
        (target, mu, theta, pi)
    }

    #[test]
    fn loss_is_negated_mean_of_row_sums() {
        let (target, mu, theta, pi) = inputs();
        let mut expected = 0.0;
        for i in 0..2 {
            for j in 0..3 {
                expected += zero_inflated::log_prob(target.data[i][j], mu.data[i][j], theta.data[0][j], pi.data[i][j], ZINB_EPS);
            }
        }
        assert_relative_eq!(zinb(&target, &mu, &theta, &pi).unwrap(), -expected / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn mask_drops_entries() {
        let (target, mu, theta, pi) = inputs();
        let all = Matrix::filled(2, 3, 1.0);
        let with_all = ZinbLoss::loss(&target, &mu, &theta, &pi, ZINB_EPS, Some(&all)).unwrap();
        assert_relative_eq!(with_all, zinb(&target, &mu, &theta, &pi).unwrap(), epsilon = 1e-12);

        let none = Matrix::zeros(2, 3);
        let with_none = ZinbLoss::loss(&target, &mu, &theta, &pi, ZINB_EPS, Some(&none)).unwrap();
        assert_relative_eq!(with_none, 0.0);
    }

    #[test]
    fn entry_at_eps_contributes_nothing() {
        let x = ZINB_EPS;
        assert_eq!(zero_inflated::log_prob(x, 2.0, 1.5, 0.3, ZINB_EPS), 0.0);
        assert_eq!(zinb_partials(x, 2.0, 1.5, 0.3, ZINB_EPS), (0.0, 0.0, 0.0));

        let target = Matrix::filled(1, 1, x);
        let (mu, theta, pi) = (Matrix::filled(1, 1, 2.0), Matrix::filled(1, 1, 1.5), Matrix::filled(1, 1, 0.3));
        assert_eq!(zinb(&target, &mu, &theta, &pi).unwrap(), 0.0);
        let grads = ZinbLoss::derivative(&target, &mu, &theta, &pi, ZINB_EPS, None).unwrap();
        assert_eq!(grads.mu.data[0][0], 0.0);
        assert_eq!(grads.theta.data[0][0], 0.0);
        assert_eq!(grads.pi.data[0][0], 0.0);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let empty = Matrix::zeros(0, 2);
        let theta = Matrix::row_vector(vec![1.0, 1.0]);
        assert!(matches!(zinb(&empty, &empty, &theta, &empty), Err(LossError::EmptyInput { .. })));
    }

    #[test]
    fn higher_dropout_logit_helps_zeros() {
        let target = Matrix::zeros(1, 1);
        let mu = Matrix::filled(1, 1, 5.0);
        let theta = Matrix::filled(1, 1, 1.0);
        let low = zinb(&target, &mu, &theta, &Matrix::filled(1, 1, -2.0)).unwrap();
        let high = zinb(&target, &mu, &theta, &Matrix::filled(1, 1, 2.0)).unwrap();
        assert!(high < low);
        let grads = ZinbLoss::derivative(&target, &mu, &theta, &Matrix::filled(1, 1, 0.0), ZINB_EPS, None).unwrap();
        assert!(grads.pi.data[0][0] < 0.0);
    }
}
