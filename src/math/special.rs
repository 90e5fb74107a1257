//! Scalar special functions shared by the likelihood losses.

pub use statrs::function::gamma::{digamma, ln_gamma};

/// Logistic sigmoid, evaluated without overflowing `exp` for large |x|.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// softplus(x) = ln(1 + e^x) = max(x, 0) + ln(1 + e^{-|x|})
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// ln(sigmoid(x)) = -softplus(-x)
pub fn log_sigmoid(x: f64) -> f64 {
    -softplus(-x)
}

/// Stable log-sum-exp. Returns `-inf` for an empty slice.
pub fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Softmax of a single row, shifted by its max.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn softplus_is_stable_at_extremes() {
        assert_relative_eq!(softplus(0.0), 2f64.ln());
        assert_relative_eq!(softplus(800.0), 800.0);
        assert!(softplus(-800.0) >= 0.0 && softplus(-800.0) < 1e-300);
        assert_relative_eq!(log_sigmoid(2.0), sigmoid(2.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn logsumexp_matches_naive_sum() {
        let v = [0.1, -2.0, 3.5];
        let naive = v.iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
        assert_relative_eq!(logsumexp(&v), naive, epsilon = 1e-12);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_relative_eq!(softmax(&v).iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ln_gamma_of_integers_is_log_factorial() {
        assert_relative_eq!(ln_gamma(5.0), 24f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(digamma(1.0), -0.577_215_664_901_532_9, epsilon = 1e-8);
    }
}
