use crate::error::Result;
use crate::loss::mask_sum;
use crate::math::matrix::{ensure_same_shape, Matrix};

/// Mean-squared error restricted to masked positions.
pub struct MaskedMseLoss;

impl MaskedMseLoss {
    /// Σ((x·m − y·m)²) / Σm
    pub fn loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
        ensure_same_shape("masked_mse_loss", input, target)?;
        ensure_same_shape("masked_mse_loss", input, mask)?;
        let total = mask_sum("masked_mse_loss", mask)?;
        Ok(squared_masked_diff(input, target, mask).sum() / total)
    }

    /// ∂L/∂input = 2·m²·(x − y) / Σm
    pub fn derivative(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Matrix> {
        ensure_same_shape("masked_mse_loss", input, target)?;
        ensure_same_shape("masked_mse_loss", input, mask)?;
        let total = mask_sum("masked_mse_loss", mask)?;
        Ok(Matrix::from_fn(input.rows, input.cols, |i, j| {
            let m = mask.data[i][j];
            2.0 * m * m * (input.data[i][j] - target.data[i][j]) / total
        }))
    }
}

fn squared_masked_diff(input: &Matrix, target: &Matrix, mask: &Matrix) -> Matrix {
    Matrix::from_fn(input.rows, input.cols, |i, j| {
        let m = mask.data[i][j];
        (input.data[i][j] * m - target.data[i][j] * m).powi(2)
    })
}

pub fn masked_mse_loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
    MaskedMseLoss::loss(input, target, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LossError;
    use approx::assert_relative_eq;

    #[test]
    fn averages_only_over_masked_positions() {
        let input = Matrix::from_data(vec![vec![1.0, 5.0], vec![2.0, 0.0]]);
        let target = Matrix::from_data(vec![vec![0.0, 0.0], vec![4.0, 9.0]]);
        let mask = Matrix::mask_from_bools(&[vec![true, false], vec![true, false]]);
        // (1² + 2²) / 2
        assert_relative_eq!(masked_mse_loss(&input, &target, &mask).unwrap(), 2.5);
        let grad = MaskedMseLoss::derivative(&input, &target, &mask).unwrap();
        assert_eq!(grad.data, vec![vec![1.0, 0.0], vec![-2.0, 0.0]]);
    }

    #[test]
    fn empty_mask_is_an_error() {
        let m = Matrix::zeros(2, 2);
        let err = masked_mse_loss(&m, &m, &m).unwrap_err();
        assert!(matches!(err, LossError::EmptyMask { .. }));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(2, 3);
        assert!(matches!(
            masked_mse_loss(&a, &b, &a),
            Err(LossError::ShapeMismatch { .. })
        ));
    }
}
