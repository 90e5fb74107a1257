use crate::error::Result;
use crate::loss::mask_sum;
use crate::math::matrix::{ensure_same_shape, Matrix};

pub struct MaskedMaeLoss;

impl MaskedMaeLoss {
    /// Σ|x·m − y·m| / Σm
    pub fn loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
        ensure_same_shape("masked_mae_loss", input, target)?;
        ensure_same_shape("masked_mae_loss", input, mask)?;
        let total = mask_sum("masked_mae_loss", mask)?;
        let abs_sum: f64 = Matrix::from_fn(input.rows, input.cols, |i, j| {
            let m = mask.data[i][j];
            (input.data[i][j] * m - target.data[i][j] * m).abs()
        }).sum();
        Ok(abs_sum / total)
    }

    /// Subgradient m·sign(m(x − y)) / Σm, 0 where the masked values agree.
    pub fn derivative(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Matrix> {
        ensure_same_shape("masked_mae_loss", input, target)?;
        ensure_same_shape("masked_mae_loss", input, mask)?;
        let total = mask_sum("masked_mae_loss", mask)?;
        Ok(Matrix::from_fn(input.rows, input.cols, |i, j| {
            let m = mask.data[i][j];
            let diff = m * (input.data[i][j] - target.data[i][j]);
            if diff > 0.0 { m / total } else if diff < 0.0 { -m / total } else { 0.0 }
        }))
    }
}

pub fn masked_mae_loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
    MaskedMaeLoss::loss(input, target, mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ignores_unmasked_errors() {
        let input = Matrix::from_data(vec![vec![1.0, 100.0, -2.0]]);
        let target = Matrix::from_data(vec![vec![0.0, 0.0, 1.0]]);
        let mask = Matrix::mask_from_bools(&[vec![true, false, true]]);
        assert_relative_eq!(masked_mae_loss(&input, &target, &mask).unwrap(), 2.0);
        let grad = MaskedMaeLoss::derivative(&input, &target, &mask).unwrap();
        assert_eq!(grad.data[0], vec![0.5, 0.0, -0.5]);
    }
}
