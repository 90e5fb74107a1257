use crate::error::{LossError, Result};
use crate::math::matrix::{ensure_same_shape, Matrix};

const REL_EPS: f64 = 1e-6;

/// Mean relative error `|x − y| / (y + 1e-6)` over the selected positions.
/// Any non-zero mask entry selects its position.
pub struct MaskedRelativeError;

impl MaskedRelativeError {
    pub fn loss(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
        let selected = selected_positions(input, target, mask)?;
        let total: f64 = selected.iter()
            .map(|&(i, j)| (input.data[i][j] - target.data[i][j]).abs() / (target.data[i][j] + REL_EPS))
            .sum();
        Ok(total / selected.len() as f64)
    }

    pub fn derivative(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Matrix> {
        let selected = selected_positions(input, target, mask)?;
        let n = selected.len() as f64;
        let mut grad = Matrix::zeros(input.rows, input.cols);
        for (i, j) in selected {
            let diff = input.data[i][j] - target.data[i][j];
            let sign = if diff > 0.0 { 1.0 } else if diff < 0.0 { -1.0 } else { 0.0 };
            grad.data[i][j] = sign / (target.data[i][j] + REL_EPS) / n;
        }
        Ok(grad)
    }
}

fn selected_positions(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<Vec<(usize, usize)>> {
    ensure_same_shape("masked_relative_error", input, target)?;
    ensure_same_shape("masked_relative_error", input, mask)?;
    let selected: Vec<(usize, usize)> = (0..mask.rows)
        .flat_map(|i| (0..mask.cols).map(move |j| (i, j)))
        .filter(|&(i, j)| mask.data[i][j] != 0.0)
        .collect();
    if selected.is_empty() {
        return Err(LossError::EmptyMask { operation: "masked_relative_error" });
    }
    Ok(selected)
}

pub fn masked_relative_error(input: &Matrix, target: &Matrix, mask: &Matrix) -> Result<f64> {
    MaskedRelativeError::loss(input, target, mask)
}
