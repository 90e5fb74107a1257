use rand::Rng;
use serde::{Serialize, Deserialize};
use std::ops::{Add, Sub, Mul};

use crate::error::{LossError, Result};

/// Dense row-major matrix. Expression data is laid out `[cells, genes]`,
/// embeddings and logits `[batch, features]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![value; cols]; rows]
        }
    }

    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Matrix
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = f(i, j);
            }
        }
        res
    }

    /// Samples every entry from U(-bound, bound).
    pub fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, bound: f64, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = rng.gen_range(-bound..=bound);
            }
        }
        res
    }

    /// Builds a 0/1 float mask, the equivalent of `mask.float()`.
    pub fn mask_from_bools(mask: &[Vec<bool>]) -> Matrix {
        Matrix::from_data(
            mask.iter()
                .map(|row| row.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect())
                .collect()
        )
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map_or(0, |row| row.len()),
            data
        }
    }

    /// Like `from_data` but rejects ragged rows.
    pub fn try_from_data(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = data.first().map_or(0, |row| row.len());
        if let Some(bad) = data.iter().find(|row| row.len() != cols) {
            return Err(LossError::ShapeMismatch {
                operation: "Matrix::try_from_data",
                expected: (data.len(), cols),
                got: (data.len(), bad.len()),
            });
        }
        Ok(Matrix::from_data(data))
    }

    pub fn row_vector(values: Vec<f64>) -> Matrix {
        Matrix::from_data(vec![values])
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect()
        }
    }

    /// Element-wise combination of two same-shape matrices.
    pub fn zip_map<F>(&self, other: &Matrix, functor: F) -> Matrix
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(self.shape(), other.shape(), "zip_map on matrices of different shapes");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(other.data.iter())
                .map(|(ra, rb)| ra.iter().zip(rb.iter()).map(|(&a, &b)| functor(a, b)).collect())
                .collect()
        }
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        self.zip_map(other, |a, b| a * b)
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| x * factor)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().flat_map(|row| row.iter()).sum()
    }

    pub fn mean(&self) -> f64 {
        let n = self.rows * self.cols;
        if n == 0 { 0.0 } else { self.sum() / n as f64 }
    }

    /// Column sums as a single row, the reduction that undoes `broadcast_rows`.
    pub fn sum_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for row in &self.data {
            for (acc, x) in res.data[0].iter_mut().zip(row.iter()) {
                *acc += x;
            }
        }
        res
    }

    /// Repeats a single-row matrix `rows` times; any other shape must already
    /// have `rows` rows.
    pub fn broadcast_rows(&self, rows: usize) -> Result<Matrix> {
        if self.rows == rows {
            return Ok(self.clone());
        }
        if self.rows != 1 {
            return Err(LossError::ShapeMismatch {
                operation: "Matrix::broadcast_rows",
                expected: (rows, self.cols),
                got: self.shape(),
            });
        }
        Ok(Matrix {
            rows,
            cols: self.cols,
            data: vec![self.data[0].clone(); rows]
        })
    }

    /// Row-wise L2 normalisation `x / max(||x||, eps)`.
    /// Returns the normalised matrix and the raw row norms.
    pub fn l2_normalize_rows(&self, eps: f64) -> (Matrix, Vec<f64>) {
        let norms: Vec<f64> = self.data.iter()
            .map(|row| row.iter().map(|x| x * x).sum::<f64>().sqrt())
            .collect();
        let data = self.data.iter().zip(norms.iter())
            .map(|(row, &n)| {
                let denom = n.max(eps);
                row.iter().map(|x| x / denom).collect()
            })
            .collect();
        (Matrix { rows: self.rows, cols: self.cols, data }, norms)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }
        self.zip_map(&rhs, |a, b| a + b)
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }
        self.zip_map(&rhs, |a, b| a - b)
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

impl<'a> Mul<&'a Matrix> for &'a Matrix {
    type Output = Matrix;

    fn mul(self, rhs: &'a Matrix) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for k in 0..self.cols {
                let a = self.data[i][k];
                for j in 0..res.cols {
                    res.data[i][j] += a * rhs.data[k][j];
                }
            }
        }

        res
    }
}

/// Returns `ShapeMismatch` unless `got` has the same shape as `expected`.
pub fn ensure_same_shape(operation: &'static str, expected: &Matrix, got: &Matrix) -> Result<()> {
    if expected.shape() != got.shape() {
        return Err(LossError::ShapeMismatch {
            operation,
            expected: expected.shape(),
            got: got.shape(),
        });
    }
    Ok(())
}
