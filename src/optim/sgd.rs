use crate::math::matrix::Matrix;

pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// In-place update `param ← param − lr · grad`.
    pub fn step(&self, param: &mut Matrix, grad: &Matrix) {
        assert_eq!(param.shape(), grad.shape(), "gradient shape must match its parameter");
        for (p_row, g_row) in param.data.iter_mut().zip(grad.data.iter()) {
            for (p, g) in p_row.iter_mut().zip(g_row.iter()) {
                *p -= self.learning_rate * g;
            }
        }
    }
}
