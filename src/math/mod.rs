pub mod matrix;
pub mod special;

pub use matrix::{ensure_same_shape, Matrix};
