pub mod dense;
pub mod layer_norm;
pub mod grad_reverse;

pub use dense::{Linear, LinearGradients};
pub use layer_norm::{LayerNorm, LayerNormGradients};
pub use grad_reverse::{grad_reverse, GradReverse};
