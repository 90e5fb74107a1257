pub mod error;
pub mod math;
pub mod distributions;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod network;
pub mod config;
pub mod optim;

// Convenience re-exports
pub use error::{LossError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{grad_reverse, GradReverse, LayerNorm, Linear};
pub use network::{AdversarialDiscriminator, DiscriminatorSpec};
pub use config::{ClassHierarchy, LossConfig, LossWeights};
pub use loss::LossType;
pub use optim::sgd::Sgd;
