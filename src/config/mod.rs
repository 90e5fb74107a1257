pub mod hierarchy;
pub mod loss_config;

pub use hierarchy::ClassHierarchy;
pub use loss_config::{LossConfig, LossWeights};
