pub mod discriminator;
pub mod spec;

pub use discriminator::{AdversarialDiscriminator, DiscriminatorGradients};
pub use spec::DiscriminatorSpec;
