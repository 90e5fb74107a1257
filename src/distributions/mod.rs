pub mod negative_binomial;
pub mod zero_inflated;

pub use negative_binomial::NegativeBinomial;
pub use zero_inflated::ZeroInflatedNegativeBinomial;
