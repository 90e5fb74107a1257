use thiserror::Error;

/// Result type alias used by every fallible loss and layer in this crate.
pub type Result<T> = std::result::Result<T, LossError>;

#[derive(Error, Debug)]
pub enum LossError {
    #[error("Shape mismatch in '{operation}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        operation: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// The mask selects nothing, so the normalising count is zero.
    #[error("Mask for '{operation}' selects no elements")]
    EmptyMask { operation: &'static str },

    #[error("Empty input passed to '{operation}'")]
    EmptyInput { operation: &'static str },

    #[error("Invalid label {label} in '{operation}'")]
    InvalidLabel { operation: &'static str, label: i64 },

    #[error("Label '{label_name}' has non-leaf values but no class hierarchy was given")]
    MissingHierarchy { label_name: String },

    #[error("Invalid parameter for '{operation}': {reason}")]
    InvalidParameter {
        operation: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LossError {
    pub fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        LossError::InvalidParameter {
            operation,
            reason: reason.into(),
        }
    }
}
