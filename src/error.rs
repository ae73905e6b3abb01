//! Error types for sparr

use thiserror::Error;

/// Result type alias using sparr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparr operations
///
/// Every fallible entry point of the library returns one of these; kernels
/// must either complete or surface a variant without leaving operands in an
/// inconsistent intermediate state.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invalid argument provided by the caller
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Shape mismatch between operands
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        got: usize,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Operation not applicable to the object's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Feature not yet implemented
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Description of the unimplemented feature
        feature: &'static str,
    },

    /// Operator program failed to compile on the accelerator
    #[error("Compilation error: {0}")]
    Compilation(String),

    /// Accelerator runtime failure (allocation, launch, transfer)
    #[error("Device error: {0}")]
    Device(String),

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Work was cancelled because a predecessor failed
    #[error("Aborted")]
    Aborted,

    /// Expression finished with at least one failed node
    #[error("Failed: {0}")]
    Failed(String),
}

impl Error {
    /// Create an invalid-argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: usize, got: usize) -> Self {
        Self::ShapeMismatch { expected, got }
    }

    /// Create an invalid-state error
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::shape_mismatch(4, 3);
        assert_eq!(e.to_string(), "Shape mismatch: expected 4, got 3");

        let e = Error::invalid_argument("mask", "null operand");
        assert!(e.to_string().contains("mask"));
    }
}
