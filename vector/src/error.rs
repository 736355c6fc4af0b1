use thiserror::Error;

/// Errors returned by feature vector operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index {index} out of range for vector of size {len}")]
    OutOfRange { index: usize, len: usize },
}
