use thiserror::Error;
use voxid_vector::VectorError;

/// Errors returned by model training and scoring.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error("model is not trained")]
    NotTrained,

    #[error("no samples given")]
    NoSamples,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
