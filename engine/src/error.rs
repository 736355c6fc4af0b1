use std::path::PathBuf;

use thiserror::Error;
use voxid_recognizer::RecognizerError;

/// Errors returned by the test engine and sample sources.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),

    #[error("io error at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{}: {}", .path.display(), .line, .message)]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
