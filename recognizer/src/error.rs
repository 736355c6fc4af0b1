use thiserror::Error;
use voxid_model::ModelError;

use crate::SpeakerKey;

/// Errors returned by recognizer operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecognizerError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("speaker {speaker}: {source}")]
    Speaker {
        speaker: SpeakerKey,
        #[source]
        source: ModelError,
    },

    #[error("recognizer is not trained")]
    NotTrained,

    #[error("unknown speaker: {0}")]
    UnknownSpeaker(SpeakerKey),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
