use voxid_model::VqModel;

use crate::{ModelKind, ModelRecognizer, RecognizerConfig};

/// Vector quantization model kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vq;

impl ModelKind for Vq {
    type Model = VqModel;
    const NAME: &'static str = "vq";

    fn create_model(config: &RecognizerConfig) -> VqModel {
        VqModel::new(config.vq())
    }
}

/// Recognizer over VQ codebooks.
pub type VqRecognizer = ModelRecognizer<Vq>;
