//! Speaker identification and verification over a population of models.
//!
//! A [`ModelRecognizer`] owns an optional background model, one model per
//! enrolled speaker and one per impostor. [`VqRecognizer`] is the VQ
//! instance.
//!
//! # Lifecycle
//!
//! ```text
//! Untrained --train--> Dirty --prepare_models--> Prepared
//!     ^                  ^                           |
//!     |                  +---- weighting / norm -----+
//!     +------- clustering / adaptation change -------+
//! ```
//!
//! Scoring calls prepare lazily, so a weighting toggle is always reflected
//! by the next trial.
//!
//! # Example
//!
//! ```
//! use voxid_recognizer::{Recognizer, RecognizerConfig, SpeechData, TrainingSet, VqRecognizer};
//! use voxid_vector::FeatureVector;
//!
//! let mut data = SpeechData::new();
//! data.insert("low".into(), vec![vec![0.0].into(), vec![1.0].into()]);
//! data.insert("high".into(), vec![vec![10.0].into(), vec![11.0].into()]);
//!
//! let mut rec = VqRecognizer::new(RecognizerConfig { order: 2, ..Default::default() });
//! rec.train(&TrainingSet::speakers(&data)).unwrap();
//!
//! let sample: Vec<FeatureVector> = vec![vec![10.4].into()];
//! assert_eq!(rec.identify(&sample).unwrap().speaker.as_str(), "high");
//! ```

mod config;
mod data;
mod error;
mod model_recognizer;
mod norm;
mod recognizer;
mod vq;

pub use config::{RecognizerConfig, ScoreNormalization};
pub use data::{SpeakerKey, SpeechData, TrainingSet, Utterance, BACKGROUND_KEY};
pub use error::RecognizerError;
pub use model_recognizer::{ModelKind, ModelRecognizer, PreparationState};
pub use norm::ScoreStats;
pub use recognizer::{Identification, Recognizer, RecognitionResult, Verification};
pub use vq::{Vq, VqRecognizer};
