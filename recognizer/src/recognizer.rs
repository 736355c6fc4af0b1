use std::sync::Arc;

use serde::{Deserialize, Serialize};
use voxid_vector::FeatureVector;

use crate::{RecognizerConfig, RecognizerError, SpeakerKey, SpeechData, TrainingSet};

/// Closed-set identification of one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub speaker: SpeakerKey,
    pub raw_score: f64,
    pub score: f64,
}

/// Accept/reject decision on one identity claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub claimed: SpeakerKey,
    pub raw_score: f64,
    pub score: f64,
    /// `None` when no decision threshold is configured.
    pub accepted: Option<bool>,
}

/// One trial with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub actual: SpeakerKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed: Option<SpeakerKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognized: Option<SpeakerKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    pub raw_score: f64,
    pub score: f64,
}

impl RecognitionResult {
    pub fn identified(actual: SpeakerKey, id: Identification) -> Self {
        Self {
            actual,
            claimed: None,
            recognized: Some(id.speaker),
            accepted: None,
            raw_score: id.raw_score,
            score: id.score,
        }
    }

    pub fn verified(actual: SpeakerKey, v: Verification) -> Self {
        Self {
            actual,
            claimed: Some(v.claimed),
            recognized: None,
            accepted: v.accepted,
            raw_score: v.raw_score,
            score: v.score,
        }
    }

    /// Whether this is a verification trial, decided or not.
    pub fn is_claim(&self) -> bool {
        self.claimed.is_some()
    }

    /// Whether the claim was made by the claimed speaker.
    pub fn genuine(&self) -> bool {
        self.claimed.as_ref() == Some(&self.actual)
    }

    /// Identification picked the right speaker, or verification made the
    /// right decision.
    pub fn correct(&self) -> bool {
        match (&self.recognized, self.accepted) {
            (Some(r), _) => *r == self.actual,
            (None, Some(accepted)) => accepted == self.genuine(),
            (None, None) => false,
        }
    }
}

/// Recognition protocol driven by the test engine.
pub trait Recognizer: Send {
    /// Model kind name, used in run identifiers.
    fn kind(&self) -> &'static str;

    fn config(&self) -> &RecognizerConfig;

    fn reconfigure(&mut self, config: RecognizerConfig);

    fn speaker_data(&self) -> Option<Arc<SpeechData>>;
    fn set_speaker_data(&mut self, data: Arc<SpeechData>);

    fn background_data(&self) -> Option<Arc<SpeechData>>;
    fn set_background_data(&mut self, data: Arc<SpeechData>);

    fn train(&mut self, set: &TrainingSet<'_>) -> Result<(), RecognizerError>;

    fn identify(&mut self, utterance: &[FeatureVector]) -> Result<Identification, RecognizerError>;

    fn verify(
        &mut self,
        claimed: &SpeakerKey,
        utterance: &[FeatureVector],
    ) -> Result<Verification, RecognizerError>;

    /// Identifies every utterance of `data`.
    fn test(&mut self, data: &SpeechData) -> Result<Vec<RecognitionResult>, RecognizerError> {
        let mut results = Vec::with_capacity(data.utterance_count());
        for (speaker, utterances) in data.iter() {
            for utterance in utterances {
                let id = self.identify(utterance)?;
                results.push(RecognitionResult::identified(speaker.clone(), id));
            }
        }
        Ok(results)
    }

    fn enrolled(&self) -> Vec<SpeakerKey>;
}
