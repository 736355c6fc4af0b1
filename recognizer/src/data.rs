use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use voxid_vector::FeatureVector;

/// Reserved key of the background (universal) model.
pub const BACKGROUND_KEY: &str = ".ubm";

/// Identifies a speaker, or the background model via [`SpeakerKey::background`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeakerKey(String);

impl SpeakerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn background() -> Self {
        Self(BACKGROUND_KEY.to_string())
    }

    pub fn is_background(&self) -> bool {
        self.0 == BACKGROUND_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpeakerKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SpeakerKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Frames of one utterance, in time order.
pub type Utterance = Vec<FeatureVector>;

/// Utterances grouped by speaker.
///
/// Iteration is in key order so that every pass over a population is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechData {
    speakers: BTreeMap<SpeakerKey, Vec<Utterance>>,
}

impl SpeechData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an utterance to the speaker's list.
    pub fn insert(&mut self, speaker: SpeakerKey, utterance: Utterance) {
        self.speakers.entry(speaker).or_default().push(utterance);
    }

    /// Number of speakers.
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn contains(&self, speaker: &SpeakerKey) -> bool {
        self.speakers.contains_key(speaker)
    }

    pub fn speakers(&self) -> impl Iterator<Item = &SpeakerKey> {
        self.speakers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpeakerKey, &[Utterance])> {
        self.speakers.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Utterances of a speaker; empty for unknown speakers.
    pub fn utterances(&self, speaker: &SpeakerKey) -> &[Utterance] {
        self.speakers.get(speaker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All frames of a speaker, utterances concatenated in order.
    pub fn frames(&self, speaker: &SpeakerKey) -> Vec<FeatureVector> {
        self.utterances(speaker).iter().flatten().cloned().collect()
    }

    /// All frames of all speakers, in key order.
    pub fn pooled_frames(&self) -> Vec<FeatureVector> {
        self.speakers.values().flatten().flatten().cloned().collect()
    }

    /// Total number of utterances across speakers.
    pub fn utterance_count(&self) -> usize {
        self.speakers.values().map(Vec::len).sum()
    }

    /// Keeps only the listed speakers.
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a SpeakerKey>) -> SpeechData {
        let mut out = SpeechData::new();
        for key in keys {
            if let Some(utts) = self.speakers.get(key) {
                out.speakers.insert(key.clone(), utts.clone());
            }
        }
        out
    }
}

impl FromIterator<(SpeakerKey, Vec<Utterance>)> for SpeechData {
    fn from_iter<T: IntoIterator<Item = (SpeakerKey, Vec<Utterance>)>>(iter: T) -> Self {
        let mut data = SpeechData::new();
        for (key, utts) in iter {
            data.speakers.entry(key).or_default().extend(utts);
        }
        data
    }
}

/// Data handed to one training pass.
#[derive(Debug, Clone, Copy)]
pub struct TrainingSet<'a> {
    /// Enrolled speakers; one model each.
    pub speakers: &'a SpeechData,
    /// Pooled into the background model when background training is on.
    pub background: Option<&'a SpeechData>,
    /// Cohort speakers; one impostor model each, and their utterances form
    /// the Z-normalization cohort.
    pub impostors: Option<&'a SpeechData>,
}

impl<'a> TrainingSet<'a> {
    pub fn speakers(speakers: &'a SpeechData) -> Self {
        Self {
            speakers,
            background: None,
            impostors: None,
        }
    }

    pub fn with_background(mut self, background: &'a SpeechData) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_impostors(mut self, impostors: &'a SpeechData) -> Self {
        self.impostors = Some(impostors);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utt(values: &[f64]) -> Utterance {
        values.iter().map(|&v| FeatureVector::from(vec![v])).collect()
    }

    #[test]
    fn background_key() {
        let k = SpeakerKey::background();
        assert!(k.is_background());
        assert_eq!(k.to_string(), ".ubm");
        assert!(!SpeakerKey::from("s001").is_background());
    }

    #[test]
    fn key_serializes_as_string() {
        let json = serde_json::to_string(&SpeakerKey::new("s042")).unwrap();
        assert_eq!(json, "\"s042\"");
    }

    #[test]
    fn frames_concatenate_in_order() {
        let mut data = SpeechData::new();
        let s = SpeakerKey::from("a");
        data.insert(s.clone(), utt(&[1.0, 2.0]));
        data.insert(s.clone(), utt(&[3.0]));
        data.insert(SpeakerKey::from("b"), utt(&[9.0]));

        let values: Vec<f64> = data.frames(&s).iter().map(|f| f.as_slice()[0]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.utterance_count(), 3);
        assert_eq!(data.pooled_frames().len(), 4);
        assert!(data.frames(&SpeakerKey::from("zzz")).is_empty());
    }

    #[test]
    fn iteration_is_key_ordered() {
        let data: SpeechData = vec![
            (SpeakerKey::from("c"), vec![utt(&[0.0])]),
            (SpeakerKey::from("a"), vec![utt(&[0.0])]),
            (SpeakerKey::from("b"), vec![utt(&[0.0])]),
        ]
        .into_iter()
        .collect();
        let keys: Vec<&str> = data.speakers().map(SpeakerKey::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn subset_keeps_listed() {
        let data: SpeechData = ["a", "b", "c"]
            .iter()
            .map(|k| (SpeakerKey::from(*k), vec![utt(&[1.0])]))
            .collect();
        let keep = [SpeakerKey::from("a"), SpeakerKey::from("c"), SpeakerKey::from("x")];
        let sub = data.subset(keep.iter());
        assert_eq!(sub.len(), 2);
        assert!(sub.contains(&SpeakerKey::from("c")));
        assert!(!sub.contains(&SpeakerKey::from("b")));
    }
}
