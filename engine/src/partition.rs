use serde::{Deserialize, Serialize};
use voxid_recognizer::{SpeechData, Utterance};
use voxid_vector::FeatureVector;

use crate::EngineError;

/// Train/test segment layout of one cross-validation cycle.
///
/// Serialized with the short names `sf`, `gf`, `sl` and `gl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLayout {
    /// Frames per training segment.
    #[serde(rename = "sf")]
    pub train_frames: usize,
    /// Training segments per speaker.
    #[serde(rename = "gf")]
    pub train_segments: usize,
    /// Frames per test segment.
    #[serde(rename = "sl")]
    pub test_frames: usize,
    /// Test segments per speaker.
    #[serde(rename = "gl")]
    pub test_segments: usize,
}

impl SegmentLayout {
    /// Frames one speaker needs for a cycle.
    pub fn required_frames(&self) -> usize {
        self.train_frames
            .saturating_mul(self.train_segments)
            .saturating_add(self.test_frames.saturating_mul(self.test_segments))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.train_frames == 0
            || self.train_segments == 0
            || self.test_frames == 0
            || self.test_segments == 0
        {
            return Err(EngineError::InvalidConfiguration(format!(
                "segment layout must be positive, got {}",
                self.label()
            )));
        }
        Ok(())
    }

    /// `sf-gf-sl-gl`.
    pub fn label(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.train_frames, self.train_segments, self.test_frames, self.test_segments
        )
    }
}

/// Train and test data of one cycle.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub train: SpeechData,
    pub test: SpeechData,
}

/// Splits every speaker's frame stream for cycle `cycle`.
///
/// The stream is the concatenation of the speaker's utterances. The cycle
/// starts at `(cycle * sl * gl) mod L` and takes `gl` test segments, then
/// `gf` training segments, wrapping around the end of the stream. Each test
/// segment becomes one test utterance.
pub fn partition(
    data: &SpeechData,
    layout: &SegmentLayout,
    cycle: usize,
) -> Result<Partition, EngineError> {
    layout.validate()?;
    let needed = layout.required_frames();
    let stride = layout.test_frames * layout.test_segments;

    let mut out = Partition::default();
    for speaker in data.speakers() {
        let frames = data.frames(speaker);
        let len = frames.len();
        if len < needed {
            return Err(EngineError::InvalidConfiguration(format!(
                "speaker {speaker} has {len} frames, layout {} needs {needed}",
                layout.label()
            )));
        }

        let offset = ((cycle % len) * (stride % len)) % len;
        for t in 0..layout.test_segments {
            let start = offset + t * layout.test_frames;
            out.test
                .insert(speaker.clone(), segment(&frames, start, layout.test_frames));
        }
        let base = offset + stride;
        for g in 0..layout.train_segments {
            let start = base + g * layout.train_frames;
            out.train
                .insert(speaker.clone(), segment(&frames, start, layout.train_frames));
        }
    }
    Ok(out)
}

fn segment(frames: &[FeatureVector], start: usize, count: usize) -> Utterance {
    (0..count)
        .map(|i| frames[(start + i) % frames.len()].clone())
        .collect()
}
