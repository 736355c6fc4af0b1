use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use voxid_recognizer::{SpeakerKey, SpeechData, Utterance};
use voxid_vector::FeatureVector;

use crate::EngineError;

/// Loads a contiguous range of speakers from a corpus root.
pub trait SampleSource: Send + Sync {
    /// Speakers `[start, start + count)` in the source's stable order.
    fn load(&self, root: &Path, start: usize, count: usize) -> Result<SpeechData, EngineError>;
}

fn check_range(root: &Path, start: usize, count: usize, available: usize) -> Result<(), EngineError> {
    match start.checked_add(count) {
        Some(end) if end <= available => Ok(()),
        _ => Err(EngineError::InvalidConfiguration(format!(
            "speakers {start}..{} requested but {} has {available}",
            start.saturating_add(count),
            root.display()
        ))),
    }
}

/// Reads speakers from a directory tree of text files.
///
/// ```text
/// root/
///   s001/
///     a.txt     one frame per line, whitespace-separated numbers
///     b.txt
///   s002/
///     ...
/// ```
///
/// Speakers are the sub-directories of `root` in name order. Each `*.txt`
/// file is one utterance; blank lines are skipped. All frames of one load
/// must have the same dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSampleSource;

impl TextSampleSource {
    pub fn new() -> Self {
        Self
    }

    /// Sorted speaker directories under `root`.
    fn speaker_dirs(root: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| EngineError::io(root, e))? {
            let entry = entry.map_err(|e| EngineError::io(root, e))?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn utterance_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))? {
            let entry = entry.map_err(|e| EngineError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_utterance(path: &Path, dim: &mut Option<usize>) -> Result<Utterance, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let mut frames = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parse_err = |message: String| EngineError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message,
            };

            let frame = line
                .split_whitespace()
                .map(|tok| match tok.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(v),
                    Ok(_) => Err(parse_err(format!("non-finite value {tok:?}"))),
                    Err(e) => Err(parse_err(format!("invalid number {tok:?}: {e}"))),
                })
                .collect::<Result<FeatureVector, _>>()?;

            match *dim {
                None => *dim = Some(frame.len()),
                Some(d) if d != frame.len() => {
                    return Err(parse_err(format!(
                        "frame has {} values, expected {d}",
                        frame.len()
                    )));
                }
                Some(_) => {}
            }
            frames.push(frame);
        }
        Ok(frames)
    }
}

impl SampleSource for TextSampleSource {
    fn load(&self, root: &Path, start: usize, count: usize) -> Result<SpeechData, EngineError> {
        let dirs = Self::speaker_dirs(root)?;
        check_range(root, start, count, dirs.len())?;

        let mut data = SpeechData::new();
        let mut dim = None;
        for dir in &dirs[start..start + count] {
            let key = SpeakerKey::new(
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            let files = Self::utterance_files(dir)?;
            if files.is_empty() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "speaker directory {} has no utterances",
                    dir.display()
                )));
            }
            for file in &files {
                data.insert(key.clone(), Self::read_utterance(file, &mut dim)?);
            }
            debug!(speaker = %key, utterances = files.len(), "speaker loaded");
        }
        Ok(data)
    }
}

/// Speakers held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    speakers: Vec<(SpeakerKey, Vec<Utterance>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: impl Into<SpeakerKey>, utterances: Vec<Utterance>) {
        self.speakers.push((speaker.into(), utterances));
    }

    pub fn with_speaker(mut self, speaker: impl Into<SpeakerKey>, utterances: Vec<Utterance>) -> Self {
        self.push(speaker, utterances);
        self
    }
}

impl SampleSource for MemorySource {
    fn load(&self, root: &Path, start: usize, count: usize) -> Result<SpeechData, EngineError> {
        check_range(root, start, count, self.speakers.len())?;
        Ok(self.speakers[start..start + count].iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_sorted_range() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("s2"), "a.txt", "3 4\n");
        write(&root.join("s1"), "b.txt", "1 2\n\n5 6\n");
        write(&root.join("s1"), "a.txt", "0 0\n");
        write(&root.join("s1"), "notes.md", "ignored");
        write(&root.join("s3"), "a.txt", "7 8\n");

        let data = TextSampleSource::new().load(root, 0, 2).unwrap();
        let keys: Vec<&str> = data.speakers().map(SpeakerKey::as_str).collect();
        assert_eq!(keys, vec!["s1", "s2"]);

        let s1 = data.utterances(&"s1".into());
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[0], vec![FeatureVector::from(vec![0.0, 0.0])]);
        assert_eq!(s1[1].len(), 2);
        assert_eq!(s1[1][1].as_slice(), &[5.0, 6.0]);

        let tail = TextSampleSource::new().load(root, 2, 1).unwrap();
        assert!(tail.contains(&"s3".into()));
    }

    #[test]
    fn range_past_end_fails() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("s1"), "a.txt", "1\n");
        let err = TextSampleSource::new().load(tmp.path(), 1, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn bad_number_reports_line() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("s1"), "a.txt", "1 2\n3 x\n");
        match TextSampleSource::new().load(tmp.path(), 0, 1).unwrap_err() {
            EngineError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_finite_values_rejected() {
        for body in ["1 NaN\n", "inf 2\n", "1 -infinity\n"] {
            let tmp = tempfile::tempdir().unwrap();
            write(&tmp.path().join("s1"), "a.txt", body);
            match TextSampleSource::new().load(tmp.path(), 0, 1).unwrap_err() {
                EngineError::Parse { line, message, .. } => {
                    assert_eq!(line, 1);
                    assert!(message.contains("non-finite"), "{message}");
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn mixed_dimensions_fail() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("s1"), "a.txt", "1 2\n");
        write(&tmp.path().join("s2"), "a.txt", "1 2 3\n");
        assert!(matches!(
            TextSampleSource::new().load(tmp.path(), 0, 2),
            Err(EngineError::Parse { .. })
        ));
    }

    #[test]
    fn missing_root_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = TextSampleSource::new()
            .load(&tmp.path().join("nope"), 0, 1)
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn memory_source_slices() {
        let frame = || vec![FeatureVector::from(vec![1.0])];
        let src = MemorySource::new()
            .with_speaker("a", vec![frame()])
            .with_speaker("b", vec![frame()])
            .with_speaker("c", vec![frame()]);
        let data = src.load(Path::new("mem"), 1, 2).unwrap();
        assert_eq!(data.len(), 2);
        assert!(!data.contains(&"a".into()));
        assert!(src.load(Path::new("mem"), 2, 2).is_err());
    }
}
