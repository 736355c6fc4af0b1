//! Experiment schedule loading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use voxid_engine::{RecognizeParams, VerifyParams};
use voxid_recognizer::RecognizerConfig;

/// Schedule file format.
///
/// ```yaml
/// root: samples
/// speakers: { start: 0, count: 20 }
/// background: { start: 40, count: 20 }
/// runs:
///   - protocol: recognize
///     config: { order: 64 }
///     params: { sf: 240, gf: 5, sl: 10, gl: 3, cycles: 4 }
///   - protocol: verify
///     config: { order: 64, score_normalization: zero }
///     params: { sf: 240, gf: 5, sl: 10, gl: 3, cycles: 4,
///               incorrect_claimed: 5, correct_claimed: 1, si: 20, gi: 10 }
/// ```
#[derive(Debug, Deserialize)]
pub struct Schedule {
    /// Corpus root; relative paths resolve against the schedule file.
    pub root: PathBuf,
    pub speakers: SpeakerRange,
    #[serde(default)]
    pub background: Option<SpeakerRange>,
    pub runs: Vec<Run>,
}

/// Contiguous range of corpus speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SpeakerRange {
    pub start: usize,
    pub count: usize,
}

/// One experiment.
#[derive(Debug, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum Run {
    Recognize {
        #[serde(default)]
        config: RecognizerConfig,
        params: RecognizeParams,
    },
    Verify {
        #[serde(default)]
        config: RecognizerConfig,
        params: VerifyParams,
    },
}

impl Run {
    pub fn config(&self) -> &RecognizerConfig {
        match self {
            Run::Recognize { config, .. } | Run::Verify { config, .. } => config,
        }
    }
}

/// Loads and checks a schedule file.
pub fn load(path: &Path) -> Result<Schedule> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read schedule {}", path.display()))?;
    let mut schedule: Schedule = serde_yaml::from_slice(&data)
        .with_context(|| format!("failed to parse schedule {}", path.display()))?;

    if schedule.root.is_relative() {
        if let Some(dir) = path.parent() {
            schedule.root = dir.join(&schedule.root);
        }
    }
    if schedule.speakers.count == 0 {
        bail!("schedule enrolls no speakers");
    }
    for (i, run) in schedule.runs.iter().enumerate() {
        run.config()
            .validate()
            .with_context(|| format!("run {i}"))?;
        if let Run::Recognize { config, .. } = run {
            if config.score_normalization.needs_cohort() {
                bail!(
                    "run {i}: identification does not support {} score normalization",
                    config.score_normalization
                );
            }
        }
    }
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxid_recognizer::ScoreNormalization;

    const SCHEDULE: &str = r#"
root: corpus
speakers: { start: 0, count: 4 }
background: { start: 8, count: 2 }
runs:
  - protocol: recognize
    config: { order: 16, weighting_enabled: false }
    params: { sf: 100, gf: 2, sl: 20, gl: 3, cycles: 2 }
  - protocol: verify
    config: { order: 16, score_normalization: zero_test }
    params:
      sf: 100
      gf: 2
      sl: 20
      gl: 3
      cycles: 2
      incorrect_claimed: 5
      correct_claimed: 1
      si: 4
      gi: 4
"#;

    #[test]
    fn loads_schedule() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tests.yaml");
        std::fs::write(&path, SCHEDULE).unwrap();

        let s = load(&path).unwrap();
        assert_eq!(s.root, tmp.path().join("corpus"));
        assert_eq!(s.speakers, SpeakerRange { start: 0, count: 4 });
        assert_eq!(s.background, Some(SpeakerRange { start: 8, count: 2 }));
        assert_eq!(s.runs.len(), 2);

        match &s.runs[0] {
            Run::Recognize { config, params } => {
                assert_eq!(config.order, 16);
                assert!(!config.weighting_enabled);
                assert_eq!(params.segments.train_frames, 100);
                assert_eq!(params.cycles, 2);
            }
            other => panic!("unexpected run: {other:?}"),
        }
        match &s.runs[1] {
            Run::Verify { config, params } => {
                assert_eq!(config.score_normalization, ScoreNormalization::ZeroTest);
                assert_eq!(params.incorrect_claimed, 5);
                assert_eq!(params.impostor_count, 4);
            }
            other => panic!("unexpected run: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.yaml");
        std::fs::write(
            &path,
            "root: x\nspeakers: { start: 0, count: 1 }\nruns:\n  - protocol: recognize\n    config: { order: 0 }\n    params: { sf: 1, gf: 1, sl: 1, gl: 1, cycles: 1 }\n",
        )
        .unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn rejects_normalized_identification() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("norm.yaml");
        std::fs::write(
            &path,
            "root: x\nspeakers: { start: 0, count: 1 }\nruns:\n  - protocol: recognize\n    config: { score_normalization: zero }\n    params: { sf: 1, gf: 1, sl: 1, gl: 1, cycles: 1 }\n",
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("score normalization"), "{err}");
    }

    #[test]
    fn missing_file_fails() {
        assert!(load(Path::new("/nonexistent/voxbench.yaml")).is_err());
    }
}
