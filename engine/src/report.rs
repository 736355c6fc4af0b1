use std::path::Path;

use serde::{Deserialize, Serialize};
use voxid_recognizer::{RecognitionResult, RecognizerConfig};

use crate::{EngineError, IdentificationSummary, RecognizeParams, VerificationSummary, VerifyParams};

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    Failed { error: String },
}

impl CycleStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One cycle of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome<S> {
    pub cycle: usize,
    #[serde(flatten)]
    pub status: CycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<S>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<RecognitionResult>,
}

impl<S> CycleOutcome<S> {
    pub fn failed(cycle: usize, error: impl ToString) -> Self {
        Self {
            cycle,
            status: CycleStatus::Failed {
                error: error.to_string(),
            },
            summary: None,
            results: Vec::new(),
        }
    }
}

/// Identification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionReport {
    pub id: String,
    pub timestamp: String,
    pub kind: String,
    pub config: RecognizerConfig,
    pub params: RecognizeParams,
    pub cycles: Vec<CycleOutcome<IdentificationSummary>>,
    /// Over completed cycles only.
    pub overall: IdentificationSummary,
}

/// Verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub id: String,
    pub timestamp: String,
    pub kind: String,
    pub config: RecognizerConfig,
    pub params: VerifyParams,
    pub cohort: Vec<String>,
    pub claimants: Vec<String>,
    /// Threshold the trials were decided at, configured or calibrated.
    pub decision_threshold: f64,
    pub cycles: Vec<CycleOutcome<VerificationSummary>>,
    /// Over completed cycles only.
    pub overall: VerificationSummary,
}

/// Common surface of run reports.
pub trait Report: Serialize {
    fn id(&self) -> &str;

    fn failed_cycles(&self) -> usize;

    fn print_summary(&self);
}

fn failed<S>(cycles: &[CycleOutcome<S>]) -> usize {
    cycles.iter().filter(|c| !c.status.is_completed()).count()
}

fn print_failures<S>(cycles: &[CycleOutcome<S>]) {
    for c in cycles {
        if let CycleStatus::Failed { error } = &c.status {
            println!("  cycle {} failed: {}", c.cycle, error);
        }
    }
}

impl Report for RecognitionReport {
    fn id(&self) -> &str {
        &self.id
    }

    fn failed_cycles(&self) -> usize {
        failed(&self.cycles)
    }

    fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("IDENTIFICATION {}", self.id);
        println!("{}", "=".repeat(80));

        println!(
            "\n{:<8} {:>10} {:>10} {:>10} {:>10}",
            "Cycle", "Status", "Total", "Correct", "Accuracy"
        );
        println!("{}", "-".repeat(80));
        for c in &self.cycles {
            match &c.summary {
                Some(s) => println!(
                    "{:<8} {:>10} {:>10} {:>10} {:>9.1}%",
                    c.cycle,
                    "ok",
                    s.total,
                    s.correct,
                    s.accuracy * 100.0
                ),
                None => println!("{:<8} {:>10}", c.cycle, "failed"),
            }
        }
        println!("{}", "-".repeat(80));
        println!(
            "{:<8} {:>10} {:>10} {:>10} {:>9.1}%",
            "overall",
            "",
            self.overall.total,
            self.overall.correct,
            self.overall.accuracy * 100.0
        );
        print_failures(&self.cycles);
    }
}

impl Report for VerificationReport {
    fn id(&self) -> &str {
        &self.id
    }

    fn failed_cycles(&self) -> usize {
        failed(&self.cycles)
    }

    fn print_summary(&self) {
        println!("\n{}", "=".repeat(100));
        println!("VERIFICATION {}", self.id);
        println!("{}", "=".repeat(100));
        println!("Decision threshold: {:.4}", self.decision_threshold);

        println!(
            "\n{:<8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10}",
            "Cycle", "Status", "Genuine", "Impostor", "FA", "FR", "FAR", "FRR", "EER"
        );
        println!("{}", "-".repeat(100));
        for c in &self.cycles {
            match &c.summary {
                Some(s) => print_verification_row(&c.cycle.to_string(), "ok", s),
                None => println!("{:<8} {:>8}", c.cycle, "failed"),
            }
        }
        println!("{}", "-".repeat(100));
        print_verification_row("overall", "", &self.overall);
        print_failures(&self.cycles);
    }
}

fn print_verification_row(label: &str, status: &str, s: &VerificationSummary) {
    let eer = s
        .eer
        .map(|e| format!("{:.1}%", e.far * 100.0))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>9.1}% {:>9.1}% {:>10}",
        label,
        status,
        s.genuine,
        s.impostor,
        s.false_accepts,
        s.false_rejects,
        s.far * 100.0,
        s.frr * 100.0,
        eer
    );
}

/// Writes a report as pretty JSON.
pub fn save_report<R: Serialize + ?Sized>(report: &R, path: &Path) -> Result<(), EngineError> {
    let data = serde_json::to_string_pretty(report)?;
    std::fs::write(path, data).map_err(|e| EngineError::io(path, e))?;
    Ok(())
}

/// Reads a report written by [`save_report`].
pub fn load_report<R: for<'de> Deserialize<'de>>(path: &Path) -> Result<R, EngineError> {
    let data = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(serde_json::from_slice(&data)?)
}

fn root_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "samples".to_string())
}

fn config_label(kind: &str, config: &RecognizerConfig) -> String {
    let mut label = format!(
        "{kind}_o{}_w{}_{}",
        config.order,
        u8::from(config.weighting_enabled),
        config.score_normalization
    );
    if config.background_model_enabled {
        label.push_str("_ubm");
    }
    if config.adapts() {
        label.push_str(&format!("_a{}", config.adaptation_iterations));
    }
    label
}

/// `<root>_rec_<kind>_o<order>_w<0|1>_<norm>[_ubm][_a<n>]_<sf-gf-sl-gl>-<cycles>`
pub fn recognition_id(
    root: &Path,
    kind: &str,
    config: &RecognizerConfig,
    params: &RecognizeParams,
) -> String {
    format!(
        "{}_rec_{}_{}-{}",
        root_name(root),
        config_label(kind, config),
        params.segments.label(),
        params.cycles
    )
}

/// Like [`recognition_id`] with `_ver_` and the claim counts and impostor
/// range appended.
pub fn verification_id(
    root: &Path,
    kind: &str,
    config: &RecognizerConfig,
    params: &VerifyParams,
) -> String {
    format!(
        "{}_ver_{}_{}-{}-{}-{}-{}-{}",
        root_name(root),
        config_label(kind, config),
        params.segments.label(),
        params.cycles,
        params.incorrect_claimed,
        params.correct_claimed,
        params.impostor_start,
        params.impostor_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentLayout;
    use voxid_recognizer::ScoreNormalization;

    fn layout() -> SegmentLayout {
        SegmentLayout {
            train_frames: 240,
            train_segments: 5,
            test_frames: 10,
            test_segments: 3,
        }
    }

    #[test]
    fn recognition_id_format() {
        let params = RecognizeParams {
            segments: layout(),
            cycles: 4,
        };
        let id = recognition_id(
            Path::new("/data/samples"),
            "vq",
            &RecognizerConfig::default(),
            &params,
        );
        assert_eq!(id, "samples_rec_vq_o64_w1_none_240-5-10-3-4");
    }

    #[test]
    fn verification_id_format() {
        let config = RecognizerConfig {
            order: 16,
            weighting_enabled: false,
            score_normalization: ScoreNormalization::ZeroTest,
            background_model_enabled: true,
            adaptation_iterations: 2,
            ..Default::default()
        };
        let params = VerifyParams {
            segments: layout(),
            cycles: 4,
            incorrect_claimed: 5,
            correct_claimed: 1,
            impostor_start: 20,
            impostor_count: 10,
        };
        let id = verification_id(Path::new("corpus"), "vq", &config, &params);
        assert_eq!(id, "corpus_ver_vq_o16_w0_zero_test_ubm_a2_240-5-10-3-4-5-1-20-10");
    }

    #[test]
    fn failed_cycle_serializes_status() {
        let c: CycleOutcome<IdentificationSummary> = CycleOutcome::failed(3, "boom");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["cycle"], 3);
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("r.json");
        let report = RecognitionReport {
            id: "x_rec".into(),
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            kind: "vq".into(),
            config: RecognizerConfig::default(),
            params: RecognizeParams {
                segments: layout(),
                cycles: 1,
            },
            cycles: vec![CycleOutcome::failed(0, "short")],
            overall: IdentificationSummary::default(),
        };
        save_report(&report, &path).unwrap();
        let back: RecognitionReport = load_report(&path).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.failed_cycles(), 1);
    }
}
