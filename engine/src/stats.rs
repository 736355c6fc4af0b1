use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voxid_recognizer::{RecognitionResult, SpeakerKey};

/// Identification tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentificationSummary {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    /// actual speaker -> recognized speaker -> count
    pub confusion: BTreeMap<SpeakerKey, BTreeMap<SpeakerKey, usize>>,
}

impl IdentificationSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RecognitionResult>) -> Self {
        let mut summary = Self::default();
        for r in results {
            let Some(recognized) = &r.recognized else {
                continue;
            };
            summary.total += 1;
            if r.correct() {
                summary.correct += 1;
            }
            *summary
                .confusion
                .entry(r.actual.clone())
                .or_default()
                .entry(recognized.clone())
                .or_default() += 1;
        }
        summary.accuracy = ratio(summary.correct, summary.total);
        summary
    }

    pub fn incorrect(&self) -> usize {
        self.total - self.correct
    }
}

/// Error rates at one decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRates {
    pub threshold: f64,
    pub far: f64,
    pub frr: f64,
}

/// Verification tallies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub genuine: usize,
    pub impostor: usize,
    pub false_accepts: usize,
    pub false_rejects: usize,
    pub far: f64,
    pub frr: f64,
    /// Point where FAR and FRR meet over the normalized scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eer: Option<ErrorRates>,
}

impl VerificationSummary {
    pub fn from_results(results: &[RecognitionResult]) -> Self {
        let mut summary = Self::default();
        for r in results.iter().filter(|r| r.is_claim()) {
            if r.genuine() {
                summary.genuine += 1;
                if r.accepted == Some(false) {
                    summary.false_rejects += 1;
                }
            } else {
                summary.impostor += 1;
                if r.accepted == Some(true) {
                    summary.false_accepts += 1;
                }
            }
        }
        summary.far = ratio(summary.false_accepts, summary.impostor);
        summary.frr = ratio(summary.false_rejects, summary.genuine);
        summary.eer = equal_error_rate(results);
        summary
    }

    pub fn trials(&self) -> usize {
        self.genuine + self.impostor
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 { 0.0 } else { n as f64 / d as f64 }
}

fn split_scores(results: &[RecognitionResult]) -> (Vec<f64>, Vec<f64>) {
    let mut genuine = Vec::new();
    let mut impostor = Vec::new();
    for r in results.iter().filter(|r| r.is_claim()) {
        if r.genuine() {
            genuine.push(r.score);
        } else {
            impostor.push(r.score);
        }
    }
    (genuine, impostor)
}

fn rates(genuine: &[f64], impostor: &[f64], threshold: f64) -> ErrorRates {
    let accepted = impostor.iter().filter(|&&s| s >= threshold).count();
    let rejected = genuine.iter().filter(|&&s| s < threshold).count();
    ErrorRates {
        threshold,
        far: ratio(accepted, impostor.len()),
        frr: ratio(rejected, genuine.len()),
    }
}

/// Decides every undecided claim in `results` at `threshold`. Claims the
/// recognizer already decided keep their decision.
pub fn decide(results: &mut [RecognitionResult], threshold: f64) {
    for r in results.iter_mut().filter(|r| r.is_claim() && r.accepted.is_none()) {
        r.accepted = Some(r.score >= threshold);
    }
}

/// FAR and FRR of the verification trials in `results` if the decision
/// threshold had been `threshold`.
pub fn error_rates(results: &[RecognitionResult], threshold: f64) -> ErrorRates {
    let (genuine, impostor) = split_scores(results);
    rates(&genuine, &impostor, threshold)
}

/// Equal error rate: over every observed score as candidate threshold, the
/// one where `|FAR - FRR|` is smallest. The reported rate is the mean of
/// the two. `None` without both genuine and impostor trials.
pub fn equal_error_rate(results: &[RecognitionResult]) -> Option<ErrorRates> {
    let (genuine, impostor) = split_scores(results);
    if genuine.is_empty() || impostor.is_empty() {
        return None;
    }

    let mut thresholds: Vec<f64> = genuine
        .iter()
        .chain(impostor.iter())
        .copied()
        .filter(|s| s.is_finite())
        .collect();
    thresholds.sort_by(f64::total_cmp);
    thresholds.dedup();

    let mut best: Option<ErrorRates> = None;
    for t in thresholds {
        let r = rates(&genuine, &impostor, t);
        let gap = (r.far - r.frr).abs();
        if best.is_none_or(|b| gap < (b.far - b.frr).abs()) {
            best = Some(r);
        }
    }
    best.map(|b| {
        let rate = (b.far + b.frr) / 2.0;
        ErrorRates {
            threshold: b.threshold,
            far: rate,
            frr: rate,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxid_recognizer::{Identification, Verification};

    fn id(actual: &str, recognized: &str) -> RecognitionResult {
        RecognitionResult::identified(
            actual.into(),
            Identification {
                speaker: recognized.into(),
                raw_score: 0.0,
                score: 0.0,
            },
        )
    }

    fn ver(actual: &str, claimed: &str, score: f64) -> RecognitionResult {
        RecognitionResult::verified(
            actual.into(),
            Verification {
                claimed: claimed.into(),
                raw_score: score,
                score,
                accepted: Some(score >= 0.0),
            },
        )
    }

    fn undecided(actual: &str, claimed: &str, score: f64) -> RecognitionResult {
        let mut r = ver(actual, claimed, score);
        r.accepted = None;
        r
    }

    #[test]
    fn identification_tally() {
        let results = [id("a", "a"), id("a", "b"), id("b", "b"), id("c", "c")];
        let s = IdentificationSummary::from_results(&results);
        assert_eq!(s.total, 4);
        assert_eq!(s.correct, 3);
        assert_eq!(s.incorrect(), 1);
        assert_eq!(s.accuracy, 0.75);
        assert_eq!(s.confusion[&SpeakerKey::from("a")][&SpeakerKey::from("b")], 1);
    }

    #[test]
    fn verification_tally() {
        let results = [
            ver("a", "a", 1.0),
            ver("a", "a", -1.0),
            ver("x", "a", 0.5),
            ver("y", "a", -2.0),
            ver("y", "b", -3.0),
        ];
        let s = VerificationSummary::from_results(&results);
        assert_eq!(s.genuine, 2);
        assert_eq!(s.impostor, 3);
        assert_eq!(s.false_rejects, 1);
        assert_eq!(s.false_accepts, 1);
        assert_eq!(s.frr, 0.5);
        assert!((s.far - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.trials(), 5);
    }

    #[test]
    fn decide_fills_only_undecided_claims() {
        let mut results = vec![
            undecided("a", "a", -3.0),
            undecided("x", "a", -8.0),
            ver("y", "a", -5.0),
            id("a", "a"),
        ];
        let before = VerificationSummary::from_results(&results);
        assert_eq!(before.trials(), 3);
        assert_eq!(before.false_rejects, 0);

        decide(&mut results, -4.0);
        assert_eq!(results[0].accepted, Some(true));
        assert_eq!(results[1].accepted, Some(false));
        assert_eq!(results[2].accepted, Some(false));
        assert_eq!(results[3].accepted, None);
    }

    #[test]
    fn separable_scores_have_zero_eer() {
        let results = [
            ver("a", "a", 3.0),
            ver("a", "a", 2.0),
            ver("x", "a", -1.0),
            ver("y", "a", -2.0),
        ];
        let eer = equal_error_rate(&results).unwrap();
        assert_eq!(eer.far, 0.0);
        assert!(eer.threshold > -1.0 && eer.threshold <= 2.0);
    }

    #[test]
    fn eer_needs_both_classes() {
        assert!(equal_error_rate(&[ver("a", "a", 1.0)]).is_none());
        assert!(equal_error_rate(&[id("a", "a")]).is_none());
    }

    #[test]
    fn far_never_increases_with_threshold() {
        let mut state = 7u64;
        let mut results = Vec::new();
        for i in 0..200 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let score = ((state >> 33) as f64) / (u32::MAX as f64) * 4.0 - 2.0;
            let actual = if i % 3 == 0 { "a" } else { "z" };
            results.push(ver(actual, "a", score));
        }

        let mut last = f64::INFINITY;
        let mut last_frr = 0.0;
        for step in 0..=40 {
            let t = -2.5 + step as f64 * 0.125;
            let r = error_rates(&results, t);
            assert!(r.far <= last, "FAR rose at {t}");
            assert!(r.frr >= last_frr, "FRR fell at {t}");
            last = r.far;
            last_frr = r.frr;
        }
        assert_eq!(last, 0.0);
    }
}
