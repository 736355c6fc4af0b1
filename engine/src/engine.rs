use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use voxid_recognizer::{RecognitionResult, Recognizer, SpeakerKey, SpeechData, TrainingSet};

use crate::{
    decide, equal_error_rate, partition, recognition_id, verification_id, CycleOutcome,
    CycleStatus, EngineError, IdentificationSummary, RecognitionReport, SampleSource,
    SegmentLayout, VerificationReport, VerificationSummary,
};

/// Decision threshold of an uncalibrated run without both genuine and
/// impostor trials.
const FALLBACK_THRESHOLD: f64 = 0.0;

/// Parameters of an identification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizeParams {
    #[serde(flatten)]
    pub segments: SegmentLayout,
    pub cycles: usize,
}

/// Parameters of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyParams {
    #[serde(flatten)]
    pub segments: SegmentLayout,
    pub cycles: usize,
    /// Impostor claims per enrolled speaker and cycle.
    pub incorrect_claimed: usize,
    /// Genuine claims per enrolled speaker and cycle.
    pub correct_claimed: usize,
    /// First speaker of the impostor pool.
    #[serde(alias = "si")]
    pub impostor_start: usize,
    /// Size of the impostor pool.
    #[serde(alias = "gi")]
    pub impostor_count: usize,
}

/// Runs cross-validated experiments against a recognizer.
///
/// Enrolled speakers come from the recognizer's speaker data and the
/// background pool from its background data. The engine's own source only
/// supplies the impostor pool of verification runs.
pub struct TestEngine {
    source: Box<dyn SampleSource>,
}

impl TestEngine {
    pub fn new(source: Box<dyn SampleSource>) -> Self {
        Self { source }
    }

    /// Closed-set identification over `params.cycles` cycles.
    ///
    /// A failing cycle is recorded and skipped; only errors before the
    /// first cycle fail the call. Identification trains no impostor
    /// models, so score normalization must be off.
    pub fn recognize(
        &self,
        root: &Path,
        recognizer: &mut dyn Recognizer,
        params: &RecognizeParams,
    ) -> Result<RecognitionReport, EngineError> {
        let normalization = recognizer.config().score_normalization;
        if normalization.needs_cohort() {
            return Err(EngineError::InvalidConfiguration(format!(
                "identification does not support {normalization} score normalization"
            )));
        }
        let speakers = enrolled_data(recognizer)?;
        let background = recognizer.background_data();
        let id = recognition_id(root, recognizer.kind(), recognizer.config(), params);
        info!(id = %id, speakers = speakers.len(), cycles = params.cycles, "identification run");

        let mut cycles = Vec::with_capacity(params.cycles);
        let mut completed = Vec::new();
        for cycle in 0..params.cycles {
            debug!(cycle, "identification cycle");
            match recognize_cycle(recognizer, &speakers, background.as_deref(), params, cycle) {
                Ok(results) => {
                    let summary = IdentificationSummary::from_results(&results);
                    info!(cycle, total = summary.total, accuracy = summary.accuracy, "cycle done");
                    completed.extend(results.iter().cloned());
                    cycles.push(CycleOutcome {
                        cycle,
                        status: CycleStatus::Completed,
                        summary: Some(summary),
                        results,
                    });
                }
                Err(e) => {
                    warn!(cycle, error = %e, "cycle failed");
                    cycles.push(CycleOutcome::failed(cycle, e));
                }
            }
        }

        let overall = IdentificationSummary::from_results(&completed);
        info!(id = %id, accuracy = overall.accuracy, "identification run done");
        Ok(RecognitionReport {
            id,
            timestamp: Utc::now().to_rfc3339(),
            kind: recognizer.kind().to_string(),
            config: recognizer.config().clone(),
            params: *params,
            cycles,
            overall,
        })
    }

    /// Open-set verification over `params.cycles` cycles.
    ///
    /// The impostor pool `[impostor_start, impostor_start + impostor_count)`
    /// is loaded once and split by key order: the first, larger half trains
    /// the impostor models and forms the normalization cohort, the rest
    /// make impostor claims.
    pub fn verify(
        &self,
        root: &Path,
        recognizer: &mut dyn Recognizer,
        params: &VerifyParams,
    ) -> Result<VerificationReport, EngineError> {
        let speakers = enrolled_data(recognizer)?;
        let background = recognizer.background_data();

        let pool = if params.impostor_count == 0 {
            SpeechData::new()
        } else {
            self.source
                .load(root, params.impostor_start, params.impostor_count)?
        };
        if let Some(shared) = pool.speakers().find(|k| speakers.contains(k)) {
            return Err(EngineError::InvalidConfiguration(format!(
                "impostor pool contains enrolled speaker {shared}"
            )));
        }
        let (cohort, claimants) = split_pool(&pool);

        let id = verification_id(root, recognizer.kind(), recognizer.config(), params);
        info!(
            id = %id,
            speakers = speakers.len(),
            cohort = cohort.len(),
            claimants = claimants.len(),
            cycles = params.cycles,
            "verification run"
        );

        let ctx = VerifyContext {
            speakers: &speakers,
            background: background.as_deref(),
            cohort: &cohort,
            claimants: &claimants,
            params,
        };
        let mut runs = Vec::with_capacity(params.cycles);
        for cycle in 0..params.cycles {
            debug!(cycle, "verification cycle");
            let run = ctx.run_cycle(recognizer, cycle);
            if let Err(e) = &run {
                warn!(cycle, error = %e, "cycle failed");
            }
            runs.push(run);
        }

        // Without a fixed threshold, decide at the run's equal error rate.
        let decision_threshold = match recognizer.config().decision_threshold {
            Some(t) => t,
            None => {
                let scored: Vec<RecognitionResult> =
                    runs.iter().flatten().flatten().cloned().collect();
                let t = equal_error_rate(&scored).map_or(FALLBACK_THRESHOLD, |e| e.threshold);
                info!(threshold = t, "decision threshold calibrated");
                t
            }
        };

        let mut cycles = Vec::with_capacity(runs.len());
        let mut completed = Vec::new();
        for (cycle, run) in runs.into_iter().enumerate() {
            match run {
                Ok(mut results) => {
                    decide(&mut results, decision_threshold);
                    let summary = VerificationSummary::from_results(&results);
                    info!(
                        cycle,
                        trials = summary.trials(),
                        far = summary.far,
                        frr = summary.frr,
                        "cycle done"
                    );
                    completed.extend(results.iter().cloned());
                    cycles.push(CycleOutcome {
                        cycle,
                        status: CycleStatus::Completed,
                        summary: Some(summary),
                        results,
                    });
                }
                Err(e) => cycles.push(CycleOutcome::failed(cycle, e)),
            }
        }

        let overall = VerificationSummary::from_results(&completed);
        info!(id = %id, far = overall.far, frr = overall.frr, "verification run done");
        Ok(VerificationReport {
            id,
            timestamp: Utc::now().to_rfc3339(),
            kind: recognizer.kind().to_string(),
            config: recognizer.config().clone(),
            params: *params,
            cohort: cohort.speakers().map(|k| k.to_string()).collect(),
            claimants: claimants.speakers().map(|k| k.to_string()).collect(),
            decision_threshold,
            cycles,
            overall,
        })
    }
}

fn enrolled_data(recognizer: &dyn Recognizer) -> Result<Arc<SpeechData>, EngineError> {
    recognizer
        .speaker_data()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| EngineError::InvalidConfiguration("recognizer has no speaker data".into()))
}

/// First half (rounded up) and second half of the pool in key order.
fn split_pool(pool: &SpeechData) -> (SpeechData, SpeechData) {
    let keys: Vec<&SpeakerKey> = pool.speakers().collect();
    let mid = keys.len().div_ceil(2);
    (
        pool.subset(keys[..mid].iter().copied()),
        pool.subset(keys[mid..].iter().copied()),
    )
}

fn training_set<'a>(
    train: &'a SpeechData,
    background: Option<&'a SpeechData>,
    impostors: Option<&'a SpeechData>,
) -> TrainingSet<'a> {
    TrainingSet {
        speakers: train,
        background,
        impostors,
    }
}

fn recognize_cycle(
    recognizer: &mut dyn Recognizer,
    speakers: &SpeechData,
    background: Option<&SpeechData>,
    params: &RecognizeParams,
    cycle: usize,
) -> Result<Vec<RecognitionResult>, EngineError> {
    let part = partition(speakers, &params.segments, cycle)?;
    recognizer.train(&training_set(&part.train, background, None))?;
    Ok(recognizer.test(&part.test)?)
}

struct VerifyContext<'a> {
    speakers: &'a SpeechData,
    background: Option<&'a SpeechData>,
    cohort: &'a SpeechData,
    claimants: &'a SpeechData,
    params: &'a VerifyParams,
}

impl VerifyContext<'_> {
    fn run_cycle(
        &self,
        recognizer: &mut dyn Recognizer,
        cycle: usize,
    ) -> Result<Vec<RecognitionResult>, EngineError> {
        let params = self.params;
        if params.incorrect_claimed > 0 && self.claimants.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "impostor claims requested but the pool has no claimants".into(),
            ));
        }

        let part = partition(self.speakers, &params.segments, cycle)?;
        let claims = if params.incorrect_claimed > 0 {
            Some(partition(self.claimants, &params.segments, cycle)?)
        } else {
            None
        };
        let impostors = (!self.cohort.is_empty()).then_some(self.cohort);
        recognizer.train(&training_set(&part.train, self.background, impostors))?;

        let claimant_keys: Vec<&SpeakerKey> = claims
            .as_ref()
            .map(|c| c.test.speakers().collect())
            .unwrap_or_default();

        let mut results = Vec::with_capacity(
            part.test.len() * (params.correct_claimed + params.incorrect_claimed),
        );
        for (i, (speaker, own)) in part.test.iter().enumerate() {
            for j in 0..params.correct_claimed {
                let v = recognizer.verify(speaker, &own[j % own.len()])?;
                results.push(RecognitionResult::verified(speaker.clone(), v));
            }

            let Some(claims) = &claims else { continue };
            let n = claimant_keys.len();
            for j in 0..params.incorrect_claimed {
                let claimant = claimant_keys[(i + j) % n];
                let utts = claims.test.utterances(claimant);
                let v = recognizer.verify(speaker, &utts[(j / n) % utts.len()])?;
                results.push(RecognitionResult::verified(claimant.clone(), v));
            }
        }
        Ok(results)
    }
}
