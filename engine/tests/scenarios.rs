use std::path::Path;
use std::sync::Arc;

use voxid_engine::{
    error_rates, partition, CycleStatus, EngineError, MemorySource, RecognizeParams,
    SampleSource, SegmentLayout, TestEngine, VerifyParams,
};
use voxid_model::{codebook_distance, AdaptationParams, Model, VqModel};
use voxid_recognizer::{
    Identification, RecognizerConfig, Recognizer, RecognizerError, ScoreNormalization,
    SpeakerKey, SpeechData, TrainingSet, Utterance, Verification, VqRecognizer,
};
use voxid_vector::FeatureVector;

/// `n` 2-D frames jittered around `center`.
fn frames(center: (f64, f64), n: usize, seed: u64) -> Utterance {
    let mut state = seed.wrapping_add(1);
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 33) as f64) / ((1u64 << 31) as f64) - 0.5
    };
    (0..n)
        .map(|_| FeatureVector::from(vec![center.0 + next(), center.1 + next()]))
        .collect()
}

fn source(centers: &[(f64, f64)], frames_per_speaker: usize) -> MemorySource {
    let mut src = MemorySource::new();
    for (i, &c) in centers.iter().enumerate() {
        src.push(
            format!("s{i:02}"),
            vec![frames(c, frames_per_speaker, i as u64 * 97)],
        );
    }
    src
}

fn config(order: usize) -> RecognizerConfig {
    RecognizerConfig {
        order,
        weighting_enabled: false,
        ..Default::default()
    }
}

fn enroll(rec: &mut dyn Recognizer, src: &MemorySource, start: usize, count: usize) {
    let data = src.load(Path::new("mem"), start, count).unwrap();
    rec.set_speaker_data(Arc::new(data));
}

#[test]
fn scenario_a_three_speakers_identified() {
    let src = source(&[(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)], 8);
    let mut rec = VqRecognizer::new(config(2));
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let params = RecognizeParams {
        segments: SegmentLayout {
            train_frames: 5,
            train_segments: 1,
            test_frames: 3,
            test_segments: 1,
        },
        cycles: 1,
    };
    let report = engine.recognize(Path::new("mem"), &mut rec, &params).unwrap();

    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].status, CycleStatus::Completed);
    assert_eq!(report.overall.total, 3);
    assert_eq!(report.overall.correct, 3);
    assert_eq!(report.overall.accuracy, 1.0);
    assert_eq!(report.id, "mem_rec_vq_o2_w0_none_5-1-3-1-1");
}

#[test]
fn scenario_b_adapted_codebooks_lie_between() {
    let line = |values: &[f64]| -> Utterance {
        values.iter().map(|&v| FeatureVector::from(vec![v])).collect()
    };
    let mut speakers = SpeechData::new();
    speakers.insert("s".into(), line(&[7.8, 7.9, 8.0, 8.1, 8.2]));
    let mut background = SpeechData::new();
    background.insert("b1".into(), line(&[-5.1, -5.0, -4.9]));
    background.insert("b2".into(), line(&[4.9, 5.0, 5.1]));

    let cfg = RecognizerConfig {
        background_model_enabled: true,
        adaptation_iterations: 2,
        relevance_factor: 12.0,
        ..config(2)
    };
    let mut rec = VqRecognizer::new(cfg.clone());
    rec.train(&TrainingSet::speakers(&speakers).with_background(&background))
        .unwrap();

    let adapted = &rec.speaker_models()[&SpeakerKey::from("s")];
    let ubm = rec.background_model().unwrap();
    let mut own = VqModel::new(cfg.vq());
    own.train(&speakers.frames(&"s".into())).unwrap();

    let adapted_to_ubm = codebook_distance(adapted, ubm).unwrap();
    assert!(adapted_to_ubm > 0.0);
    assert!(adapted_to_ubm < codebook_distance(&own, ubm).unwrap());
    assert!(codebook_distance(adapted, &own).unwrap() < codebook_distance(ubm, &own).unwrap());
}

fn verify_params(cycles: usize) -> VerifyParams {
    VerifyParams {
        segments: SegmentLayout {
            train_frames: 10,
            train_segments: 2,
            test_frames: 4,
            test_segments: 2,
        },
        cycles,
        incorrect_claimed: 5,
        correct_claimed: 1,
        impostor_start: 3,
        impostor_count: 4,
    }
}

fn verification_source() -> MemorySource {
    source(
        &[
            (0.0, 0.0),
            (10.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (-10.0, 0.0),
            (0.0, -10.0),
            (-10.0, -10.0),
        ],
        40,
    )
}

#[test]
fn scenario_c_trial_counts() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(config(4));
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let report = engine
        .verify(Path::new("mem"), &mut rec, &verify_params(5))
        .unwrap();

    let s = 3;
    assert_eq!(report.cycles.len(), 5);
    assert!(report.cycles.iter().all(|c| c.status == CycleStatus::Completed));
    assert_eq!(report.overall.genuine, 5 * s);
    assert_eq!(report.overall.impostor, 5 * 5 * s);
    assert_eq!(report.overall.trials(), 30 * s);
    for c in &report.cycles {
        assert_eq!(c.results.len(), 6 * s);
        assert!(c.results.iter().all(|r| r.accepted.is_some()));
    }
    assert_eq!(report.cohort, vec!["s03", "s04"]);
    assert_eq!(report.claimants, vec!["s05", "s06"]);
}

#[test]
fn verification_far_falls_with_threshold() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(config(4));
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let report = engine
        .verify(Path::new("mem"), &mut rec, &verify_params(3))
        .unwrap();
    let results: Vec<_> = report
        .cycles
        .iter()
        .flat_map(|c| c.results.iter().cloned())
        .collect();

    let mut scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    scores.sort_by(f64::total_cmp);
    let mut last = f64::INFINITY;
    for t in scores {
        let far = error_rates(&results, t).far;
        assert!(far <= last);
        last = far;
    }
    assert!(report.overall.eer.is_some());
}

#[test]
fn normalized_verification_runs_with_cohort() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(RecognizerConfig {
        score_normalization: ScoreNormalization::Zero,
        ..config(4)
    });
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let report = engine
        .verify(Path::new("mem"), &mut rec, &verify_params(2))
        .unwrap();
    assert!(report.cycles.iter().all(|c| c.status == CycleStatus::Completed));
    assert_eq!(report.overall.genuine, 2 * 3);
}

#[test]
fn default_threshold_accepts_genuine_claims() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(config(4));
    enroll(&mut rec, &src, 0, 3);
    assert_eq!(rec.config().decision_threshold, None);

    let engine = TestEngine::new(Box::new(src));
    let report = engine
        .verify(Path::new("mem"), &mut rec, &verify_params(3))
        .unwrap();

    // Raw scores are negated distortions, so every score is below zero.
    assert!(report.decision_threshold < 0.0);
    let eer = report.overall.eer.unwrap();
    assert_eq!(eer.far, 0.0);
    assert_eq!(report.decision_threshold, eer.threshold);
    assert_eq!(report.overall.false_rejects, 0);
    assert_eq!(report.overall.false_accepts, 0);
    for c in &report.cycles {
        let s = c.summary.as_ref().unwrap();
        assert_eq!(s.frr, 0.0);
        assert_eq!(s.far, 0.0);
    }
}

#[test]
fn fixed_threshold_is_applied_as_configured() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(RecognizerConfig {
        decision_threshold: Some(0.0),
        ..config(4)
    });
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let report = engine
        .verify(Path::new("mem"), &mut rec, &verify_params(2))
        .unwrap();
    assert_eq!(report.decision_threshold, 0.0);
    assert_eq!(report.overall.frr, 1.0);
    assert_eq!(report.overall.far, 0.0);
}

#[test]
fn background_adaptation_and_zero_test_norm_through_engine() {
    let src = source(
        &[
            (0.0, 0.0),
            (10.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (-10.0, 0.0),
            (0.0, -10.0),
            (-10.0, -10.0),
            (5.0, 5.0),
            (-5.0, 5.0),
        ],
        40,
    );
    let cfg = RecognizerConfig {
        weighting_enabled: true,
        score_normalization: ScoreNormalization::ZeroTest,
        background_model_enabled: true,
        adaptation_iterations: 2,
        relevance_factor: 4.0,
        ..config(4)
    };
    let mut rec = VqRecognizer::new(cfg.clone());
    enroll(&mut rec, &src, 0, 3);
    let background = src.load(Path::new("mem"), 7, 2).unwrap();
    rec.set_background_data(Arc::new(background));

    let engine = TestEngine::new(Box::new(src.clone()));
    let params = verify_params(3);
    let report = engine.verify(Path::new("mem"), &mut rec, &params).unwrap();

    assert!(report.cycles.iter().all(|c| c.status == CycleStatus::Completed));
    assert_eq!(report.overall.genuine, 3 * 3);
    assert_eq!(report.overall.impostor, 3 * 5 * 3);
    assert!(report.overall.eer.is_some());
    assert_eq!(rec.impostor_models().len(), 2);

    // The recognizer holds the models of the last cycle.
    let speakers = rec.speaker_data().unwrap();
    let last = partition(&speakers, &params.segments, params.cycles - 1).unwrap();
    let ubm = rec.background_model().unwrap();
    let adaptation = AdaptationParams {
        iterations: 2,
        relevance_factor: 4.0,
    };
    for key in speakers.speakers() {
        let mut expected = VqModel::new(cfg.vq());
        expected
            .adapt(ubm, &last.train.frames(key), &adaptation)
            .unwrap();
        assert_eq!(rec.speaker_models()[key].codebook(), expected.codebook(), "{key}");
    }
}

#[test]
fn identification_rejects_score_normalization() {
    let src = source(&[(0.0, 0.0), (20.0, 0.0)], 16);
    let mut rec = Flaky {
        inner: VqRecognizer::new(RecognizerConfig {
            score_normalization: ScoreNormalization::Test,
            ..config(2)
        }),
        trains: 0,
        fail_on: usize::MAX,
    };
    enroll(&mut rec, &src, 0, 2);

    let engine = TestEngine::new(Box::new(src));
    let params = RecognizeParams {
        segments: SegmentLayout {
            train_frames: 5,
            train_segments: 2,
            test_frames: 3,
            test_segments: 1,
        },
        cycles: 2,
    };
    let err = engine
        .recognize(Path::new("mem"), &mut rec, &params)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    assert_eq!(rec.trains, 0);
}

#[test]
fn impostor_pool_failure_fails_the_call() {
    let src = verification_source();
    let mut rec = VqRecognizer::new(config(4));
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let params = VerifyParams {
        impostor_start: 5,
        impostor_count: 10,
        ..verify_params(1)
    };
    assert!(engine.verify(Path::new("mem"), &mut rec, &params).is_err());
}

#[test]
fn short_speakers_fail_each_cycle_without_aborting() {
    let src = source(&[(0.0, 0.0), (20.0, 0.0)], 6);
    let mut rec = VqRecognizer::new(config(2));
    enroll(&mut rec, &src, 0, 2);

    let engine = TestEngine::new(Box::new(src));
    let params = RecognizeParams {
        segments: SegmentLayout {
            train_frames: 5,
            train_segments: 1,
            test_frames: 3,
            test_segments: 1,
        },
        cycles: 2,
    };
    let report = engine.recognize(Path::new("mem"), &mut rec, &params).unwrap();
    assert_eq!(report.cycles.len(), 2);
    assert!(report
        .cycles
        .iter()
        .all(|c| matches!(c.status, CycleStatus::Failed { .. })));
    assert_eq!(report.overall.total, 0);
}

/// Fails training on one chosen cycle.
struct Flaky {
    inner: VqRecognizer,
    trains: usize,
    fail_on: usize,
}

impl Recognizer for Flaky {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn config(&self) -> &RecognizerConfig {
        self.inner.config()
    }

    fn reconfigure(&mut self, config: RecognizerConfig) {
        self.inner.reconfigure(config);
    }

    fn speaker_data(&self) -> Option<Arc<SpeechData>> {
        self.inner.speaker_data()
    }

    fn set_speaker_data(&mut self, data: Arc<SpeechData>) {
        self.inner.set_speaker_data(data);
    }

    fn background_data(&self) -> Option<Arc<SpeechData>> {
        self.inner.background_data()
    }

    fn set_background_data(&mut self, data: Arc<SpeechData>) {
        self.inner.set_background_data(data);
    }

    fn train(&mut self, set: &TrainingSet<'_>) -> Result<(), RecognizerError> {
        let call = self.trains;
        self.trains += 1;
        if call == self.fail_on {
            return Err(RecognizerError::InvalidConfiguration("injected".into()));
        }
        self.inner.train(set)
    }

    fn identify(&mut self, utterance: &[FeatureVector]) -> Result<Identification, RecognizerError> {
        self.inner.identify(utterance)
    }

    fn verify(
        &mut self,
        claimed: &SpeakerKey,
        utterance: &[FeatureVector],
    ) -> Result<Verification, RecognizerError> {
        self.inner.verify(claimed, utterance)
    }

    fn enrolled(&self) -> Vec<SpeakerKey> {
        self.inner.enrolled()
    }
}

#[test]
fn failed_cycle_is_recorded_and_run_continues() {
    let src = source(&[(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)], 16);
    let mut rec = Flaky {
        inner: VqRecognizer::new(config(2)),
        trains: 0,
        fail_on: 1,
    };
    enroll(&mut rec, &src, 0, 3);

    let engine = TestEngine::new(Box::new(src));
    let params = RecognizeParams {
        segments: SegmentLayout {
            train_frames: 5,
            train_segments: 2,
            test_frames: 3,
            test_segments: 1,
        },
        cycles: 3,
    };
    let report = engine.recognize(Path::new("mem"), &mut rec, &params).unwrap();

    assert_eq!(report.cycles[0].status, CycleStatus::Completed);
    assert_eq!(
        report.cycles[1].status,
        CycleStatus::Failed {
            error: "invalid configuration: injected".into()
        }
    );
    assert_eq!(report.cycles[2].status, CycleStatus::Completed);
    assert_eq!(report.overall.total, 2 * 3);
}

#[test]
fn repeated_runs_are_identical() {
    let src = verification_source();
    let engine = TestEngine::new(Box::new(src.clone()));
    let run = || {
        let mut rec = VqRecognizer::new(RecognizerConfig {
            weighting_enabled: true,
            seed: 11,
            ..config(4)
        });
        enroll(&mut rec, &src, 0, 3);
        engine
            .verify(Path::new("mem"), &mut rec, &verify_params(2))
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.cycles, b.cycles);
    assert_eq!(a.overall, b.overall);
}
