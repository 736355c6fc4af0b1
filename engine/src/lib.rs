//! Experiment engine for speaker recognizers.
//!
//! [`TestEngine`] runs cross-validated identification and verification
//! experiments against any [`voxid_recognizer::Recognizer`]. Each cycle
//! carves fresh train and test segments out of every speaker's frame
//! stream (see [`partition`]), retrains the recognizer and scores the test
//! segments. A cycle that fails is recorded in the report and the run moves
//! on.
//!
//! Reports carry per-cycle and overall statistics and are written as JSON
//! by [`save_report`].

mod engine;
mod error;
mod partition;
mod report;
mod source;
mod stats;

pub use engine::{RecognizeParams, TestEngine, VerifyParams};
pub use error::EngineError;
pub use partition::{partition, Partition, SegmentLayout};
pub use report::{
    load_report, recognition_id, save_report, verification_id, CycleOutcome, CycleStatus,
    RecognitionReport, Report, VerificationReport,
};
pub use source::{MemorySource, SampleSource, TextSampleSource};
pub use stats::{
    decide, equal_error_rate, error_rates, ErrorRates, IdentificationSummary,
    VerificationSummary,
};
