use std::fmt;

use serde::{Deserialize, Serialize};
use voxid_model::{AdaptationParams, VqConfig};

use crate::RecognizerError;

/// Score normalization applied before a score is compared or reported.
///
/// - `zero`: per-speaker statistics over the impostor cohort utterances.
/// - `test`: per-utterance statistics over the impostor models.
/// - `zero_test`: Z-normalization first, then T-normalization over the
///   Z-normalized impostor scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    #[default]
    None,
    Zero,
    Test,
    ZeroTest,
}

impl ScoreNormalization {
    pub fn uses_zero(self) -> bool {
        matches!(self, Self::Zero | Self::ZeroTest)
    }

    pub fn uses_test(self) -> bool {
        matches!(self, Self::Test | Self::ZeroTest)
    }

    /// Whether an impostor population is required.
    pub fn needs_cohort(self) -> bool {
        self != Self::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zero => "zero",
            Self::Test => "test",
            Self::ZeroTest => "zero_test",
        }
    }
}

impl fmt::Display for ScoreNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Codebook size of every model.
    pub order: usize,

    /// Population-relative centroid weighting.
    pub weighting_enabled: bool,

    pub score_normalization: ScoreNormalization,

    /// Subtract the background model score from every speaker score.
    pub background_model_enabled: bool,

    /// Train the background model on the next `train` call. When off, the
    /// previously trained background model is reused.
    pub background_model_training_enabled: bool,

    /// Derive speaker models from the background model instead of training
    /// them from scratch. Zero disables adaptation.
    pub adaptation_iterations: usize,

    pub relevance_factor: f64,

    /// Verification accepts when the normalized score is at least this.
    /// Without a fixed threshold claims are left undecided and the test
    /// engine decides a run's trials at its equal error rate threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_threshold: Option<f64>,

    pub max_iterations: usize,
    pub perturbation: f64,
    pub seed: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            order: 64,
            weighting_enabled: true,
            score_normalization: ScoreNormalization::None,
            background_model_enabled: false,
            background_model_training_enabled: true,
            adaptation_iterations: 0,
            relevance_factor: 12.0,
            decision_threshold: None,
            max_iterations: 20,
            perturbation: 0.01,
            seed: 0,
        }
    }
}

impl RecognizerConfig {
    pub fn validate(&self) -> Result<(), RecognizerError> {
        if self.order == 0 {
            return Err(invalid("order must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        if !self.relevance_factor.is_finite() || self.relevance_factor < 0.0 {
            return Err(invalid("relevance_factor must be a non-negative number"));
        }
        if !self.perturbation.is_finite() || self.perturbation <= 0.0 {
            return Err(invalid("perturbation must be positive"));
        }
        if self.decision_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(invalid("decision_threshold must be finite"));
        }
        Ok(())
    }

    pub fn vq(&self) -> VqConfig {
        VqConfig {
            order: self.order,
            max_iterations: self.max_iterations,
            perturbation: self.perturbation,
            seed: self.seed,
        }
    }

    pub fn adaptation(&self) -> AdaptationParams {
        AdaptationParams {
            iterations: self.adaptation_iterations,
            relevance_factor: self.relevance_factor,
        }
    }

    /// Speaker models adapt from the background model.
    pub fn adapts(&self) -> bool {
        self.background_model_enabled && self.adaptation_iterations > 0
    }

    /// Changes that invalidate the background model.
    pub(crate) fn clustering_differs(&self, other: &Self) -> bool {
        self.order != other.order
            || self.max_iterations != other.max_iterations
            || self.perturbation != other.perturbation
            || self.seed != other.seed
            || self.background_model_enabled != other.background_model_enabled
    }

    /// Changes that invalidate trained speaker and impostor models.
    pub(crate) fn population_differs(&self, other: &Self) -> bool {
        self.clustering_differs(other)
            || self.adaptation_iterations != other.adaptation_iterations
            || self.relevance_factor != other.relevance_factor
    }

    /// Changes that only require re-preparation.
    pub(crate) fn preparation_differs(&self, other: &Self) -> bool {
        self.weighting_enabled != other.weighting_enabled
            || self.score_normalization != other.score_normalization
    }
}

fn invalid(msg: &str) -> RecognizerError {
    RecognizerError::InvalidConfiguration(msg.to_string())
}
