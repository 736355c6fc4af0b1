use serde::{Deserialize, Serialize};
use voxid_vector::FeatureVector;

use crate::ModelError;

/// Parameters of MAP-style adaptation from a background model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptationParams {
    /// Number of re-assignment passes (typically 1-3).
    pub iterations: usize,
    /// Controls how much speaker data a centroid needs before it moves
    /// away from the background centroid. Larger = more conservative.
    pub relevance_factor: f64,
}

impl Default for AdaptationParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            relevance_factor: 12.0,
        }
    }
}

/// A statistical speaker model trained from feature frames.
///
/// Scores follow one convention for every implementation: higher means a
/// better fit. Distortion-based models return the negated distortion.
///
/// Weighting is part of the capability set so that a recognizer can run its
/// preparation pass over any model kind. Kinds without weighting keep the
/// default no-op implementations.
pub trait Model: Send + Sync {
    /// Trains the model from scratch on the given frames.
    fn train(&mut self, samples: &[FeatureVector]) -> Result<(), ModelError>;

    /// Derives the model from a trained background model of the same kind,
    /// blended toward `samples`.
    fn adapt(
        &mut self,
        background: &Self,
        samples: &[FeatureVector],
        params: &AdaptationParams,
    ) -> Result<(), ModelError>;

    /// Scores a frame sequence against the model. Fails with
    /// [`ModelError::NotTrained`] before training.
    fn score(&self, samples: &[FeatureVector]) -> Result<f64, ModelError>;

    fn is_trained(&self) -> bool;

    /// Computes new weights for this model relative to `peers`, without
    /// applying them. `peers` must not contain the model itself.
    fn weights_against(&self, _peers: &[&Self]) -> Result<Option<Vec<f64>>, ModelError> {
        Ok(None)
    }

    /// Installs weights previously returned by [`Model::weights_against`].
    fn apply_weights(&mut self, _weights: Vec<f64>) -> Result<(), ModelError> {
        Ok(())
    }

    /// Re-weights the model against `peers` in one step. The recognizer
    /// splits this into [`Model::weights_against`] and
    /// [`Model::apply_weights`] so that the whole population is read before
    /// any model changes.
    fn weight(&mut self, peers: &[&Self]) -> Result<(), ModelError> {
        if let Some(weights) = self.weights_against(peers)? {
            self.apply_weights(weights)?;
        }
        Ok(())
    }

    /// Drops all weighting information.
    fn reset_weights(&mut self) {}
}
