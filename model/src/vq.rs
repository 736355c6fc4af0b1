use std::fmt;

use serde::{Deserialize, Serialize};
use voxid_vector::{FeatureVector, VectorError};

use crate::lbg::{nearest, train_codebook, LbgOptions};
use crate::model::{AdaptationParams, Model};
use crate::ModelError;

/// Neutral centroid weight.
pub const NEUTRAL_WEIGHT: f64 = 1.0;

/// Keeps the inverse-distance sum finite when a peer shares a centroid.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Controls codebook training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VqConfig {
    /// Codebook size. Powers of two are typical (16, 64, 256).
    pub order: usize,

    /// Maximum k-means refinement passes per split round.
    pub max_iterations: usize,

    /// Split perturbation, relative to the per-dimension standard deviation.
    pub perturbation: f64,

    /// Seed of the split perturbation.
    pub seed: u64,
}

impl Default for VqConfig {
    fn default() -> Self {
        Self {
            order: 64,
            max_iterations: 20,
            perturbation: 0.01,
            seed: 0,
        }
    }
}

/// A vector quantization codebook with one weight per centroid.
///
/// The codebook and weight array always have the same length. Re-weighting
/// never reorders or resizes the codebook.
#[derive(Clone)]
pub struct VqModel {
    config: VqConfig,
    codebook: Vec<FeatureVector>,
    weights: Vec<f64>,
}

impl VqModel {
    pub fn new(config: VqConfig) -> Self {
        Self {
            config,
            codebook: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn codebook(&self) -> &[FeatureVector] {
        &self.codebook
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Feature dimension, or `None` before training.
    pub fn dimension(&self) -> Option<usize> {
        self.codebook.first().map(FeatureVector::len)
    }

    /// Weighted average of the per-frame minimum squared distance.
    ///
    /// Each frame contributes with the weight of its nearest centroid, so
    /// frames matched by strongly weighted centroids dominate the average.
    /// With neutral weights this is the plain mean distortion.
    pub fn distortion(&self, samples: &[FeatureVector]) -> Result<f64, ModelError> {
        if self.codebook.is_empty() {
            return Err(ModelError::NotTrained);
        }
        if samples.is_empty() {
            return Err(ModelError::NoSamples);
        }

        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for frame in samples {
            let (idx, d) = nearest(&self.codebook, frame)?;
            let w = self.weights[idx];
            total += w * d;
            weight_sum += w;
        }
        Ok(total / weight_sum)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.config.order == 0 {
            return Err(ModelError::InvalidConfiguration(
                "codebook order must be positive".into(),
            ));
        }
        Ok(())
    }

    fn check_dimension(&self, samples: &[FeatureVector]) -> Result<(), ModelError> {
        match self.dimension() {
            Some(dim) => uniform_dimension(samples, dim),
            None => Ok(()),
        }
    }
}

/// Fails unless every frame has `dim` values.
fn uniform_dimension(samples: &[FeatureVector], dim: usize) -> Result<(), ModelError> {
    for frame in samples {
        if frame.len() != dim {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                got: frame.len(),
            }
            .into());
        }
    }
    Ok(())
}

impl Model for VqModel {
    fn train(&mut self, samples: &[FeatureVector]) -> Result<(), ModelError> {
        self.validate()?;
        if samples.is_empty() {
            return Err(ModelError::NoSamples);
        }
        // Retraining may change the dimension, so only the new frames count.
        uniform_dimension(samples, samples[0].len())?;

        let opts = LbgOptions {
            order: self.config.order,
            max_iterations: self.config.max_iterations,
            perturbation: self.config.perturbation,
            seed: self.config.seed,
        };
        let codebook = train_codebook(samples, &opts)?;
        self.weights = vec![NEUTRAL_WEIGHT; codebook.len()];
        self.codebook = codebook;
        Ok(())
    }

    /// MAP-style adaptation: every background centroid moves toward the
    /// mean of the speaker frames it attracts, by `n / (n + relevance)`.
    fn adapt(
        &mut self,
        background: &Self,
        samples: &[FeatureVector],
        params: &AdaptationParams,
    ) -> Result<(), ModelError> {
        if background.codebook.is_empty() {
            return Err(ModelError::NotTrained);
        }
        if samples.is_empty() {
            return Err(ModelError::NoSamples);
        }
        if !params.relevance_factor.is_finite() || params.relevance_factor < 0.0 {
            return Err(ModelError::InvalidConfiguration(format!(
                "relevance factor must be finite and non-negative, got {}",
                params.relevance_factor
            )));
        }
        background.check_dimension(samples)?;

        let prior = &background.codebook;
        let mut codebook = prior.clone();
        let dim = prior[0].len();

        for _ in 0..params.iterations {
            let mut sums = vec![FeatureVector::new(dim); codebook.len()];
            let mut counts = vec![0usize; codebook.len()];
            for frame in samples {
                let (idx, _) = nearest(&codebook, frame)?;
                sums[idx].add(frame)?;
                counts[idx] += 1;
            }

            for (k, (mut mean, &n)) in sums.into_iter().zip(counts.iter()).enumerate() {
                if n == 0 {
                    codebook[k] = prior[k].clone();
                    continue;
                }
                let n = n as f64;
                let alpha = n / (n + params.relevance_factor);
                mean.scale(alpha / n);
                let mut blended = prior[k].clone();
                blended.scale(1.0 - alpha);
                blended.add(&mean)?;
                codebook[k] = blended;
            }
        }

        self.weights = vec![NEUTRAL_WEIGHT; codebook.len()];
        self.codebook = codebook;
        Ok(())
    }

    fn score(&self, samples: &[FeatureVector]) -> Result<f64, ModelError> {
        Ok(-self.distortion(samples)?)
    }

    fn is_trained(&self) -> bool {
        !self.codebook.is_empty()
    }

    /// Speaker-discriminative weights.
    ///
    /// For centroid `c` the raw weight is `1 / Σ_p 1 / (d_p(c) + ε)`, where
    /// `d_p(c)` is the squared distance from `c` to the nearest centroid of
    /// peer `p`. Centroids lying close to any peer get small weights. The
    /// result is divided by its mean, so an average centroid keeps weight 1.
    /// Untrained peers are ignored; with no usable peer all weights are
    /// neutral.
    fn weights_against(&self, peers: &[&Self]) -> Result<Option<Vec<f64>>, ModelError> {
        if self.codebook.is_empty() {
            return Err(ModelError::NotTrained);
        }

        let mut weights = Vec::with_capacity(self.codebook.len());
        for centroid in &self.codebook {
            let mut inverse = 0.0;
            for peer in peers.iter().filter(|p| p.is_trained()) {
                let (_, d) = nearest(&peer.codebook, centroid)?;
                inverse += 1.0 / (d + WEIGHT_EPSILON);
            }
            weights.push(if inverse > 0.0 { 1.0 / inverse } else { NEUTRAL_WEIGHT });
        }

        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        if mean > 0.0 && mean.is_finite() {
            weights.iter_mut().for_each(|w| *w /= mean);
        }
        Ok(Some(weights))
    }

    fn apply_weights(&mut self, weights: Vec<f64>) -> Result<(), ModelError> {
        if self.codebook.is_empty() {
            return Err(ModelError::NotTrained);
        }
        if weights.len() != self.codebook.len() {
            return Err(VectorError::DimensionMismatch {
                expected: self.codebook.len(),
                got: weights.len(),
            }
            .into());
        }
        self.weights = weights;
        Ok(())
    }

    fn reset_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = NEUTRAL_WEIGHT);
    }
}

impl fmt::Debug for VqModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VqModel")
            .field("order", &self.config.order)
            .field("trained", &self.is_trained())
            .field("dimension", &self.dimension())
            .finish()
    }
}

/// Aggregate distance between two codebooks: the mean, over the centroids
/// of `a`, of the squared distance to the nearest centroid of `b`.
/// Not symmetric.
pub fn codebook_distance(a: &VqModel, b: &VqModel) -> Result<f64, ModelError> {
    if a.codebook.is_empty() || b.codebook.is_empty() {
        return Err(ModelError::NotTrained);
    }
    let mut total = 0.0;
    for centroid in &a.codebook {
        total += nearest(&b.codebook, centroid)?.1;
    }
    Ok(total / a.codebook.len() as f64)
}
