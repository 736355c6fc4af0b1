//! Trainable speaker models.
//!
//! [`Model`] is the capability set every model kind shares: train from
//! frames, adapt from a background model, score a frame sequence, and take
//! part in population-relative weighting. [`VqModel`] implements it with a
//! vector quantization codebook.
//!
//! # Training
//!
//! [`VqModel`] uses the Linde-Buzo-Gray algorithm: the codebook starts at
//! the global mean and is doubled by perturb-and-split rounds, each followed
//! by k-means refinement. Empty clusters are re-seeded internally. The split
//! perturbation comes from a seeded generator, so the same frames and seed
//! always give the same codebook.
//!
//! # Scoring
//!
//! Scores are "higher is better" for every model kind. For VQ the score is
//! the negated, weight-averaged distortion:
//!
//! ```text
//! score = -( Σ w(x)·d(x) / Σ w(x) )
//! d(x)  = squared distance from frame x to its nearest centroid
//! w(x)  = weight of that centroid (1 when unweighted)
//! ```

mod error;
mod lbg;
mod model;
mod rng;
mod vq;

pub use error::ModelError;
pub use model::{AdaptationParams, Model};
pub use vq::{codebook_distance, VqConfig, VqModel, NEUTRAL_WEIGHT};
