//! Variable-size feature vectors for acoustic pattern models.
//!
//! A [`FeatureVector`] holds one frame of features (e.g. MFCC coefficients).
//! Binary operations require both operands to have the same size and fail
//! with [`VectorError::DimensionMismatch`] otherwise; nothing is ever
//! truncated or padded implicitly.
//!
//! ```
//! use voxid_vector::FeatureVector;
//!
//! let a = FeatureVector::from(vec![1.0, 2.0]);
//! let b = FeatureVector::from(vec![4.0, 6.0]);
//! assert_eq!(a.distance(&b).unwrap(), 25.0);
//! ```

mod error;
mod vector;

pub use error::VectorError;
pub use vector::FeatureVector;
