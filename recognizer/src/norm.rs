use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as 1.
const MIN_STD: f64 = 1e-12;

/// Mean and population standard deviation of a score sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub std: f64,
}

impl ScoreStats {
    /// Returns `None` for an empty sample.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: var.sqrt(),
        })
    }

    /// `(score - mean) / std`.
    pub fn apply(&self, score: f64) -> f64 {
        let std = if self.std < MIN_STD { 1.0 } else { self.std };
        (score - self.mean) / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_none() {
        assert!(ScoreStats::from_scores(&[]).is_none());
    }

    #[test]
    fn standardizes() {
        let s = ScoreStats::from_scores(&[1.0, 3.0]).unwrap();
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.std, 1.0);
        assert_eq!(s.apply(4.0), 2.0);
        assert_eq!(s.apply(2.0), 0.0);
    }

    #[test]
    fn constant_sample_only_shifts() {
        let s = ScoreStats::from_scores(&[-5.0, -5.0, -5.0]).unwrap();
        assert_eq!(s.std, 0.0);
        assert_eq!(s.apply(-3.0), 2.0);
    }
}
