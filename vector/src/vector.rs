use std::fmt;

use crate::VectorError;

/// A variable-size vector of feature values.
#[derive(Clone, Default, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Creates a zero-filled vector with `size` dimensions.
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
        }
    }

    /// Computes the mean of a non-empty set of equally sized frames.
    ///
    /// Returns `None` for an empty set.
    pub fn mean_of<'a, I>(frames: I) -> Result<Option<Self>, VectorError>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let mut iter = frames.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut sum = first.clone();
        let mut count = 1usize;
        for frame in iter {
            sum.add(frame)?;
            count += 1;
        }
        sum.scale(1.0 / count as f64);
        Ok(Some(sum))
    }

    /// Returns the number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the vector has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resizes the vector, keeping the existing prefix and filling new
    /// slots with `value`.
    pub fn resize(&mut self, size: usize, value: f64) {
        self.values.resize(size, value);
    }

    /// Appends a value, growing the vector by one dimension.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Returns the value at `index`.
    pub fn get(&self, index: usize) -> Result<f64, VectorError> {
        self.values
            .get(index)
            .copied()
            .ok_or(VectorError::OutOfRange {
                index,
                len: self.values.len(),
            })
    }

    /// Overwrites the value at `index`.
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), VectorError> {
        let len = self.values.len();
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VectorError::OutOfRange { index, len }),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Assigns `value` to every dimension.
    pub fn fill(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    /// Multiplies every dimension by `value`.
    pub fn scale(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v *= value);
    }

    /// Adds `value` to every dimension.
    pub fn offset(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v += value);
    }

    /// Copies all values from `other`. Sizes must match.
    pub fn copy_from(&mut self, other: &FeatureVector) -> Result<(), VectorError> {
        self.check(other)?;
        self.values.copy_from_slice(&other.values);
        Ok(())
    }

    /// Element-wise addition.
    pub fn add(&mut self, other: &FeatureVector) -> Result<(), VectorError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise subtraction.
    pub fn subtract(&mut self, other: &FeatureVector) -> Result<(), VectorError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise multiplication.
    pub fn multiply(&mut self, other: &FeatureVector) -> Result<(), VectorError> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise division.
    pub fn divide(&mut self, other: &FeatureVector) -> Result<(), VectorError> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// No square root is taken; the result is only used for comparisons
    /// and averaged distortion.
    pub fn distance(&self, other: &FeatureVector) -> Result<f64, VectorError> {
        self.check(other)?;
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum())
    }

    fn zip_with(
        &mut self,
        other: &FeatureVector,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<(), VectorError> {
        self.check(other)?;
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a = op(*a, *b);
        }
        Ok(())
    }

    fn check(&self, other: &FeatureVector) -> Result<(), VectorError> {
        if self.values.len() != other.values.len() {
            return Err(VectorError::DimensionMismatch {
                expected: self.values.len(),
                got: other.values.len(),
            });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl From<&[f64]> for FeatureVector {
    fn from(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }
}

impl FromIterator<f64> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}
