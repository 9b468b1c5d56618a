use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum allowed deviation of a unit vector's L2 norm from 1.
pub const UNIT_TOLERANCE: f32 = 1e-4;

/// A fixed-length embedding vector.
///
/// Vectors produced by an embedding model are L2-normalized, so cosine
/// similarity between two of them reduces to their dot product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector(Vec<f32>);

impl Vector {
    /// Wrap raw values without validation.
    ///
    /// Used for values read back from a store and for hand-built corpora.
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Scale raw model output to unit length.
    ///
    /// # Errors
    /// Fails on an empty, non-finite, or all-zero input.
    pub fn normalize(mut values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidVector("empty vector".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidVector("non-finite component".to_string()));
        }
        let norm = l2_norm(&values);
        if norm == 0.0 {
            return Err(Error::InvalidVector("zero-length vector".to_string()));
        }
        for value in &mut values {
            *value /= norm;
        }
        Ok(Self(values))
    }

    /// Accept values that are already unit length.
    ///
    /// # Errors
    /// Fails if the norm deviates from 1 by more than [`UNIT_TOLERANCE`].
    pub fn from_unit(values: Vec<f32>) -> Result<Self> {
        let vector = Self(values);
        if vector.is_unit() {
            Ok(vector)
        } else {
            Err(Error::InvalidVector(format!(
                "expected unit norm, got {}",
                vector.norm()
            )))
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    #[must_use]
    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }

    /// Whether every component is finite and the norm is within tolerance of 1.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        !self.0.is_empty()
            && self.0.iter().all(|v| v.is_finite())
            && (self.norm() - 1.0).abs() < UNIT_TOLERANCE
    }

    /// Dot product. Callers check dimensions first; extra components of the
    /// longer vector are ignored.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}
