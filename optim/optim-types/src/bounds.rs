//! Box bounds on optimization variables.

use std::ops::Range;

use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Lower and upper bounds for a vector of variables.
///
/// Bounds are consumed as pre-built containers: the problem author fills
/// them, the configuration engine only slices them per block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    /// Lower bounds.
    pub min: DVector<f64>,
    /// Upper bounds.
    pub max: DVector<f64>,
}

impl Bounds {
    /// Create bounds from lower and upper vectors.
    pub fn new(min: impl Into<Vec<f64>>, max: impl Into<Vec<f64>>) -> Result<Self> {
        let min = DVector::from_vec(min.into());
        let max = DVector::from_vec(max.into());
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// The same interval for all `n` variables.
    #[must_use]
    pub fn uniform(n: usize, min: f64, max: f64) -> Self {
        Self {
            min: DVector::from_element(n, min),
            max: DVector::from_element(n, max),
        }
    }

    /// `n` unbounded variables.
    #[must_use]
    pub fn unbounded(n: usize) -> Self {
        Self::uniform(n, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Empty bounds.
    #[must_use]
    pub fn empty() -> Self {
        Self::unbounded(0)
    }

    /// Number of bounded variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.min.len()
    }

    /// Check if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Copy of the bounds for `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(TypesError::BoundsOutOfRange {
                start: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        let n = range.end - range.start;
        Ok(Self {
            min: self.min.rows(range.start, n).into_owned(),
            max: self.max.rows(range.start, n).into_owned(),
        })
    }

    /// Append another set of bounds after this one.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let min: Vec<f64> = self.min.iter().chain(other.min.iter()).copied().collect();
        let max: Vec<f64> = self.max.iter().chain(other.max.iter()).copied().collect();
        Self {
            min: DVector::from_vec(min),
            max: DVector::from_vec(max),
        }
    }

    /// Check if `value` satisfies every bound.
    #[must_use]
    pub fn contains(&self, value: &DVector<f64>) -> bool {
        value.len() == self.len()
            && value
                .iter()
                .zip(self.min.iter().zip(self.max.iter()))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    /// Validate lengths and ordering.
    pub fn validate(&self) -> Result<()> {
        if self.min.len() != self.max.len() {
            return Err(TypesError::length_mismatch(
                "bounds",
                self.min.len(),
                self.max.len(),
            ));
        }
        for (index, (&min, &max)) in self.min.iter().zip(self.max.iter()).enumerate() {
            if min > max {
                return Err(TypesError::InvertedBounds { index, min, max });
            }
        }
        Ok(())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}
