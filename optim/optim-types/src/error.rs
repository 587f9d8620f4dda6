//! Error types for mappings and bounds.

use thiserror::Error;

/// Errors raised while building or applying index mappings and bounds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    /// A mapping entry references an index outside the source space.
    #[error("mapping index {index} out of range (source length {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Length of the space the index points into.
        len: usize,
    },

    /// A vector or mapping does not have the length it was declared with.
    #[error("length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// What was being checked.
        context: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// `reduce` and `expand` are not inverses of each other.
    #[error("reduce entry {reduced} points at full index {full}, which does not expand back to it")]
    InconsistentInverse {
        /// Reduced index whose round trip failed.
        reduced: usize,
        /// Full index the reduce entry points at.
        full: usize,
    },

    /// A bounds slice falls outside the container.
    #[error("bounds slice {start}..{end} out of range (bounds length {len})")]
    BoundsOutOfRange {
        /// Slice start.
        start: usize,
        /// Slice end (exclusive).
        end: usize,
        /// Bounds length.
        len: usize,
    },

    /// Lower bound above upper bound.
    #[error("invalid bounds at {index}: min {min} > max {max}")]
    InvertedBounds {
        /// Entry index.
        index: usize,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

impl TypesError {
    /// Create an index out of range error.
    #[must_use]
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// Result type for mapping and bounds operations.
pub type Result<T> = std::result::Result<T, TypesError>;
