//! Index mappings between reduced and full degree-of-freedom spaces.
//!
//! A problem is often posed over fewer degrees of freedom than the underlying
//! model exposes: a symmetric motion drives the left and right side with one
//! variable, a locked joint is forced to zero. An [`IndexMapping`] describes
//! how to build a target vector out of a source vector, entry by entry:
//!
//! ```text
//! source (reduced)      target (full)
//!   r0 ──────────────►  q0 =  r0
//!   r1 ──────────────►  q1 =  r1
//!   r2 ───────┬──────►  q2 =  r2
//!             └──────►  q3 = -r2     (mirrored)
//! ```
//!
//! A [`BidirectionalMapping`] pairs the `reduce` direction (full → reduced,
//! used to pick the optimized variables out of the model's native set) with
//! the `expand` direction (reduced → full, used to feed the model).
//!
//! # Example
//!
//! ```
//! use optim_types::{BidirectionalMapping, IndexMapping};
//!
//! // Reduced index 2 drives native indices 2 and 3, the latter mirrored.
//! let expand = IndexMapping::with_opposed(&[0, 1, 2, 2], &[3]).unwrap();
//! let reduce = IndexMapping::from_indices([0, 1, 2]);
//! let mapping = BidirectionalMapping::new(reduce, expand, 4).unwrap();
//!
//! let full = mapping.expand.map(&[1.0, 2.0, 3.0]).unwrap();
//! assert_eq!(full, vec![1.0, 2.0, 3.0, -3.0]);
//! ```

use std::ops::{Add, Neg};

use num_traits::Zero;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Sign applied to a mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sign {
    /// Value copied as-is.
    #[default]
    Positive,
    /// Value negated.
    Negative,
}

impl Sign {
    /// Apply the sign to a value.
    pub fn apply<T: Neg<Output = T>>(self, value: T) -> T {
        match self {
            Self::Positive => value,
            Self::Negative => -value,
        }
    }

    /// The sign as a float factor.
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// One entry of an index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MapEntry {
    /// Copy the source value at this index.
    Direct(usize),
    /// Copy the source value at this index with a sign applied.
    Mirrored(usize, Sign),
    /// Force the target value to zero.
    Zero,
}

impl MapEntry {
    /// Source index referenced by the entry, if any.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Direct(i) | Self::Mirrored(i, _) => Some(i),
            Self::Zero => None,
        }
    }

    /// Sign applied by the entry. `Zero` reports positive.
    #[must_use]
    pub const fn sign(self) -> Sign {
        match self {
            Self::Mirrored(_, sign) => sign,
            Self::Direct(_) | Self::Zero => Sign::Positive,
        }
    }
}

/// Ordered list of source-to-target correspondences.
///
/// Applying the mapping to a source vector produces one value per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexMapping {
    entries: Vec<MapEntry>,
}

impl IndexMapping {
    /// Create a mapping from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<MapEntry>) -> Self {
        Self { entries }
    }

    /// Identity mapping over `0..n`.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self::from_indices(0..n)
    }

    /// Mapping made of direct entries only.
    #[must_use]
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            entries: indices.into_iter().map(MapEntry::Direct).collect(),
        }
    }

    /// Mapping made of direct entries where the entries at the positions
    /// listed in `oppose` are negated.
    ///
    /// `oppose` refers to positions in `indices`, not to the index values.
    pub fn with_opposed(indices: &[usize], oppose: &[usize]) -> Result<Self> {
        let mut entries: Vec<MapEntry> = indices.iter().copied().map(MapEntry::Direct).collect();
        for &pos in oppose {
            let entry = entries
                .get_mut(pos)
                .ok_or_else(|| TypesError::out_of_range(pos, indices.len()))?;
            if let MapEntry::Direct(i) = *entry {
                *entry = MapEntry::Mirrored(i, Sign::Negative);
            }
        }
        Ok(Self { entries })
    }

    /// Number of entries, i.e. the length of a mapped vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The mapping entries.
    #[must_use]
    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    /// Source index referenced by each entry (`None` for zero entries).
    pub fn map_idx(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.entries.iter().map(|e| e.index())
    }

    /// Source indices referenced by the mapping, skipping zero entries.
    pub fn source_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().filter_map(|e| e.index())
    }

    /// Check that every entry points inside a source of length `source_len`.
    pub fn validate(&self, source_len: usize) -> Result<()> {
        match self.source_indices().find(|&i| i >= source_len) {
            Some(index) => Err(TypesError::out_of_range(index, source_len)),
            None => Ok(()),
        }
    }

    /// Check if this mapping is the identity over `0..n`.
    #[must_use]
    pub fn is_identity(&self, n: usize) -> bool {
        self.entries.len() == n
            && self
                .entries
                .iter()
                .enumerate()
                .all(|(k, e)| *e == MapEntry::Direct(k))
    }

    /// Build the target vector from `source`.
    pub fn map<T>(&self, source: &[T]) -> Result<Vec<T>>
    where
        T: Clone + Neg<Output = T> + Zero,
    {
        self.entries
            .iter()
            .map(|entry| match *entry {
                MapEntry::Zero => Ok(T::zero()),
                MapEntry::Direct(i) | MapEntry::Mirrored(i, _) => source
                    .get(i)
                    .cloned()
                    .map(|v| entry.sign().apply(v))
                    .ok_or_else(|| TypesError::out_of_range(i, source.len())),
            })
            .collect()
    }

    /// Transpose of [`map`](Self::map): scatter `mapped` back into a source
    /// of length `source_len`, summing (with sign) every entry that points at
    /// the same source index.
    pub fn accumulate<T>(&self, mapped: &[T], source_len: usize) -> Result<Vec<T>>
    where
        T: Clone + Neg<Output = T> + Zero + Add<Output = T>,
    {
        if mapped.len() != self.entries.len() {
            return Err(TypesError::length_mismatch(
                "accumulate",
                self.entries.len(),
                mapped.len(),
            ));
        }
        let mut source = vec![T::zero(); source_len];
        for (entry, value) in self.entries.iter().zip(mapped) {
            let Some(i) = entry.index() else { continue };
            let slot = source
                .get_mut(i)
                .ok_or_else(|| TypesError::out_of_range(i, source_len))?;
            *slot = slot.clone() + entry.sign().apply(value.clone());
        }
        Ok(source)
    }
}

/// A `reduce` mapping (full → reduced) paired with its `expand` inverse
/// (reduced → full).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BidirectionalMapping {
    /// Picks the reduced variables out of a full vector.
    pub reduce: IndexMapping,
    /// Rebuilds a full vector from the reduced variables.
    pub expand: IndexMapping,
}

impl BidirectionalMapping {
    /// Create a mapping over a full space of size `n_full`.
    ///
    /// Fails if an index is out of range, if `expand` does not produce a
    /// full-length vector, or if `reduce(expand(r)) != r`.
    pub fn new(reduce: IndexMapping, expand: IndexMapping, n_full: usize) -> Result<Self> {
        let mapping = Self { reduce, expand };
        mapping.validate(n_full)?;
        Ok(mapping)
    }

    /// Identity mapping over `0..n`.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self {
            reduce: IndexMapping::identity(n),
            expand: IndexMapping::identity(n),
        }
    }

    /// Size of the reduced space.
    #[must_use]
    pub fn reduced_len(&self) -> usize {
        self.reduce.len()
    }

    /// Size of the full space.
    #[must_use]
    pub fn full_len(&self) -> usize {
        self.expand.len()
    }

    /// Validate the mapping against a full space of size `n_full`.
    pub fn validate(&self, n_full: usize) -> Result<()> {
        if self.expand.len() != n_full {
            return Err(TypesError::length_mismatch(
                "expand mapping",
                n_full,
                self.expand.len(),
            ));
        }
        self.reduce.validate(n_full)?;
        self.expand.validate(self.reduce.len())?;

        for (reduced, entry) in self.reduce.entries().iter().enumerate() {
            let Some(full) = entry.index() else {
                return Err(TypesError::InconsistentInverse { reduced, full: n_full });
            };
            if entry.sign() != Sign::Positive || self.expand.entries()[full] != MapEntry::Direct(reduced)
            {
                return Err(TypesError::InconsistentInverse { reduced, full });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn symmetric() -> BidirectionalMapping {
        let expand = IndexMapping::with_opposed(&[0, 1, 2, 2], &[3]).unwrap();
        let reduce = IndexMapping::from_indices([0, 1, 2]);
        BidirectionalMapping::new(reduce, expand, 4).unwrap()
    }

    #[test]
    fn test_identity_round_trip() {
        let mapping = BidirectionalMapping::identity(5);
        let v = vec![0.5, -1.0, 2.0, 3.25, 0.0];

        let reduced = mapping.reduce.map(&v).unwrap();
        let expanded = mapping.expand.map(&reduced).unwrap();

        assert_eq!(expanded, v);
        assert_eq!(mapping.reduce.len(), 5);
        assert!(mapping.reduce.is_identity(5));
    }

    #[test]
    fn test_symmetric_expand() {
        let mapping = symmetric();
        let full = mapping.expand.map(&[0.1, 0.2, 0.7]).unwrap();

        assert_eq!(full.len(), 4);
        assert_relative_eq!(full[2], 0.7);
        assert_relative_eq!(full[3], -0.7);
        assert_eq!(mapping.reduced_len(), 3);
        assert_eq!(mapping.full_len(), 4);
    }

    #[test]
    fn test_expand_then_reduce() {
        let mapping = symmetric();
        let r = vec![1.0, -2.0, 4.0];
        let back = mapping
            .reduce
            .map(&mapping.expand.map(&r).unwrap())
            .unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_accumulate_collapses_with_sign() {
        let mapping = symmetric();
        // Generalized forces on the full model summed back onto the reduced dof.
        let full_forces = [1.0, 2.0, 3.0, 5.0];
        let reduced = mapping.expand.accumulate(&full_forces, 3).unwrap();
        assert_eq!(reduced, vec![1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_zero_entry() {
        let mapping = IndexMapping::new(vec![MapEntry::Direct(1), MapEntry::Zero]);
        let out = mapping.map(&[3.0, 4.0]).unwrap();
        assert_eq!(out, vec![4.0, 0.0]);
        assert_eq!(mapping.source_indices().count(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let reduce = IndexMapping::from_indices([0, 5]);
        let expand = IndexMapping::from_indices([0, 1, 1]);
        let err = BidirectionalMapping::new(reduce, expand, 3).unwrap_err();
        assert_eq!(err, TypesError::out_of_range(5, 3));

        let err = IndexMapping::from_indices([2]).map(&[1.0]).unwrap_err();
        assert!(matches!(err, TypesError::IndexOutOfRange { index: 2, .. }));
    }

    #[test]
    fn test_expand_length_must_match_full() {
        let err = BidirectionalMapping::new(
            IndexMapping::identity(3),
            IndexMapping::identity(3),
            4,
        )
        .unwrap_err();
        assert!(matches!(err, TypesError::LengthMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn test_inconsistent_inverse_rejected() {
        // reduce picks full index 3, but full index 3 expands from a mirrored value.
        let expand = IndexMapping::with_opposed(&[0, 1, 2, 2], &[3]).unwrap();
        let reduce = IndexMapping::from_indices([0, 1, 3]);
        let err = BidirectionalMapping::new(reduce, expand, 4).unwrap_err();
        assert_eq!(err, TypesError::InconsistentInverse { reduced: 2, full: 3 });
    }

    #[test]
    fn test_opposed_position_out_of_range() {
        assert!(IndexMapping::with_opposed(&[0, 1], &[2]).is_err());
    }
}
