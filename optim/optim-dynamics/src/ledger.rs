//! Ordered block-size ledgers.

use std::ops::Range;

use indexmap::IndexMap;

use crate::error::{OcpError, Result};

/// Ordered record of the named blocks of a flat vector.
///
/// Insertion order is vector order, so the offset of a block is the sum of
/// the sizes recorded before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLedger {
    label: &'static str,
    blocks: IndexMap<String, usize>,
}

impl BlockLedger {
    /// Create an empty ledger. `label` names it in error messages.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            blocks: IndexMap::new(),
        }
    }

    /// Record a block and return its offset.
    pub fn insert(&mut self, key: impl Into<String>, size: usize) -> Result<usize> {
        let key = key.into();
        if self.blocks.contains_key(&key) {
            return Err(OcpError::DuplicateBlock {
                block: key,
                ledger: self.label,
            });
        }
        let offset = self.total();
        self.blocks.insert(key, size);
        Ok(offset)
    }

    /// Ledger label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Size of block `key`.
    #[must_use]
    pub fn size(&self, key: &str) -> Option<usize> {
        self.blocks.get(key).copied()
    }

    /// Offset of block `key`.
    #[must_use]
    pub fn offset(&self, key: &str) -> Option<usize> {
        let index = self.blocks.get_index_of(key)?;
        Some(self.blocks.values().take(index).sum())
    }

    /// Rows occupied by block `key`.
    #[must_use]
    pub fn range(&self, key: &str) -> Option<Range<usize>> {
        let offset = self.offset(key)?;
        let size = self.size(key)?;
        Some(offset..offset + size)
    }

    /// Sum of all block sizes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.blocks.values().sum()
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if no block has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check if block `key` has been recorded.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.blocks.contains_key(key)
    }

    /// Block keys, in vector order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.blocks.keys().map(String::as_str)
    }

    /// `(key, size)` pairs, in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.blocks.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `(key, range)` pairs, in vector order.
    pub fn ranges(&self) -> impl Iterator<Item = (&str, Range<usize>)> + '_ {
        let mut offset = 0;
        self.blocks.iter().map(move |(k, &size)| {
            let range = offset..offset + size;
            offset += size;
            (k.as_str(), range)
        })
    }
}
