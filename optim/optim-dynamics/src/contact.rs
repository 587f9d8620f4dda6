//! Problem-wide contact naming.
//!
//! Phases of the same problem may have different contact sets (a foot lifts
//! off, a heel strikes). Plots show one column per distinct contact name
//! across the whole problem, so each phase's contacts are routed to their
//! column in the merged list.

use optim_types::IndexMapping;

use crate::error::{OcpError, Result};

/// Merged list of all distinct contact names, first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactNameRegistry {
    names: Vec<String>,
    fixed: bool,
}

impl ContactNameRegistry {
    /// An empty registry that grows as phases register their contacts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry declared up front; registering an unknown name fails.
    #[must_use]
    pub fn fixed<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut registry = Self::new();
        for name in names {
            registry.push_if_new(name.into());
        }
        registry.fixed = true;
        registry
    }

    fn push_if_new(&mut self, name: String) {
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// Check if the registry rejects unknown names.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Append the names not seen yet, in order.
    pub fn register<S: AsRef<str>>(&mut self, phase: usize, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            if self.column_of(name).is_some() {
                continue;
            }
            if self.fixed {
                return Err(OcpError::contact_names(
                    phase,
                    format!("{name} is not a declared contact"),
                ));
            }
            self.names.push(name.to_string());
        }
        Ok(())
    }

    /// The merged names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of merged columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no contact has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Merged column of `name`.
    #[must_use]
    pub fn column_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Register `names` and pick their merged columns.
    ///
    /// Columns keep the merged list's order: a phase listing `["toe", "heel"]`
    /// against a merged `["heel", "toe"]` maps to `[0, 1]`.
    pub fn column_mapping<S: AsRef<str>>(
        &mut self,
        phase: usize,
        names: &[S],
    ) -> Result<IndexMapping> {
        self.register(phase, names)?;
        let columns: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, merged)| names.iter().any(|n| n.as_ref() == merged.as_str()))
            .map(|(column, _)| column)
            .collect();
        Ok(IndexMapping::from_indices(columns))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use optim_types::MapEntry;

    #[test]
    fn test_first_seen_order() {
        let mut registry = ContactNameRegistry::new();
        registry.register(0, &["heel", "toe"]).unwrap();
        registry.register(1, &["toe", "hand"]).unwrap();
        assert_eq!(registry.names(), &["heel", "toe", "hand"]);
    }

    #[test]
    fn test_column_mapping_across_phases() {
        let mut registry = ContactNameRegistry::new();
        let first = registry.column_mapping(0, &["heel", "toe"]).unwrap();
        let second = registry.column_mapping(1, &["toe"]).unwrap();

        assert!(first.is_identity(2));
        assert_eq!(second.entries(), &[MapEntry::Direct(1)]);
    }

    #[test]
    fn test_column_mapping_keeps_merged_order() {
        let mut registry = ContactNameRegistry::new();
        registry.column_mapping(0, &["heel", "toe"]).unwrap();
        let swapped = registry.column_mapping(1, &["toe", "heel"]).unwrap();

        assert_eq!(registry.names(), &["heel", "toe"]);
        assert!(swapped.is_identity(2));

        let partial = registry.column_mapping(2, &["hand", "heel"]).unwrap();
        assert_eq!(registry.names(), &["heel", "toe", "hand"]);
        assert_eq!(
            partial.entries(),
            &[MapEntry::Direct(0), MapEntry::Direct(2)]
        );
    }

    #[test]
    fn test_fixed_registry_rejects_unknown() {
        let mut registry = ContactNameRegistry::fixed(["heel", "toe"]);
        assert!(registry.is_fixed());
        registry.register(0, &["toe"]).unwrap();

        let err = registry.column_mapping(1, &["hand"]).unwrap_err();
        assert!(matches!(err, OcpError::ContactNames { phase: 1, .. }));
        assert_eq!(registry.len(), 2);
    }
}
