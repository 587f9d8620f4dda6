//! Problem-level optimization parameters.
//!
//! Parameters are decision variables shared by every node of every phase
//! (a segment mass, a spring stiffness). Each phase receives them as the
//! `p` input of its compiled functions.

use indexmap::IndexMap;
use optim_symbolic::SymVector;
use optim_types::Bounds;

use crate::error::{OcpError, Result};

/// One named parameter block.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    cx: SymVector,
    bounds: Option<Bounds>,
}

impl Parameter {
    /// Create a block of `size` fresh symbols named `name_0 ..`.
    #[must_use]
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        let cx = if size == 1 {
            SymVector::scalar(&name)
        } else {
            SymVector::sym(&name, size)
        };
        Self {
            name,
            cx,
            bounds: None,
        }
    }

    /// Attach bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbolic variables.
    #[must_use]
    pub fn cx(&self) -> &SymVector {
        &self.cx
    }

    /// Number of scalar variables.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cx.len()
    }

    /// Bounds, if any.
    #[must_use]
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }
}

/// Ordered set of parameters.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: IndexMap<String, Parameter>,
}

impl Parameters {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. Names must be unique.
    pub fn add(&mut self, parameter: Parameter) -> Result<()> {
        if self.entries.contains_key(parameter.name()) {
            return Err(OcpError::DuplicateBlock {
                block: parameter.name,
                ledger: "parameters",
            });
        }
        if let Some(bounds) = parameter.bounds() {
            bounds.validate()?;
            if bounds.len() != parameter.size() {
                return Err(OcpError::invalid_config(format!(
                    "parameter {} has {} variables but {} bounds",
                    parameter.name(),
                    parameter.size(),
                    bounds.len()
                )));
            }
        }
        self.entries.insert(parameter.name.clone(), parameter);
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, parameter: Parameter) -> Result<Self> {
        self.add(parameter)?;
        Ok(self)
    }

    /// Look up a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.entries.values()
    }

    /// All parameter variables concatenated in insertion order.
    #[must_use]
    pub fn symbolic(&self) -> SymVector {
        SymVector::vertcat(self.entries.values().map(Parameter::cx))
    }

    /// Total number of scalar variables.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.entries.values().map(Parameter::size).sum()
    }

    /// Bounds of every parameter concatenated; unbounded where none given.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.entries.values().fold(Bounds::empty(), |acc, p| {
            let b = p
                .bounds()
                .cloned()
                .unwrap_or_else(|| Bounds::unbounded(p.size()));
            acc.concat(&b)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenation_order() {
        let params = Parameters::new()
            .with(Parameter::new("mass", 1))
            .unwrap()
            .with(Parameter::new("stiffness", 2).with_bounds(Bounds::uniform(2, 0.0, 10.0)))
            .unwrap();

        assert_eq!(params.total_size(), 3);
        assert_eq!(
            params.symbolic().names(),
            vec!["mass", "stiffness_0", "stiffness_1"]
        );

        let bounds = params.bounds();
        assert_eq!(bounds.len(), 3);
        assert!(bounds.min[0].is_infinite());
        assert_eq!(bounds.max[2], 10.0);
    }

    #[test]
    fn test_duplicate_and_bad_bounds() {
        let mut params = Parameters::new();
        params.add(Parameter::new("mass", 1)).unwrap();
        assert!(matches!(
            params.add(Parameter::new("mass", 1)).unwrap_err(),
            OcpError::DuplicateBlock { .. }
        ));

        let err = params
            .add(Parameter::new("k", 2).with_bounds(Bounds::uniform(3, 0.0, 1.0)))
            .unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(params.len(), 1);
    }
}
