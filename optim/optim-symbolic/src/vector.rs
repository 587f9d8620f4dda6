//! Column vectors of scalar expressions.

use std::ops::{Index, Neg, Range};

use crate::error::{Result, SymbolicError};
use crate::expr::{Expr, Symbol};

/// An ordered column of scalar expressions.
///
/// This is the unit the configuration engine composes: state and control
/// vectors are concatenations of named blocks, function inputs are vectors of
/// bare symbols.
#[derive(Debug, Clone, Default)]
pub struct SymVector {
    elements: Vec<Expr>,
}

impl SymVector {
    /// An empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` fresh symbols named `name_0 .. name_{n-1}`.
    #[must_use]
    pub fn sym(name: &str, n: usize) -> Self {
        Self {
            elements: (0..n).map(|i| Expr::sym(format!("{name}_{i}"))).collect(),
        }
    }

    /// A single fresh symbol named exactly `name`.
    #[must_use]
    pub fn scalar(name: &str) -> Self {
        Self {
            elements: vec![Expr::sym(name)],
        }
    }

    /// One fresh symbol per name.
    #[must_use]
    pub fn named<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            elements: names.into_iter().map(Expr::sym).collect(),
        }
    }

    /// A vector of zeros.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self::constants(&vec![0.0; n])
    }

    /// A vector of constants.
    #[must_use]
    pub fn constants(values: &[f64]) -> Self {
        Self {
            elements: values.iter().copied().map(Expr::constant).collect(),
        }
    }

    /// Wrap existing expressions.
    #[must_use]
    pub fn from_exprs(elements: Vec<Expr>) -> Self {
        Self { elements }
    }

    /// Vertical concatenation.
    #[must_use]
    pub fn vertcat<'a>(parts: impl IntoIterator<Item = &'a SymVector>) -> Self {
        Self {
            elements: parts
                .into_iter()
                .flat_map(|p| p.elements.iter().cloned())
                .collect(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Expr> {
        self.elements.get(index)
    }

    /// Rows in `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        self.elements
            .get(range.clone())
            .map(|s| Self::from_exprs(s.to_vec()))
            .ok_or(SymbolicError::OutOfRange {
                index: range.end,
                len: self.len(),
            })
    }

    /// Append one expression.
    pub fn push(&mut self, e: Expr) {
        self.elements.push(e);
    }

    /// Append all rows of `other`.
    pub fn extend(&mut self, other: &Self) {
        self.elements.extend(other.elements.iter().cloned());
    }

    /// Iterate over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.elements.iter()
    }

    /// Rows as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Expr] {
        &self.elements
    }

    /// Consume into the underlying expressions.
    #[must_use]
    pub fn into_vec(self) -> Vec<Expr> {
        self.elements
    }

    /// Apply `f` to every row.
    #[must_use]
    pub fn map(&self, f: impl FnMut(&Expr) -> Expr) -> Self {
        Self {
            elements: self.elements.iter().map(f).collect(),
        }
    }

    /// Multiply every row by `factor`.
    #[must_use]
    pub fn scale(&self, factor: &Expr) -> Self {
        self.map(|e| e * factor)
    }

    /// Check if every row is a bare symbol.
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        self.elements.iter().all(Expr::is_symbol)
    }

    /// The symbols of a purely symbolic vector.
    #[must_use]
    pub fn symbols(&self) -> Option<Vec<Symbol>> {
        self.elements
            .iter()
            .map(|e| e.as_symbol().cloned())
            .collect()
    }

    /// Names of the rows that are bare symbols.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter_map(|e| e.as_symbol().map(|s| s.name().to_string()))
            .collect()
    }

    fn zip_with(&self, rhs: &Self, f: impl Fn(&Expr, &Expr) -> Expr) -> Result<Self> {
        if self.len() != rhs.len() {
            return Err(SymbolicError::OutOfRange {
                index: rhs.len(),
                len: self.len(),
            });
        }
        Ok(Self {
            elements: self
                .elements
                .iter()
                .zip(&rhs.elements)
                .map(|(a, b)| f(a, b))
                .collect(),
        })
    }

    /// Element-wise sum, failing on length mismatch.
    pub fn try_add(&self, rhs: &Self) -> Result<Self> {
        self.zip_with(rhs, |a, b| a + b)
    }

    /// Element-wise difference, failing on length mismatch.
    pub fn try_sub(&self, rhs: &Self) -> Result<Self> {
        self.zip_with(rhs, |a, b| a - b)
    }

    /// Element-wise product, failing on length mismatch.
    pub fn try_mul(&self, rhs: &Self) -> Result<Self> {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl Index<usize> for SymVector {
    type Output = Expr;

    fn index(&self, index: usize) -> &Expr {
        &self.elements[index]
    }
}

impl From<Vec<Expr>> for SymVector {
    fn from(elements: Vec<Expr>) -> Self {
        Self { elements }
    }
}

impl FromIterator<Expr> for SymVector {
    fn from_iter<I: IntoIterator<Item = Expr>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SymVector {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Neg for &SymVector {
    type Output = SymVector;

    fn neg(self) -> SymVector {
        self.map(|e| -e)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sym_and_names() {
        let q = SymVector::sym("q", 3);
        assert_eq!(q.len(), 3);
        assert!(q.is_symbolic());
        assert_eq!(q.names(), vec!["q_0", "q_1", "q_2"]);

        let named = SymVector::named(["Q_hip", "Q_knee"]);
        assert_eq!(named.names(), vec!["Q_hip", "Q_knee"]);
    }

    #[test]
    fn test_vertcat_and_slice() {
        let a = SymVector::sym("a", 2);
        let b = SymVector::sym("b", 3);
        let x = SymVector::vertcat([&a, &b]);
        assert_eq!(x.len(), 5);

        let tail = x.slice(2..5).unwrap();
        assert!(tail[0].ptr_eq(&b[0]));
        assert!(x.slice(3..6).is_err());
    }

    #[test]
    fn test_elementwise() {
        let a = SymVector::sym("a", 2);
        let z = SymVector::zeros(2);
        let s = a.try_add(&z).unwrap();
        assert!(s[1].ptr_eq(&a[1]));
        assert!(a.try_add(&SymVector::zeros(3)).is_err());
        assert!(!a.try_sub(&a).unwrap().is_symbolic());
        assert!((-&a)[0].as_symbol().is_none());
    }
}
