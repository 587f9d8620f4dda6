//! Scalar expression graph.
//!
//! Expressions are immutable, reference-counted DAG nodes. Building an
//! expression never mutates its operands, so sub-expressions are shared
//! freely between vectors, functions and phases.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use num_traits::{One, Zero};

use crate::error::{Result, SymbolicError};
use crate::function::Function;
use crate::vector::SymVector;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A named scalar symbol.
///
/// Two symbols with the same name are still distinct: identity is carried by
/// a process-unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u64,
    name: Arc<str>,
}

impl Symbol {
    /// Create a fresh symbol.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: next_id(),
            name: Arc::from(name.as_ref()),
        }
    }

    /// Unique id of the symbol.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `exp(x)`
    Exp,
    /// `tanh(x)`
    Tanh,
    /// `sqrt(x)`
    Sqrt,
}

impl UnaryOp {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Neg => -x,
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Exp => x.exp(),
            Self::Tanh => x.tanh(),
            Self::Sqrt => x.sqrt(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Exp => "exp",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
        }
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

/// A call of a compiled function, shared by every output element it feeds.
#[derive(Debug)]
pub(crate) struct CallSite {
    pub(crate) function: Function,
    pub(crate) args: Vec<SymVector>,
}

#[derive(Debug)]
pub(crate) enum Node {
    Constant(f64),
    Symbol(Symbol),
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
    Call {
        site: Arc<CallSite>,
        output: usize,
        index: usize,
    },
}

/// A scalar symbolic expression.
#[derive(Debug, Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    pub(crate) fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    pub(crate) fn key(&self) -> *const Node {
        Arc::as_ptr(&self.0)
    }

    pub(crate) fn call(site: Arc<CallSite>, output: usize, index: usize) -> Self {
        Self::from_node(Node::Call {
            site,
            output,
            index,
        })
    }

    /// A fresh named symbol.
    #[must_use]
    pub fn sym(name: impl AsRef<str>) -> Self {
        Self::from_node(Node::Symbol(Symbol::new(name)))
    }

    /// A numeric constant.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::from_node(Node::Constant(value))
    }

    /// The symbol, if this expression is a bare symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.node() {
            Node::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The value, if this expression is a constant.
    #[must_use]
    pub fn as_constant(&self) -> Option<f64> {
        match self.node() {
            Node::Constant(v) => Some(*v),
            _ => None,
        }
    }

    /// Check if this expression is a bare symbol.
    #[must_use]
    pub fn is_symbol(&self) -> bool {
        self.as_symbol().is_some()
    }

    /// Check if this expression is the same node as `other`.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Apply a unary operation, folding constants.
    #[must_use]
    pub fn unary(op: UnaryOp, x: &Self) -> Self {
        if let Some(v) = x.as_constant() {
            return Self::constant(op.apply(v));
        }
        if op == UnaryOp::Neg {
            if let Node::Unary(UnaryOp::Neg, inner) = x.node() {
                return inner.clone();
            }
        }
        Self::from_node(Node::Unary(op, x.clone()))
    }

    /// Apply a binary operation, folding constants and trivial identities.
    #[must_use]
    pub fn binary(op: BinaryOp, a: &Self, b: &Self) -> Self {
        match (op, a.as_constant(), b.as_constant()) {
            (_, Some(x), Some(y)) => return Self::constant(op.apply(x, y)),
            (BinaryOp::Add, Some(z), _) if z == 0.0 => return b.clone(),
            (BinaryOp::Add | BinaryOp::Sub, _, Some(z)) if z == 0.0 => return a.clone(),
            (BinaryOp::Sub, Some(z), _) if z == 0.0 => return -b,
            (BinaryOp::Mul, Some(z), _) | (BinaryOp::Mul, _, Some(z)) if z == 0.0 => {
                return Self::zero();
            }
            (BinaryOp::Mul, Some(o), _) if o == 1.0 => return b.clone(),
            (BinaryOp::Mul | BinaryOp::Div, _, Some(o)) if o == 1.0 => return a.clone(),
            _ => {}
        }
        Self::from_node(Node::Binary(op, a.clone(), b.clone()))
    }

    /// `sin(self)`
    #[must_use]
    pub fn sin(&self) -> Self {
        Self::unary(UnaryOp::Sin, self)
    }

    /// `cos(self)`
    #[must_use]
    pub fn cos(&self) -> Self {
        Self::unary(UnaryOp::Cos, self)
    }

    /// `exp(self)`
    #[must_use]
    pub fn exp(&self) -> Self {
        Self::unary(UnaryOp::Exp, self)
    }

    /// `tanh(self)`
    #[must_use]
    pub fn tanh(&self) -> Self {
        Self::unary(UnaryOp::Tanh, self)
    }

    /// `sqrt(self)`
    #[must_use]
    pub fn sqrt(&self) -> Self {
        Self::unary(UnaryOp::Sqrt, self)
    }

    /// Check if the graph below this expression contains function calls.
    #[must_use]
    pub fn has_calls(&self) -> bool {
        let mut seen = HashMap::new();
        self.has_calls_cached(&mut seen)
    }

    fn has_calls_cached(&self, seen: &mut HashMap<*const Node, bool>) -> bool {
        if let Some(&known) = seen.get(&self.key()) {
            return known;
        }
        let result = match self.node() {
            Node::Constant(_) | Node::Symbol(_) => false,
            Node::Unary(_, x) => x.has_calls_cached(seen),
            Node::Binary(_, a, b) => a.has_calls_cached(seen) || b.has_calls_cached(seen),
            Node::Call { .. } => true,
        };
        seen.insert(self.key(), result);
        result
    }

    /// Collect the free symbols of the expression into `out`, first-seen order.
    pub(crate) fn collect_symbols(
        &self,
        visited: &mut HashMap<*const Node, ()>,
        out: &mut Vec<Symbol>,
    ) {
        if visited.insert(self.key(), ()).is_some() {
            return;
        }
        match self.node() {
            Node::Constant(_) => {}
            Node::Symbol(s) => {
                if !out.contains(s) {
                    out.push(s.clone());
                }
            }
            Node::Unary(_, x) => x.collect_symbols(visited, out),
            Node::Binary(_, a, b) => {
                a.collect_symbols(visited, out);
                b.collect_symbols(visited, out);
            }
            Node::Call { site, .. } => {
                for arg in &site.args {
                    for e in arg.iter() {
                        e.collect_symbols(visited, out);
                    }
                }
            }
        }
    }

    /// Replace symbols by expressions.
    pub(crate) fn substitute(
        &self,
        map: &HashMap<u64, Expr>,
        cache: &mut HashMap<*const Node, Expr>,
    ) -> Self {
        if let Some(done) = cache.get(&self.key()) {
            return done.clone();
        }
        let result = match self.node() {
            Node::Constant(_) => self.clone(),
            Node::Symbol(s) => map.get(&s.id()).cloned().unwrap_or_else(|| self.clone()),
            Node::Unary(op, x) => {
                let nx = x.substitute(map, cache);
                if nx.ptr_eq(x) {
                    self.clone()
                } else {
                    Self::unary(*op, &nx)
                }
            }
            Node::Binary(op, a, b) => {
                let na = a.substitute(map, cache);
                let nb = b.substitute(map, cache);
                if na.ptr_eq(a) && nb.ptr_eq(b) {
                    self.clone()
                } else {
                    Self::binary(*op, &na, &nb)
                }
            }
            Node::Call {
                site,
                output,
                index,
            } => {
                let args = site
                    .args
                    .iter()
                    .map(|arg| arg.map(|e| e.substitute(map, cache)))
                    .collect();
                let new_site = Arc::new(CallSite {
                    function: site.function.clone(),
                    args,
                });
                Self::call(new_site, *output, *index)
            }
        };
        cache.insert(self.key(), result.clone());
        result
    }

    /// Evaluate numerically. Symbols are looked up by id in `env`.
    pub(crate) fn evaluate(
        &self,
        env: &HashMap<u64, f64>,
        cache: &mut HashMap<*const Node, f64>,
        calls: &mut HashMap<*const CallSite, Vec<Vec<f64>>>,
    ) -> Result<f64> {
        if let Some(&v) = cache.get(&self.key()) {
            return Ok(v);
        }
        let value = match self.node() {
            Node::Constant(v) => *v,
            Node::Symbol(s) => *env.get(&s.id()).ok_or_else(|| SymbolicError::FreeSymbol {
                function: String::from("<eval>"),
                name: s.name().to_string(),
            })?,
            Node::Unary(op, x) => op.apply(x.evaluate(env, cache, calls)?),
            Node::Binary(op, a, b) => {
                let va = a.evaluate(env, cache, calls)?;
                let vb = b.evaluate(env, cache, calls)?;
                op.apply(va, vb)
            }
            Node::Call {
                site,
                output,
                index,
            } => {
                let key = Arc::as_ptr(site);
                if !calls.contains_key(&key) {
                    let mut args = Vec::with_capacity(site.args.len());
                    for arg in &site.args {
                        let mut values = Vec::with_capacity(arg.len());
                        for e in arg.iter() {
                            values.push(e.evaluate(env, cache, calls)?);
                        }
                        args.push(nalgebra::DVector::from_vec(values));
                    }
                    let outputs = site.function.eval(&args)?;
                    calls.insert(key, outputs.iter().map(|o| o.as_slice().to_vec()).collect());
                }
                calls
                    .get(&key)
                    .and_then(|outs| outs.get(*output))
                    .and_then(|out| out.get(*index))
                    .copied()
                    .ok_or(SymbolicError::OutOfRange {
                        index: *index,
                        len: site.function.size_out(*output),
                    })?
            }
        };
        cache.insert(self.key(), value);
        Ok(value)
    }

    /// Replace every call node by the called function's outputs.
    pub(crate) fn inline(
        &self,
        cache: &mut HashMap<*const Node, Expr>,
        sites: &mut HashMap<*const CallSite, Vec<SymVector>>,
    ) -> Self {
        if let Some(done) = cache.get(&self.key()) {
            return done.clone();
        }
        let result = match self.node() {
            Node::Constant(_) | Node::Symbol(_) => self.clone(),
            Node::Unary(op, x) => {
                let nx = x.inline(cache, sites);
                if nx.ptr_eq(x) {
                    self.clone()
                } else {
                    Self::unary(*op, &nx)
                }
            }
            Node::Binary(op, a, b) => {
                let na = a.inline(cache, sites);
                let nb = b.inline(cache, sites);
                if na.ptr_eq(a) && nb.ptr_eq(b) {
                    self.clone()
                } else {
                    Self::binary(*op, &na, &nb)
                }
            }
            Node::Call {
                site,
                output,
                index,
            } => {
                let key = Arc::as_ptr(site);
                if !sites.contains_key(&key) {
                    let args: Vec<SymVector> = site
                        .args
                        .iter()
                        .map(|arg| arg.map(|e| e.inline(cache, sites)))
                        .collect();
                    let outputs = site.function.inline_outputs(&args);
                    sites.insert(key, outputs);
                }
                sites
                    .get(&key)
                    .and_then(|outs| outs.get(*output))
                    .and_then(|out| out.get(*index))
                    .cloned()
                    .unwrap_or_else(Self::zero)
            }
        };
        cache.insert(self.key(), result.clone());
        result
    }

    /// Symbolic derivative with respect to `wrt`.
    ///
    /// Fails on graphs that still contain calls.
    pub fn diff(&self, wrt: &Symbol) -> Result<Self> {
        let mut cache = HashMap::new();
        self.diff_cached(wrt, &mut cache)
    }

    pub(crate) fn diff_cached(
        &self,
        wrt: &Symbol,
        cache: &mut HashMap<*const Node, Expr>,
    ) -> Result<Self> {
        if let Some(done) = cache.get(&self.key()) {
            return Ok(done.clone());
        }
        let d = match self.node() {
            Node::Constant(_) => Self::zero(),
            Node::Symbol(s) => {
                if s.id() == wrt.id() {
                    Self::one()
                } else {
                    Self::zero()
                }
            }
            Node::Unary(op, x) => {
                let dx = x.diff_cached(wrt, cache)?;
                match op {
                    UnaryOp::Neg => -&dx,
                    UnaryOp::Sin => &x.cos() * &dx,
                    UnaryOp::Cos => -&(&x.sin() * &dx),
                    UnaryOp::Exp => self * &dx,
                    UnaryOp::Tanh => &(Self::one() - self * self) * &dx,
                    UnaryOp::Sqrt => &dx / &(self * 2.0),
                }
            }
            Node::Binary(op, a, b) => {
                let da = a.diff_cached(wrt, cache)?;
                let db = b.diff_cached(wrt, cache)?;
                match op {
                    BinaryOp::Add => &da + &db,
                    BinaryOp::Sub => &da - &db,
                    BinaryOp::Mul => &(&da * b) + &(a * &db),
                    BinaryOp::Div => &(&(&da * b) - &(a * &db)) / &(b * b),
                }
            }
            Node::Call { .. } => return Err(SymbolicError::NotExpanded),
        };
        cache.insert(self.key(), d.clone());
        Ok(d)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl Zero for Expr {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.as_constant() == Some(0.0)
    }
}

impl One for Expr {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, &self)
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

macro_rules! impl_binary {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, &self, &rhs)
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &self, rhs)
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, &rhs)
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, &Expr::constant(rhs))
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, &self, &Expr::constant(rhs))
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &Expr::constant(self), rhs)
            }
        }
    };
}

impl_binary!(Add, add, BinaryOp::Add);
impl_binary!(Sub, sub, BinaryOp::Sub);
impl_binary!(Mul, mul, BinaryOp::Mul);
impl_binary!(Div, div, BinaryOp::Div);

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Constant(v) => write!(f, "{v}"),
            Node::Symbol(s) => write!(f, "{}", s.name()),
            Node::Unary(UnaryOp::Neg, x) => write!(f, "(-{x})"),
            Node::Unary(op, x) => write!(f, "{}({x})", op.name()),
            Node::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Node::Call {
                site,
                output,
                index,
            } => write!(f, "{}(...)[{output}][{index}]", site.function.name()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(e: &Expr, env: &[(&Symbol, f64)]) -> f64 {
        let env: HashMap<u64, f64> = env.iter().map(|(s, v)| (s.id(), *v)).collect();
        e.evaluate(&env, &mut HashMap::new(), &mut HashMap::new())
            .unwrap()
    }

    #[test]
    fn test_symbols_are_distinct() {
        let a = Symbol::new("q");
        let b = Symbol::new("q");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_constant_folding() {
        let x = Expr::sym("x");
        assert!((&x * 0.0).is_zero());
        assert!((&x + 0.0).ptr_eq(&x));
        assert!((&x * 1.0).ptr_eq(&x));
        assert_relative_eq!((Expr::constant(2.0) * 3.0).as_constant().unwrap(), 6.0);
        assert!((-(-&x)).ptr_eq(&x));
    }

    #[test]
    fn test_evaluate() {
        let x = Expr::sym("x");
        let y = Expr::sym("y");
        let e = &(&x * &y) + &x.sin();
        let v = eval(&e, &[(x.as_symbol().unwrap(), 0.5), (y.as_symbol().unwrap(), 3.0)]);
        assert_relative_eq!(v, 1.5 + 0.5_f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_diff() {
        let x = Expr::sym("x");
        let sx = x.as_symbol().unwrap().clone();
        let e = &(&x * &x) + &x.cos();
        let d = e.diff(&sx).unwrap();
        assert_relative_eq!(eval(&d, &[(&sx, 0.3)]), 0.6 - 0.3_f64.sin(), epsilon = 1e-12);

        let q = &x / &(&x + 1.0);
        let dq = q.diff(&sx).unwrap();
        assert_relative_eq!(eval(&dq, &[(&sx, 1.0)]), 0.25, epsilon = 1e-12);

        let t = x.tanh();
        let dt = t.diff(&sx).unwrap();
        let expected = 1.0 - 0.2_f64.tanh().powi(2);
        assert_relative_eq!(eval(&dt, &[(&sx, 0.2)]), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_display() {
        let x = Expr::sym("q");
        let e = &x + 1.0;
        assert_eq!(e.to_string(), "(q + 1)");
    }
}
