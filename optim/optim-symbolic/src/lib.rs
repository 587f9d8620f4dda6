//! Symbolic expressions and differentiable functions.
//!
//! This crate is the symbolic builder used by the optimal control
//! configuration engine. It provides:
//!
//! - [`Expr`] - scalar expression DAG with constant folding
//! - [`SymVector`] - column vectors of expressions (`vertcat`, slicing)
//! - [`Function`] - compiled mapping from symbol vectors to expression
//!   vectors, with numeric evaluation, symbolic calls, graph expansion and
//!   Jacobians
//!
//! # Example
//!
//! ```
//! use optim_symbolic::{Function, SymVector};
//! use nalgebra::DVector;
//!
//! let x = SymVector::sym("x", 2);
//! let xdot = SymVector::from_exprs(vec![x[1].clone(), -&x[0]]);
//! let f = Function::new("oscillator", [("x", x)], [("xdot", xdot)]).unwrap();
//!
//! let out = f.eval(&[DVector::from_vec(vec![1.0, 0.5])]).unwrap();
//! assert_eq!(out[0].as_slice(), &[0.5, -1.0]);
//! ```

#![doc(html_root_url = "https://docs.rs/optim-symbolic/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc, clippy::float_cmp)]

mod error;
mod expr;
mod function;
mod vector;

pub use error::{Result, SymbolicError};
pub use expr::{BinaryOp, Expr, Symbol, UnaryOp};
pub use function::Function;
pub use vector::SymVector;

// Re-exported so callers can build zeros/ones without naming num-traits.
pub use num_traits::{One, Zero};
