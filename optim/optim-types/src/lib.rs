//! Core data types for optimal control problem descriptions.
//!
//! - [`IndexMapping`] / [`BidirectionalMapping`] - translation between the
//!   reduced, user-facing degrees of freedom and the model's native ones
//! - [`Bounds`] - box bounds on state and control variables
//!
//! These types are pure data. The configuration engine in `optim-dynamics`
//! builds them into per-phase problem descriptions.

#![doc(html_root_url = "https://docs.rs/optim-types/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod bounds;
mod error;
mod mapping;

pub use bounds::Bounds;
pub use error::{Result, TypesError};
pub use mapping::{BidirectionalMapping, IndexMapping, MapEntry, Sign};
