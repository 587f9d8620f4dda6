//! Dynamics configuration for multibody trajectory optimization.
//!
//! This crate turns a choice of dynamics model (torque driven, muscle
//! driven, with or without ground contact) into the symbolic state vector,
//! control vector and forward-dynamics function a direct multiple-shooting
//! transcription needs.
//!
//! # Layout
//!
//! States and controls are flat vectors built from named blocks, always in
//! the same order:
//!
//! | vector | blocks                                         |
//! |--------|------------------------------------------------|
//! | `x`    | `q`, `q_dot`, `muscles` (excitation-driven)    |
//! | `u`    | `tau`, `muscles`                               |
//! | `p`    | one block per problem parameter                |
//!
//! The blocks live in a reduced space: a [`BidirectionalMapping`] per
//! quantity translates between the optimized variables and the model's
//! native degrees of freedom (symmetry, locked joints).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use optim_dynamics::{BiomechanicalModel, DynamicsType, OptimalControlProgram, PhaseDefinition};
//! use optim_symbolic::SymVector;
//!
//! /// Unit point mass in the plane: `q̈ = τ`.
//! struct PointMass {
//!     dofs: Vec<String>,
//! }
//!
//! impl BiomechanicalModel for PointMass {
//!     fn nb_q(&self) -> usize {
//!         self.dofs.len()
//!     }
//!
//!     fn nb_qdot(&self) -> usize {
//!         self.dofs.len()
//!     }
//!
//!     fn dof_names(&self) -> &[String] {
//!         &self.dofs
//!     }
//!
//!     fn forward_dynamics(
//!         &self,
//!         _q: &SymVector,
//!         _qdot: &SymVector,
//!         tau: &SymVector,
//!     ) -> optim_dynamics::Result<SymVector> {
//!         Ok(tau.clone())
//!     }
//! }
//!
//! # fn main() -> optim_dynamics::Result<()> {
//! let model = PointMass {
//!     dofs: vec!["x".into(), "y".into()],
//! };
//! let def = PhaseDefinition::new(Arc::new(model), DynamicsType::TorqueDriven)
//!     .with_n_shooting(20)
//!     .with_final_time(0.5);
//! let mut ocp = OptimalControlProgram::new(vec![def])?;
//! let phase = ocp.configure_phase(0)?;
//!
//! assert_eq!(phase.nx(), 4);
//! assert_eq!(phase.nu(), 2);
//! assert_eq!(phase.var_states().range("q_dot"), Some(2..4));
//! assert_eq!(phase.u().names(), vec!["Tau_x", "Tau_y"]);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/optim-dynamics/0.3.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
mod configure;
mod contact;
mod dynamics_type;
mod error;
mod functions;
mod ledger;
mod model;
mod ocp;
mod parameters;
mod phase;
mod plot;

pub use config::{PhaseDefinition, DEFAULT_N_SHOOTING};
pub use configure::configure_phase;
pub use contact::ContactNameRegistry;
pub use dynamics_type::{
    ConfigureFn, ContactFn, Dynamics, DynamicsFn, DynamicsOutput, DynamicsType, MuscleDrive,
};
pub use error::{OcpError, Result};
pub use functions::{builtin_contact_forces, builtin_dynamics};
pub use ledger::BlockLedger;
pub use model::{ActivationTimeConstants, BiomechanicalModel, ConstrainedDynamics};
pub use ocp::OptimalControlProgram;
pub use parameters::{Parameter, Parameters};
pub use phase::{
    BlocksAppended, DynamicsBound, Empty, Phase, PhaseBuilder, ProblemContext,
    CONTACT_FORCES_FUNC, FORWARD_DYN, MUSCLES, Q, Q_DOT, TAU,
};
pub use plot::{CustomPlot, PlotExtractor, PlotType};

pub use optim_types::{BidirectionalMapping, Bounds, IndexMapping, MapEntry, Sign};
