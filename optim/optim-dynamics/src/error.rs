//! Error types for dynamics configuration.

use optim_symbolic::SymbolicError;
use optim_types::TypesError;
use thiserror::Error;

use crate::dynamics_type::DynamicsType;

/// Errors that can occur while configuring a phase.
///
/// Everything except [`OcpError::ShapeMismatch`] and symbolic evaluation
/// failures is a configuration error: it is raised while the phase is being
/// assembled, never deferred to solve time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OcpError {
    /// Invalid mapping or bounds.
    #[error(transparent)]
    Types(#[from] TypesError),

    /// Symbolic construction failed.
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),

    /// Unknown dynamics name.
    #[error("unsupported dynamics type: {name}")]
    UnsupportedDynamics {
        /// The name that failed to parse.
        name: String,
    },

    /// The phase has already been bound to its dynamics.
    #[error("phase {phase} is already configured")]
    AlreadyConfigured {
        /// Phase index.
        phase: usize,
    },

    /// Phase index outside the program.
    #[error("phase {phase} out of range ({count} phases)")]
    PhaseOutOfRange {
        /// Requested phase.
        phase: usize,
        /// Number of phases.
        count: usize,
    },

    /// A muscle-driven variant was requested on a model without muscles.
    #[error("{dynamics} requires muscles but the model declares none")]
    NoMuscles {
        /// The requested variant.
        dynamics: DynamicsType,
    },

    /// A block was appended out of the fixed position, velocity, torque,
    /// muscle order.
    #[error("block {block} out of order: {reason}")]
    BlockOrder {
        /// Block key.
        block: String,
        /// What went wrong.
        reason: String,
    },

    /// The same block key was recorded twice in one ledger.
    #[error("block {block} already recorded in {ledger}")]
    DuplicateBlock {
        /// Block key.
        block: String,
        /// Ledger label (`states`, `controls`, `parameters`).
        ledger: &'static str,
    },

    /// Contact names cannot be routed to plot columns.
    #[error("contact names mismatch in phase {phase}: {reason}")]
    ContactNames {
        /// Phase index.
        phase: usize,
        /// What went wrong.
        reason: String,
    },

    /// The physics model does not provide a required entry point.
    #[error("model does not provide {capability}")]
    ModelCapability {
        /// Name of the missing entry point.
        capability: &'static str,
    },

    /// A compiled function produces the wrong number of rows.
    #[error("shape mismatch in {function}: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// Function name.
        function: String,
        /// Expected rows.
        expected: usize,
        /// Produced rows.
        actual: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl OcpError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a block order error.
    #[must_use]
    pub fn block_order(block: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BlockOrder {
            block: block.into(),
            reason: reason.into(),
        }
    }

    /// Create a contact names error.
    #[must_use]
    pub fn contact_names(phase: usize, reason: impl Into<String>) -> Self {
        Self::ContactNames {
            phase,
            reason: reason.into(),
        }
    }

    /// Check if this is a shape error.
    #[must_use]
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::ShapeMismatch { .. } | Self::Symbolic(_))
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, OcpError>;
