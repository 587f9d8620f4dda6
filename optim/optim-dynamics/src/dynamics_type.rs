//! Dynamics variants and the recipes attached to them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use optim_symbolic::SymVector;

use crate::error::{OcpError, Result};
use crate::phase::{DynamicsBound, Empty, Phase, PhaseBuilder, ProblemContext};

/// How muscles enter the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MuscleDrive {
    /// Activations are controls.
    Activation,
    /// Excitations are controls, activations are states.
    Excitation,
}

/// Supported dynamics models, one per configuration recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DynamicsType {
    /// States `q, q_dot`; controls `tau`.
    TorqueDriven,
    /// As [`TorqueDriven`](Self::TorqueDriven) with contact forces.
    TorqueDrivenWithContact,
    /// Controls are torque actuator activations.
    TorqueActivationsDriven,
    /// Torque activations with contact forces.
    TorqueActivationsDrivenWithContact,
    /// Controls are muscle activations.
    MuscleActivationsDriven,
    /// Controls are residual torques and muscle activations.
    MuscleActivationsAndTorqueDriven,
    /// Residual torques and muscle activations with contact forces.
    MuscleActivationsAndTorqueDrivenWithContact,
    /// Controls are muscle excitations, activations are states.
    MuscleExcitationsDriven,
    /// Residual torques and muscle excitations.
    MuscleExcitationsAndTorqueDriven,
    /// Residual torques and muscle excitations with contact forces.
    MuscleExcitationsAndTorqueDrivenWithContact,
    /// Layout and recipe supplied by the caller.
    Custom,
}

impl DynamicsType {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::TorqueDriven,
        Self::TorqueDrivenWithContact,
        Self::TorqueActivationsDriven,
        Self::TorqueActivationsDrivenWithContact,
        Self::MuscleActivationsDriven,
        Self::MuscleActivationsAndTorqueDriven,
        Self::MuscleActivationsAndTorqueDrivenWithContact,
        Self::MuscleExcitationsDriven,
        Self::MuscleExcitationsAndTorqueDriven,
        Self::MuscleExcitationsAndTorqueDrivenWithContact,
        Self::Custom,
    ];

    /// Snake-case name of the variant.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TorqueDriven => "torque_driven",
            Self::TorqueDrivenWithContact => "torque_driven_with_contact",
            Self::TorqueActivationsDriven => "torque_activations_driven",
            Self::TorqueActivationsDrivenWithContact => "torque_activations_driven_with_contact",
            Self::MuscleActivationsDriven => "muscle_activations_driven",
            Self::MuscleActivationsAndTorqueDriven => "muscle_activations_and_torque_driven",
            Self::MuscleActivationsAndTorqueDrivenWithContact => {
                "muscle_activations_and_torque_driven_with_contact"
            }
            Self::MuscleExcitationsDriven => "muscle_excitations_driven",
            Self::MuscleExcitationsAndTorqueDriven => "muscle_excitations_and_torque_driven",
            Self::MuscleExcitationsAndTorqueDrivenWithContact => {
                "muscle_excitations_and_torque_driven_with_contact"
            }
            Self::Custom => "custom",
        }
    }

    /// Check if the variant has a torque control block.
    #[must_use]
    pub const fn has_torque(self) -> bool {
        !matches!(
            self,
            Self::MuscleActivationsDriven | Self::MuscleExcitationsDriven | Self::Custom
        )
    }

    /// Check if torque controls are actuator activations rather than raw torques.
    #[must_use]
    pub const fn torque_is_activation(self) -> bool {
        matches!(
            self,
            Self::TorqueActivationsDriven | Self::TorqueActivationsDrivenWithContact
        )
    }

    /// How muscles are driven, if the variant has muscles.
    #[must_use]
    pub const fn muscle_drive(self) -> Option<MuscleDrive> {
        match self {
            Self::MuscleActivationsDriven
            | Self::MuscleActivationsAndTorqueDriven
            | Self::MuscleActivationsAndTorqueDrivenWithContact => Some(MuscleDrive::Activation),
            Self::MuscleExcitationsDriven
            | Self::MuscleExcitationsAndTorqueDriven
            | Self::MuscleExcitationsAndTorqueDrivenWithContact => Some(MuscleDrive::Excitation),
            _ => None,
        }
    }

    /// Check if the variant computes contact forces.
    #[must_use]
    pub const fn has_contact(self) -> bool {
        matches!(
            self,
            Self::TorqueDrivenWithContact
                | Self::TorqueActivationsDrivenWithContact
                | Self::MuscleActivationsAndTorqueDrivenWithContact
                | Self::MuscleExcitationsAndTorqueDrivenWithContact
        )
    }
}

impl fmt::Display for DynamicsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DynamicsType {
    type Err = OcpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| OcpError::UnsupportedDynamics { name: s.to_string() })
    }
}

/// What a dynamics recipe returns: the state derivative, either whole or as
/// pieces that are concatenated in order.
#[derive(Debug, Clone)]
pub enum DynamicsOutput {
    /// The full state derivative.
    Single(SymVector),
    /// Pieces of the state derivative, concatenated in order.
    Pieces(Vec<SymVector>),
}

impl DynamicsOutput {
    /// Concatenate into a single vector.
    #[must_use]
    pub fn into_vector(self) -> SymVector {
        match self {
            Self::Single(v) => v,
            Self::Pieces(pieces) => SymVector::vertcat(&pieces),
        }
    }
}

impl From<SymVector> for DynamicsOutput {
    fn from(v: SymVector) -> Self {
        Self::Single(v)
    }
}

impl From<Vec<SymVector>> for DynamicsOutput {
    fn from(pieces: Vec<SymVector>) -> Self {
        Self::Pieces(pieces)
    }
}

/// Forward-dynamics recipe: `(x, u, p, phase) -> xdot`.
pub type DynamicsFn =
    Arc<dyn Fn(&SymVector, &SymVector, &SymVector, &Phase) -> Result<DynamicsOutput> + Send + Sync>;

/// Contact-force recipe: `(x, u, p, phase) -> contact forces`.
pub type ContactFn =
    Arc<dyn Fn(&SymVector, &SymVector, &SymVector, &Phase) -> Result<SymVector> + Send + Sync>;

/// Fully custom configuration: lays out the blocks and binds the dynamics.
pub type ConfigureFn = Arc<
    dyn Fn(PhaseBuilder<Empty>, &mut ProblemContext<'_>) -> Result<PhaseBuilder<DynamicsBound>>
        + Send
        + Sync,
>;

/// The dynamics chosen for a phase.
///
/// An override recipe, when present, always replaces the variant's built-in
/// recipe. [`DynamicsType::Custom`] requires a configure function.
#[derive(Clone)]
pub struct Dynamics {
    kind: DynamicsType,
    dynamics: Option<DynamicsFn>,
    configure: Option<ConfigureFn>,
}

impl Dynamics {
    /// Use the built-in recipe of `kind`.
    #[must_use]
    pub fn new(kind: DynamicsType) -> Self {
        Self {
            kind,
            dynamics: None,
            configure: None,
        }
    }

    /// Fully custom layout and recipe.
    #[must_use]
    pub fn custom(configure: ConfigureFn) -> Self {
        Self {
            kind: DynamicsType::Custom,
            dynamics: None,
            configure: Some(configure),
        }
    }

    /// Replace the built-in forward-dynamics recipe.
    #[must_use]
    pub fn with_dynamics(mut self, dynamics: DynamicsFn) -> Self {
        self.dynamics = Some(dynamics);
        self
    }

    /// The variant tag.
    #[must_use]
    pub fn kind(&self) -> DynamicsType {
        self.kind
    }

    /// The override recipe, if any.
    #[must_use]
    pub fn dynamics(&self) -> Option<&DynamicsFn> {
        self.dynamics.as_ref()
    }

    /// The custom configure function, if any.
    #[must_use]
    pub fn configure(&self) -> Option<&ConfigureFn> {
        self.configure.as_ref()
    }

    /// The override recipe if present, `builtin` otherwise.
    #[must_use]
    pub fn recipe_or(&self, builtin: DynamicsFn) -> DynamicsFn {
        self.dynamics.clone().unwrap_or(builtin)
    }
}

impl From<DynamicsType> for Dynamics {
    fn from(kind: DynamicsType) -> Self {
        Self::new(kind)
    }
}

impl fmt::Debug for Dynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dynamics")
            .field("kind", &self.kind)
            .field("dynamics", &self.dynamics.is_some())
            .field("configure", &self.configure.is_some())
            .finish()
    }
}
