//! Phase definitions.
//!
//! A [`PhaseDefinition`] is what the problem author provides for one phase:
//! the model, the dynamics, the discretization and the optional mappings and
//! bounds. Configuration turns it into a [`Phase`](crate::Phase).

use std::fmt;
use std::sync::Arc;

use optim_types::{BidirectionalMapping, Bounds, IndexMapping};

use crate::dynamics_type::{Dynamics, DynamicsType};
use crate::error::{OcpError, Result};
use crate::model::BiomechanicalModel;

/// Default number of shooting intervals.
pub const DEFAULT_N_SHOOTING: usize = 30;

/// Everything needed to configure one phase.
#[derive(Clone)]
pub struct PhaseDefinition {
    /// The physics model.
    pub model: Arc<dyn BiomechanicalModel>,
    /// The dynamics.
    pub dynamics: Dynamics,
    /// Number of shooting intervals.
    pub n_shooting: usize,
    /// Phase duration in seconds.
    pub final_time: f64,
    /// Position mapping; identity over `nb_q` if absent.
    pub q_mapping: Option<BidirectionalMapping>,
    /// Velocity mapping; identity over `nb_qdot` if absent.
    pub q_dot_mapping: Option<BidirectionalMapping>,
    /// Generalized force mapping; identity over `nb_generalized_torque` if
    /// absent.
    pub tau_mapping: Option<BidirectionalMapping>,
    /// State bounds.
    pub x_bounds: Option<Bounds>,
    /// Control bounds.
    pub u_bounds: Option<Bounds>,
    /// Explicit column of the merged contact list for each contact of this
    /// phase.
    pub contact_plot_mapping: Option<IndexMapping>,
}

impl PhaseDefinition {
    /// A one-second phase with default discretization and no mapping.
    #[must_use]
    pub fn new(model: Arc<dyn BiomechanicalModel>, dynamics: impl Into<Dynamics>) -> Self {
        Self {
            model,
            dynamics: dynamics.into(),
            n_shooting: DEFAULT_N_SHOOTING,
            final_time: 1.0,
            q_mapping: None,
            q_dot_mapping: None,
            tau_mapping: None,
            x_bounds: None,
            u_bounds: None,
            contact_plot_mapping: None,
        }
    }

    /// Set the number of shooting intervals.
    #[must_use]
    pub fn with_n_shooting(mut self, n_shooting: usize) -> Self {
        self.n_shooting = n_shooting;
        self
    }

    /// Set the phase duration.
    #[must_use]
    pub fn with_final_time(mut self, final_time: f64) -> Self {
        self.final_time = final_time;
        self
    }

    /// Set the position mapping.
    #[must_use]
    pub fn with_q_mapping(mut self, mapping: BidirectionalMapping) -> Self {
        self.q_mapping = Some(mapping);
        self
    }

    /// Set the velocity mapping.
    #[must_use]
    pub fn with_q_dot_mapping(mut self, mapping: BidirectionalMapping) -> Self {
        self.q_dot_mapping = Some(mapping);
        self
    }

    /// Set the generalized force mapping.
    #[must_use]
    pub fn with_tau_mapping(mut self, mapping: BidirectionalMapping) -> Self {
        self.tau_mapping = Some(mapping);
        self
    }

    /// Use one mapping for positions, velocities and generalized forces.
    #[must_use]
    pub fn with_all_generalized_mapping(self, mapping: BidirectionalMapping) -> Self {
        self.with_q_mapping(mapping.clone())
            .with_q_dot_mapping(mapping.clone())
            .with_tau_mapping(mapping)
    }

    /// Set the state bounds.
    #[must_use]
    pub fn with_x_bounds(mut self, bounds: Bounds) -> Self {
        self.x_bounds = Some(bounds);
        self
    }

    /// Set the control bounds.
    #[must_use]
    pub fn with_u_bounds(mut self, bounds: Bounds) -> Self {
        self.u_bounds = Some(bounds);
        self
    }

    /// Route this phase's contacts to explicit merged columns.
    #[must_use]
    pub fn with_contact_plot_mapping(mut self, mapping: IndexMapping) -> Self {
        self.contact_plot_mapping = Some(mapping);
        self
    }

    /// Validate the definition against its model.
    pub fn validate(&self) -> Result<()> {
        if self.n_shooting == 0 {
            return Err(OcpError::invalid_config("n_shooting must be at least 1"));
        }

        if !self.final_time.is_finite() || self.final_time <= 0.0 {
            return Err(OcpError::invalid_config(format!(
                "final_time must be positive and finite, got {}",
                self.final_time
            )));
        }

        if self.dynamics.kind() == DynamicsType::Custom && self.dynamics.configure().is_none() {
            return Err(OcpError::invalid_config(
                "custom dynamics require a configure function",
            ));
        }

        if self.model.dof_names().len() < self.model.nb_q().max(self.model.nb_qdot()) {
            return Err(OcpError::invalid_config(format!(
                "model declares {} dof names for {} coordinates",
                self.model.dof_names().len(),
                self.model.nb_q()
            )));
        }

        if let Some(m) = &self.q_mapping {
            m.validate(self.model.nb_q())?;
        }
        if let Some(m) = &self.q_dot_mapping {
            m.validate(self.model.nb_qdot())?;
        }
        if let Some(m) = &self.tau_mapping {
            m.validate(self.model.nb_generalized_torque())?;
        }
        if let Some(b) = &self.x_bounds {
            b.validate()?;
        }
        if let Some(b) = &self.u_bounds {
            b.validate()?;
        }

        Ok(())
    }
}

impl fmt::Debug for PhaseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseDefinition")
            .field("nb_q", &self.model.nb_q())
            .field("dynamics", &self.dynamics)
            .field("n_shooting", &self.n_shooting)
            .field("final_time", &self.final_time)
            .field("q_mapping", &self.q_mapping)
            .field("q_dot_mapping", &self.q_dot_mapping)
            .field("tau_mapping", &self.tau_mapping)
            .field("x_bounds", &self.x_bounds)
            .field("u_bounds", &self.u_bounds)
            .field("contact_plot_mapping", &self.contact_plot_mapping)
            .finish()
    }
}
