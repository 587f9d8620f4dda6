//! The optimal control program: phase definitions, parameters and the
//! problem-wide contact registry.

use tracing::debug;

use crate::config::PhaseDefinition;
use crate::configure::configure_phase;
use crate::contact::ContactNameRegistry;
use crate::dynamics_type::DynamicsType;
use crate::error::{OcpError, Result};
use crate::parameters::Parameters;
use crate::phase::{Phase, PhaseBuilder, ProblemContext};

#[derive(Debug)]
enum PhaseSlot {
    Pending(PhaseDefinition),
    Configured(Box<Phase>),
}

/// A multi-phase optimal control program.
///
/// Phases are configured one at a time, in any order. A phase that fails to
/// configure keeps its definition, so it can be fixed and retried.
#[derive(Debug)]
pub struct OptimalControlProgram {
    slots: Vec<PhaseSlot>,
    parameters: Parameters,
    contacts: ContactNameRegistry,
    contacts_primed: bool,
}

impl OptimalControlProgram {
    /// Create a program from its phase definitions.
    pub fn new(phases: Vec<PhaseDefinition>) -> Result<Self> {
        if phases.is_empty() {
            return Err(OcpError::invalid_config("a program needs at least one phase"));
        }
        for phase in &phases {
            phase.validate()?;
        }
        Ok(Self {
            slots: phases.into_iter().map(PhaseSlot::Pending).collect(),
            parameters: Parameters::new(),
            contacts: ContactNameRegistry::new(),
            contacts_primed: false,
        })
    }

    /// Set the optimization parameters shared by every phase.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Declare the merged contact list up front. Phases whose contacts are
    /// not in it fail to configure.
    #[must_use]
    pub fn with_contact_names(mut self, contacts: ContactNameRegistry) -> Self {
        self.contacts = contacts;
        self.contacts_primed = true;
        self
    }

    /// Number of phases.
    #[must_use]
    pub fn nb_phases(&self) -> usize {
        self.slots.len()
    }

    /// Problem parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Merged contact names.
    #[must_use]
    pub fn contacts(&self) -> &ContactNameRegistry {
        &self.contacts
    }

    /// Configured phase `index`, if it is configured.
    pub fn phase(&self, index: usize) -> Result<Option<&Phase>> {
        match self.slot(index)? {
            PhaseSlot::Configured(phase) => Ok(Some(phase.as_ref())),
            PhaseSlot::Pending(_) => Ok(None),
        }
    }

    /// Check if phase `index` is configured.
    pub fn is_configured(&self, index: usize) -> Result<bool> {
        Ok(self.phase(index)?.is_some())
    }

    /// Every configured phase, in order.
    pub fn phases(&self) -> impl Iterator<Item = &Phase> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            PhaseSlot::Configured(phase) => Some(phase.as_ref()),
            PhaseSlot::Pending(_) => None,
        })
    }

    fn slot(&self, index: usize) -> Result<&PhaseSlot> {
        self.slots.get(index).ok_or(OcpError::PhaseOutOfRange {
            phase: index,
            count: self.slots.len(),
        })
    }

    fn definition(&self, index: usize) -> Option<&PhaseDefinition> {
        match self.slots.get(index) {
            Some(PhaseSlot::Pending(def)) => Some(def),
            _ => None,
        }
    }

    /// Merge the contact names of every phase in phase order, so column
    /// indices do not depend on the order phases are configured in.
    fn prime_contacts(&mut self) -> Result<()> {
        if self.contacts_primed {
            return Ok(());
        }
        for index in 0..self.slots.len() {
            let model = match &self.slots[index] {
                PhaseSlot::Pending(def) => def.model.clone(),
                PhaseSlot::Configured(phase) => phase.model_arc(),
            };
            self.contacts.register(index, model.contact_names())?;
        }
        self.contacts_primed = true;
        debug!(contacts = ?self.contacts.names(), "merged contact names");
        Ok(())
    }

    /// Configure phase `index`.
    ///
    /// Fails with [`OcpError::AlreadyConfigured`] if it is already configured.
    pub fn configure_phase(&mut self, index: usize) -> Result<&Phase> {
        if let PhaseSlot::Configured(_) = self.slot(index)? {
            return Err(OcpError::AlreadyConfigured { phase: index });
        }
        let may_bind_contacts = self.definition(index).is_some_and(|def| {
            let kind = def.dynamics.kind();
            kind.has_contact() || (kind == DynamicsType::Custom && def.model.nb_contacts() > 0)
        });
        if may_bind_contacts {
            self.prime_contacts()?;
        }

        let def = self
            .definition(index)
            .cloned()
            .ok_or(OcpError::AlreadyConfigured { phase: index })?;

        let mut ctx = ProblemContext {
            parameters: &self.parameters,
            contacts: &mut self.contacts,
        };
        let phase = PhaseBuilder::new(index, def).and_then(|b| configure_phase(b, &mut ctx))?;
        self.slots[index] = PhaseSlot::Configured(Box::new(phase));
        self.phase(index)?
            .ok_or(OcpError::AlreadyConfigured { phase: index })
    }

    /// Configure every phase that is not configured yet, in order.
    pub fn configure(&mut self) -> Result<()> {
        for index in 0..self.slots.len() {
            if !self.is_configured(index)? {
                self.configure_phase(index)?;
            }
        }
        Ok(())
    }

    /// Times at which one phase ends and the next starts.
    #[must_use]
    pub fn phase_transition_times(&self) -> Vec<f64> {
        self.final_times()
            .take(self.slots.len().saturating_sub(1))
            .scan(0.0, |t, tf| {
                *t += tf;
                Some(*t)
            })
            .collect()
    }

    /// Node times of every phase, each starting where the previous one ends.
    #[must_use]
    pub fn time_grid(&self) -> Vec<Vec<f64>> {
        let mut start = 0.0;
        self.slots
            .iter()
            .map(|slot| match slot {
                PhaseSlot::Pending(def) => (def.n_shooting, def.final_time),
                PhaseSlot::Configured(phase) => (phase.n_shooting(), phase.final_time()),
            })
            .map(|(ns, tf)| {
                let dt = tf / ns as f64;
                let nodes = (0..=ns).map(|k| start + dt * k as f64).collect();
                start += tf;
                nodes
            })
            .collect()
    }

    fn final_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots.iter().map(|slot| match slot {
            PhaseSlot::Pending(def) => def.final_time,
            PhaseSlot::Configured(phase) => phase.final_time(),
        })
    }
}
