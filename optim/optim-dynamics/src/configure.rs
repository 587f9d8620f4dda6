//! Variant dispatch: lay out the blocks of a phase and bind its dynamics.

use tracing::{info, warn};

use crate::dynamics_type::DynamicsType;
use crate::error::{OcpError, Result};
use crate::functions::{builtin_contact_forces, builtin_dynamics};
use crate::phase::{DynamicsBound, Empty, Phase, PhaseBuilder, ProblemContext};

/// Configure a phase according to its dynamics variant.
///
/// Built-in variants append positions and velocities, then torques, then
/// muscles, compile the forward dynamics (the override recipe wins over the
/// built-in one) and, for contact variants, the contact forces.
/// [`DynamicsType::Custom`] hands the builder to the caller's configure
/// function.
pub fn configure_phase(builder: PhaseBuilder<Empty>, ctx: &mut ProblemContext<'_>) -> Result<Phase> {
    let kind = builder.phase().dynamics().kind();
    let bound = match kind {
        DynamicsType::TorqueDriven
        | DynamicsType::TorqueDrivenWithContact
        | DynamicsType::TorqueActivationsDriven
        | DynamicsType::TorqueActivationsDrivenWithContact
        | DynamicsType::MuscleActivationsDriven
        | DynamicsType::MuscleActivationsAndTorqueDriven
        | DynamicsType::MuscleActivationsAndTorqueDrivenWithContact
        | DynamicsType::MuscleExcitationsDriven
        | DynamicsType::MuscleExcitationsAndTorqueDriven
        | DynamicsType::MuscleExcitationsAndTorqueDrivenWithContact => {
            configure_builtin(builder, kind, ctx)?
        }
        DynamicsType::Custom => configure_custom(builder, ctx)?,
    };

    let phase = bound.finish();
    info!(
        phase = phase.index(),
        dynamics = %kind,
        nx = phase.nx(),
        nu = phase.nu(),
        np = phase.np(),
        contacts = phase.contact_forces_func().is_some(),
        "configured phase"
    );
    Ok(phase)
}

fn configure_builtin(
    builder: PhaseBuilder<Empty>,
    kind: DynamicsType,
    ctx: &mut ProblemContext<'_>,
) -> Result<PhaseBuilder<DynamicsBound>> {
    let mut blocks = builder.append_q_qdot()?;
    if kind.has_torque() {
        blocks = if kind.torque_is_activation() {
            blocks.append_torque_activations()?
        } else {
            blocks.append_tau()?
        };
    }
    if let Some(drive) = kind.muscle_drive() {
        blocks = blocks.append_muscles(drive)?;
    }

    let builtin = builtin_dynamics(kind).ok_or_else(|| OcpError::UnsupportedDynamics {
        name: kind.name().to_string(),
    })?;
    let recipe = blocks.phase().dynamics().recipe_or(builtin);
    let mut bound = blocks.bind_dynamics(&recipe, ctx.parameters)?;

    if let Some(contact) = builtin_contact_forces(kind) {
        if bound.phase().model().nb_contacts() == 0 {
            warn!(
                phase = bound.phase().index(),
                dynamics = %kind,
                "model declares no contact, contact forces are not computed"
            );
        } else {
            bound = bound.bind_contacts(&contact, ctx.contacts)?;
        }
    }
    Ok(bound)
}

fn configure_custom(
    builder: PhaseBuilder<Empty>,
    ctx: &mut ProblemContext<'_>,
) -> Result<PhaseBuilder<DynamicsBound>> {
    let configure = builder
        .phase()
        .dynamics()
        .configure()
        .cloned()
        .ok_or_else(|| OcpError::invalid_config("custom dynamics require a configure function"))?;
    configure(builder, ctx)
}
