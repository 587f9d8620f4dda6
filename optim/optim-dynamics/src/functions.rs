//! Built-in forward-dynamics and contact-force recipes.
//!
//! Every recipe reads the reduced blocks out of `x` and `u` using the
//! phase's counts, expands them to the model's native space, calls the model,
//! and reduces the result back:
//!
//! ```text
//! xdot = [ q_mapping.reduce(q̇),  q_dot_mapping.reduce(q̈),  (ȧ) ]
//! ```
//!
//! Activation-rate rows are only present for excitation-driven muscles.

use std::sync::Arc;

use optim_symbolic::SymVector;
use optim_types::BidirectionalMapping;

use crate::dynamics_type::{ContactFn, DynamicsFn, DynamicsOutput, DynamicsType, MuscleDrive};
use crate::error::Result;
use crate::phase::Phase;

/// How generalized forces are produced from the controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorqueSource {
    /// No torque block.
    None,
    /// Controls are generalized forces.
    Direct,
    /// Controls are torque actuator activations.
    Activations,
}

/// Where the muscle activations come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuscleSource {
    None,
    Controls,
    States,
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    torque: TorqueSource,
    muscles: MuscleSource,
    contact: bool,
}

impl Layout {
    const fn of(kind: DynamicsType) -> Option<Self> {
        let torque = if !kind.has_torque() {
            TorqueSource::None
        } else if kind.torque_is_activation() {
            TorqueSource::Activations
        } else {
            TorqueSource::Direct
        };
        let muscles = match kind.muscle_drive() {
            None => MuscleSource::None,
            Some(MuscleDrive::Activation) => MuscleSource::Controls,
            Some(MuscleDrive::Excitation) => MuscleSource::States,
        };
        match kind {
            DynamicsType::Custom => None,
            _ => Some(Self {
                torque,
                muscles,
                contact: kind.has_contact(),
            }),
        }
    }
}

fn expand(mapping: &BidirectionalMapping, reduced: &SymVector) -> Result<SymVector> {
    Ok(SymVector::from_exprs(mapping.expand.map(reduced.as_slice())?))
}

fn reduce(mapping: &BidirectionalMapping, full: &SymVector) -> Result<SymVector> {
    Ok(SymVector::from_exprs(mapping.reduce.map(full.as_slice())?))
}

/// Native-space positions and velocities.
fn generalized_states(x: &SymVector, phase: &Phase) -> Result<(SymVector, SymVector)> {
    let nb_q = phase.nb_q();
    let q = expand(phase.q_mapping(), &x.slice(0..nb_q)?)?;
    let qdot = expand(
        phase.q_dot_mapping(),
        &x.slice(nb_q..nb_q + phase.nb_qdot())?,
    )?;
    Ok((q, qdot))
}

fn muscle_activations(
    x: &SymVector,
    u: &SymVector,
    phase: &Phase,
    source: MuscleSource,
) -> Result<Option<SymVector>> {
    let n = phase.nb_muscles();
    Ok(match source {
        MuscleSource::None => None,
        MuscleSource::Controls => Some(u.slice(phase.nb_tau()..phase.nb_tau() + n)?),
        MuscleSource::States => {
            let offset = phase.nb_q() + phase.nb_qdot();
            Some(x.slice(offset..offset + n)?)
        }
    })
}

/// Native-space generalized forces from every actuation source of `layout`.
fn generalized_forces(
    layout: Layout,
    x: &SymVector,
    u: &SymVector,
    q: &SymVector,
    qdot: &SymVector,
    phase: &Phase,
) -> Result<SymVector> {
    let model = phase.model();
    let controls = u.slice(0..phase.nb_tau())?;
    let mut tau = match layout.torque {
        TorqueSource::None => SymVector::zeros(model.nb_generalized_torque()),
        TorqueSource::Direct => expand(phase.tau_mapping(), &controls)?,
        TorqueSource::Activations => {
            let activations = expand(phase.tau_mapping(), &controls)?;
            model.torque_from_activations(&activations, q, qdot)?
        }
    };
    if let Some(activations) = muscle_activations(x, u, phase, layout.muscles)? {
        let muscle_tau = model.muscular_joint_torque(&activations, q, qdot)?;
        tau = tau.try_add(&muscle_tau)?;
    }
    Ok(tau)
}

fn forward(layout: Layout, x: &SymVector, u: &SymVector, phase: &Phase) -> Result<DynamicsOutput> {
    let model = phase.model();
    let (q, qdot) = generalized_states(x, phase)?;
    let tau = generalized_forces(layout, x, u, &q, &qdot, phase)?;

    let qddot = if layout.contact {
        model.forward_dynamics_constraints_direct(&q, &qdot, &tau)?.qddot
    } else {
        model.forward_dynamics(&q, &qdot, &tau)?
    };

    let mut pieces = vec![
        reduce(phase.q_mapping(), &qdot)?,
        reduce(phase.q_dot_mapping(), &qddot)?,
    ];
    if layout.muscles == MuscleSource::States {
        let offset = phase.nb_q() + phase.nb_qdot();
        let activations = x.slice(offset..offset + phase.nb_muscles())?;
        let excitations = u.slice(phase.nb_tau()..phase.nb_tau() + phase.nb_muscles())?;
        pieces.push(model.activation_dot(&excitations, &activations)?);
    }
    Ok(DynamicsOutput::Pieces(pieces))
}

fn contact_forces(layout: Layout, x: &SymVector, u: &SymVector, phase: &Phase) -> Result<SymVector> {
    let (q, qdot) = generalized_states(x, phase)?;
    let tau = generalized_forces(layout, x, u, &q, &qdot, phase)?;
    Ok(phase
        .model()
        .forward_dynamics_constraints_direct(&q, &qdot, &tau)?
        .contact_forces)
}

/// Built-in forward-dynamics recipe of `kind`. `None` for
/// [`DynamicsType::Custom`].
#[must_use]
pub fn builtin_dynamics(kind: DynamicsType) -> Option<DynamicsFn> {
    let layout = Layout::of(kind)?;
    Some(Arc::new(
        move |x: &SymVector, u: &SymVector, _p: &SymVector, phase: &Phase| {
            forward(layout, x, u, phase)
        },
    ))
}

/// Built-in contact-force recipe of `kind`. `None` for variants without
/// contact.
#[must_use]
pub fn builtin_contact_forces(kind: DynamicsType) -> Option<ContactFn> {
    let layout = Layout::of(kind).filter(|l| l.contact)?;
    Some(Arc::new(
        move |x: &SymVector, u: &SymVector, _p: &SymVector, phase: &Phase| {
            contact_forces(layout, x, u, phase)
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_variant_has_a_recipe() {
        for kind in DynamicsType::ALL {
            assert_eq!(
                builtin_dynamics(kind).is_some(),
                kind != DynamicsType::Custom,
                "{kind}"
            );
            assert_eq!(builtin_contact_forces(kind).is_some(), kind.has_contact(), "{kind}");
        }
    }

    #[test]
    fn test_layouts() {
        let layout = Layout::of(DynamicsType::TorqueActivationsDrivenWithContact).unwrap();
        assert_eq!(layout.torque, TorqueSource::Activations);
        assert_eq!(layout.muscles, MuscleSource::None);
        assert!(layout.contact);

        let layout = Layout::of(DynamicsType::MuscleExcitationsDriven).unwrap();
        assert_eq!(layout.torque, TorqueSource::None);
        assert_eq!(layout.muscles, MuscleSource::States);
        assert!(!layout.contact);
    }
}
