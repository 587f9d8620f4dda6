//! Toy models shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use nalgebra::DVector;
use optim_dynamics::{BiomechanicalModel, ConstrainedDynamics, Result};
use optim_symbolic::{Expr, SymVector};

pub const GRAVITY: f64 = 9.81;
pub const MAX_TORQUE: f64 = 50.0;
pub const MOMENT_ARM: f64 = 0.05;
pub const MAX_ISOMETRIC_FORCE: f64 = 1000.0;

/// A chain of independent pendulums: `q̈_i = τ_i - g sin(q_i)`.
///
/// Muscle `k` spans dof `k % nb_dof` with a constant moment arm. Contacts
/// damp the motion and report `Σ τ` as reaction.
#[derive(Debug, Clone, Default)]
pub struct PendulumChain {
    pub dofs: Vec<String>,
    pub muscles: Vec<String>,
    pub contacts: Vec<String>,
}

impl PendulumChain {
    pub fn new(nb_dof: usize) -> Self {
        Self {
            dofs: (0..nb_dof).map(|i| format!("d{i}")).collect(),
            ..Self::default()
        }
    }

    pub fn with_muscles(mut self, names: &[&str]) -> Self {
        self.muscles = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_contacts(mut self, names: &[&str]) -> Self {
        self.contacts = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn shared(self) -> Arc<dyn BiomechanicalModel> {
        Arc::new(self)
    }
}

impl BiomechanicalModel for PendulumChain {
    fn nb_q(&self) -> usize {
        self.dofs.len()
    }

    fn nb_qdot(&self) -> usize {
        self.dofs.len()
    }

    fn dof_names(&self) -> &[String] {
        &self.dofs
    }

    fn muscle_names(&self) -> &[String] {
        &self.muscles
    }

    fn contact_names(&self) -> &[String] {
        &self.contacts
    }

    fn forward_dynamics(
        &self,
        q: &SymVector,
        _qdot: &SymVector,
        tau: &SymVector,
    ) -> Result<SymVector> {
        Ok(q
            .iter()
            .zip(tau.iter())
            .map(|(q, tau)| tau - q.sin() * GRAVITY)
            .collect())
    }

    fn forward_dynamics_constraints_direct(
        &self,
        q: &SymVector,
        qdot: &SymVector,
        tau: &SymVector,
    ) -> Result<ConstrainedDynamics> {
        let free = self.forward_dynamics(q, qdot, tau)?;
        let qddot = free.try_sub(qdot)?;
        let total = tau.iter().fold(Expr::from(0.0), |acc, t| acc + t);
        let contact_forces = self
            .contacts
            .iter()
            .enumerate()
            .map(|(i, _)| &total * (i + 1) as f64)
            .collect();
        Ok(ConstrainedDynamics {
            qddot,
            contact_forces,
        })
    }

    fn muscular_joint_torque(
        &self,
        activations: &SymVector,
        _q: &SymVector,
        _qdot: &SymVector,
    ) -> Result<SymVector> {
        let mut tau = vec![Expr::from(0.0); self.dofs.len()];
        for (k, a) in activations.iter().enumerate() {
            let dof = k % self.dofs.len();
            tau[dof] = &tau[dof] + a * (MOMENT_ARM * MAX_ISOMETRIC_FORCE);
        }
        Ok(SymVector::from_exprs(tau))
    }

    fn torque_from_activations(
        &self,
        activations: &SymVector,
        _q: &SymVector,
        _qdot: &SymVector,
    ) -> Result<SymVector> {
        Ok(activations.map(|a| a * MAX_TORQUE))
    }
}

pub fn dvec(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}
