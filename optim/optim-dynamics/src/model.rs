//! Interface to the rigid-body physics model.
//!
//! The configuration engine never evaluates physics itself. It queries the
//! model for its layout (counts and names) and hands the model's symbolic
//! entry points to the dynamics recipes, which call them on expanded
//! position, velocity and force vectors.

use optim_symbolic::{Expr, SymVector};

use crate::error::{OcpError, Result};

/// Result of a forward-dynamics evaluation under contact constraints.
#[derive(Debug, Clone)]
pub struct ConstrainedDynamics {
    /// Generalized accelerations (full model size).
    pub qddot: SymVector,
    /// Constraint reaction forces, one row per contact constraint.
    pub contact_forces: SymVector,
}

/// Activation and deactivation time constants for first-order muscle
/// activation dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationTimeConstants {
    /// Activation (rising) time constant, seconds.
    pub activation: f64,
    /// Deactivation (falling) time constant, seconds.
    pub deactivation: f64,
    /// Steepness of the smooth switch between the two constants.
    pub smoothing: f64,
}

impl Default for ActivationTimeConstants {
    fn default() -> Self {
        Self {
            activation: 0.015,   // 15 ms
            deactivation: 0.060, // 60 ms
            smoothing: 10.0,
        }
    }
}

/// A multibody or musculoskeletal model, queried read-only.
///
/// Vectors passed to the symbolic entry points are in the model's native
/// (full) degree-of-freedom space.
pub trait BiomechanicalModel: Send + Sync {
    /// Number of generalized coordinates.
    fn nb_q(&self) -> usize;

    /// Number of generalized velocities.
    fn nb_qdot(&self) -> usize;

    /// Number of generalized forces.
    fn nb_generalized_torque(&self) -> usize {
        self.nb_qdot()
    }

    /// Degree-of-freedom names, in native order.
    fn dof_names(&self) -> &[String];

    /// Muscle names, in native order.
    fn muscle_names(&self) -> &[String] {
        &[]
    }

    /// Number of muscles.
    fn nb_muscles(&self) -> usize {
        self.muscle_names().len()
    }

    /// Contact constraint names, in native order.
    fn contact_names(&self) -> &[String] {
        &[]
    }

    /// Number of contact constraints.
    fn nb_contacts(&self) -> usize {
        self.contact_names().len()
    }

    /// Generalized accelerations from positions, velocities and forces.
    fn forward_dynamics(&self, q: &SymVector, qdot: &SymVector, tau: &SymVector)
        -> Result<SymVector>;

    /// Generalized accelerations and contact reactions under the model's
    /// contact constraints.
    fn forward_dynamics_constraints_direct(
        &self,
        _q: &SymVector,
        _qdot: &SymVector,
        _tau: &SymVector,
    ) -> Result<ConstrainedDynamics> {
        Err(OcpError::ModelCapability {
            capability: "constrained forward dynamics",
        })
    }

    /// Generalized forces produced by muscles at the given activations.
    fn muscular_joint_torque(
        &self,
        _activations: &SymVector,
        _q: &SymVector,
        _qdot: &SymVector,
    ) -> Result<SymVector> {
        Err(OcpError::ModelCapability {
            capability: "muscular joint torque",
        })
    }

    /// Generalized forces produced by torque actuators at the given
    /// activations.
    fn torque_from_activations(
        &self,
        _activations: &SymVector,
        _q: &SymVector,
        _qdot: &SymVector,
    ) -> Result<SymVector> {
        Err(OcpError::ModelCapability {
            capability: "torque actuators",
        })
    }

    /// Time constants used by the default [`activation_dot`](Self::activation_dot).
    fn activation_time_constants(&self) -> ActivationTimeConstants {
        ActivationTimeConstants::default()
    }

    /// Muscle activation rate from excitations and current activations.
    ///
    /// The default is first-order dynamics `da/dt = (u - a) / τ(u, a)` where
    /// `τ` switches smoothly from the deactivation constant (u < a) to the
    /// activation constant (u > a).
    fn activation_dot(&self, excitations: &SymVector, activations: &SymVector) -> Result<SymVector> {
        let c = self.activation_time_constants();
        let diff = excitations.try_sub(activations)?;
        Ok(diff.map(|d| {
            let switch = (Expr::from(1.0) + (d * c.smoothing).tanh()) * 0.5;
            let tau = &switch * (c.activation - c.deactivation) + c.deactivation;
            d / &tau
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use optim_symbolic::Function;

    struct Bare {
        names: Vec<String>,
    }

    impl BiomechanicalModel for Bare {
        fn nb_q(&self) -> usize {
            self.names.len()
        }

        fn nb_qdot(&self) -> usize {
            self.names.len()
        }

        fn dof_names(&self) -> &[String] {
            &self.names
        }

        fn forward_dynamics(
            &self,
            _q: &SymVector,
            _qdot: &SymVector,
            tau: &SymVector,
        ) -> Result<SymVector> {
            Ok(tau.clone())
        }
    }

    #[test]
    fn test_defaults() {
        let model = Bare {
            names: vec!["hinge".into()],
        };
        assert_eq!(model.nb_generalized_torque(), 1);
        assert_eq!(model.nb_muscles(), 0);
        assert_eq!(model.nb_contacts(), 0);

        let q = SymVector::sym("q", 1);
        let err = model
            .muscular_joint_torque(&q, &q, &q)
            .unwrap_err();
        assert!(matches!(err, OcpError::ModelCapability { .. }));
    }

    #[test]
    fn test_activation_dot_asymmetry() {
        let model = Bare { names: vec![] };
        let u = SymVector::sym("u", 1);
        let a = SymVector::sym("a", 1);
        let adot = model.activation_dot(&u, &a).unwrap();
        let f = Function::new("adot", [("u", u), ("a", a)], [("adot", adot)]).unwrap();

        let eval = |u: f64, a: f64| {
            f.eval(&[DVector::from_vec(vec![u]), DVector::from_vec(vec![a])])
                .unwrap()[0][0]
        };

        // Rising: close to (1 - 0) / 15 ms.
        assert_relative_eq!(eval(1.0, 0.0), 1.0 / 0.015, max_relative = 1e-3);
        // Falling: close to (0 - 1) / 60 ms.
        assert_relative_eq!(eval(0.0, 1.0), -1.0 / 0.060, max_relative = 1e-3);
        assert_relative_eq!(eval(0.4, 0.4), 0.0);
    }
}
