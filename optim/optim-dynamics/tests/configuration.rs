//! Block layout and compiled dynamics for every built-in variant.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use common::{dvec, PendulumChain, GRAVITY, MAX_TORQUE, MOMENT_ARM, MAX_ISOMETRIC_FORCE};
use optim_dynamics::{
    BidirectionalMapping, Bounds, Dynamics, DynamicsFn, DynamicsOutput, DynamicsType,
    IndexMapping, OcpError, OptimalControlProgram, Parameters, Phase, PhaseBuilder,
    PhaseDefinition, PlotType, Result, MUSCLES, Q, Q_DOT, TAU,
};
use optim_symbolic::SymVector;

fn configure(def: PhaseDefinition) -> Phase {
    let mut ocp = OptimalControlProgram::new(vec![def]).unwrap();
    ocp.configure_phase(0).unwrap().clone()
}

#[test]
fn test_torque_driven_three_dof() {
    let phase = configure(PhaseDefinition::new(
        PendulumChain::new(3).shared(),
        DynamicsType::TorqueDriven,
    ));

    assert_eq!(phase.nx(), 6);
    assert_eq!(phase.nu(), 3);
    assert_eq!(phase.np(), 0);
    assert_eq!(
        phase.var_states().iter().collect::<Vec<_>>(),
        vec![(Q, 3), (Q_DOT, 3)]
    );
    assert_eq!(phase.var_controls().iter().collect::<Vec<_>>(), vec![(TAU, 3)]);
    assert_eq!(
        phase.x().names(),
        vec!["Q_d0", "Q_d1", "Q_d2", "Qdot_d0", "Qdot_d1", "Qdot_d2"]
    );
    assert_eq!(phase.u().names(), vec!["Tau_d0", "Tau_d1", "Tau_d2"]);
    assert!(phase.contact_forces_func().is_none());

    let f = phase.dynamics_func().unwrap();
    assert_eq!(f.name(), "ForwardDyn");
    assert_eq!(f.name_in(0), Some("x"));
    assert_eq!(f.name_out(0), Some("xdot"));
    assert!(f.is_expanded());

    let x = dvec(&[0.0, 0.5, 0.0, 1.0, 2.0, 3.0]);
    let u = dvec(&[4.0, 5.0, 6.0]);
    let xdot = &f.eval(&[x, u, dvec(&[])]).unwrap()[0];
    assert_relative_eq!(xdot[0], 1.0);
    assert_relative_eq!(xdot[2], 3.0);
    assert_relative_eq!(xdot[3], 4.0);
    assert_relative_eq!(xdot[4], 5.0 - GRAVITY * 0.5_f64.sin(), epsilon = 1e-12);
}

#[test]
fn test_sizes_match_ledgers_for_every_variant() {
    let model = PendulumChain::new(2)
        .with_muscles(&["biceps", "triceps", "deltoid"])
        .with_contacts(&["heel"])
        .shared();

    for kind in DynamicsType::ALL {
        if kind == DynamicsType::Custom {
            continue;
        }
        let phase = configure(PhaseDefinition::new(model.clone(), kind));

        assert_eq!(phase.nx(), phase.x().len(), "{kind}");
        assert_eq!(phase.nu(), phase.u().len(), "{kind}");
        assert_eq!(phase.nx(), phase.var_states().total(), "{kind}");
        assert_eq!(phase.nu(), phase.var_controls().total(), "{kind}");
        assert_eq!(phase.dynamics_func().unwrap().size_out(0), phase.nx(), "{kind}");
        assert_eq!(phase.contact_forces_func().is_some(), kind.has_contact(), "{kind}");
        assert_eq!(
            phase.nb_actuators(),
            if kind.torque_is_activation() { 2 } else { 0 },
            "{kind}"
        );
    }
}

#[test]
fn test_muscle_offsets() {
    let model = PendulumChain::new(2).with_muscles(&["m0", "m1", "m2"]).shared();
    let phase = configure(PhaseDefinition::new(
        model,
        DynamicsType::MuscleExcitationsAndTorqueDriven,
    ));

    let nb_q = phase.nb_q();
    let nb_qdot = phase.nb_qdot();
    let nb_tau = phase.nb_tau();
    assert_eq!(phase.var_states().offset(MUSCLES), Some(nb_q + nb_qdot));
    assert_eq!(phase.var_controls().offset(MUSCLES), Some(nb_tau));
    assert_eq!(phase.nx(), 7);
    assert_eq!(phase.nu(), 5);
    assert_eq!(phase.muscle_names(), &["m0", "m1", "m2"]);

    let states_plot = &phase.plots()["muscles_states"];
    assert_eq!(states_plot.plot_type, PlotType::Integrated);
    assert_eq!(states_plot.ylim, Some((0.0, 1.0)));
    let control_plot = &phase.plots()["muscles_control"];
    assert_eq!(control_plot.plot_type, PlotType::Step);
    assert_eq!(control_plot.combine_to.as_deref(), Some("muscles_states"));
}

#[test]
fn test_muscle_activations_are_controls_only() {
    let model = PendulumChain::new(2).with_muscles(&["m0"]).shared();
    let phase = configure(PhaseDefinition::new(
        model,
        DynamicsType::MuscleActivationsDriven,
    ));

    assert_eq!(phase.nx(), 4);
    assert_eq!(phase.nu(), 1);
    assert!(!phase.var_states().contains(MUSCLES));
    assert_eq!(phase.var_controls().range(MUSCLES), Some(0..1));
    assert!(phase.plots()["muscles_control"].combine_to.is_none());

    // Muscle 0 drives dof 0 through its moment arm.
    let f = phase.dynamics_func().unwrap();
    let xdot = &f
        .eval(&[dvec(&[0.0; 4]), dvec(&[0.2]), dvec(&[])])
        .unwrap()[0];
    assert_relative_eq!(xdot[2], 0.2 * MOMENT_ARM * MAX_ISOMETRIC_FORCE, epsilon = 1e-9);
    assert_relative_eq!(xdot[3], 0.0);
}

#[test]
fn test_excitation_dynamics_rows() {
    let model = PendulumChain::new(1).with_muscles(&["m0"]).shared();
    let phase = configure(PhaseDefinition::new(model, DynamicsType::MuscleExcitationsDriven));
    assert_eq!(phase.nx(), 3);

    let f = phase.dynamics_func().unwrap();
    let x = dvec(&[0.0, 0.0, 0.1]);
    let rising = &f.eval(&[x.clone(), dvec(&[1.0]), dvec(&[])]).unwrap()[0];
    let falling = &f.eval(&[x, dvec(&[0.0]), dvec(&[])]).unwrap()[0];

    assert!(rising[2] > 0.0);
    assert!(falling[2] < 0.0);
    // Activation is faster than deactivation.
    assert!(rising[2].abs() > falling[2].abs());
}

#[test]
fn test_torque_activations_scale_controls() {
    let phase = configure(PhaseDefinition::new(
        PendulumChain::new(2).shared(),
        DynamicsType::TorqueActivationsDriven,
    ));
    assert_eq!(phase.nb_actuators(), phase.nb_tau());

    let f = phase.dynamics_func().unwrap();
    let xdot = &f
        .eval(&[dvec(&[0.0; 4]), dvec(&[0.5, -1.0]), dvec(&[])])
        .unwrap()[0];
    assert_relative_eq!(xdot[2], 0.5 * MAX_TORQUE);
    assert_relative_eq!(xdot[3], -MAX_TORQUE);
}

#[test]
fn test_symmetric_mapping() {
    let expand = IndexMapping::with_opposed(&[0, 1, 2, 2], &[3]).unwrap();
    let reduce = IndexMapping::from_indices([0, 1, 2]);
    let mapping = BidirectionalMapping::new(reduce, expand, 4).unwrap();

    let phase = configure(
        PhaseDefinition::new(PendulumChain::new(4).shared(), DynamicsType::TorqueDriven)
            .with_all_generalized_mapping(mapping),
    );

    assert_eq!(phase.nb_q(), 3);
    assert_eq!(phase.nx(), 6);
    assert_eq!(phase.nu(), 3);
    assert_eq!(phase.u().names(), vec!["Tau_d0", "Tau_d1", "Tau_d2"]);
    assert_eq!(phase.plots()[Q].legend, vec!["q_d0", "q_d1", "q_d2"]);

    let f = phase.dynamics_func().unwrap();
    let x = dvec(&[0.0, 0.0, 0.3, 0.0, 0.0, 0.7]);
    let u = dvec(&[0.0, 0.0, 1.0]);
    let xdot = &f.eval(&[x, u, dvec(&[])]).unwrap()[0];

    assert_eq!(xdot.len(), 6);
    assert_relative_eq!(xdot[2], 0.7);
    assert_relative_eq!(xdot[5], 1.0 - GRAVITY * 0.3_f64.sin(), epsilon = 1e-12);
}

#[test]
fn test_repeated_builds_have_identical_shapes() {
    let model = PendulumChain::new(3).with_muscles(&["a", "b"]).shared();
    let def = PhaseDefinition::new(model, DynamicsType::MuscleActivationsAndTorqueDriven);
    let recipe = optim_dynamics::builtin_dynamics(def.dynamics.kind()).unwrap();

    let mut builder = PhaseBuilder::new(0, def)
        .unwrap()
        .append_q_qdot()
        .unwrap()
        .append_tau()
        .unwrap()
        .append_muscles(optim_dynamics::MuscleDrive::Activation)
        .unwrap();

    builder
        .build_dynamics_function(&recipe, &Parameters::new())
        .unwrap();
    let first = builder.phase().dynamics_func().unwrap().clone();
    builder
        .build_dynamics_function(&recipe, &Parameters::new())
        .unwrap();
    let second = builder.phase().dynamics_func().unwrap().clone();

    assert!(!first.same_as(&second));
    for i in 0..3 {
        assert_eq!(first.size_in(i), second.size_in(i));
    }
    assert_eq!(first.size_out(0), second.size_out(0));
    assert_eq!(builder.phase().nx(), 6);
    assert_eq!(builder.phase().nu(), 5);
}

#[test]
fn test_override_takes_precedence() {
    let frozen: DynamicsFn = Arc::new(
        |x: &SymVector, _u: &SymVector, _p: &SymVector, _phase: &Phase| -> Result<DynamicsOutput> {
            Ok(SymVector::zeros(x.len()).into())
        },
    );
    let dynamics = Dynamics::new(DynamicsType::TorqueDriven).with_dynamics(frozen);
    let phase = configure(PhaseDefinition::new(PendulumChain::new(2).shared(), dynamics));

    let xdot = &phase
        .dynamics_func()
        .unwrap()
        .eval(&[dvec(&[1.0, 1.0, 1.0, 1.0]), dvec(&[3.0, 3.0]), dvec(&[])])
        .unwrap()[0];
    assert!(xdot.iter().all(|v| *v == 0.0));
}

#[test]
fn test_zero_muscles_rejected() {
    let def = PhaseDefinition::new(
        PendulumChain::new(2).shared(),
        DynamicsType::MuscleExcitationsDriven,
    );
    let mut ocp = OptimalControlProgram::new(vec![def]).unwrap();

    let err = ocp.configure_phase(0).unwrap_err();
    assert_eq!(
        err,
        OcpError::NoMuscles {
            dynamics: DynamicsType::MuscleExcitationsDriven
        }
    );
    assert!(err.is_config_error());
    assert!(!ocp.is_configured(0).unwrap());
}

#[test]
fn test_recipe_shape_error() {
    let short: DynamicsFn = Arc::new(
        |x: &SymVector, _u: &SymVector, _p: &SymVector, _phase: &Phase| -> Result<DynamicsOutput> {
            Ok(vec![x.slice(0..1)?].into())
        },
    );
    let def = PhaseDefinition::new(
        PendulumChain::new(2).shared(),
        Dynamics::new(DynamicsType::TorqueDriven).with_dynamics(short),
    );
    let mut ocp = OptimalControlProgram::new(vec![def]).unwrap();

    let err = ocp.configure_phase(0).unwrap_err();
    assert!(err.is_shape_error());
    assert_eq!(
        err,
        OcpError::ShapeMismatch {
            function: "ForwardDyn".into(),
            expected: 4,
            actual: 1
        }
    );
    assert!(!ocp.is_configured(0).unwrap());
}

#[test]
fn test_plot_bounds_follow_blocks() {
    let x_bounds = Bounds::new(vec![-1.0, -2.0, -3.0, -4.0], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let u_bounds = Bounds::uniform(2, -10.0, 10.0);
    let phase = configure(
        PhaseDefinition::new(PendulumChain::new(2).shared(), DynamicsType::TorqueDriven)
            .with_x_bounds(x_bounds)
            .with_u_bounds(u_bounds),
    );

    let q_dot = phase.plots()[Q_DOT].bounds.as_ref().unwrap();
    assert_eq!(q_dot.min.as_slice(), &[-3.0, -4.0]);
    let tau = phase.plots()[TAU].bounds.as_ref().unwrap();
    assert_relative_eq!(tau.max[1], 10.0);
    assert_eq!(phase.plots()[TAU].plot_type, PlotType::Step);
    assert_eq!(phase.plots()[Q].plot_type, PlotType::Integrated);
}

#[test]
fn test_short_control_bounds_rejected() {
    let def = PhaseDefinition::new(
        PendulumChain::new(2).with_muscles(&["m"]).shared(),
        DynamicsType::MuscleActivationsAndTorqueDriven,
    )
    .with_u_bounds(Bounds::uniform(2, 0.0, 1.0));
    let mut ocp = OptimalControlProgram::new(vec![def]).unwrap();

    let err = ocp.configure_phase(0).unwrap_err();
    assert!(err.is_config_error());
    assert!(matches!(err, OcpError::Types(_)));
}
