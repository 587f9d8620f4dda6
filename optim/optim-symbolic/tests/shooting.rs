//! A shooting step built on top of a compiled dynamics function: the way
//! a transcription composes `ForwardDyn` into its continuity constraints.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use nalgebra::DVector;
use optim_symbolic::{Expr, Function, SymVector, SymbolicError};

const G: f64 = 9.81;
const DT: f64 = 0.1;

fn pendulum() -> Function {
    let x = SymVector::sym("x", 2);
    let xdot = SymVector::from_exprs(vec![x[1].clone(), x[0].sin() * -G]);
    Function::new("ForwardDyn", [("x", x)], [("xdot", xdot)]).unwrap()
}

fn euler_step(dynamics: &Function) -> Function {
    let x = SymVector::sym("x0", 2);
    let xdot = dynamics.call(&[x.clone()]).unwrap().remove(0);
    let next = x.try_add(&xdot.scale(&Expr::constant(DT))).unwrap();
    Function::new("step", [("x0", x)], [("xf", next)]).unwrap()
}

#[test]
fn test_step_matches_expanded_step() {
    let step = euler_step(&pendulum());
    let flat = step.expand();
    assert!(!step.is_expanded());
    assert!(flat.is_expanded());

    let x0 = DVector::from_vec(vec![0.4, -0.2]);
    let nested = step.eval(&[x0.clone()]).unwrap();
    let expanded = flat.eval(&[x0]).unwrap();
    for k in 0..2 {
        assert_relative_eq!(nested[0][k], expanded[0][k], epsilon = 1e-12);
    }
    assert_relative_eq!(nested[0][0], 0.4 - 0.02, epsilon = 1e-12);
    assert_relative_eq!(nested[0][1], -0.2 - DT * G * 0.4_f64.sin(), epsilon = 1e-12);
}

#[test]
fn test_step_jacobian() {
    let jac = euler_step(&pendulum()).jacobian(0, 0).unwrap();
    assert_eq!(jac.size_out(0), 4);

    let j = jac.eval(&[DVector::from_vec(vec![0.0, 1.0])]).unwrap();
    assert_relative_eq!(j[0][0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(j[0][1], DT, epsilon = 1e-12);
    assert_relative_eq!(j[0][2], -DT * G, epsilon = 1e-12);
    assert_relative_eq!(j[0][3], 1.0, epsilon = 1e-12);
}

#[test]
fn test_call_checks_shapes() {
    let err = pendulum().call(&[SymVector::sym("y", 3)]).unwrap_err();
    assert_eq!(
        err,
        SymbolicError::ArgumentShape {
            function: "ForwardDyn".into(),
            input: 0,
            expected: 2,
            actual: 3,
        }
    );
}
