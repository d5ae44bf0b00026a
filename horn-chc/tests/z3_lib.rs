#![cfg(feature = "z3")]

mod common;

use horn_smt::solver::z3_lib::Z3LibSolver;

use common::{constant_assertion, counting_loop, external_call_between, proved};

fn solver() -> Box<Z3LibSolver> {
    Box::new(Z3LibSolver::new(Some(20_000)))
}

#[test]
fn in_process_backend_proves_and_refutes() {
    assert_eq!(proved(solver(), &constant_assertion(3, 3)), vec![true]);
    assert_eq!(proved(solver(), &constant_assertion(3, 4)), vec![false]);
}

#[test]
fn in_process_backend_handles_loops_and_unknown_calls() {
    assert_eq!(proved(solver(), &counting_loop()), vec![true]);
    assert_eq!(proved(solver(), &external_call_between()), vec![false]);
}
