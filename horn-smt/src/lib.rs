#![forbid(unsafe_code)]

//! Horn-clause terms, SMT-LIB2 rendering and solver backends.

pub mod predicate;
pub mod process;
pub mod script;
pub mod smtlib2;
pub mod solver;
pub mod sort;
pub mod term;

pub use predicate::{PredicateDecl, SortError};
pub use process::{ExternalBackend, ProcessSolver, find_executable};
pub use script::{HornScript, universal_closure};
pub use smtlib2::{ReadCallback, ResponseCache, SMT_QUERY_KIND, SmtLib2Interface, query_hash};
pub use solver::{
    CheckResult, HornSolver, SolverChoice, SolverError, SolverKind, SolverSettings, select_solver,
};
pub use sort::{FunctionSort, Sort};
pub use term::{Op, Term, Variable};
