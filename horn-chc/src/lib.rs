#![forbid(unsafe_code)]

//! Constrained-Horn-Clause model checking of contracts.
//!
//! [`Chc`] walks a resolved [`horn_ast::SourceUnit`] once, allocating a
//! predicate per program point and a Horn rule per control-flow edge, and
//! asks a [`horn_smt::HornSolver`] whether any assertion's error state is
//! reachable. Assertions proved unreachable end up in
//! [`Chc::safe_assertions`]; everything else is "not proved".

mod arith;
mod context;
mod diagnostics;
mod encoder;
mod expressions;
mod predicates;
mod scan;
mod settings;
mod sorts;
mod statements;

pub use context::{EncodingContext, SymbolicVariable};
pub use diagnostics::{ChcDiagnostic, ChcError, ErrorReporter};
pub use encoder::{Chc, VerificationTarget};
pub use predicates::{Predicate, PredicateArena, PredicateId, PredicateKind};
pub use scan::{CallScan, scan_contract};
pub use settings::ModelCheckerSettings;
pub use sorts::{block_sort, function_sort, summary_sort};
