#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::predicate::{PredicateDecl, SortError};
use crate::process::{ExternalBackend, ProcessSolver, find_executable};
use crate::smtlib2::{ReadCallback, ResponseCache, SmtLib2Interface};
use crate::term::Term;

#[derive(Debug, Error, Diagnostic)]
pub enum SolverError {
    #[error("Horn rule `{name}` rejected: {reason}")]
    #[diagnostic(code(horn::smt::rule))]
    RuleRejected { name: String, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sort(#[from] SortError),

    #[error("unknown solver `{0}`")]
    #[diagnostic(
        code(horn::smt::config),
        help("expected one of: z3-lib, z3, golem, none")
    )]
    UnknownSolver(String),
}

/// Outcome of a reachability query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    /// The queried state is unreachable.
    Unsatisfiable,
    /// The queried state is reachable.
    Satisfiable,
    Unknown,
    Error,
}

impl CheckResult {
    /// Interprets a Horn solver's `check-sat` answer. Horn solvers answer
    /// `sat` when the rules have a model, i.e. the query is unreachable.
    pub fn from_horn_answer(output: &str) -> Self {
        let mut answer = None;
        for line in output.lines().map(str::trim) {
            if line.starts_with("(error") {
                return CheckResult::Error;
            }
            if answer.is_none() {
                answer = match line {
                    "sat" => Some(CheckResult::Unsatisfiable),
                    "unsat" => Some(CheckResult::Satisfiable),
                    "unknown" | "timeout" => Some(CheckResult::Unknown),
                    _ => None,
                };
            }
        }
        answer.unwrap_or(CheckResult::Error)
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckResult::Unsatisfiable => "unsatisfiable",
            CheckResult::Satisfiable => "satisfiable",
            CheckResult::Unknown => "unknown",
            CheckResult::Error => "error",
        })
    }
}

/// Horn-clause solver boundary used by the encoder.
pub trait HornSolver {
    fn name(&self) -> &'static str;

    fn register_relation(&mut self, predicate: &PredicateDecl);

    /// Adds `rule`, universally closed over its free variables. An error is
    /// fatal for the current analysis.
    fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError>;

    /// Asks whether any state satisfying `query` is derivable.
    fn query(&mut self, query: &Term) -> Result<CheckResult, SolverError>;

    /// Query scripts no backend answered.
    fn unhandled_queries(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    Z3Lib,
    Z3,
    Golem,
}

impl FromStr for SolverKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "z3-lib" => Ok(SolverKind::Z3Lib),
            "z3" => Ok(SolverKind::Z3),
            "golem" => Ok(SolverKind::Golem),
            other => Err(SolverError::UnknownSolver(other.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverKind::Z3Lib => "z3-lib",
            SolverKind::Z3 => "z3",
            SolverKind::Golem => "golem",
        })
    }
}

/// Which backends may be tried, in priority order z3-lib, z3, golem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverChoice {
    pub z3_lib: bool,
    pub z3: bool,
    pub golem: bool,
}

impl SolverChoice {
    pub fn all() -> Self {
        Self {
            z3_lib: true,
            z3: true,
            golem: true,
        }
    }

    pub fn none() -> Self {
        Self {
            z3_lib: false,
            z3: false,
            golem: false,
        }
    }

    pub fn from_kinds(kinds: &[SolverKind]) -> Self {
        let mut c = Self::none();
        for k in kinds {
            match k {
                SolverKind::Z3Lib => c.z3_lib = true,
                SolverKind::Z3 => c.z3 = true,
                SolverKind::Golem => c.golem = true,
            }
        }
        c
    }

    pub fn is_none(&self) -> bool {
        !(self.z3_lib || self.z3 || self.golem)
    }
}

impl Default for SolverChoice {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverSettings {
    pub choice: SolverChoice,
    /// Per-query timeout; `None` lets the solver run to completion.
    pub timeout_ms: Option<u64>,
    pub z3_path: Option<PathBuf>,
    pub golem_path: Option<PathBuf>,
}

/// Picks the first enabled and available backend. Falls back to the
/// export-only interface, which answers from `responses` or `callback`.
pub fn select_solver(
    settings: &SolverSettings,
    responses: ResponseCache,
    callback: Option<ReadCallback>,
) -> Box<dyn HornSolver> {
    let choice = settings.choice;

    if choice.z3_lib {
        #[cfg(feature = "z3")]
        {
            debug!("using in-process z3");
            return Box::new(z3_lib::Z3LibSolver::new(settings.timeout_ms));
        }
        #[cfg(not(feature = "z3"))]
        debug!("in-process z3 requested but not compiled in");
    }

    if choice.z3 {
        let path = settings.z3_path.clone().or_else(|| find_executable("z3"));
        match path {
            Some(path) => {
                debug!(path = %path.display(), "using z3 executable");
                return Box::new(ProcessSolver::new(ExternalBackend::Z3, path, settings.timeout_ms));
            }
            None => debug!("z3 executable not found on PATH"),
        }
    }

    if choice.golem {
        let path = settings
            .golem_path
            .clone()
            .or_else(|| find_executable("golem"));
        match path {
            Some(path) => {
                debug!(path = %path.display(), "using golem executable");
                return Box::new(ProcessSolver::new(
                    ExternalBackend::Golem,
                    path,
                    settings.timeout_ms,
                ));
            }
            None => debug!("golem executable not found on PATH"),
        }
    }

    if !choice.is_none() {
        warn!("no enabled Horn solver is available; queries will be exported only");
    }
    Box::new(SmtLib2Interface::new(responses, callback))
}

#[cfg(feature = "z3")]
pub mod z3_lib {
    use super::{CheckResult, HornSolver, SolverError};
    use crate::predicate::PredicateDecl;
    use crate::script::HornScript;
    use crate::term::Term;

    use tracing::trace;
    use z3::{Config, Context, Params, SatResult, Solver};

    /// Links libz3 and feeds it the rendered Horn script per query.
    pub struct Z3LibSolver {
        ctx: Context,
        script: HornScript,
        timeout_ms: Option<u64>,
    }

    impl Z3LibSolver {
        pub fn new(timeout_ms: Option<u64>) -> Self {
            let cfg = Config::new();
            Self {
                ctx: Context::new(&cfg),
                script: HornScript::new(),
                timeout_ms,
            }
        }
    }

    impl HornSolver for Z3LibSolver {
        fn name(&self) -> &'static str {
            "z3-lib"
        }

        fn register_relation(&mut self, predicate: &PredicateDecl) {
            self.script.declare(predicate);
        }

        fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError> {
            self.script.add_rule(rule, name)
        }

        fn query(&mut self, query: &Term) -> Result<CheckResult, SolverError> {
            let text = self.script.assertions(query)?;
            let solver = Solver::new_for_logic(&self.ctx, "HORN")
                .unwrap_or_else(|| Solver::new(&self.ctx));
            if let Some(ms) = self.timeout_ms {
                let mut params = Params::new(&self.ctx);
                params.set_u32("timeout", u32::try_from(ms).unwrap_or(u32::MAX));
                solver.set_params(&params);
            }
            solver.from_string(text);
            let result = match solver.check() {
                SatResult::Sat => CheckResult::Unsatisfiable,
                SatResult::Unsat => CheckResult::Satisfiable,
                SatResult::Unknown => CheckResult::Unknown,
            };
            trace!(%result, "z3-lib answered");
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horn_answers_are_inverted() {
        assert_eq!(CheckResult::from_horn_answer("sat\n"), CheckResult::Unsatisfiable);
        assert_eq!(CheckResult::from_horn_answer("unsat\n"), CheckResult::Satisfiable);
        assert_eq!(CheckResult::from_horn_answer("unknown"), CheckResult::Unknown);
        assert_eq!(CheckResult::from_horn_answer("timeout\n"), CheckResult::Unknown);
        assert_eq!(CheckResult::from_horn_answer(""), CheckResult::Error);
        assert_eq!(
            CheckResult::from_horn_answer("(error \"line 2: unknown constant\")\nsat\n"),
            CheckResult::Error
        );
    }

    #[test]
    fn solver_names_parse() {
        let kinds = ["z3", "golem"]
            .iter()
            .map(|n| n.parse::<SolverKind>())
            .collect::<Result<Vec<_>, _>>()
            .expect("names");
        assert_eq!(
            SolverChoice::from_kinds(&kinds),
            SolverChoice {
                z3_lib: false,
                z3: true,
                golem: true
            }
        );
        assert!(SolverChoice::from_kinds(&[]).is_none());
        let err = "cvc5".parse::<SolverKind>().expect_err("unknown");
        assert!(err.to_string().contains("cvc5"), "unexpected message: {err}");
    }

    #[test]
    fn disabled_solvers_fall_back_to_export_only() {
        let settings = SolverSettings {
            choice: SolverChoice::none(),
            ..SolverSettings::default()
        };
        let solver = select_solver(&settings, ResponseCache::default(), None);
        assert_eq!(solver.name(), "smtlib2");
    }
}
