#![forbid(unsafe_code)]

use std::path::PathBuf;

use horn_smt::{SolverChoice, SolverKind, SolverSettings};
use serde::{Deserialize, Serialize};

/// User-facing model checker options, as read from configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelCheckerSettings {
    /// Backends allowed to run, tried in the order z3-lib, z3, golem.
    pub solvers: Vec<SolverKind>,
    pub timeout_ms: Option<u64>,
    pub z3_path: Option<PathBuf>,
    pub golem_path: Option<PathBuf>,
}

impl Default for ModelCheckerSettings {
    fn default() -> Self {
        Self {
            solvers: vec![SolverKind::Z3Lib, SolverKind::Z3, SolverKind::Golem],
            timeout_ms: None,
            z3_path: None,
            golem_path: None,
        }
    }
}

impl ModelCheckerSettings {
    /// Export-only: every query ends up in `unhandled_queries`.
    pub fn export_only() -> Self {
        Self {
            solvers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            choice: SolverChoice::from_kinds(&self.solvers),
            timeout_ms: self.timeout_ms,
            z3_path: self.z3_path.clone(),
            golem_path: self.golem_path.clone(),
        }
    }
}
