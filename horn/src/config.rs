#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use horn_chc::ModelCheckerSettings;
use horn_smt::{SolverError, SolverKind};
use miette::Diagnostic;
use thiserror::Error;

pub const CONFIG_FILE: &str = "horn.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(horn::config))]
pub struct ConfigError {
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedConfig {
    pub config_path: Option<PathBuf>,
    pub project_root: PathBuf,
    pub settings: ModelCheckerSettings,
    /// Directory receiving `<sha256>.smt2` files for unanswered queries.
    pub export_queries: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn empty(project_root: PathBuf) -> Self {
        Self {
            config_path: None,
            project_root,
            settings: ModelCheckerSettings::default(),
            export_queries: None,
        }
    }

    /// Command-line flags win over `horn.toml`.
    pub fn apply_overrides(
        &mut self,
        solvers: &[String],
        timeout_ms: Option<u64>,
        export_queries: Option<PathBuf>,
    ) -> Result<(), ConfigError> {
        if !solvers.is_empty() {
            self.settings.solvers = parse_solvers(solvers).map_err(|e| ConfigError {
                message: e.to_string(),
            })?;
        }
        if timeout_ms.is_some() {
            self.settings.timeout_ms = timeout_ms;
        }
        if export_queries.is_some() {
            self.export_queries = export_queries;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    solver: Option<SolverSection>,

    #[serde(default)]
    output: Option<OutputSection>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SolverSection {
    #[serde(default)]
    enabled: Option<Vec<String>>,

    #[serde(default)]
    timeout_ms: Option<u64>,

    #[serde(default)]
    z3_path: Option<String>,

    #[serde(default)]
    golem_path: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    #[serde(default)]
    export_queries: Option<String>,
}

/// Solver names as accepted on the command line; `none` enables nothing.
pub fn parse_solvers<S: AsRef<str>>(names: &[S]) -> Result<Vec<SolverKind>, SolverError> {
    let mut out = Vec::new();
    for name in names.iter().map(AsRef::as_ref).filter(|n| *n != "none") {
        let kind: SolverKind = name.parse()?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    Ok(out)
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        match cur.parent() {
            Some(p) => cur = p.to_path_buf(),
            None => return None,
        }
    }
}

pub fn load_resolved_config(start: &Path) -> Result<ResolvedConfig, ConfigError> {
    let project_root = if start.is_file() {
        start
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    } else {
        start.to_path_buf()
    };

    let Some(config_path) = find_config(&project_root) else {
        return Ok(ResolvedConfig::empty(project_root));
    };

    let config_dir = config_path
        .parent()
        .ok_or_else(|| ConfigError {
            message: "config file has no parent directory".to_string(),
        })?
        .to_path_buf();

    let raw = fs::read_to_string(&config_path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", config_path.display()),
    })?;

    let parsed: ConfigFile = toml::from_str(&raw).map_err(|e| ConfigError {
        message: format!("failed to parse {}: {e}", config_path.display()),
    })?;

    let mut out = ResolvedConfig {
        config_path: Some(config_path.clone()),
        project_root: config_dir.clone(),
        ..ResolvedConfig::default()
    };

    if let Some(solver) = parsed.solver {
        if let Some(enabled) = solver.enabled {
            out.settings.solvers = parse_solvers(&enabled).map_err(|e| ConfigError {
                message: format!("{}: {e}", config_path.display()),
            })?;
        }
        out.settings.timeout_ms = solver.timeout_ms;
        out.settings.z3_path = solver.z3_path.map(|p| resolve_path(&config_dir, &p));
        out.settings.golem_path = solver.golem_path.map(|p| resolve_path(&config_dir, &p));
    }

    if let Some(output) = parsed.output {
        out.export_queries = output.export_queries.map(|p| resolve_path(&config_dir, &p));
    }

    Ok(out)
}

fn resolve_path(base: &Path, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() { pb } else { base.join(pb) }
}
