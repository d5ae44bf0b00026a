#![forbid(unsafe_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{Parser, Subcommand};
use miette::{Diagnostic, IntoDiagnostic, NamedSource};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use horn_ast::SourceUnit;
use horn_chc::{Chc, ErrorReporter};
use horn_smt::{ResponseCache, SolverKind, find_executable};

mod config;
mod report;

use report::{ChcReport, display_path};

#[derive(Parser, Debug)]
#[command(name = "horn", version, about = "Constrained-Horn-Clause verifier for contracts")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode a resolved AST as Horn clauses and check every assertion
    Check {
        /// Resolved AST (JSON)
        path: PathBuf,

        /// Contract source the AST spans point into, for rendering diagnostics
        #[arg(long)]
        source: Option<PathBuf>,

        /// JSON map from query SHA-256 to a solver response
        #[arg(long)]
        responses: Option<PathBuf>,

        /// Enabled solver (repeatable): `z3-lib`, `z3`, `golem` or `none`. Overrides `horn.toml`.
        #[arg(long = "solver")]
        solvers: Vec<String>,

        /// Per-query solver timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Write unanswered queries to `<DIR>/<sha256>.smt2`
        #[arg(long)]
        export_queries: Option<PathBuf>,

        /// Print the machine-readable report (JSON) instead of the summary
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write the machine-readable report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List solver backends and whether each can be used
    Solvers {
        /// Directory used to discover `horn.toml`
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Debug, Error, Diagnostic)]
#[error("failed to read {path}: {message}")]
#[diagnostic(code(horn::input))]
struct InputError {
    path: String,
    message: String,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HORN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> miette::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Check {
            path,
            source,
            responses,
            solvers,
            timeout_ms,
            export_queries,
            json,
            report,
        } => {
            let mut resolved = config::load_resolved_config(&path).map_err(miette::Report::new)?;
            resolved
                .apply_overrides(&solvers, timeout_ms, export_queries)
                .map_err(miette::Report::new)?;
            if let Some(cfg) = &resolved.config_path {
                debug!(config = %cfg.display(), "using configuration");
            }
            check(&path, source.as_deref(), responses.as_deref(), &resolved, json, report.as_deref())
        }
        Cmd::Solvers { path } => {
            let resolved = config::load_resolved_config(&path).map_err(miette::Report::new)?;
            list_solvers(&resolved);
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|e| InputError {
        path: display_path(path),
        message: e.to_string(),
    })
}

fn load_unit(path: &Path) -> Result<SourceUnit, InputError> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).map_err(|e| InputError {
        path: display_path(path),
        message: format!("invalid AST: {e}"),
    })
}

fn load_responses(path: Option<&Path>) -> Result<ResponseCache, InputError> {
    let Some(path) = path else {
        return Ok(ResponseCache::new());
    };
    let raw = read_input(path)?;
    serde_json::from_str(&raw).map_err(|e| InputError {
        path: display_path(path),
        message: format!("invalid response file: {e}"),
    })
}

fn check(
    path: &Path,
    source: Option<&Path>,
    responses: Option<&Path>,
    resolved: &config::ResolvedConfig,
    json: bool,
    report_path: Option<&Path>,
) -> miette::Result<()> {
    let started = Instant::now();
    let unit = load_unit(path)?;
    let responses = load_responses(responses)?;
    let named = match source {
        Some(p) => Some(NamedSource::new(display_path(p), read_input(p)?)),
        None => None,
    };

    let mut reporter = ErrorReporter::new();
    let (mut out, result, unhandled) = {
        let mut chc = Chc::new(&mut reporter, &resolved.settings, responses, None);
        let mut out = ChcReport::new(path, chc.solver_name());
        let result = chc.analyze(&unit);
        let safe = chc.safe_assertions().clone();
        out.record_targets(chc.verification_targets(), |id| safe.contains(&id));
        out.encoding.predicates = chc.predicates().count();
        out.encoding.rules = chc.rule_count();
        out.encoding.unknown_calls = chc.unknown_function_call_seen();
        let unhandled = chc.unhandled_queries();
        (out, result, unhandled)
    };
    out.record_unhandled(&unhandled);
    out.record_diagnostics(reporter.diagnostics());
    if let Err(e) = &result {
        out.fail(e);
    }

    for d in reporter.take() {
        let rendered = match &named {
            Some(src) => miette::Report::new(d).with_source_code(src.clone()),
            None => miette::Report::new(d),
        };
        eprintln!("{rendered:?}");
    }

    if let Some(dir) = &resolved.export_queries {
        let written = report::export_queries(dir, &unhandled)?;
        if !written.is_empty() {
            eprintln!("exported {} query file(s) to {}", written.len(), dir.display());
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
    } else {
        for a in &out.assertions {
            println!(
                "{}.{}: assertion at {}: {}",
                a.contract,
                a.function,
                a.span.offset,
                if a.proved { "proved safe" } else { "not proved" }
            );
        }
        println!(
            "{} of {} assertion(s) proved safe (solver: {})",
            out.proved_count(),
            out.assertions.len(),
            out.solver
        );
    }

    if let Some(p) = report_path {
        report::write_report(&out, p)?;
    }

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "check finished");

    result.map_err(|e| match &named {
        Some(src) => miette::Report::new(e).with_source_code(src.clone()),
        None => miette::Report::new(e),
    })
}

fn list_solvers(resolved: &config::ResolvedConfig) {
    let enabled = |kind: SolverKind| resolved.settings.solvers.contains(&kind);
    let status = |found: Option<PathBuf>| match found {
        Some(p) => format!("available ({})", p.display()),
        None => "not found".to_string(),
    };

    let z3_lib = if cfg!(feature = "z3") {
        "available (in-process)".to_string()
    } else {
        "not compiled in (build with --features z3)".to_string()
    };
    let z3 = resolved
        .settings
        .z3_path
        .clone()
        .filter(|p| p.exists())
        .or_else(|| find_executable("z3"));
    let golem = resolved
        .settings
        .golem_path
        .clone()
        .filter(|p| p.exists())
        .or_else(|| find_executable("golem"));

    let rows = [
        (SolverKind::Z3Lib, z3_lib),
        (SolverKind::Z3, status(z3)),
        (SolverKind::Golem, status(golem)),
    ];
    for (kind, state) in rows {
        let flag = if enabled(kind) { "enabled" } else { "disabled" };
        println!("{:<7} {flag:<9} {state}", kind.to_string());
    }
    if resolved.settings.solvers.is_empty() {
        println!("no solver enabled: queries are exported only");
    }
}
