#![forbid(unsafe_code)]

//! Horn solvers run as child processes, one process per query.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::predicate::PredicateDecl;
use crate::script::HornScript;
use crate::solver::{CheckResult, HornSolver, SolverError};
use crate::term::Term;

/// Extra time a process gets past its own timeout before it is killed.
const KILL_GRACE: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalBackend {
    Z3,
    Golem,
}

impl ExternalBackend {
    pub fn program(self) -> &'static str {
        match self {
            ExternalBackend::Z3 => "z3",
            ExternalBackend::Golem => "golem",
        }
    }
}

/// First `name` found on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(name);
        #[cfg(windows)]
        let full = full.with_extension("exe");
        full.is_file().then_some(full)
    })
}

pub struct ProcessSolver {
    backend: ExternalBackend,
    program: PathBuf,
    timeout_ms: Option<u64>,
    script: HornScript,
}

impl ProcessSolver {
    pub fn new(backend: ExternalBackend, program: PathBuf, timeout_ms: Option<u64>) -> Self {
        Self {
            backend,
            program,
            timeout_ms,
            script: HornScript::new(),
        }
    }

    /// `Ok(None)` when the process had to be killed.
    fn run(&self, text: &str) -> io::Result<Option<String>> {
        let mut cmd = Command::new(&self.program);
        // Golem reads from a file only; keep it alive until the child exits.
        let mut input_file = None;
        match self.backend {
            ExternalBackend::Z3 => {
                cmd.arg("-smt2").arg("-in");
                if let Some(ms) = self.timeout_ms {
                    cmd.arg(format!("-t:{ms}"));
                }
                cmd.stdin(Stdio::piped());
            }
            ExternalBackend::Golem => {
                let mut tmp = tempfile::NamedTempFile::with_suffix(".smt2")?;
                tmp.write_all(text.as_bytes())?;
                tmp.flush()?;
                cmd.arg("--input").arg(tmp.path());
                cmd.stdin(Stdio::null());
                input_file = Some(tmp);
            }
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let stdout = child.stdout.take().map(|mut s| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = s.read_to_string(&mut buf);
                buf
            })
        });
        let stderr = child.stderr.take().map(|mut s| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = s.read_to_string(&mut buf);
                buf
            })
        });

        let deadline = self
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms) + KILL_GRACE);
        loop {
            match child.try_wait()? {
                Some(status) => {
                    trace!(%status, "solver process exited");
                    break;
                }
                None if deadline.is_some_and(|d| Instant::now() >= d) => {
                    debug!(program = %self.program.display(), "killing solver after timeout");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                None => thread::sleep(Duration::from_millis(20)),
            }
        }
        drop(input_file);

        let out = stdout.and_then(|t| t.join().ok()).unwrap_or_default();
        let err = stderr.and_then(|t| t.join().ok()).unwrap_or_default();
        if !err.trim().is_empty() {
            trace!(stderr = %err.trim(), "solver stderr");
        }
        Ok(Some(out))
    }
}

impl HornSolver for ProcessSolver {
    fn name(&self) -> &'static str {
        self.backend.program()
    }

    fn register_relation(&mut self, predicate: &PredicateDecl) {
        self.script.declare(predicate);
    }

    fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError> {
        self.script.add_rule(rule, name)
    }

    fn query(&mut self, query: &Term) -> Result<CheckResult, SolverError> {
        let text = self.script.query_text(query)?;
        let result = match self.run(&text) {
            Ok(Some(out)) => CheckResult::from_horn_answer(&out),
            Ok(None) => CheckResult::Unknown,
            Err(e) => {
                warn!(program = %self.program.display(), error = %e, "failed to run Horn solver");
                CheckResult::Error
            }
        };
        trace!(solver = self.name(), %result, "query answered");
        Ok(result)
    }
}
