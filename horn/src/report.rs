#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use horn_ast::{NodeId, Span};
use horn_chc::{ChcDiagnostic, VerificationTarget};
use horn_smt::{CheckResult, query_hash};
use miette::{IntoDiagnostic, Severity};
use serde::Serialize;

pub const SCHEMA: &str = "horn.chc.report.v1";

#[derive(Debug, Clone, Serialize)]
pub struct SpanRange {
    pub offset: usize,
    pub len: usize,
}

impl From<Span> for SpanRange {
    fn from(s: Span) -> Self {
        Self {
            offset: s.offset,
            len: s.len,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChcReport {
    pub schema: &'static str,
    pub input: String,
    pub solver: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub assertions: Vec<AssertionReport>,
    pub encoding: EncodingSummary,
    /// SHA-256 of every query no backend answered.
    pub unhandled_queries: Vec<String>,
    pub diagnostics: Vec<DiagnosticReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssertionReport {
    pub assertion: NodeId,
    pub contract: String,
    pub function: String,
    pub span: SpanRange,
    pub proved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<CheckResult>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EncodingSummary {
    pub predicates: usize,
    pub rules: usize,
    pub unknown_calls: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub severity: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanRange>,
}

impl From<&ChcDiagnostic> for DiagnosticReport {
    fn from(d: &ChcDiagnostic) -> Self {
        Self {
            severity: severity_name(d.severity),
            code: d.code,
            message: d.message.clone(),
            span: d.span.map(SpanRange::from),
        }
    }
}

fn severity_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Advice => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

impl ChcReport {
    pub fn new(input: &Path, solver: &'static str) -> Self {
        Self {
            schema: SCHEMA,
            input: display_path(input),
            solver,
            ok: true,
            error: None,
            assertions: Vec::new(),
            encoding: EncodingSummary::default(),
            unhandled_queries: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record_targets<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a VerificationTarget>,
        proved: impl Fn(NodeId) -> bool,
    ) {
        for t in targets {
            self.assertions.push(AssertionReport {
                assertion: t.assertion,
                contract: t.contract.clone(),
                function: t.function.clone(),
                span: t.span.into(),
                proved: proved(t.assertion),
                verdict: t.verdict,
            });
        }
    }

    pub fn record_unhandled(&mut self, queries: &[String]) {
        self.unhandled_queries = queries.iter().map(|q| query_hash(q)).collect();
    }

    pub fn record_diagnostics(&mut self, diagnostics: &[ChcDiagnostic]) {
        self.diagnostics = diagnostics.iter().map(DiagnosticReport::from).collect();
    }

    pub fn fail(&mut self, error: impl ToString) {
        self.ok = false;
        self.error = Some(error.to_string());
    }

    pub fn proved_count(&self) -> usize {
        self.assertions.iter().filter(|a| a.proved).count()
    }
}

pub fn write_report(report: &ChcReport, out_path: &Path) -> miette::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    let json = serde_json::to_string_pretty(report).into_diagnostic()?;
    std::fs::write(out_path, json).into_diagnostic()?;
    Ok(())
}

/// Writes each query to `<dir>/<sha256>.smt2` so it can be solved offline
/// and fed back through a response file.
pub fn export_queries(dir: &Path, queries: &[String]) -> miette::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).into_diagnostic()?;
    let mut written = Vec::with_capacity(queries.len());
    for q in queries {
        let path = dir.join(format!("{}.smt2", query_hash(q)));
        std::fs::write(&path, q).into_diagnostic()?;
        written.push(path);
    }
    Ok(written)
}

pub fn display_path(path: &Path) -> String {
    // Keep output stable and mostly relative for CI artifacts.
    let p = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let s = p.to_string_lossy().replace('\\', "/");

    if let Ok(cwd) = std::env::current_dir() {
        let cwd_s = cwd.to_string_lossy().replace('\\', "/");
        if let Some(rest) = s.strip_prefix(&format!("{cwd_s}/")) {
            return rest.to_string();
        }
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: u32, verdict: CheckResult) -> VerificationTarget {
        VerificationTarget {
            assertion: NodeId(id),
            span: Span::new(10, 4),
            contract: "Vault".to_string(),
            function: "withdraw".to_string(),
            error_index: u64::from(id),
            verdict: Some(verdict),
        }
    }

    #[test]
    fn report_serializes_with_schema_and_verdicts() {
        let mut report = ChcReport::new(Path::new("vault.ast.json"), "z3");
        let targets = [
            target(1, CheckResult::Unsatisfiable),
            target(2, CheckResult::Unknown),
        ];
        report.record_targets(&targets, |id| id == NodeId(1));
        report.record_unhandled(&["(check-sat)\n".to_string()]);

        assert_eq!(report.proved_count(), 1);
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["schema"], SCHEMA);
        assert_eq!(json["ok"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["assertions"][0]["assertion"], 1);
        assert_eq!(json["assertions"][0]["verdict"], "unsatisfiable");
        assert_eq!(json["assertions"][1]["proved"], false);
        assert_eq!(json["assertions"][1]["span"]["offset"], 10);
        assert_eq!(
            json["unhandled_queries"][0],
            query_hash("(check-sat)\n").as_str()
        );
    }

    #[test]
    fn failed_run_carries_the_error() {
        let mut report = ChcReport::new(Path::new("x.json"), "smtlib2");
        report.fail("internal encoder error: no current block");
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "internal encoder error: no current block");
    }

    #[test]
    fn exported_queries_are_named_by_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let queries = vec!["(set-logic HORN)\n(check-sat)\n".to_string()];
        let written = export_queries(&dir.path().join("queries"), &queries).expect("export");
        assert_eq!(written.len(), 1);
        let name = written[0]
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert_eq!(name, format!("{}.smt2", query_hash(&queries[0])));
        assert_eq!(std::fs::read_to_string(&written[0]).expect("read"), queries[0]);
    }
}
