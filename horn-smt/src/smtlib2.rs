#![forbid(unsafe_code)]

//! Export-only backend: queries are answered from previously recorded
//! responses or a host callback, and otherwise kept as unhandled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::predicate::PredicateDecl;
use crate::script::HornScript;
use crate::solver::{CheckResult, HornSolver, SolverError};
use crate::term::Term;

/// Kind string passed to a [`ReadCallback`] for solver queries.
pub const SMT_QUERY_KIND: &str = "smt-query";

/// Host hook `(kind, query_text) -> response`.
pub type ReadCallback = Box<dyn FnMut(&str, &str) -> Result<String, String>>;

/// Lowercase hex SHA-256 of a query script.
pub fn query_hash(query_text: &str) -> String {
    hex::encode(Sha256::digest(query_text.as_bytes()))
}

/// Solver answers keyed by the hash of the exact query text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCache {
    responses: BTreeMap<String, String>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, query_text: &str, response: impl Into<String>) {
        self.responses.insert(query_hash(query_text), response.into());
    }

    pub fn get(&self, query_text: &str) -> Option<&str> {
        self.responses.get(&query_hash(query_text)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

pub struct SmtLib2Interface {
    script: HornScript,
    responses: ResponseCache,
    callback: Option<ReadCallback>,
    unhandled: Vec<String>,
}

impl SmtLib2Interface {
    pub fn new(responses: ResponseCache, callback: Option<ReadCallback>) -> Self {
        Self {
            script: HornScript::new(),
            responses,
            callback,
            unhandled: Vec::new(),
        }
    }
}

impl HornSolver for SmtLib2Interface {
    fn name(&self) -> &'static str {
        "smtlib2"
    }

    fn register_relation(&mut self, predicate: &PredicateDecl) {
        self.script.declare(predicate);
    }

    fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError> {
        self.script.add_rule(rule, name)
    }

    fn query(&mut self, query: &Term) -> Result<CheckResult, SolverError> {
        let text = self.script.query_text(query)?;

        if let Some(response) = self.responses.get(&text) {
            trace!(hash = %query_hash(&text), "answered from recorded responses");
            return Ok(CheckResult::from_horn_answer(response));
        }

        if let Some(callback) = self.callback.as_mut() {
            match callback(SMT_QUERY_KIND, &text) {
                Ok(response) => return Ok(CheckResult::from_horn_answer(&response)),
                Err(e) => debug!(error = %e, "query callback failed"),
            }
        }

        self.unhandled.push(text);
        Ok(CheckResult::Unknown)
    }

    fn unhandled_queries(&self) -> Vec<String> {
        self.unhandled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::{FunctionSort, Sort};

    fn fixture(solver: &mut SmtLib2Interface) -> Term {
        let p = PredicateDecl::new("p", FunctionSort::new(vec![Sort::Int]));
        solver.register_relation(&p);
        let x = Term::var("x", Sort::Int);
        solver
            .add_rule(&p.apply(vec![Term::int(0)]).expect("apply"), "fact")
            .expect("rule");
        Term::and([
            p.apply(vec![x.clone()]).expect("apply"),
            Term::gt(x, Term::int(0)),
        ])
    }

    #[test]
    fn unanswered_queries_are_recorded() {
        let mut solver = SmtLib2Interface::new(ResponseCache::new(), None);
        let q = fixture(&mut solver);
        assert_eq!(solver.query(&q).expect("query"), CheckResult::Unknown);
        let unhandled = solver.unhandled_queries();
        assert_eq!(unhandled.len(), 1);
        assert!(unhandled[0].contains("(check-sat)"));
    }

    #[test]
    fn recorded_responses_answer_by_hash() {
        let mut probe = SmtLib2Interface::new(ResponseCache::new(), None);
        let q = fixture(&mut probe);
        let _ = probe.query(&q).expect("query");
        let text = probe.unhandled_queries().remove(0);

        let mut cache = ResponseCache::new();
        cache.record(&text, "sat\n");
        assert_eq!(cache.get(&text), Some("sat\n"));

        let mut solver = SmtLib2Interface::new(cache, None);
        let q = fixture(&mut solver);
        assert_eq!(solver.query(&q).expect("query"), CheckResult::Unsatisfiable);
        assert!(solver.unhandled_queries().is_empty());
    }

    #[test]
    fn callback_is_consulted_with_query_kind() {
        let callback: ReadCallback = Box::new(|kind, text| {
            assert_eq!(kind, SMT_QUERY_KIND);
            assert!(text.contains("(set-logic HORN)"));
            Ok("unsat".to_string())
        });
        let mut solver = SmtLib2Interface::new(ResponseCache::new(), Some(callback));
        let q = fixture(&mut solver);
        assert_eq!(solver.query(&q).expect("query"), CheckResult::Satisfiable);

        let failing: ReadCallback = Box::new(|_, _| Err("offline".to_string()));
        let mut solver = SmtLib2Interface::new(ResponseCache::new(), Some(failing));
        let q = fixture(&mut solver);
        assert_eq!(solver.query(&q).expect("query"), CheckResult::Unknown);
        assert_eq!(solver.unhandled_queries().len(), 1);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = query_hash("");
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
