#![forbid(unsafe_code)]

use std::collections::HashSet;

use crate::predicate::PredicateDecl;
use crate::solver::SolverError;
use crate::sort::Sort;
use crate::term::{Term, quote_symbol};

/// Accumulated declarations and rules of one Horn system, rendered as
/// SMT-LIB2 for every query.
#[derive(Clone, Debug, Default)]
pub struct HornScript {
    declarations: Vec<String>,
    declared: HashSet<String>,
    rules: Vec<String>,
}

impl HornScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaring the same relation twice is a no-op.
    pub fn declare(&mut self, predicate: &PredicateDecl) {
        if self.declared.insert(predicate.name.clone()) {
            self.declarations.push(predicate.declaration());
        }
    }

    pub fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError> {
        if rule.sort() != Sort::Bool {
            return Err(SolverError::RuleRejected {
                name: name.to_string(),
                reason: format!("rule has sort {}", rule.sort()),
            });
        }
        if let Some(undeclared) = rule.relations().into_iter().find(|r| !self.declared.contains(*r)) {
            return Err(SolverError::RuleRejected {
                name: name.to_string(),
                reason: format!("relation `{undeclared}` is not declared"),
            });
        }
        self.rules
            .push(format!("; {name}\n(assert {})", universal_closure(rule)));
        Ok(())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Declarations, rules and the negated query, without logic or
    /// `check-sat` commands.
    pub fn assertions(&self, query: &Term) -> Result<String, SolverError> {
        if query.sort() != Sort::Bool {
            return Err(SolverError::RuleRejected {
                name: "query".to_string(),
                reason: format!("query has sort {}", query.sort()),
            });
        }
        let mut out = String::new();
        for d in &self.declarations {
            out.push_str(d);
            out.push('\n');
        }
        for r in &self.rules {
            out.push_str(r);
            out.push('\n');
        }
        let goal = Term::implies(query.clone(), Term::Bool(false));
        out.push_str("; query\n");
        out.push_str(&format!("(assert {})\n", universal_closure(&goal)));
        Ok(out)
    }

    /// Complete script: a `sat` answer means the query is unreachable.
    pub fn query_text(&self, query: &Term) -> Result<String, SolverError> {
        let body = self.assertions(query)?;
        Ok(format!("(set-logic HORN)\n{body}(check-sat)\n"))
    }
}

/// `(forall ((v S) ..) t)`, or `t` itself when it has no variables.
pub fn universal_closure(t: &Term) -> String {
    let vars = t.free_variables();
    if vars.is_empty() {
        return t.to_string();
    }
    let binders: Vec<String> = vars
        .iter()
        .map(|v| format!("({} {})", quote_symbol(&v.name), v.sort))
        .collect();
    format!("(forall ({}) {t})", binders.join(" "))
}
