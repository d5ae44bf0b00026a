#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

use crate::sort::FunctionSort;
use crate::term::{Term, quote_symbol};

#[derive(Debug, Error, Diagnostic)]
#[error("sort mismatch applying `{predicate}`: {detail}")]
#[diagnostic(code(horn::smt::sort))]
pub struct SortError {
    pub predicate: String,
    pub detail: String,
}

/// An uninterpreted relation of fixed arity and sort.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredicateDecl {
    pub name: String,
    pub sort: FunctionSort,
}

impl PredicateDecl {
    pub fn new(name: impl Into<String>, sort: FunctionSort) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }

    pub fn arity(&self) -> usize {
        self.sort.arity()
    }

    /// Applies the relation, checking arity and every argument sort.
    pub fn apply(&self, args: Vec<Term>) -> Result<Term, SortError> {
        if args.len() != self.arity() {
            return Err(SortError {
                predicate: self.name.clone(),
                detail: format!("expected {} arguments, got {}", self.arity(), args.len()),
            });
        }
        for (i, (arg, expected)) in args.iter().zip(&self.sort.domain).enumerate() {
            let actual = arg.sort();
            if actual != *expected {
                return Err(SortError {
                    predicate: self.name.clone(),
                    detail: format!("argument {i} `{arg}` has sort {actual}, expected {expected}"),
                });
            }
        }
        Ok(Term::Relation {
            name: self.name.clone(),
            args,
        })
    }

    /// `(declare-fun name (S1 .. Sn) Bool)`
    pub fn declaration(&self) -> String {
        format!("(declare-fun {} {})", quote_symbol(&self.name), self.sort)
    }
}
