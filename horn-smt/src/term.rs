#![forbid(unsafe_code)]

//! Solver-independent terms, rendered as SMT-LIB2.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use num_bigint::BigInt;
use num_traits::Signed;

use crate::sort::Sort;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    pub name: String,
    pub sort: Sort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Not,
    And,
    Or,
    Implies,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Ite,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Implies => "=>",
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Ite => "ite",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Bool(bool),
    Int(BigInt),
    Var(Variable),
    App(Op, Vec<Term>),
    /// Application of an uninterpreted relation (a Horn predicate).
    Relation { name: String, args: Vec<Term> },
}

impl Term {
    pub fn var(name: impl Into<String>, sort: Sort) -> Term {
        Term::Var(Variable {
            name: name.into(),
            sort,
        })
    }

    pub fn int(n: impl Into<BigInt>) -> Term {
        Term::Int(n.into())
    }

    pub fn truth() -> Term {
        Term::Bool(true)
    }

    /// Conjunction that flattens nested conjunctions and drops `true`.
    pub fn and(items: impl IntoIterator<Item = Term>) -> Term {
        let mut out = Vec::new();
        for item in items {
            match item {
                Term::Bool(true) => {}
                Term::Bool(false) => return Term::Bool(false),
                Term::App(Op::And, inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Bool(true),
            1 => out.pop().unwrap_or(Term::Bool(true)),
            _ => Term::App(Op::And, out),
        }
    }

    pub fn or(items: impl IntoIterator<Item = Term>) -> Term {
        let mut out = Vec::new();
        for item in items {
            match item {
                Term::Bool(false) => {}
                Term::Bool(true) => return Term::Bool(true),
                Term::App(Op::Or, inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Term::Bool(false),
            1 => out.pop().unwrap_or(Term::Bool(false)),
            _ => Term::App(Op::Or, out),
        }
    }

    pub fn not(t: Term) -> Term {
        match t {
            Term::Bool(b) => Term::Bool(!b),
            Term::App(Op::Not, mut inner) if inner.len() == 1 => inner.remove(0),
            other => Term::App(Op::Not, vec![other]),
        }
    }

    pub fn implies(body: Term, head: Term) -> Term {
        Term::App(Op::Implies, vec![body, head])
    }

    pub fn eq(a: Term, b: Term) -> Term {
        Term::App(Op::Eq, vec![a, b])
    }

    pub fn ne(a: Term, b: Term) -> Term {
        Term::not(Term::eq(a, b))
    }

    pub fn lt(a: Term, b: Term) -> Term {
        Term::App(Op::Lt, vec![a, b])
    }

    pub fn le(a: Term, b: Term) -> Term {
        Term::App(Op::Le, vec![a, b])
    }

    pub fn gt(a: Term, b: Term) -> Term {
        Term::App(Op::Gt, vec![a, b])
    }

    pub fn ge(a: Term, b: Term) -> Term {
        Term::App(Op::Ge, vec![a, b])
    }

    pub fn add(a: Term, b: Term) -> Term {
        Term::App(Op::Add, vec![a, b])
    }

    pub fn sub(a: Term, b: Term) -> Term {
        Term::App(Op::Sub, vec![a, b])
    }

    pub fn mul(a: Term, b: Term) -> Term {
        Term::App(Op::Mul, vec![a, b])
    }

    pub fn div(a: Term, b: Term) -> Term {
        Term::App(Op::Div, vec![a, b])
    }

    pub fn modulo(a: Term, b: Term) -> Term {
        Term::App(Op::Mod, vec![a, b])
    }

    pub fn neg(a: Term) -> Term {
        Term::App(Op::Neg, vec![a])
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Term {
        match cond {
            Term::Bool(true) => then,
            Term::Bool(false) => otherwise,
            cond => Term::App(Op::Ite, vec![cond, then, otherwise]),
        }
    }

    pub fn sort(&self) -> Sort {
        match self {
            Term::Bool(_) | Term::Relation { .. } => Sort::Bool,
            Term::Int(_) => Sort::Int,
            Term::Var(v) => v.sort,
            Term::App(Op::Ite, args) => args.get(1).map(Term::sort).unwrap_or(Sort::Bool),
            Term::App(
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Neg,
                _,
            ) => Sort::Int,
            Term::App(_, _) => Sort::Bool,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Term::Relation { .. })
    }

    /// Variables occurring in the term, ordered by name.
    pub fn free_variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<Variable>) {
        match self {
            Term::Var(v) => {
                out.insert(v.clone());
            }
            Term::App(_, args) | Term::Relation { args, .. } => {
                for a in args {
                    a.collect_variables(out);
                }
            }
            Term::Bool(_) | Term::Int(_) => {}
        }
    }

    /// Relation names applied anywhere in the term.
    pub fn relations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out
    }

    fn collect_relations<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Term::Relation { name, args } => {
                out.push(name.as_str());
                for a in args {
                    a.collect_relations(out);
                }
            }
            Term::App(_, args) => {
                for a in args {
                    a.collect_relations(out);
                }
            }
            Term::Var(_) | Term::Bool(_) | Term::Int(_) => {}
        }
    }
}

/// Quotes `name` unless it already is an SMT-LIB2 simple symbol.
pub fn quote_symbol(name: &str) -> Cow<'_, str> {
    let simple = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c));
    if simple {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("|{}|", name.replace('|', "_")))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Bool(b) => write!(f, "{b}"),
            Term::Int(n) if n.is_negative() => write!(f, "(- {})", n.abs()),
            Term::Int(n) => write!(f, "{n}"),
            Term::Var(v) => f.write_str(&quote_symbol(&v.name)),
            Term::App(Op::And, args) if args.is_empty() => f.write_str("true"),
            Term::App(Op::Or, args) if args.is_empty() => f.write_str("false"),
            Term::App(op, args) => {
                write!(f, "({}", op.symbol())?;
                for a in args {
                    write!(f, " {a}")?;
                }
                f.write_str(")")
            }
            Term::Relation { name, args } if args.is_empty() => {
                f.write_str(&quote_symbol(name))
            }
            Term::Relation { name, args } => {
                write!(f, "({}", quote_symbol(name))?;
                for a in args {
                    write!(f, " {a}")?;
                }
                f.write_str(")")
            }
        }
    }
}
