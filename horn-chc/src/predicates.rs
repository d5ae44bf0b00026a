#![forbid(unsafe_code)]

use std::fmt;

use horn_ast::NodeId;
use horn_smt::{FunctionSort, PredicateDecl};
use serde::Serialize;
use tracing::debug;

/// Stable handle into a [`PredicateArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PredicateId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    Genesis,
    Constructor,
    Interface,
    Error,
    Block,
    Summary,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredicateKind::Genesis => "genesis",
            PredicateKind::Constructor => "constructor",
            PredicateKind::Interface => "interface",
            PredicateKind::Error => "error",
            PredicateKind::Block => "block",
            PredicateKind::Summary => "summary",
        })
    }
}

#[derive(Clone, Debug)]
pub struct Predicate {
    pub decl: PredicateDecl,
    pub kind: PredicateKind,
    /// AST node the predicate was created for, if any.
    pub node: Option<NodeId>,
}

impl Predicate {
    pub fn name(&self) -> &str {
        &self.decl.name
    }
}

/// Owns every predicate of an encoder. Names come from a counter that is
/// never reset, so they stay unique for the lifetime of the arena.
#[derive(Debug, Default)]
pub struct PredicateArena {
    predicates: Vec<Predicate>,
    counter: u64,
}

impl PredicateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique_prefix(&mut self) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("b{n}_")
    }

    pub fn create(
        &mut self,
        kind: PredicateKind,
        tag: &str,
        sort: FunctionSort,
        node: Option<NodeId>,
    ) -> PredicateId {
        let name = format!("{}{}", self.unique_prefix(), sanitize(tag));
        debug!(%name, %kind, arity = sort.arity(), "predicate");
        let id = PredicateId(self.predicates.len() as u32);
        self.predicates.push(Predicate {
            decl: PredicateDecl::new(name, sort),
            kind,
            node,
        });
        id
    }

    pub fn get(&self, id: PredicateId) -> &Predicate {
        &self.predicates[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Keeps `[A-Za-z0-9_]`, replacing everything else with `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use horn_smt::Sort;

    #[test]
    fn names_are_prefixed_by_a_monotonic_counter() {
        let mut arena = PredicateArena::new();
        let a = arena.create(PredicateKind::Genesis, "genesis", FunctionSort::default(), None);
        let b = arena.create(
            PredicateKind::Block,
            "if_true",
            FunctionSort::new(vec![Sort::Int]),
            Some(NodeId(7)),
        );
        let c = arena.create(PredicateKind::Block, "if_true", FunctionSort::default(), None);
        assert_eq!(arena.get(a).name(), "b0_genesis");
        assert_eq!(arena.get(b).name(), "b1_if_true");
        assert_eq!(arena.get(c).name(), "b2_if_true");
        assert_eq!(arena.get(b).node, Some(NodeId(7)));
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn tags_are_sanitized() {
        assert_eq!(sanitize("summary_f(uint256)"), "summary_f_uint256_");
        assert_eq!(sanitize("Token$"), "Token_");
    }
}
