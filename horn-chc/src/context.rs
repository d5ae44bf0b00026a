#![forbid(unsafe_code)]

//! SSA bookkeeping for the encoder: one symbolic variable per declaration,
//! a fresh name per assignment, and the constraints collected since the
//! current block started.

use std::collections::BTreeMap;

use horn_ast::{NodeId, TypeName, VariableDeclaration};
use horn_smt::Term;

use crate::arith;
use crate::predicates::sanitize;
use crate::sorts::type_sort;

#[derive(Clone, Debug)]
pub struct SymbolicVariable {
    pub declaration: NodeId,
    pub name: String,
    pub ty: TypeName,
    index: u32,
    /// Highest index handed out since the last `clear_indices`.
    max_index: u32,
}

impl SymbolicVariable {
    fn base(&self) -> String {
        format!("{}_{}", sanitize(&self.name), self.declaration)
    }

    pub fn at(&self, index: u32) -> Term {
        Term::var(format!("{}_{index}", self.base()), type_sort(self.ty))
    }

    pub fn current(&self) -> Term {
        self.at(self.index)
    }

    /// Value at function entry.
    pub fn snapshot(&self) -> Term {
        Term::var(format!("{}_init", self.base()), type_sort(self.ty))
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Current index of every variable, used to merge branches.
pub type Indices = BTreeMap<NodeId, u32>;

#[derive(Debug, Default)]
pub struct EncodingContext {
    variables: BTreeMap<NodeId, SymbolicVariable>,
    assertions: Vec<Term>,
    next_temp: u64,
}

impl EncodingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-declaring resets the variable to index 0.
    pub fn declare(&mut self, decl: &VariableDeclaration) {
        self.variables.insert(
            decl.id,
            SymbolicVariable {
                declaration: decl.id,
                name: decl.name.clone(),
                ty: decl.ty,
                index: 0,
                max_index: 0,
            },
        );
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn variable(&self, id: NodeId) -> Option<&SymbolicVariable> {
        self.variables.get(&id)
    }

    pub fn current(&self, id: NodeId) -> Option<Term> {
        self.variables.get(&id).map(SymbolicVariable::current)
    }

    pub fn snapshot(&self, id: NodeId) -> Option<Term> {
        self.variables.get(&id).map(SymbolicVariable::snapshot)
    }

    /// Moves `id` to a fresh SSA name and returns it.
    pub fn new_value(&mut self, id: NodeId) -> Option<Term> {
        let var = self.variables.get_mut(&id)?;
        var.max_index += 1;
        var.index = var.max_index;
        Some(var.current())
    }

    pub fn fresh_temp(&mut self, ty: TypeName) -> Term {
        let n = self.next_temp;
        self.next_temp += 1;
        Term::var(format!("tmp_{n}"), type_sort(ty))
    }

    /// A fresh value constrained to the range of `ty`.
    pub fn fresh_value(&mut self, ty: TypeName) -> Term {
        let t = self.fresh_temp(ty);
        self.add_assertion(arith::range_constraint(ty, &t));
        t
    }

    pub fn add_assertion(&mut self, t: Term) {
        if t != Term::truth() {
            self.assertions.push(t);
        }
    }

    pub fn assertions(&self) -> &[Term] {
        &self.assertions
    }

    pub fn assertion_mark(&self) -> usize {
        self.assertions.len()
    }

    /// Removes and returns the assertions added after `mark`.
    pub fn split_assertions(&mut self, mark: usize) -> Vec<Term> {
        self.assertions.split_off(mark.min(self.assertions.len()))
    }

    pub fn clear_assertions(&mut self) {
        self.assertions.clear();
    }

    pub fn clear_indices(&mut self) {
        for var in self.variables.values_mut() {
            var.index = 0;
            var.max_index = 0;
        }
    }

    pub fn indices(&self) -> Indices {
        self.variables
            .iter()
            .map(|(id, v)| (*id, v.index))
            .collect()
    }

    /// Points variables back at earlier names without reusing indices
    /// handed out in between.
    pub fn set_indices(&mut self, indices: &Indices) {
        for (id, index) in indices {
            if let Some(var) = self.variables.get_mut(id) {
                var.index = *index;
            }
        }
    }

    /// Joins two branch outcomes: every variable whose index differs gets
    /// a fresh name equal to `ite(cond, on_true, on_false)`.
    pub fn merge(&mut self, cond: &Term, on_true: &Indices, on_false: &Indices) {
        for (id, t_index) in on_true {
            let Some(f_index) = on_false.get(id) else {
                continue;
            };
            if t_index == f_index {
                continue;
            }
            let Some(var) = self.variables.get(id) else {
                continue;
            };
            let value = Term::ite(cond.clone(), var.at(*t_index), var.at(*f_index));
            if let Some(fresh) = self.new_value(*id) {
                self.add_assertion(Term::eq(fresh, value));
            }
        }
    }
}
