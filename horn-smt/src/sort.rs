#![forbid(unsafe_code)]

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Int,
    Bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Int => f.write_str("Int"),
            Sort::Bool => f.write_str("Bool"),
        }
    }
}

/// Domain of an uninterpreted relation; the codomain is always `Bool`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FunctionSort {
    pub domain: Vec<Sort>,
}

impl FunctionSort {
    pub fn new(domain: Vec<Sort>) -> Self {
        Self { domain }
    }

    pub fn arity(&self) -> usize {
        self.domain.len()
    }

    pub fn concat(mut self, more: &[Sort]) -> Self {
        self.domain.extend_from_slice(more);
        self
    }
}

impl fmt::Display for FunctionSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, s) in self.domain.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{s}")?;
        }
        f.write_str(") Bool")
    }
}
