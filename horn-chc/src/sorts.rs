#![forbid(unsafe_code)]

//! Sort tuples of the predicates built for a contract.

use horn_ast::{ContractDefinition, FunctionDefinition, TypeName, VariableDeclaration};
use horn_smt::{FunctionSort, Sort};

pub fn type_sort(ty: TypeName) -> Sort {
    if ty.is_bool() { Sort::Bool } else { Sort::Int }
}

fn sorts_of<'a>(decls: impl IntoIterator<Item = &'a VariableDeclaration>) -> Vec<Sort> {
    decls.into_iter().map(|d| type_sort(d.ty)).collect()
}

pub fn state_sorts(contract: &ContractDefinition) -> Vec<Sort> {
    sorts_of(&contract.state_variables)
}

/// Sort of the constructor and interface predicates.
pub fn interface_sort(contract: &ContractDefinition) -> FunctionSort {
    FunctionSort::new(state_sorts(contract))
}

/// The error predicate takes the index of the violated assertion.
pub fn error_sort() -> FunctionSort {
    FunctionSort::new(vec![Sort::Int])
}

/// State, then parameters, then return variables.
pub fn function_sort(contract: &ContractDefinition, f: &FunctionDefinition) -> FunctionSort {
    FunctionSort::new(state_sorts(contract))
        .concat(&sorts_of(&f.parameters))
        .concat(&sorts_of(&f.return_parameters))
}

/// [`function_sort`] followed by the post-state.
pub fn summary_sort(contract: &ContractDefinition, f: &FunctionDefinition) -> FunctionSort {
    function_sort(contract, f).concat(&state_sorts(contract))
}

/// Entry snapshot of state and parameters, then state, parameters,
/// return variables and every local of the body.
pub fn block_sort(contract: &ContractDefinition, f: &FunctionDefinition) -> FunctionSort {
    let state = state_sorts(contract);
    let params = sorts_of(&f.parameters);
    FunctionSort::new(state.clone())
        .concat(&params)
        .concat(&state)
        .concat(&params)
        .concat(&sorts_of(&f.return_parameters))
        .concat(&sorts_of(f.local_variables()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use horn_ast::{AstBuilder, Visibility};

    #[test]
    fn summary_and_block_sorts_follow_the_layout() {
        let ast = AstBuilder::new();
        let x = ast.var("x", TypeName::uint256());
        let flag = ast.var("flag", TypeName::Bool);
        let a = ast.var("a", TypeName::Int(8));
        let r = ast.var("r", TypeName::Bool);
        let tmp = ast.var("tmp", TypeName::Address);
        let f = ast.function(
            "f",
            Visibility::Public,
            vec![a],
            vec![r],
            vec![ast.declare(&tmp, None)],
        );
        let c = ast.contract("C", vec![x, flag], vec![f.clone()]);

        use Sort::{Bool as B, Int as I};
        assert_eq!(function_sort(&c, &f).domain, vec![I, B, I, B]);
        assert_eq!(summary_sort(&c, &f).domain, vec![I, B, I, B, I, B]);
        assert_eq!(block_sort(&c, &f).domain, vec![I, B, I, I, B, I, B, I]);
        assert_eq!(interface_sort(&c).domain, vec![I, B]);
        assert_eq!(block_sort(&c, &f), block_sort(&c, &f));
    }
}
