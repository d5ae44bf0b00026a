#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use horn_ast::{Callee, ContractDefinition, Expr, ExprKind, NodeId, Stmt, StmtKind};

/// Call structure of one contract, collected before encoding it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallScan {
    /// Functions of the contract that some code of the contract calls.
    pub internally_called: BTreeSet<NodeId>,
    /// Some call leaves the contract or targets a function without body.
    pub has_unknown_calls: bool,
}

pub fn scan_contract(contract: &ContractDefinition) -> CallScan {
    let implemented: BTreeSet<NodeId> = contract
        .functions
        .iter()
        .filter(|f| f.is_implemented())
        .map(|f| f.id)
        .collect();
    let mut scan = CallScan::default();
    let mut visit = |callee: &Callee| match callee {
        Callee::Internal { function, .. } if implemented.contains(function) => {
            scan.internally_called.insert(*function);
        }
        Callee::Internal { .. } | Callee::External { .. } => scan.has_unknown_calls = true,
        Callee::Builtin(_) => {}
    };

    for var in &contract.state_variables {
        if let Some(value) = &var.value {
            expr_calls(value, &mut visit);
        }
    }
    for f in &contract.functions {
        for p in f.parameters.iter().chain(&f.return_parameters) {
            if let Some(value) = &p.value {
                expr_calls(value, &mut visit);
            }
        }
        if let Some(body) = &f.body {
            for s in &body.statements {
                stmt_calls(s, &mut visit);
            }
        }
    }
    scan
}

fn stmt_calls(stmt: &Stmt, visit: &mut impl FnMut(&Callee)) {
    match &stmt.kind {
        StmtKind::Block(b) => {
            for s in &b.statements {
                stmt_calls(s, visit);
            }
        }
        StmtKind::VariableDeclaration(decl) => {
            if let Some(v) = &decl.value {
                expr_calls(v, visit);
            }
        }
        StmtKind::Expression(e) => expr_calls(e, visit),
        StmtKind::If {
            condition,
            true_body,
            false_body,
        } => {
            expr_calls(condition, visit);
            stmt_calls(true_body, visit);
            if let Some(f) = false_body {
                stmt_calls(f, visit);
            }
        }
        StmtKind::While {
            condition, body, ..
        } => {
            expr_calls(condition, visit);
            stmt_calls(body, visit);
        }
        StmtKind::For {
            init,
            condition,
            loop_expression,
            body,
        } => {
            if let Some(i) = init {
                stmt_calls(i, visit);
            }
            if let Some(c) = condition {
                expr_calls(c, visit);
            }
            if let Some(l) = loop_expression {
                stmt_calls(l, visit);
            }
            stmt_calls(body, visit);
        }
        StmtKind::Return(values) => {
            for v in values {
                expr_calls(v, visit);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
    }
}

fn expr_calls(expr: &Expr, visit: &mut impl FnMut(&Callee)) {
    match &expr.kind {
        ExprKind::Bool(_) | ExprKind::Number(_) | ExprKind::Identifier { .. } => {}
        ExprKind::Unary { operand, .. } => expr_calls(operand, visit),
        ExprKind::Binary { left, right, .. } => {
            expr_calls(left, visit);
            expr_calls(right, visit);
        }
        ExprKind::Assignment { target, value, .. } => {
            expr_calls(target, visit);
            expr_calls(value, visit);
        }
        ExprKind::Conditional {
            condition,
            true_expr,
            false_expr,
        } => {
            expr_calls(condition, visit);
            expr_calls(true_expr, visit);
            expr_calls(false_expr, visit);
        }
        ExprKind::MemberAccess { base, .. } => expr_calls(base, visit),
        ExprKind::Call { callee, arguments } => {
            visit(callee);
            if let Callee::External { target, .. } = callee {
                expr_calls(target, visit);
            }
            for a in arguments {
                expr_calls(a, visit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horn_ast::{AstBuilder, TypeName, Visibility};

    #[test]
    fn internal_and_unknown_calls_are_told_apart() {
        let ast = AstBuilder::new();
        let g = ast.reserve_function("g", &[TypeName::uint256()]);
        let missing = ast.reserve_function("h", &[]);
        let r = ast.var("r", TypeName::uint256());
        let g_def = ast.define(
            &g,
            Visibility::Internal,
            Vec::new(),
            vec![r],
            Some(vec![ast.ret(vec![ast.number(1)])]),
        );
        let h_def = ast.define(&missing, Visibility::Internal, Vec::new(), Vec::new(), None);
        let f = ast.function(
            "f",
            Visibility::Public,
            Vec::new(),
            Vec::new(),
            vec![ast.expr_stmt(ast.call(&g, Vec::new()))],
        );
        let c = ast.contract("C", Vec::new(), vec![g_def, h_def.clone(), f.clone()]);
        let scan = scan_contract(&c);
        assert!(scan.internally_called.contains(&g.id));
        assert!(!scan.has_unknown_calls);

        let caller = ast.function(
            "k",
            Visibility::Public,
            Vec::new(),
            Vec::new(),
            vec![ast.expr_stmt(ast.call(&missing, Vec::new()))],
        );
        let c = ast.contract("D", Vec::new(), vec![h_def, caller]);
        assert!(scan_contract(&c).has_unknown_calls);
    }
}
