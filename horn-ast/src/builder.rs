#![forbid(unsafe_code)]

//! Programmatic construction of resolved ASTs.
//!
//! Every node gets a fresh `NodeId` and a synthetic span derived from it.
//! Identifiers are resolved by passing the declaration itself, so trees
//! built here need no separate name-resolution pass.

use std::cell::Cell;

use num_bigint::BigInt;

use crate::{
    AssignOp, BinaryOp, Block, Builtin, Callee, ContractDefinition, ContractKind, Expr, ExprKind,
    FunctionDefinition, FunctionKind, NodeId, SourceUnit, Span, Stmt, StmtKind, TypeName, UnaryOp,
    VariableDeclaration, Visibility,
};

/// A function identity that can be called before its definition is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHandle {
    pub id: NodeId,
    pub name: String,
    pub returns: Vec<TypeName>,
}

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    fn span(id: NodeId) -> Span {
        Span::new(id.0 as usize, 1)
    }

    fn expr(&self, ty: Option<TypeName>, kind: ExprKind) -> Expr {
        let id = self.id();
        Expr {
            id,
            span: Self::span(id),
            ty,
            kind,
        }
    }

    fn stmt(&self, kind: StmtKind) -> Stmt {
        let id = self.id();
        Stmt {
            id,
            span: Self::span(id),
            kind,
        }
    }

    // Declarations

    pub fn var(&self, name: &str, ty: TypeName) -> VariableDeclaration {
        let id = self.id();
        VariableDeclaration {
            id,
            span: Self::span(id),
            name: name.to_string(),
            ty,
            value: None,
        }
    }

    pub fn var_init(&self, name: &str, ty: TypeName, value: Expr) -> VariableDeclaration {
        VariableDeclaration {
            value: Some(value),
            ..self.var(name, ty)
        }
    }

    // Expressions

    pub fn number(&self, n: i64) -> Expr {
        self.number_big(BigInt::from(n))
    }

    pub fn number_big(&self, n: BigInt) -> Expr {
        self.expr(Some(TypeName::uint256()), ExprKind::Number(n))
    }

    pub fn boolean(&self, b: bool) -> Expr {
        self.expr(Some(TypeName::Bool), ExprKind::Bool(b))
    }

    pub fn ident(&self, decl: &VariableDeclaration) -> Expr {
        self.expr(
            Some(decl.ty),
            ExprKind::Identifier {
                name: decl.name.clone(),
                declaration: decl.id,
            },
        )
    }

    pub fn binary(&self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let ty = if op.is_comparison() || op.is_boolean() {
            Some(TypeName::Bool)
        } else if matches!(left.kind, ExprKind::Number(_)) {
            right.ty.or(left.ty)
        } else {
            left.ty
        };
        self.expr(
            ty,
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn add(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Add, l, r)
    }

    pub fn sub(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Sub, l, r)
    }

    pub fn mul(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Mul, l, r)
    }

    pub fn eq(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Eq, l, r)
    }

    pub fn ne(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Ne, l, r)
    }

    pub fn lt(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Lt, l, r)
    }

    pub fn le(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Le, l, r)
    }

    pub fn gt(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Gt, l, r)
    }

    pub fn ge(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Ge, l, r)
    }

    pub fn and(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::And, l, r)
    }

    pub fn or(&self, l: Expr, r: Expr) -> Expr {
        self.binary(BinaryOp::Or, l, r)
    }

    pub fn unary(&self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = if op == UnaryOp::Not {
            Some(TypeName::Bool)
        } else {
            operand.ty
        };
        self.expr(
            ty,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        )
    }

    pub fn not(&self, e: Expr) -> Expr {
        self.unary(UnaryOp::Not, e)
    }

    pub fn post_inc(&self, decl: &VariableDeclaration) -> Expr {
        self.unary(UnaryOp::PostInc, self.ident(decl))
    }

    pub fn pre_dec(&self, decl: &VariableDeclaration) -> Expr {
        self.unary(UnaryOp::PreDec, self.ident(decl))
    }

    pub fn assign_op(&self, op: AssignOp, decl: &VariableDeclaration, value: Expr) -> Expr {
        self.expr(
            Some(decl.ty),
            ExprKind::Assignment {
                op,
                target: Box::new(self.ident(decl)),
                value: Box::new(value),
            },
        )
    }

    pub fn assign(&self, decl: &VariableDeclaration, value: Expr) -> Expr {
        self.assign_op(AssignOp::Assign, decl, value)
    }

    pub fn conditional(&self, condition: Expr, true_expr: Expr, false_expr: Expr) -> Expr {
        self.expr(
            true_expr.ty,
            ExprKind::Conditional {
                condition: Box::new(condition),
                true_expr: Box::new(true_expr),
                false_expr: Box::new(false_expr),
            },
        )
    }

    /// Environment access such as `msg.value`; `base` is not a declared variable.
    pub fn magic(&self, base: &str, member: &str, ty: TypeName) -> Expr {
        let base = self.expr(
            None,
            ExprKind::Identifier {
                name: base.to_string(),
                declaration: self.id(),
            },
        );
        self.expr(
            Some(ty),
            ExprKind::MemberAccess {
                base: Box::new(base),
                member: member.to_string(),
            },
        )
    }

    fn builtin(&self, builtin: Builtin, arguments: Vec<Expr>) -> Expr {
        self.expr(
            None,
            ExprKind::Call {
                callee: Callee::Builtin(builtin),
                arguments,
            },
        )
    }

    pub fn assert(&self, condition: Expr) -> Expr {
        self.builtin(Builtin::Assert, vec![condition])
    }

    pub fn require(&self, condition: Expr) -> Expr {
        self.builtin(Builtin::Require, vec![condition])
    }

    pub fn revert(&self) -> Expr {
        self.builtin(Builtin::Revert, Vec::new())
    }

    pub fn call(&self, function: &FunctionHandle, arguments: Vec<Expr>) -> Expr {
        let ty = match function.returns.as_slice() {
            [single] => Some(*single),
            _ => None,
        };
        self.expr(
            ty,
            ExprKind::Call {
                callee: Callee::Internal {
                    function: function.id,
                    name: function.name.clone(),
                },
                arguments,
            },
        )
    }

    pub fn external_call(
        &self,
        target: Expr,
        member: &str,
        arguments: Vec<Expr>,
        ty: Option<TypeName>,
    ) -> Expr {
        self.expr(
            ty,
            ExprKind::Call {
                callee: Callee::External {
                    target: Box::new(target),
                    member: member.to_string(),
                },
                arguments,
            },
        )
    }

    // Statements

    pub fn expr_stmt(&self, e: Expr) -> Stmt {
        self.stmt(StmtKind::Expression(e))
    }

    /// `T name = value;` for a declaration created with [`AstBuilder::var`].
    pub fn declare(&self, decl: &VariableDeclaration, value: Option<Expr>) -> Stmt {
        let mut decl = decl.clone();
        decl.value = value;
        self.stmt(StmtKind::VariableDeclaration(decl))
    }

    pub fn block(&self, statements: Vec<Stmt>) -> Block {
        let id = self.id();
        Block {
            id,
            span: Self::span(id),
            statements,
        }
    }

    pub fn block_stmt(&self, statements: Vec<Stmt>) -> Stmt {
        let block = self.block(statements);
        self.stmt(StmtKind::Block(block))
    }

    pub fn if_(&self, condition: Expr, true_body: Stmt, false_body: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            true_body: Box::new(true_body),
            false_body: false_body.map(Box::new),
        })
    }

    pub fn while_(&self, condition: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
            do_while: false,
        })
    }

    pub fn do_while(&self, body: Stmt, condition: Expr) -> Stmt {
        self.stmt(StmtKind::While {
            condition,
            body: Box::new(body),
            do_while: true,
        })
    }

    pub fn for_(
        &self,
        init: Option<Stmt>,
        condition: Option<Expr>,
        loop_expression: Option<Stmt>,
        body: Stmt,
    ) -> Stmt {
        self.stmt(StmtKind::For {
            init: init.map(Box::new),
            condition,
            loop_expression: loop_expression.map(Box::new),
            body: Box::new(body),
        })
    }

    pub fn break_(&self) -> Stmt {
        self.stmt(StmtKind::Break)
    }

    pub fn continue_(&self) -> Stmt {
        self.stmt(StmtKind::Continue)
    }

    pub fn ret(&self, values: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(values))
    }

    // Definitions

    pub fn reserve_function(&self, name: &str, returns: &[TypeName]) -> FunctionHandle {
        FunctionHandle {
            id: self.id(),
            name: name.to_string(),
            returns: returns.to_vec(),
        }
    }

    pub fn define(
        &self,
        handle: &FunctionHandle,
        visibility: Visibility,
        parameters: Vec<VariableDeclaration>,
        return_parameters: Vec<VariableDeclaration>,
        body: Option<Vec<Stmt>>,
    ) -> FunctionDefinition {
        FunctionDefinition {
            id: handle.id,
            span: Self::span(handle.id),
            name: handle.name.clone(),
            kind: FunctionKind::Function,
            visibility,
            parameters,
            return_parameters,
            body: body.map(|stmts| self.block(stmts)),
        }
    }

    /// A function nobody calls internally before it is built.
    pub fn function(
        &self,
        name: &str,
        visibility: Visibility,
        parameters: Vec<VariableDeclaration>,
        return_parameters: Vec<VariableDeclaration>,
        body: Vec<Stmt>,
    ) -> FunctionDefinition {
        let returns: Vec<TypeName> = return_parameters.iter().map(|p| p.ty).collect();
        let handle = self.reserve_function(name, &returns);
        self.define(&handle, visibility, parameters, return_parameters, Some(body))
    }

    pub fn constructor(
        &self,
        parameters: Vec<VariableDeclaration>,
        body: Vec<Stmt>,
    ) -> FunctionDefinition {
        let handle = self.reserve_function("constructor", &[]);
        FunctionDefinition {
            kind: FunctionKind::Constructor,
            ..self.define(&handle, Visibility::Public, parameters, Vec::new(), Some(body))
        }
    }

    pub fn contract(
        &self,
        name: &str,
        state_variables: Vec<VariableDeclaration>,
        functions: Vec<FunctionDefinition>,
    ) -> ContractDefinition {
        self.contract_of_kind(ContractKind::Contract, name, state_variables, functions)
    }

    pub fn contract_of_kind(
        &self,
        kind: ContractKind,
        name: &str,
        state_variables: Vec<VariableDeclaration>,
        functions: Vec<FunctionDefinition>,
    ) -> ContractDefinition {
        let id = self.id();
        ContractDefinition {
            id,
            span: Self::span(id),
            name: name.to_string(),
            kind,
            state_variables,
            functions,
        }
    }

    pub fn source_unit(&self, path: &str, contracts: Vec<ContractDefinition>) -> SourceUnit {
        SourceUnit {
            path: path.to_string(),
            contracts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique_and_identifiers_resolve() {
        let ast = AstBuilder::new();
        let x = ast.var("x", TypeName::uint256());
        let read = ast.ident(&x);
        let write = ast.assign(&x, ast.number(1));

        assert_ne!(read.id, write.id);
        match read.kind {
            ExprKind::Identifier { declaration, .. } => assert_eq!(declaration, x.id),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(write.ty, Some(TypeName::uint256()));
    }

    #[test]
    fn comparison_is_bool_and_literal_left_takes_right_type() {
        let ast = AstBuilder::new();
        let i = ast.var("i", TypeName::Int(8));
        assert_eq!(ast.lt(ast.ident(&i), ast.number(3)).ty, Some(TypeName::Bool));
        assert_eq!(ast.sub(ast.number(3), ast.ident(&i)).ty, Some(TypeName::Int(8)));
    }

    #[test]
    fn locals_are_collected_from_nested_statements() {
        let ast = AstBuilder::new();
        let a = ast.var("a", TypeName::uint256());
        let b = ast.var("b", TypeName::Bool);
        let i = ast.var("i", TypeName::uint256());
        let body = vec![
            ast.declare(&a, Some(ast.number(1))),
            ast.if_(
                ast.boolean(true),
                ast.block_stmt(vec![ast.declare(&b, None)]),
                None,
            ),
            ast.for_(
                Some(ast.declare(&i, Some(ast.number(0)))),
                Some(ast.lt(ast.ident(&i), ast.number(3))),
                Some(ast.expr_stmt(ast.post_inc(&i))),
                ast.block_stmt(Vec::new()),
            ),
        ];
        let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), body);
        let names: Vec<&str> = f.local_variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "i"]);
    }

    #[test]
    fn ast_round_trips_through_json() {
        let ast = AstBuilder::new();
        let x = ast.var("x", TypeName::uint256());
        let f = ast.function(
            "f",
            Visibility::External,
            Vec::new(),
            Vec::new(),
            vec![ast.expr_stmt(ast.assert(ast.eq(ast.ident(&x), ast.number(0))))],
        );
        let unit = ast.source_unit("a.sol", vec![ast.contract("C", vec![x], vec![f])]);

        let json = serde_json::to_string(&unit).expect("serialize");
        let back: SourceUnit = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, unit);
    }
}
