#![forbid(unsafe_code)]

//! Resolved contract AST consumed by the CHC verifier.
//!
//! Parsing, name resolution and type checking happen upstream: every
//! identifier already points at its declaration and every expression
//! carries its type.

use miette::SourceSpan;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

pub mod builder;

pub use builder::{AstBuilder, FunctionHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

impl From<Span> for SourceSpan {
    fn from(s: Span) -> Self {
        SourceSpan::new(s.offset.into(), s.len)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: String,
    pub contracts: Vec<ContractDefinition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Contract,
    Library,
    Interface,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub kind: ContractKind,
    #[serde(default)]
    pub state_variables: Vec<VariableDeclaration>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
}

impl ContractDefinition {
    pub fn constructor(&self) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.is_constructor())
    }

    pub fn function(&self, id: NodeId) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.id == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
}

impl TypeName {
    pub fn uint256() -> Self {
        TypeName::Uint(256)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, TypeName::Bool)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, TypeName::Int(_))
    }

    /// Bit width of integer-like types; `None` for `bool`.
    pub fn bits(self) -> Option<u16> {
        match self {
            TypeName::Bool => None,
            TypeName::Uint(b) | TypeName::Int(b) => Some(b),
            TypeName::Address => Some(160),
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Bool => write!(f, "bool"),
            TypeName::Uint(b) => write!(f, "uint{b}"),
            TypeName::Int(b) => write!(f, "int{b}"),
            TypeName::Address => write!(f, "address"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub ty: TypeName,
    /// Initializer for state variables and local declarations.
    #[serde(default)]
    pub value: Option<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Constructor,
    Function,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    #[serde(default)]
    pub parameters: Vec<VariableDeclaration>,
    #[serde(default)]
    pub return_parameters: Vec<VariableDeclaration>,
    /// `None` for declarations without implementation.
    #[serde(default)]
    pub body: Option<Block>,
}

impl FunctionDefinition {
    pub fn is_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
    }

    /// Reachable from outside the contract as a transaction.
    pub fn is_public(&self) -> bool {
        matches!(self.visibility, Visibility::Public | Visibility::External)
    }

    pub fn is_implemented(&self) -> bool {
        self.body.is_some()
    }

    /// Every local variable declared anywhere in the body, in source order.
    pub fn local_variables(&self) -> Vec<&VariableDeclaration> {
        let mut out = Vec::new();
        if let Some(body) = &self.body {
            for stmt in &body.statements {
                collect_locals(stmt, &mut out);
            }
        }
        out
    }
}

fn collect_locals<'a>(stmt: &'a Stmt, out: &mut Vec<&'a VariableDeclaration>) {
    match &stmt.kind {
        StmtKind::Block(b) => {
            for s in &b.statements {
                collect_locals(s, out);
            }
        }
        StmtKind::VariableDeclaration(decl) => out.push(decl),
        StmtKind::If {
            true_body,
            false_body,
            ..
        } => {
            collect_locals(true_body, out);
            if let Some(f) = false_body {
                collect_locals(f, out);
            }
        }
        StmtKind::While { body, .. } => collect_locals(body, out),
        StmtKind::For {
            init,
            loop_expression,
            body,
            ..
        } => {
            if let Some(i) = init {
                collect_locals(i, out);
            }
            if let Some(l) = loop_expression {
                collect_locals(l, out);
            }
            collect_locals(body, out);
        }
        StmtKind::Expression(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_) => {}
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    Block(Block),
    VariableDeclaration(VariableDeclaration),
    Expression(Expr),
    If {
        condition: Expr,
        true_body: Box<Stmt>,
        false_body: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        #[serde(default)]
        do_while: bool,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        loop_expression: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    /// `return;`, `return e;` or `return (a, b);`
    Return(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    /// `None` for calls without a single return value.
    pub ty: Option<TypeName>,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Bool(bool),
    Number(BigInt),
    Identifier {
        name: String,
        declaration: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assignment {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
    },
    /// `msg.value`, `block.number`, `s.field`, ...
    MemberAccess {
        base: Box<Expr>,
        member: String,
    },
    Call {
        callee: Callee,
        arguments: Vec<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Builtin(Builtin),
    /// Direct call to a function of the enclosing contract.
    Internal { function: NodeId, name: String },
    /// Message call to another contract or address, including `this.f()`.
    External { target: Box<Expr>, member: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    Assert,
    Require,
    Revert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
        }
    }
}
