#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use horn_ast::{AstBuilder, NodeId, SourceUnit, TypeName, Visibility};
use horn_chc::{Chc, ErrorReporter};
use horn_smt::{
    CheckResult, ExternalBackend, HornScript, HornSolver, PredicateDecl, ProcessSolver,
    SolverError, Term, find_executable,
};

#[derive(Debug, Default)]
pub struct Recorded {
    pub relations: Vec<PredicateDecl>,
    pub rules: Vec<(String, Term)>,
    pub queries: Vec<Term>,
}

impl Recorded {
    /// Rules whose body applies `relation`.
    pub fn rules_using(&self, relation: &str) -> Vec<&(String, Term)> {
        self.rules
            .iter()
            .filter(|(_, rule)| match rule {
                Term::App(horn_smt::Op::Implies, parts) => parts[0].relations().contains(&relation),
                _ => false,
            })
            .collect()
    }

    /// Rules whose head is `relation`.
    pub fn rules_into(&self, relation: &str) -> Vec<&Term> {
        self.rules
            .iter()
            .filter(|(name, _)| name.ends_with(relation))
            .map(|(_, rule)| rule)
            .collect()
    }
}

/// Top-level conjuncts of a rule body.
pub fn body_conjuncts(rule: &Term) -> Vec<&Term> {
    match rule {
        Term::App(horn_smt::Op::Implies, parts) => match &parts[0] {
            Term::App(horn_smt::Op::And, items) => items.iter().collect(),
            single => vec![single],
        },
        _ => Vec::new(),
    }
}

/// Argument lists of every application of `relation` inside `t`.
pub fn applications<'a>(t: &'a Term, relation: &str) -> Vec<&'a [Term]> {
    let mut out = Vec::new();
    collect_applications(t, relation, &mut out);
    out
}

fn collect_applications<'a>(t: &'a Term, relation: &str, out: &mut Vec<&'a [Term]>) {
    match t {
        Term::Relation { name, args } => {
            if name == relation {
                out.push(args);
            }
            for a in args {
                collect_applications(a, relation, out);
            }
        }
        Term::App(_, args) => {
            for a in args {
                collect_applications(a, relation, out);
            }
        }
        Term::Var(_) | Term::Bool(_) | Term::Int(_) => {}
    }
}

/// Answers every query with a fixed verdict and records what it was given.
pub struct RecordingSolver {
    log: Rc<RefCell<Recorded>>,
    answer: CheckResult,
    script: HornScript,
}

pub fn recording(answer: CheckResult) -> (Box<dyn HornSolver>, Rc<RefCell<Recorded>>) {
    let log = Rc::new(RefCell::new(Recorded::default()));
    let solver = RecordingSolver {
        log: Rc::clone(&log),
        answer,
        script: HornScript::new(),
    };
    (Box::new(solver), log)
}

impl HornSolver for RecordingSolver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn register_relation(&mut self, predicate: &PredicateDecl) {
        self.script.declare(predicate);
        self.log.borrow_mut().relations.push(predicate.clone());
    }

    fn add_rule(&mut self, rule: &Term, name: &str) -> Result<(), SolverError> {
        self.script.add_rule(rule, name)?;
        self.log
            .borrow_mut()
            .rules
            .push((name.to_string(), rule.clone()));
        Ok(())
    }

    fn query(&mut self, query: &Term) -> Result<CheckResult, SolverError> {
        self.script.query_text(query)?;
        self.log.borrow_mut().queries.push(query.clone());
        Ok(self.answer)
    }
}

pub fn z3() -> Option<Box<dyn HornSolver>> {
    let Some(path) = find_executable("z3") else {
        eprintln!("z3 not on PATH; skipping");
        return None;
    };
    Some(Box::new(ProcessSolver::new(
        ExternalBackend::Z3,
        path,
        Some(20_000),
    )))
}

pub struct Scenario {
    pub unit: SourceUnit,
    pub assertions: Vec<NodeId>,
}

/// Runs `scenario` and returns the proved-safe subset of its assertions.
pub fn proved(solver: Box<dyn HornSolver>, scenario: &Scenario) -> Vec<bool> {
    let mut reporter = ErrorReporter::new();
    let mut chc = Chc::with_solver(&mut reporter, solver);
    chc.analyze(&scenario.unit).expect("analysis");
    scenario
        .assertions
        .iter()
        .map(|a| chc.safe_assertions().contains(a))
        .collect()
}

fn uint() -> TypeName {
    TypeName::uint256()
}

/// `function f() public { assert(lhs == rhs); }`
pub fn constant_assertion(lhs: i64, rhs: i64) -> Scenario {
    let ast = AstBuilder::new();
    let check = ast.assert(ast.eq(ast.number(lhs), ast.number(rhs)));
    let id = check.id;
    let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), vec![ast.expr_stmt(check)]);
    Scenario {
        unit: ast.source_unit("constant.sol", vec![ast.contract("C", Vec::new(), vec![f])]),
        assertions: vec![id],
    }
}

/// `x = 0; while (x < 10) { x = x + 1; } assert(x == 10);`
pub fn counting_loop() -> Scenario {
    let ast = AstBuilder::new();
    let x = ast.var("x", uint());
    let check = ast.assert(ast.eq(ast.ident(&x), ast.number(10)));
    let id = check.id;
    let body = vec![
        ast.expr_stmt(ast.assign(&x, ast.number(0))),
        ast.while_(
            ast.lt(ast.ident(&x), ast.number(10)),
            ast.block_stmt(vec![ast.expr_stmt(
                ast.assign(&x, ast.add(ast.ident(&x), ast.number(1))),
            )]),
        ),
        ast.expr_stmt(check),
    ];
    let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), body);
    Scenario {
        unit: ast.source_unit("loop.sol", vec![ast.contract("C", vec![x], vec![f])]),
        assertions: vec![id],
    }
}

/// `x = 1; other.poke(); assert(x == 1);`
pub fn external_call_between() -> Scenario {
    let ast = AstBuilder::new();
    let x = ast.var("x", uint());
    let other = ast.var("other", TypeName::Address);
    let check = ast.assert(ast.eq(ast.ident(&x), ast.number(1)));
    let id = check.id;
    let body = vec![
        ast.expr_stmt(ast.assign(&x, ast.number(1))),
        ast.expr_stmt(ast.external_call(ast.ident(&other), "poke", Vec::new(), None)),
        ast.expr_stmt(check),
    ];
    let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), body);
    Scenario {
        unit: ast.source_unit("external.sol", vec![ast.contract("C", vec![x, other], vec![f])]),
        assertions: vec![id],
    }
}

/// `x = 0; g(x++); assert(x == 0);` with `g` internal and empty.
pub fn state_write_in_argument() -> (Scenario, NodeId) {
    let ast = AstBuilder::new();
    let x = ast.var("x", uint());
    let g = ast.reserve_function("g", &[]);
    let a = ast.var("a", uint());
    let g_def = ast.define(&g, Visibility::Internal, vec![a], Vec::new(), Some(Vec::new()));
    let check = ast.assert(ast.eq(ast.ident(&x), ast.number(0)));
    let id = check.id;
    let body = vec![
        ast.expr_stmt(ast.assign(&x, ast.number(0))),
        ast.expr_stmt(ast.call(&g, vec![ast.post_inc(&x)])),
        ast.expr_stmt(check),
    ];
    let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), body);
    let unit = ast.source_unit("args.sol", vec![ast.contract("C", vec![x], vec![g_def, f])]);
    (
        Scenario {
            unit,
            assertions: vec![id],
        },
        g.id,
    )
}

/// `inc(a) = a + 1` called twice from `f`, with one assertion per call site.
pub fn two_call_sites() -> (Scenario, NodeId) {
    let ast = AstBuilder::new();
    let inc = ast.reserve_function("inc", &[uint()]);
    let a = ast.var("a", uint());
    let r = ast.var("r", uint());
    let inc_def = ast.define(
        &inc,
        Visibility::Internal,
        vec![a.clone()],
        vec![r],
        Some(vec![ast.ret(vec![ast.add(ast.ident(&a), ast.number(1))])]),
    );

    let y = ast.var("y", uint());
    let z = ast.var("z", uint());
    let first = ast.assert(ast.eq(ast.ident(&y), ast.number(2)));
    let second = ast.assert(ast.eq(ast.ident(&z), ast.number(8)));
    let ids = vec![first.id, second.id];
    let body = vec![
        ast.declare(&y, Some(ast.call(&inc, vec![ast.number(1)]))),
        ast.declare(&z, Some(ast.call(&inc, vec![ast.number(7)]))),
        ast.expr_stmt(first),
        ast.expr_stmt(second),
    ];
    let f = ast.function("f", Visibility::Public, Vec::new(), Vec::new(), body);
    let unit = ast.source_unit("calls.sol", vec![ast.contract("C", Vec::new(), vec![inc_def, f])]);
    (
        Scenario {
            unit,
            assertions: ids,
        },
        inc.id,
    )
}
