mod common;

use std::collections::HashSet;

use horn_ast::{AstBuilder, ContractDefinition, Stmt, TypeName, VariableDeclaration, Visibility};
use horn_chc::{Chc, ErrorReporter};
use horn_smt::CheckResult;
use proptest::{
    prelude::prop,
    test_runner::{Config, TestCaseError, TestRunner},
};

use common::recording;

/// 0: assert, 1: if, 2: while, 3: do-while, 4: for.
type Shape = Vec<Vec<u8>>;

fn statement(ast: &AstBuilder, x: &VariableDeclaration, kind: u8) -> Stmt {
    let cond = || ast.lt(ast.ident(x), ast.number(4));
    let step = || ast.expr_stmt(ast.post_inc(x));
    match kind {
        0 => ast.expr_stmt(ast.assert(ast.ge(ast.ident(x), ast.number(0)))),
        1 => ast.if_(cond(), step(), Some(ast.block_stmt(Vec::new()))),
        2 => ast.while_(cond(), step()),
        3 => ast.do_while(step(), cond()),
        _ => ast.for_(None, Some(cond()), Some(step()), ast.continue_()),
    }
}

fn build(ast: &AstBuilder, contracts: &[Shape]) -> Vec<ContractDefinition> {
    contracts
        .iter()
        .map(|functions| {
            let x = ast.var("x", TypeName::uint256());
            let defs = functions
                .iter()
                .map(|body| {
                    let stmts = body.iter().map(|k| statement(ast, &x, *k)).collect();
                    ast.function("f", Visibility::Public, Vec::new(), Vec::new(), stmts)
                })
                .collect();
            ast.contract("C", vec![x], defs)
        })
        .collect()
}

#[test]
fn predicate_names_never_collide() {
    let mut runner = TestRunner::new(Config {
        cases: 48,
        ..Config::default()
    });
    let shapes = prop::collection::vec(
        prop::collection::vec(prop::collection::vec(0u8..5, 0..4), 0..3),
        1..4,
    );

    runner
        .run(&shapes, |contracts: Vec<Shape>| {
            let ast = AstBuilder::new();
            let unit = ast.source_unit("generated.sol", build(&ast, &contracts));
            let (solver, log) = recording(CheckResult::Unknown);
            let mut reporter = ErrorReporter::new();
            let mut chc = Chc::with_solver(&mut reporter, solver);
            chc.analyze(&unit)
                .map_err(|e| TestCaseError::fail(format!("analysis failed: {e}")))?;

            let mut names = HashSet::new();
            for p in chc.predicates() {
                if !names.insert(p.name().to_string()) {
                    return Err(TestCaseError::fail(format!("duplicate {}", p.name())));
                }
            }
            if log.borrow().relations.len() != names.len() {
                return Err(TestCaseError::fail("every predicate is registered once"));
            }
            Ok(())
        })
        .expect("predicate names must be unique");
}
