#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use horn_ast::{
    ContractDefinition, ContractKind, FunctionDefinition, NodeId, SourceUnit, Span, TypeName,
};
use horn_smt::{
    CheckResult, FunctionSort, HornSolver, ReadCallback, ResponseCache, Term, select_solver,
};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::arith;
use crate::context::EncodingContext;
use crate::diagnostics::{ChcError, ErrorReporter, codes};
use crate::predicates::{Predicate, PredicateArena, PredicateId, PredicateKind};
use crate::scan::{CallScan, scan_contract};
use crate::settings::ModelCheckerSettings;
use crate::sorts;

/// An `assert` whose reachability is checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationTarget {
    /// The `assert(...)` call expression.
    pub assertion: NodeId,
    pub span: Span,
    pub contract: String,
    pub function: String,
    /// Argument of the contract's error predicate for this assertion.
    pub error_index: u64,
    pub verdict: Option<CheckResult>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct LoopDestinations {
    pub break_target: PredicateId,
    pub continue_target: PredicateId,
}

pub(crate) struct ContractScope {
    pub name: String,
    pub state: Vec<NodeId>,
    pub state_types: Vec<TypeName>,
    pub constructor: PredicateId,
    pub interface: PredicateId,
    pub error: PredicateId,
    pub summaries: BTreeMap<NodeId, PredicateId>,
    pub returns: BTreeMap<NodeId, Vec<TypeName>>,
    pub calls: CallScan,
    pub next_error_index: u64,
    pub first_target: usize,
}

pub(crate) struct FunctionScope {
    pub name: String,
    pub params: Vec<NodeId>,
    pub returns: Vec<NodeId>,
    pub locals: Vec<NodeId>,
    pub sort: FunctionSort,
    pub summary: PredicateId,
}

/// Encodes contracts as constrained Horn clauses and checks every
/// assertion for reachability of the contract's error predicate.
pub struct Chc<'r> {
    pub(crate) reporter: &'r mut ErrorReporter,
    pub(crate) solver: Box<dyn HornSolver>,
    pub(crate) predicates: PredicateArena,
    pub(crate) context: EncodingContext,
    block_sorts: BTreeMap<NodeId, FunctionSort>,
    genesis: Option<PredicateId>,
    pub(crate) contract: Option<ContractScope>,
    pub(crate) function: Option<FunctionScope>,
    pub(crate) current_block: Option<Term>,
    pub(crate) loops: Vec<LoopDestinations>,
    /// Nesting depth of conditionally evaluated subexpressions.
    pub(crate) branch_depth: usize,
    pub(crate) unknown_function_call_seen: bool,
    targets: Vec<VerificationTarget>,
    safe: BTreeSet<NodeId>,
    rule_count: usize,
}

impl<'r> Chc<'r> {
    pub fn new(
        reporter: &'r mut ErrorReporter,
        settings: &ModelCheckerSettings,
        responses: ResponseCache,
        callback: Option<ReadCallback>,
    ) -> Self {
        let solver = select_solver(&settings.solver_settings(), responses, callback);
        Self::with_solver(reporter, solver)
    }

    pub fn with_solver(reporter: &'r mut ErrorReporter, solver: Box<dyn HornSolver>) -> Self {
        Self {
            reporter,
            solver,
            predicates: PredicateArena::new(),
            context: EncodingContext::new(),
            block_sorts: BTreeMap::new(),
            genesis: None,
            contract: None,
            function: None,
            current_block: None,
            loops: Vec::new(),
            branch_depth: 0,
            unknown_function_call_seen: false,
            targets: Vec::new(),
            safe: BTreeSet::new(),
            rule_count: 0,
        }
    }

    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Encodes and checks every contract of `unit`. On error the safe set
    /// is left empty.
    pub fn analyze(&mut self, unit: &SourceUnit) -> Result<(), ChcError> {
        self.reset();
        let result = self.encode_source(unit);
        if result.is_err() {
            self.safe.clear();
        }
        result
    }

    /// Clears the encoding position and per-run results. Predicates and
    /// rules already handed to the solver are kept.
    pub fn reset(&mut self) {
        self.targets.clear();
        self.safe.clear();
        self.loops.clear();
        self.contract = None;
        self.function = None;
        self.current_block = None;
        self.genesis = None;
        self.block_sorts.clear();
        self.branch_depth = 0;
        self.unknown_function_call_seen = false;
        self.context.clear_assertions();
        self.context.clear_indices();
    }

    pub fn safe_assertions(&self) -> &BTreeSet<NodeId> {
        &self.safe
    }

    pub fn verification_targets(&self) -> &[VerificationTarget] {
        &self.targets
    }

    pub fn unhandled_queries(&self) -> Vec<String> {
        self.solver.unhandled_queries()
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn unknown_function_call_seen(&self) -> bool {
        self.unknown_function_call_seen
    }

    fn encode_source(&mut self, unit: &SourceUnit) -> Result<(), ChcError> {
        let unhandled_before = self.solver.unhandled_queries().len();
        let genesis = self.create_predicate(
            PredicateKind::Genesis,
            "genesis",
            FunctionSort::default(),
            None,
        );
        self.genesis = Some(genesis);
        let fact = self.predicates.get(genesis).decl.apply(Vec::new())?;
        self.add_rule(fact, "genesis")?;

        for contract in &unit.contracts {
            if contract.kind != ContractKind::Contract {
                debug!(contract = %contract.name, kind = ?contract.kind, "skipping");
                continue;
            }
            self.visit_contract(contract)?;
        }

        let unhandled = self.solver.unhandled_queries().len() - unhandled_before;
        if unhandled > 0 {
            self.reporter.warning(
                codes::SOLVER,
                None,
                format!(
                    "CHC: {unhandled} verification condition(s) could not be solved because no \
                     Horn solver is available. Enable z3 or golem, or solve the exported \
                     queries and provide their responses."
                ),
            );
        }
        info!(
            path = %unit.path,
            predicates = self.predicates.len(),
            rules = self.rule_count,
            targets = self.targets.len(),
            safe = self.safe.len(),
            solver = self.solver.name(),
            "analysis finished"
        );
        Ok(())
    }

    // Contracts

    fn visit_contract(&mut self, contract: &ContractDefinition) -> Result<(), ChcError> {
        debug!(contract = %contract.name, "encoding contract");
        self.context.clear_variables();
        for var in &contract.state_variables {
            self.context.declare(var);
        }

        let name = &contract.name;
        let interface_sort = sorts::interface_sort(contract);
        let constructor = self.create_predicate(
            PredicateKind::Constructor,
            &format!("implicit_constructor_{name}"),
            interface_sort.clone(),
            Some(contract.id),
        );
        let interface = self.create_predicate(
            PredicateKind::Interface,
            &format!("interface_{name}"),
            interface_sort,
            Some(contract.id),
        );
        let error = self.create_predicate(
            PredicateKind::Error,
            &format!("error_{name}"),
            sorts::error_sort(),
            Some(contract.id),
        );

        let mut summaries = BTreeMap::new();
        let mut returns = BTreeMap::new();
        for f in contract.functions.iter().filter(|f| f.is_implemented()) {
            let summary = self.create_predicate(
                PredicateKind::Summary,
                &format!("summary_{}_function_{}", f.id, f.name),
                sorts::summary_sort(contract, f),
                Some(f.id),
            );
            summaries.insert(f.id, summary);
            returns.insert(f.id, f.return_parameters.iter().map(|r| r.ty).collect());
        }

        self.contract = Some(ContractScope {
            name: name.clone(),
            state: contract.state_variables.iter().map(|v| v.id).collect(),
            state_types: contract.state_variables.iter().map(|v| v.ty).collect(),
            constructor,
            interface,
            error,
            summaries,
            returns,
            calls: scan_contract(contract),
            next_error_index: 0,
            first_target: self.targets.len(),
        });

        self.encode_state_initialization(contract)?;

        match contract.constructor().filter(|c| c.is_implemented()) {
            Some(ctor) => {
                self.visit_function(contract, ctor)?;
                self.add_transaction_rule(contract, ctor, constructor)?;
            }
            None => {
                let pre = self.state_vector("");
                let head = self.apply(interface, pre.clone())?;
                let body = self.apply(constructor, pre)?;
                self.add_rule(Term::implies(body, head), &format!("{name}_constructor_to_interface"))?;
            }
        }

        for f in contract
            .functions
            .iter()
            .filter(|f| f.is_implemented() && !f.is_constructor())
        {
            self.visit_function(contract, f)?;
            if f.is_public() {
                self.add_transaction_rule(contract, f, interface)?;
            }
        }

        self.check_contract_targets()?;
        self.contract = None;
        Ok(())
    }

    /// `genesis ∧ defaults ∧ initializers => constructor(state)`.
    fn encode_state_initialization(&mut self, contract: &ContractDefinition) -> Result<(), ChcError> {
        let genesis = self.genesis_predicate()?;
        self.function = None;
        self.current_block = Some(self.apply(genesis, Vec::new())?);
        self.context.clear_assertions();
        self.context.clear_indices();

        for var in &contract.state_variables {
            let current = self.current_value(var.id)?;
            self.context
                .add_assertion(Term::eq(current, arith::default_value(var.ty)));
        }
        for var in &contract.state_variables {
            if let Some(value) = &var.value {
                let v = self.eval_expr(value)?;
                self.assign_variable(var.id, v)?;
            }
        }

        let constructor = self.contract_scope()?.constructor;
        let head = self.apply(constructor, self.state_vector_current()?)?;
        self.connect_to(head, Term::truth())
    }

    /// `source(s) ∧ summary_f(s, p, r, s') => interface(s')`.
    fn add_transaction_rule(
        &mut self,
        contract: &ContractDefinition,
        f: &FunctionDefinition,
        source: PredicateId,
    ) -> Result<(), ChcError> {
        let scope = self.contract_scope()?;
        let interface = scope.interface;
        let summary = *scope
            .summaries
            .get(&f.id)
            .ok_or_else(|| ChcError::internal(format!("no summary for `{}`", f.name)))?;

        let pre = self.state_vector("");
        let post = self.state_vector("_post");
        let mut args = pre.clone();
        for (i, p) in f.parameters.iter().enumerate() {
            args.push(Term::var(format!("p{i}_{}", p.id), sorts::type_sort(p.ty)));
        }
        for (i, r) in f.return_parameters.iter().enumerate() {
            args.push(Term::var(format!("r{i}_{}", r.id), sorts::type_sort(r.ty)));
        }
        args.extend(post.iter().cloned());

        let body = Term::and([self.apply(source, pre)?, self.apply(summary, args)?]);
        let head = self.apply(interface, post)?;
        self.add_rule(
            Term::implies(body, head),
            &format!("{}_{}_transaction", contract.name, f.name),
        )
    }

    /// State variables as plain named variables, for rules written outside
    /// any function body.
    fn state_vector(&self, suffix: &str) -> Vec<Term> {
        let Some(scope) = &self.contract else {
            return Vec::new();
        };
        scope
            .state
            .iter()
            .zip(&scope.state_types)
            .map(|(id, ty)| Term::var(format!("s_{id}{suffix}"), sorts::type_sort(*ty)))
            .collect()
    }

    pub(crate) fn state_vector_current(&self) -> Result<Vec<Term>, ChcError> {
        let ids = self.contract_scope()?.state.clone();
        ids.into_iter().map(|id| self.current_value(id)).collect()
    }

    // Functions

    fn visit_function(
        &mut self,
        contract: &ContractDefinition,
        f: &FunctionDefinition,
    ) -> Result<(), ChcError> {
        debug!(function = %f.name, "encoding function");
        let Some(body) = &f.body else {
            return Ok(());
        };
        let summary = *self
            .contract_scope()?
            .summaries
            .get(&f.id)
            .ok_or_else(|| ChcError::internal(format!("no summary for `{}`", f.name)))?;

        let locals = f.local_variables();
        for decl in f.parameters.iter().chain(&f.return_parameters).chain(locals.iter().copied()) {
            self.context.declare(decl);
        }
        let sort = self
            .block_sorts
            .entry(f.id)
            .or_insert_with(|| sorts::block_sort(contract, f))
            .clone();
        self.function = Some(FunctionScope {
            name: f.name.clone(),
            params: f.parameters.iter().map(|p| p.id).collect(),
            returns: f.return_parameters.iter().map(|r| r.id).collect(),
            locals: locals.iter().map(|l| l.id).collect(),
            sort,
            summary,
        });
        self.loops.clear();

        let entry = self.create_block(f.id, &format!("function_{}_{}_entry", f.name, f.id));
        self.seed_entry(f, entry)?;
        self.set_current_block(entry)?;

        for stmt in &body.statements {
            self.visit_stmt(stmt)?;
        }

        self.connect_to_summary()?;
        self.function = None;
        self.current_block = None;
        Ok(())
    }

    /// Rule into the entry block of `f` from the predicate describing the
    /// states the function may start in.
    fn seed_entry(&mut self, f: &FunctionDefinition, entry: PredicateId) -> Result<(), ChcError> {
        self.context.clear_assertions();
        self.context.clear_indices();
        let scope = self.contract_scope()?;
        let source = if f.is_constructor() {
            self.apply(scope.constructor, self.state_vector_current()?)?
        } else if f.is_public()
            && !scope.calls.has_unknown_calls
            && !scope.calls.internally_called.contains(&f.id)
        {
            self.apply(scope.interface, self.state_vector_current()?)?
        } else {
            let genesis = self.genesis_predicate()?;
            self.apply(genesis, Vec::new())?
        };
        trace!(function = %f.name, source = %relation_name(&source), "entry seed");
        self.current_block = Some(source);

        let scope = self.contract_scope()?;
        let typed_state: Vec<(NodeId, TypeName)> =
            scope.state.iter().copied().zip(scope.state_types.iter().copied()).collect();
        let typed_params: Vec<(NodeId, TypeName)> =
            f.parameters.iter().map(|p| (p.id, p.ty)).collect();
        let mut constraints = Vec::new();
        for (id, ty) in typed_state.iter().chain(&typed_params) {
            let current = self.current_value(*id)?;
            let snapshot = self
                .context
                .snapshot(*id)
                .ok_or_else(|| ChcError::internal("undeclared variable in entry snapshot"))?;
            constraints.push(Term::eq(snapshot, current.clone()));
            constraints.push(arith::range_constraint(*ty, &current));
        }
        for decl in f.return_parameters.iter().chain(f.local_variables()) {
            let current = self.current_value(decl.id)?;
            constraints.push(Term::eq(current, arith::default_value(decl.ty)));
        }
        self.connect_blocks(entry, Term::and(constraints))
    }

    pub(crate) fn connect_to_summary(&mut self) -> Result<(), ChcError> {
        let scope = self.function_scope()?;
        let summary = scope.summary;
        let params = scope.params.clone();
        let returns = scope.returns.clone();
        let state = self.contract_scope()?.state.clone();

        let mut args = Vec::new();
        for id in state.iter().chain(&params) {
            args.push(
                self.context
                    .snapshot(*id)
                    .ok_or_else(|| ChcError::internal("undeclared variable in summary"))?,
            );
        }
        for id in returns.iter().chain(&state) {
            args.push(self.current_value(*id)?);
        }
        let head = self.apply(summary, args)?;
        self.connect_to(head, Term::truth())
    }

    // Blocks and rules

    pub(crate) fn create_predicate(
        &mut self,
        kind: PredicateKind,
        tag: &str,
        sort: FunctionSort,
        node: Option<NodeId>,
    ) -> PredicateId {
        let id = self.predicates.create(kind, tag, sort, node);
        self.solver.register_relation(&self.predicates.get(id).decl);
        id
    }

    /// A block of the current function, sorted by its block sort.
    pub(crate) fn create_block(&mut self, node: NodeId, tag: &str) -> PredicateId {
        let sort = self
            .function
            .as_ref()
            .map(|f| f.sort.clone())
            .unwrap_or_default();
        self.create_predicate(PredicateKind::Block, tag, sort, Some(node))
    }

    pub(crate) fn apply(&self, predicate: PredicateId, args: Vec<Term>) -> Result<Term, ChcError> {
        Ok(self.predicates.get(predicate).decl.apply(args)?)
    }

    /// `block(snapshot, state, params, returns, locals)` at current indices.
    pub(crate) fn block_application(&self, block: PredicateId) -> Result<Term, ChcError> {
        let contract = self.contract_scope()?;
        let function = self.function_scope()?;
        let mut args = Vec::new();
        for id in contract.state.iter().chain(&function.params) {
            args.push(
                self.context
                    .snapshot(*id)
                    .ok_or_else(|| ChcError::internal("undeclared variable in block"))?,
            );
        }
        for id in contract
            .state
            .iter()
            .chain(&function.params)
            .chain(&function.returns)
            .chain(&function.locals)
        {
            args.push(self.current_value(*id)?);
        }
        self.apply(block, args)
    }

    pub(crate) fn set_current_block(&mut self, block: PredicateId) -> Result<(), ChcError> {
        self.context.clear_assertions();
        self.context.clear_indices();
        self.current_block = Some(self.block_application(block)?);
        Ok(())
    }

    /// Continues in a block nothing leads to, after control left the
    /// current path.
    pub(crate) fn set_ghost_block(&mut self, node: NodeId) -> Result<(), ChcError> {
        let ghost = self.create_block(node, &format!("ghost_{node}"));
        self.set_current_block(ghost)
    }

    pub(crate) fn connect_blocks(&mut self, to: PredicateId, constraint: Term) -> Result<(), ChcError> {
        let head = self.block_application(to)?;
        self.connect_to(head, constraint)
    }

    /// `current ∧ assertions ∧ constraint => head`.
    pub(crate) fn connect_to(&mut self, head: Term, constraint: Term) -> Result<(), ChcError> {
        let from = self
            .current_block
            .clone()
            .ok_or_else(|| ChcError::internal("no current block"))?;
        let name = format!("{}_to_{}", relation_name(&from), relation_name(&head));
        let mut body = vec![from];
        body.extend(self.context.assertions().iter().cloned());
        body.push(constraint);
        self.add_rule(Term::implies(Term::and(body), head), &name)
    }

    fn add_rule(&mut self, rule: Term, name: &str) -> Result<(), ChcError> {
        trace!(%name, "rule");
        self.solver.add_rule(&rule, name)?;
        self.rule_count += 1;
        Ok(())
    }

    // Assertions and queries

    /// Adds the violation rule for `assert(condition)` and records its target.
    pub(crate) fn add_verification_target(
        &mut self,
        assertion: NodeId,
        span: Span,
        condition: Term,
    ) -> Result<(), ChcError> {
        let scope = self
            .contract
            .as_mut()
            .ok_or_else(|| ChcError::internal("assertion outside a contract"))?;
        let index = scope.next_error_index;
        scope.next_error_index += 1;
        let error = scope.error;
        let contract = scope.name.clone();
        let function = self
            .function
            .as_ref()
            .map(|f| f.name.clone())
            .unwrap_or_default();

        let head = self.apply(error, vec![Term::int(index)])?;
        self.connect_to(head, Term::not(condition))?;
        debug!(%assertion, index, "verification target");
        self.targets.push(VerificationTarget {
            assertion,
            span,
            contract,
            function,
            error_index: index,
            verdict: None,
        });
        Ok(())
    }

    /// Issued once the whole contract is encoded, so loop back-edges that
    /// follow an assertion are already part of the system.
    fn check_contract_targets(&mut self) -> Result<(), ChcError> {
        let scope = self.contract_scope()?;
        let error = scope.error;
        let first = scope.first_target;
        for i in first..self.targets.len() {
            let target = self.targets[i].clone();
            if self.safe.contains(&target.assertion) {
                self.targets[i].verdict = Some(CheckResult::Unsatisfiable);
                continue;
            }
            let query = self.apply(error, vec![Term::int(target.error_index)])?;
            let verdict = self.solver.query(&query)?;
            debug!(assertion = %target.assertion, %verdict, "query");
            self.targets[i].verdict = Some(verdict);
            match verdict {
                CheckResult::Unsatisfiable => {
                    self.safe.insert(target.assertion);
                }
                CheckResult::Satisfiable => self.reporter.warning(
                    codes::VIOLATION,
                    Some(target.span),
                    "CHC: Assertion violation happens here.",
                ),
                CheckResult::Unknown => self.reporter.warning(
                    codes::UNPROVED,
                    Some(target.span),
                    "CHC: Assertion violation might happen here.",
                ),
                CheckResult::Error => {
                    warn!(assertion = %target.assertion, "Horn solver failed");
                    self.reporter.warning(
                        codes::SOLVER,
                        Some(target.span),
                        "CHC: Error trying to invoke Horn solver.",
                    )
                }
            }
        }
        info!(
            contract = %self.contract_scope()?.name,
            targets = self.targets.len() - first,
            "contract checked"
        );
        Ok(())
    }

    // Lookups

    pub(crate) fn contract_scope(&self) -> Result<&ContractScope, ChcError> {
        self.contract
            .as_ref()
            .ok_or_else(|| ChcError::internal("no contract being encoded"))
    }

    pub(crate) fn function_scope(&self) -> Result<&FunctionScope, ChcError> {
        self.function
            .as_ref()
            .ok_or_else(|| ChcError::internal("no function being encoded"))
    }

    fn genesis_predicate(&self) -> Result<PredicateId, ChcError> {
        self.genesis
            .ok_or_else(|| ChcError::internal("genesis predicate missing"))
    }

    pub(crate) fn current_value(&self, id: NodeId) -> Result<Term, ChcError> {
        self.context
            .current(id)
            .ok_or_else(|| ChcError::internal(format!("variable {id} is not declared")))
    }

    pub(crate) fn assign_variable(&mut self, id: NodeId, value: Term) -> Result<Term, ChcError> {
        let fresh = self
            .context
            .new_value(id)
            .ok_or_else(|| ChcError::internal(format!("variable {id} is not declared")))?;
        self.context.add_assertion(Term::eq(fresh.clone(), value));
        Ok(fresh)
    }

    /// Every state variable takes an arbitrary in-range value.
    pub(crate) fn erase_knowledge(&mut self) -> Result<(), ChcError> {
        let scope = self.contract_scope()?;
        let state: Vec<(NodeId, TypeName)> = scope
            .state
            .iter()
            .copied()
            .zip(scope.state_types.iter().copied())
            .collect();
        for (id, ty) in state {
            let fresh = self
                .context
                .new_value(id)
                .ok_or_else(|| ChcError::internal(format!("variable {id} is not declared")))?;
            self.context.add_assertion(arith::range_constraint(ty, &fresh));
        }
        Ok(())
    }

    pub(crate) fn unsupported(&mut self, span: Span, what: &str) {
        debug!(%what, "unsupported construct");
        self.reporter.warning(
            codes::UNSUPPORTED,
            Some(span),
            format!("CHC does not yet support {what}."),
        );
    }
}

fn relation_name(t: &Term) -> &str {
    match t {
        Term::Relation { name, .. } => name,
        _ => "rule",
    }
}
