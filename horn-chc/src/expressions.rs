#![forbid(unsafe_code)]

use horn_ast::{BinaryOp, Builtin, Callee, Expr, ExprKind, NodeId, TypeName, UnaryOp};
use horn_smt::Term;
use tracing::trace;

use crate::arith;
use crate::context::Indices;
use crate::diagnostics::ChcError;
use crate::encoder::Chc;

/// Value of expressions that produce none, such as `assert(...)`.
fn unit() -> Term {
    Term::truth()
}

fn numeric_type(e: &Expr) -> TypeName {
    match e.ty {
        Some(ty) if !ty.is_bool() => ty,
        _ => TypeName::uint256(),
    }
}

impl Chc<'_> {
    pub(crate) fn eval_expr(&mut self, e: &Expr) -> Result<Term, ChcError> {
        match &e.kind {
            ExprKind::Bool(b) => Ok(Term::Bool(*b)),
            ExprKind::Number(n) => Ok(Term::Int(n.clone())),
            ExprKind::Identifier { name, declaration } => match self.context.current(*declaration) {
                Some(t) => Ok(t),
                None => {
                    self.unsupported(e.span, &format!("the identifier `{name}`"));
                    Ok(self.fresh_value(e.ty))
                }
            },
            ExprKind::Unary { op, operand } => self.eval_unary(e, *op, operand),
            ExprKind::Binary { op, left, right } => self.eval_binary(e, *op, left, right),
            ExprKind::Assignment { op, target, value } => {
                let mut v = self.eval_expr(value)?;
                if let Some(bin) = op.binary() {
                    let current = self.eval_expr(target)?;
                    v = self.arithmetic(e, bin, current, v);
                }
                self.assign(target, v)
            }
            ExprKind::Conditional {
                condition,
                true_expr,
                false_expr,
            } => {
                let c = self.eval_expr(condition)?;
                let (t, on_true) = self.in_branch(&c, |s| s.eval_expr(true_expr))?;
                let (f, on_false) = self.in_branch(&Term::not(c.clone()), |s| s.eval_expr(false_expr))?;
                self.context.merge(&c, &on_true, &on_false);
                Ok(Term::ite(c, t, f))
            }
            ExprKind::MemberAccess { member, .. } => {
                self.unsupported(e.span, &format!("the member access `.{member}`"));
                Ok(self.fresh_value(e.ty))
            }
            ExprKind::Call { callee, arguments } => self.eval_call(e, callee, arguments),
        }
    }

    pub(crate) fn fresh_value(&mut self, ty: Option<TypeName>) -> Term {
        self.context.fresh_value(ty.unwrap_or_else(TypeName::uint256))
    }

    /// Evaluates `f` on a path guarded by `guard`. Constraints it adds hold
    /// only under the guard; the returned indices are its outcome and the
    /// context is pointed back at the indices from before.
    fn in_branch<T>(
        &mut self,
        guard: &Term,
        f: impl FnOnce(&mut Self) -> Result<T, ChcError>,
    ) -> Result<(T, Indices), ChcError> {
        let before = self.context.indices();
        let mark = self.context.assertion_mark();
        self.branch_depth += 1;
        let out = f(self);
        self.branch_depth -= 1;
        let out = out?;
        let added = self.context.split_assertions(mark);
        if !added.is_empty() {
            self.context
                .add_assertion(Term::implies(guard.clone(), Term::and(added)));
        }
        let after = self.context.indices();
        self.context.set_indices(&before);
        Ok((out, after))
    }

    fn eval_unary(&mut self, e: &Expr, op: UnaryOp, operand: &Expr) -> Result<Term, ChcError> {
        let ty = numeric_type(e);
        match op {
            UnaryOp::Not => Ok(Term::not(self.eval_expr(operand)?)),
            UnaryOp::Neg => Ok(arith::neg(ty, self.eval_expr(operand)?)),
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let old = self.eval_expr(operand)?;
                let new = if matches!(op, UnaryOp::PreInc | UnaryOp::PostInc) {
                    arith::add(ty, old.clone(), Term::int(1))
                } else {
                    arith::sub(ty, old.clone(), Term::int(1))
                };
                let new = self.assign(operand, new)?;
                Ok(if matches!(op, UnaryOp::PreInc | UnaryOp::PreDec) {
                    new
                } else {
                    old
                })
            }
        }
    }

    fn eval_binary(
        &mut self,
        e: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Term, ChcError> {
        let l = self.eval_expr(left)?;

        if op.is_boolean() {
            // The right operand only runs when the left does not decide.
            let guard = if op == BinaryOp::And {
                l.clone()
            } else {
                Term::not(l.clone())
            };
            let skipped = self.context.indices();
            let (r, evaluated) = self.in_branch(&guard, |s| s.eval_expr(right))?;
            self.context.merge(&guard, &evaluated, &skipped);
            return Ok(if op == BinaryOp::And {
                Term::and([l, r])
            } else {
                Term::or([l, r])
            });
        }

        let r = self.eval_expr(right)?;
        Ok(match op {
            BinaryOp::Eq => Term::eq(l, r),
            BinaryOp::Ne => Term::ne(l, r),
            BinaryOp::Lt => Term::lt(l, r),
            BinaryOp::Gt => Term::gt(l, r),
            BinaryOp::Le => Term::le(l, r),
            BinaryOp::Ge => Term::ge(l, r),
            _ => self.arithmetic(e, op, l, r),
        })
    }

    fn arithmetic(&mut self, e: &Expr, op: BinaryOp, l: Term, r: Term) -> Term {
        let ty = numeric_type(e);
        match op {
            BinaryOp::Add => arith::add(ty, l, r),
            BinaryOp::Sub => arith::sub(ty, l, r),
            BinaryOp::Mul => arith::mul(ty, l, r),
            BinaryOp::Div | BinaryOp::Mod => {
                // Division by zero reverts.
                self.context.add_assertion(Term::ne(r.clone(), Term::int(0)));
                if op == BinaryOp::Div {
                    arith::div(ty, l, r)
                } else {
                    arith::modulo(ty, l, r)
                }
            }
            _ => {
                trace!(?op, "non-arithmetic operator in arithmetic position");
                self.context.fresh_value(ty)
            }
        }
    }

    /// Writes `value` to an assignable target and returns the new value.
    fn assign(&mut self, target: &Expr, value: Term) -> Result<Term, ChcError> {
        if let ExprKind::Identifier { declaration, .. } = &target.kind {
            if self.context.variable(*declaration).is_some() {
                return self.assign_variable(*declaration, value);
            }
        }
        self.unsupported(target.span, "this assignment target");
        Ok(value)
    }

    fn eval_call(&mut self, e: &Expr, callee: &Callee, arguments: &[Expr]) -> Result<Term, ChcError> {
        match callee {
            Callee::Builtin(Builtin::Assert) => {
                let Some(arg) = arguments.first() else {
                    self.unsupported(e.span, "assert without a condition");
                    return Ok(unit());
                };
                let c = self.eval_expr(arg)?;
                self.add_verification_target(e.id, e.span, c.clone())?;
                // A failing assertion reverts.
                self.context.add_assertion(c);
                Ok(unit())
            }
            Callee::Builtin(Builtin::Require) => {
                for (i, arg) in arguments.iter().enumerate() {
                    let v = self.eval_expr(arg)?;
                    if i == 0 {
                        self.context.add_assertion(v);
                    }
                }
                Ok(unit())
            }
            Callee::Builtin(Builtin::Revert) => {
                for arg in arguments {
                    self.eval_expr(arg)?;
                }
                self.set_ghost_block(e.id)?;
                Ok(unit())
            }
            Callee::Internal { function, .. } => {
                let known = self
                    .contract_scope()?
                    .summaries
                    .contains_key(function);
                if known && self.branch_depth == 0 {
                    self.internal_call(e, *function, arguments)
                } else {
                    self.unknown_call(e, arguments)
                }
            }
            Callee::External { target, .. } => {
                self.eval_expr(target)?;
                self.unknown_call(e, arguments)
            }
        }
    }

    /// `summary_g(state, args, rets, state')` joins the current path; the
    /// callee body is never inlined.
    fn internal_call(
        &mut self,
        e: &Expr,
        function: NodeId,
        arguments: &[Expr],
    ) -> Result<Term, ChcError> {
        let mut values = Vec::with_capacity(arguments.len());
        for a in arguments {
            values.push(self.eval_expr(a)?);
        }
        // Pre-state includes writes made while evaluating the arguments.
        let mut args = self.state_vector_current()?;
        args.extend(values);
        let (summary, return_types, state) = {
            let scope = self.contract_scope()?;
            let summary = scope
                .summaries
                .get(&function)
                .copied()
                .ok_or_else(|| ChcError::internal(format!("no summary for function {function}")))?;
            let returns = scope.returns.get(&function).cloned().unwrap_or_default();
            (summary, returns, scope.state.clone())
        };
        let rets: Vec<Term> = return_types
            .iter()
            .map(|ty| self.context.fresh_temp(*ty))
            .collect();
        args.extend(rets.iter().cloned());
        for id in state {
            let post = self
                .context
                .new_value(id)
                .ok_or_else(|| ChcError::internal(format!("variable {id} is not declared")))?;
            args.push(post);
        }
        let app = self.apply(summary, args)?;
        trace!(call = %e.id, "internal call");
        self.context.add_assertion(app);
        Ok(match rets.as_slice() {
            [single] => single.clone(),
            _ => unit(),
        })
    }

    /// Calls into code that may do anything to the contract state,
    /// including re-entering it.
    fn unknown_call(&mut self, e: &Expr, arguments: &[Expr]) -> Result<Term, ChcError> {
        for a in arguments {
            self.eval_expr(a)?;
        }
        self.unknown_function_call_seen = true;
        self.erase_knowledge()?;
        trace!(call = %e.id, "unknown call");
        Ok(match e.ty {
            Some(ty) => self.context.fresh_value(ty),
            None => unit(),
        })
    }
}
