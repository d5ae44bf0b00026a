#![forbid(unsafe_code)]

use horn_ast::{Stmt, StmtKind, VariableDeclaration};
use horn_smt::Term;

use crate::arith;
use crate::diagnostics::ChcError;
use crate::encoder::{Chc, LoopDestinations};

impl Chc<'_> {
    pub(crate) fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), ChcError> {
        match &stmt.kind {
            StmtKind::Block(block) => {
                for s in &block.statements {
                    self.visit_stmt(s)?;
                }
                Ok(())
            }
            StmtKind::VariableDeclaration(decl) => self.visit_declaration(decl),
            StmtKind::Expression(e) => {
                self.eval_expr(e)?;
                Ok(())
            }
            StmtKind::If {
                condition,
                true_body,
                false_body,
            } => self.visit_if(stmt, condition, true_body, false_body.as_deref()),
            StmtKind::While {
                condition,
                body,
                do_while: false,
            } => self.visit_while(stmt, condition, body),
            StmtKind::While {
                condition,
                body,
                do_while: true,
            } => self.visit_do_while(stmt, condition, body),
            StmtKind::For {
                init,
                condition,
                loop_expression,
                body,
            } => self.visit_for(
                stmt,
                init.as_deref(),
                condition.as_ref(),
                loop_expression.as_deref(),
                body,
            ),
            StmtKind::Break | StmtKind::Continue => {
                let Some(dest) = self.loops.last().copied() else {
                    self.unsupported(stmt.span, "break or continue outside a loop");
                    return Ok(());
                };
                let target = if matches!(stmt.kind, StmtKind::Break) {
                    dest.break_target
                } else {
                    dest.continue_target
                };
                self.connect_blocks(target, Term::truth())?;
                self.set_ghost_block(stmt.id)
            }
            StmtKind::Return(values) => {
                let mut terms = Vec::with_capacity(values.len());
                for v in values {
                    terms.push(self.eval_expr(v)?);
                }
                let returns = self.function_scope()?.returns.clone();
                if terms.len() == returns.len() {
                    for (id, value) in returns.into_iter().zip(terms) {
                        self.assign_variable(id, value)?;
                    }
                } else if !terms.is_empty() {
                    self.unsupported(stmt.span, "this return statement");
                    for id in returns {
                        let ty = self
                            .context
                            .variable(id)
                            .map(|v| v.ty)
                            .ok_or_else(|| ChcError::internal(format!("variable {id} is not declared")))?;
                        let value = self.context.fresh_value(ty);
                        self.assign_variable(id, value)?;
                    }
                }
                self.connect_to_summary()?;
                self.set_ghost_block(stmt.id)
            }
        }
    }

    /// Locals are zero-initialized on every execution of their declaration.
    fn visit_declaration(&mut self, decl: &VariableDeclaration) -> Result<(), ChcError> {
        let value = match &decl.value {
            Some(e) => self.eval_expr(e)?,
            None => arith::default_value(decl.ty),
        };
        self.assign_variable(decl.id, value)?;
        Ok(())
    }

    fn visit_if(
        &mut self,
        stmt: &Stmt,
        condition: &horn_ast::Expr,
        true_body: &Stmt,
        false_body: Option<&Stmt>,
    ) -> Result<(), ChcError> {
        let c = self.eval_expr(condition)?;
        let then_block = self.create_block(stmt.id, &format!("if_true_{}", stmt.id));
        let else_block = false_body.map(|_| self.create_block(stmt.id, &format!("if_false_{}", stmt.id)));
        let after = self.create_block(stmt.id, &format!("if_after_{}", stmt.id));

        self.connect_blocks(then_block, c.clone())?;
        self.connect_blocks(else_block.unwrap_or(after), Term::not(c))?;

        self.set_current_block(then_block)?;
        self.visit_stmt(true_body)?;
        self.connect_blocks(after, Term::truth())?;

        if let (Some(block), Some(body)) = (else_block, false_body) {
            self.set_current_block(block)?;
            self.visit_stmt(body)?;
            self.connect_blocks(after, Term::truth())?;
        }

        self.set_current_block(after)
    }

    fn visit_while(
        &mut self,
        stmt: &Stmt,
        condition: &horn_ast::Expr,
        body: &Stmt,
    ) -> Result<(), ChcError> {
        let header = self.create_block(stmt.id, &format!("while_header_{}", stmt.id));
        let body_block = self.create_block(stmt.id, &format!("while_body_{}", stmt.id));
        let after = self.create_block(stmt.id, &format!("while_after_{}", stmt.id));

        self.connect_blocks(header, Term::truth())?;
        self.set_current_block(header)?;
        let c = self.eval_expr(condition)?;
        self.connect_blocks(body_block, c.clone())?;
        self.connect_blocks(after, Term::not(c))?;

        self.loops.push(LoopDestinations {
            break_target: after,
            continue_target: header,
        });
        self.set_current_block(body_block)?;
        self.visit_stmt(body)?;
        self.connect_blocks(header, Term::truth())?;
        self.loops.pop();

        self.set_current_block(after)
    }

    fn visit_do_while(
        &mut self,
        stmt: &Stmt,
        condition: &horn_ast::Expr,
        body: &Stmt,
    ) -> Result<(), ChcError> {
        let body_block = self.create_block(stmt.id, &format!("do_while_body_{}", stmt.id));
        let header = self.create_block(stmt.id, &format!("do_while_header_{}", stmt.id));
        let after = self.create_block(stmt.id, &format!("do_while_after_{}", stmt.id));

        self.connect_blocks(body_block, Term::truth())?;
        self.loops.push(LoopDestinations {
            break_target: after,
            continue_target: header,
        });
        self.set_current_block(body_block)?;
        self.visit_stmt(body)?;
        self.connect_blocks(header, Term::truth())?;
        self.loops.pop();

        self.set_current_block(header)?;
        let c = self.eval_expr(condition)?;
        self.connect_blocks(body_block, c.clone())?;
        self.connect_blocks(after, Term::not(c))?;

        self.set_current_block(after)
    }

    fn visit_for(
        &mut self,
        stmt: &Stmt,
        init: Option<&Stmt>,
        condition: Option<&horn_ast::Expr>,
        loop_expression: Option<&Stmt>,
        body: &Stmt,
    ) -> Result<(), ChcError> {
        if let Some(init) = init {
            self.visit_stmt(init)?;
        }

        let header = self.create_block(stmt.id, &format!("for_header_{}", stmt.id));
        let body_block = self.create_block(stmt.id, &format!("for_body_{}", stmt.id));
        let increment = loop_expression
            .map(|_| self.create_block(stmt.id, &format!("for_loop_expression_{}", stmt.id)));
        let after = self.create_block(stmt.id, &format!("for_after_{}", stmt.id));

        self.connect_blocks(header, Term::truth())?;
        self.set_current_block(header)?;
        let c = match condition {
            Some(e) => self.eval_expr(e)?,
            None => Term::truth(),
        };
        self.connect_blocks(body_block, c.clone())?;
        self.connect_blocks(after, Term::not(c))?;

        self.loops.push(LoopDestinations {
            break_target: after,
            continue_target: increment.unwrap_or(header),
        });
        self.set_current_block(body_block)?;
        self.visit_stmt(body)?;

        if let (Some(block), Some(expr)) = (increment, loop_expression) {
            self.connect_blocks(block, Term::truth())?;
            self.set_current_block(block)?;
            self.visit_stmt(expr)?;
        }
        self.connect_blocks(header, Term::truth())?;
        self.loops.pop();

        self.set_current_block(after)
    }
}
