//! Statements and structured control flow.

use std::sync::Arc;

use crate::{
    ast::{AstNode, NodeKind, VariableRc},
    il::{ILBlock, ILCatchBlock, ILExpression, ILNode, ILSwitchCase, ILVariableRc},
    translator::{argument, BlockTarget, Translation},
    typesystem::TypeRc,
    Result,
};

impl Translation<'_> {
    /// Translates a block. Each label starts a labeled block that runs to the next label
    /// or the end of the enclosing block.
    pub(super) fn block(&mut self, block: &ILBlock) -> Result<AstNode> {
        let mut statements = Vec::new();
        let mut segment = Vec::new();
        let mut label: Option<&str> = None;

        for node in &block.body {
            if let ILNode::Label(name) = node {
                close_segment(&mut statements, label, std::mem::take(&mut segment));
                label = Some(name);
                continue;
            }
            let statement = self.statement(node)?;
            if !statement.is_null() {
                segment.push(statement);
            }
        }
        close_segment(&mut statements, label, segment);

        Ok(AstNode::block(statements))
    }

    fn statement(&mut self, node: &ILNode) -> Result<AstNode> {
        match node {
            ILNode::Expression(expr) => {
                let value = self.expression(expr)?;
                if value.is_null() || value.kind().is_statement() {
                    return Ok(value);
                }
                Ok(AstNode::expression_statement(value))
            }
            ILNode::Label(_) => Ok(AstNode::null()),
            ILNode::Block(block) => self.block(block),
            ILNode::Condition {
                condition,
                true_block,
                false_block,
            } => {
                let condition = self.condition(condition)?;
                let then = self.block(true_block)?;
                let otherwise = match false_block {
                    Some(block) => self.block(block)?,
                    None => AstNode::null(),
                };
                Ok(AstNode::build(NodeKind::If, vec![condition, then, otherwise]))
            }
            ILNode::While { condition, body } => self.while_loop(condition.as_ref(), body),
            ILNode::Switch { condition, cases } => self.switch(condition, cases),
            ILNode::TryCatch {
                try_block,
                catch_blocks,
                finally_block,
                fault_block,
            } => self.try_catch(
                try_block,
                catch_blocks,
                finally_block.as_ref(),
                fault_block.as_ref(),
            ),
            ILNode::Fixed { initializers, body } => self.fixed(initializers, body),
        }
    }

    /// Runs `f` with `target` as the innermost break/continue target.
    fn scoped<T>(
        &mut self,
        target: BlockTarget,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.ctx.push_target(target);
        let result = f(self);
        self.ctx.pop_target();
        result
    }

    fn while_loop(&mut self, condition: Option<&ILExpression>, body: &ILBlock) -> Result<AstNode> {
        let condition = match condition {
            Some(condition) => self.condition(condition)?,
            None => AstNode::boolean(true),
        };
        let index = self.ctx.next_loop_index();
        let body = self.scoped(BlockTarget::Loop(index), |this| this.block(body))?;
        Ok(AstNode::build(NodeKind::While { index }, vec![condition, body]))
    }

    fn switch(&mut self, condition: &ILExpression, cases: &[ILSwitchCase]) -> Result<AstNode> {
        let value = self.expression(condition)?;
        let mut operands = Vec::with_capacity(cases.len() + 1);
        operands.push(value);

        self.scoped(BlockTarget::Switch, |this| {
            for case in cases {
                let body = this.block(&case.body)?;
                operands.push(AstNode::build(
                    NodeKind::SwitchCase {
                        values: case.values.clone(),
                        is_default: case.values.is_empty(),
                    },
                    vec![body],
                ));
            }
            Ok(())
        })?;

        Ok(AstNode::build(NodeKind::Switch, operands))
    }

    /// Typed handlers fold into one catch block: a chain of type tests over the caught
    /// exception, ending in a rethrow unless a handler catches everything.
    fn try_catch(
        &mut self,
        try_block: &ILBlock,
        catch_blocks: &[ILCatchBlock],
        finally_block: Option<&ILBlock>,
        fault_block: Option<&ILBlock>,
    ) -> Result<AstNode> {
        self.scoped(BlockTarget::Try, |this| {
            let body = this.block(try_block)?;

            let (catch_variable, handler) = if catch_blocks.is_empty() {
                (None, AstNode::null())
            } else {
                let exception = this.types().exception();
                let caught = this.ctx.declare_temporary(&exception);
                let mut handlers = Vec::with_capacity(catch_blocks.len());
                for catch in catch_blocks {
                    handlers.push((&catch.exception_type, this.catch_handler(catch, &caught)?));
                }

                let rethrow = AstNode::block(vec![AstNode::expression_statement(
                    AstNode::build(NodeKind::Rethrow, Vec::new()),
                )]);
                let chain = handlers.into_iter().rev().fold(rethrow, |chain, (ty, handler)| {
                    if this.catches_everything(ty) {
                        return handler;
                    }
                    let test = AstNode::build(
                        NodeKind::TypeTest { ty: ty.clone() },
                        vec![AstNode::variable(&caught)],
                    );
                    AstNode::build(NodeKind::If, vec![test, handler, chain])
                });
                (Some(caught), AstNode::block(vec![chain]))
            };

            let finally = match finally_block {
                Some(block) => this.block(block)?,
                None => AstNode::null(),
            };
            let fault = match fault_block {
                Some(block) => this.block(block)?,
                None => AstNode::null(),
            };

            Ok(AstNode::build(
                NodeKind::Try { catch_variable },
                vec![body, handler, finally, fault],
            ))
        })
    }

    fn catches_everything(&self, ty: &TypeRc) -> bool {
        let oracle = self.oracle();
        oracle.is_object(ty) || oracle.equal(ty, &self.types().exception(), false)
    }

    fn catch_handler(&mut self, catch: &ILCatchBlock, caught: &VariableRc) -> Result<AstNode> {
        let mut statements = Vec::new();
        if let Some(variable) = &catch.variable {
            let variable = self.variable(variable)?;
            let value = AstNode::change_type(AstNode::variable(caught), &variable.ty());
            statements.push(AstNode::expression_statement(AstNode::assign(
                AstNode::variable(&variable),
                value,
                self.types(),
            )?));
        }
        statements.extend(self.block(&catch.body)?.into_operands());
        Ok(AstNode::block(statements))
    }

    /// `fixed (T* p = &x) body` pins each reference and runs the body in a try whose
    /// finally unpins.
    fn fixed(
        &mut self,
        initializers: &[(ILVariableRc, ILExpression)],
        body: &ILBlock,
    ) -> Result<AstNode> {
        let types = self.types();
        let mut statements = Vec::with_capacity(initializers.len() + 1);
        let mut pinned = Vec::with_capacity(initializers.len());

        for (variable, initializer) in initializers {
            let variable = self.variable(variable)?;
            let reference = self.expression_raw(initializer)?;
            let reference = self.reference_of(reference, "fixed statement")?;
            let pin = AstNode::build(NodeKind::Pin, vec![reference]);
            statements.push(AstNode::expression_statement(AstNode::assign(
                AstNode::variable(&variable),
                pin,
                types,
            )?));
            pinned.push(variable);
        }

        // Unpinning sits in a finally so an early exit from the body still releases.
        let unpins = pinned
            .iter()
            .map(|variable| {
                AstNode::expression_statement(AstNode::build(
                    NodeKind::Unpin,
                    vec![AstNode::variable(variable)],
                ))
            })
            .collect();
        statements.push(AstNode::build(
            NodeKind::Try {
                catch_variable: None,
            },
            vec![
                self.block(body)?,
                AstNode::null(),
                AstNode::block(unpins),
                AstNode::null(),
            ],
        ));
        Ok(AstNode::block(statements))
    }

    // ------------------------------------------------------------------------
    // Control flow expressions
    // ------------------------------------------------------------------------

    pub(super) fn goto(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let label = expr
            .label()
            .ok_or_else(|| malformed_error!("{} requires a label operand", expr.code))?;
        Ok(AstNode::build(
            NodeKind::Goto {
                label: Arc::from(label),
            },
            Vec::new(),
        ))
    }

    pub(super) fn break_loop(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let target = self
            .ctx
            .resolve_break()
            .ok_or_else(|| malformed_error!("{} outside of a loop or switch", expr.code))?;
        Ok(AstNode::build(NodeKind::Break { target }, Vec::new()))
    }

    pub(super) fn continue_loop(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let target = self
            .ctx
            .resolve_continue()
            .ok_or_else(|| malformed_error!("{} outside of a loop", expr.code))?;
        Ok(AstNode::build(
            NodeKind::Continue {
                target: Some(target),
            },
            Vec::new(),
        ))
    }

    /// `return value`, converted to the declared return type.
    pub(super) fn return_value(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let Some(value) = expr.arguments.first() else {
            return Ok(AstNode::return_value(AstNode::null()));
        };
        let return_type = self.method.return_type.clone();
        let value = self.expression_expecting(value, &return_type)?;
        Ok(AstNode::return_value(self.copy_value(value)))
    }

    pub(super) fn throw(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let exception = self.expression(argument(expr, 0)?)?;
        Ok(AstNode::throw(exception))
    }
}

/// Appends a finished segment: a labeled block when a label opened it, the bare
/// statements otherwise.
fn close_segment(statements: &mut Vec<AstNode>, label: Option<&str>, segment: Vec<AstNode>) {
    match label {
        Some(label) => statements.push(AstNode::labeled_block(label, segment)),
        None => statements.extend(segment),
    }
}
