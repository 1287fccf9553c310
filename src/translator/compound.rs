//! Compound assignment and post-increment reconstruction.

use crate::{
    ast::{AstNode, BinaryOperator, NodeKind, UnaryOperator},
    il::{ILCode, ILExpression, ILOperand},
    translator::{argument, Translation},
    typesystem::{PrimitiveKind, TypeOracle},
    Error, Result,
};

/// The compound assignment operator for an arithmetic instruction.
fn compound_operator(code: ILCode) -> Option<BinaryOperator> {
    Some(match code {
        ILCode::Add | ILCode::AddOvf | ILCode::AddOvfUn => BinaryOperator::AddAssign,
        ILCode::Sub | ILCode::SubOvf | ILCode::SubOvfUn => BinaryOperator::SubAssign,
        ILCode::Mul | ILCode::MulOvf | ILCode::MulOvfUn => BinaryOperator::MulAssign,
        ILCode::Div | ILCode::DivUn => BinaryOperator::DivAssign,
        ILCode::Rem | ILCode::RemUn => BinaryOperator::RemAssign,
        ILCode::And => BinaryOperator::AndAssign,
        ILCode::Or => BinaryOperator::OrAssign,
        ILCode::Xor => BinaryOperator::XorAssign,
        ILCode::Shl => BinaryOperator::ShlAssign,
        ILCode::Shr => BinaryOperator::ShrAssign,
        ILCode::ShrUn => BinaryOperator::ShrUnsignedAssign,
        _ => return None,
    })
}

impl Translation<'_> {
    /// `CompoundAssignment(op(load target, value))` becomes `target op= value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompoundAssignment`] if the operation has no compound form or does
    /// not read its target first, and [`Error::InvalidLValue`] if the target is not a
    /// storage location.
    pub(super) fn compound_assignment(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let operation = argument(expr, 0)?;
        let op = compound_operator(operation.code).ok_or_else(|| {
            Error::CompoundAssignment(format!("no compound form of {}", operation.code))
        })?;
        let load = argument(operation, 0)?;
        if !load.code.is_load() {
            return Err(Error::CompoundAssignment(format!(
                "{} does not read its target, found {}",
                operation.code, load.code
            )));
        }

        let target = self.expression_raw(load)?;
        let (prelude, target) = self.hoist_indices(target);
        let target_type = target.computed_type(self.types());
        let value = match op {
            // Shift counts keep their own type.
            BinaryOperator::ShlAssign
            | BinaryOperator::ShrAssign
            | BinaryOperator::ShrUnsignedAssign => self.expression(argument(operation, 1)?)?,
            _ => self.expression_expecting(argument(operation, 1)?, &target_type)?,
        };

        let assignment = AstNode::compound_assign(op, target, value, self.types())?;
        Ok(with_prelude(prelude, assignment))
    }

    /// `PostIncrement(address)` with a delta operand becomes `x++`, `x--`, or a
    /// read-then-add sequence for other deltas.
    pub(super) fn post_increment(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let delta = match expr.operand {
            ILOperand::Int32(delta) => i64::from(delta),
            ILOperand::Int64(delta) => delta,
            _ => return Err(malformed_error!("{} requires an integer delta", expr.code)),
        };

        let address = self.expression_raw(argument(expr, 0)?)?;
        let target = self.lvalue_of(address);
        if !target.is_lvalue() {
            return Err(Error::InvalidLValue(target.to_string()));
        }
        let (prelude, target) = self.hoist_indices(target);
        let ty = target.computed_type(self.types());

        let increment = match delta {
            1 => AstNode::unary(UnaryOperator::PostIncrement, target, &ty),
            -1 => AstNode::unary(UnaryOperator::PostDecrement, target, &ty),
            _ => {
                let old = AstNode::variable(&self.ctx.declare_temporary(&ty));
                let kind = TypeOracle::numeric_kind(&ty)
                    .filter(|kind| kind.is_integral())
                    .unwrap_or(PrimitiveKind::I4);
                let types = self.types();
                AstNode::comma(vec![
                    AstNode::assign(old.clone(), target.clone(), types)?,
                    AstNode::compound_assign(
                        BinaryOperator::AddAssign,
                        target,
                        AstNode::integer(types, kind, delta),
                        types,
                    )?,
                    old,
                ])
            }
        };
        Ok(with_prelude(prelude, increment))
    }

    /// Moves every index of a multi-dimensional element target into a temporary, so a
    /// compound operation evaluates each index once.
    pub(super) fn hoist_indices(&mut self, target: AstNode) -> (Vec<AstNode>, AstNode) {
        let NodeKind::ElementAccess { element } = target.kind() else {
            return (Vec::new(), target);
        };
        if target.operands().len() <= 2 {
            return (Vec::new(), target);
        }

        let element = element.clone();
        let types = self.types();
        let mut operands = target.into_operands().into_iter();
        let array = operands.next().unwrap_or_else(AstNode::null);

        let mut prelude = Vec::new();
        let mut indices = Vec::new();
        for index in operands {
            if index.is_constant() || index.as_variable().is_some() {
                indices.push(index);
                continue;
            }
            let ty = index.computed_type(types);
            let temporary = AstNode::variable(&self.ctx.declare_temporary(&ty));
            prelude.push(AstNode::binary(
                BinaryOperator::Assign,
                temporary.clone(),
                index,
                &ty,
            ));
            indices.push(temporary);
        }
        (prelude, AstNode::element_access(&element, array, indices))
    }
}

pub(super) fn with_prelude(mut prelude: Vec<AstNode>, expression: AstNode) -> AstNode {
    prelude.push(expression);
    AstNode::comma(prelude)
}
