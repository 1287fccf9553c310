//! Arithmetic, bitwise and logical operators.

use crate::{
    ast::{AstNode, BinaryOperator, NodeKind, UnaryOperator},
    diagnostics::DiagnosticCategory,
    il::{ILCode, ILExpression},
    translator::{argument, Translation},
    typesystem::{PrimitiveKind, TypeOracle, TypeRc},
    Result,
};

/// The binary operator of an arithmetic instruction. Overflow checks are not preserved.
fn binary_operator(code: ILCode) -> Option<BinaryOperator> {
    Some(match code {
        ILCode::Add | ILCode::AddOvf | ILCode::AddOvfUn => BinaryOperator::Add,
        ILCode::Sub | ILCode::SubOvf | ILCode::SubOvfUn => BinaryOperator::Sub,
        ILCode::Mul | ILCode::MulOvf | ILCode::MulOvfUn => BinaryOperator::Mul,
        ILCode::Div | ILCode::DivUn => BinaryOperator::Div,
        ILCode::Rem | ILCode::RemUn => BinaryOperator::Rem,
        ILCode::And => BinaryOperator::BitwiseAnd,
        ILCode::Or => BinaryOperator::BitwiseOr,
        ILCode::Xor => BinaryOperator::Xor,
        ILCode::Shl => BinaryOperator::Shl,
        ILCode::Shr => BinaryOperator::Shr,
        ILCode::ShrUn => BinaryOperator::ShrUnsigned,
        _ => return None,
    })
}

fn is_pointer_hint(expr: &ILExpression) -> bool {
    expr.inferred_type
        .iter()
        .chain(&expr.expected_type)
        .any(TypeOracle::is_pointer_like)
}

/// Corrects the result type of an integer operation the decompiler typed too narrowly.
///
/// When both operands are integral and neither annotation of the operation is as wide as
/// the wider operand, the operation takes the wider operand's type; the left operand wins
/// ties.
pub(crate) fn promoted_type(
    annotated: &TypeRc,
    expected: Option<&TypeRc>,
    inferred: Option<&TypeRc>,
    left: &TypeRc,
    right: &TypeRc,
) -> TypeRc {
    if !TypeOracle::is_integral(left) || !TypeOracle::is_integral(right) {
        return annotated.clone();
    }

    let width = expected
        .map_or(0, TypeOracle::size_of)
        .max(inferred.map_or(0, TypeOracle::size_of));
    let wider = if TypeOracle::size_of(left) >= TypeOracle::size_of(right) {
        left
    } else {
        right
    };
    if width < TypeOracle::size_of(wider) {
        return wider.clone();
    }
    annotated.clone()
}

impl Translation<'_> {
    pub(super) fn binary_arithmetic(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let op = binary_operator(expr.code)
            .ok_or_else(|| malformed_error!("{} is not a binary operator", expr.code))?;
        let left_expr = argument(expr, 0)?;
        let right_expr = argument(expr, 1)?;

        // Pointer operands keep their own representation.
        let pointerish = is_pointer_hint(left_expr) || is_pointer_hint(right_expr);
        let (left, right) = if pointerish {
            (self.expression_raw(left_expr)?, self.expression_raw(right_expr)?)
        } else {
            (self.expression(left_expr)?, self.expression(right_expr)?)
        };

        let types = self.types();
        let left_type = left.computed_type(types);
        let right_type = right.computed_type(types);
        if TypeOracle::is_pointer_like(&left_type) || TypeOracle::is_pointer_like(&right_type) {
            return self.pointer_arithmetic(expr, op, left, right, &left_type, &right_type);
        }

        let annotated = expr
            .inferred_type
            .clone()
            .or_else(|| expr.expected_type.clone())
            .unwrap_or_else(|| left_type.clone());
        let mut result = promoted_type(
            &annotated,
            expr.expected_type.as_ref(),
            expr.inferred_type.as_ref(),
            &left_type,
            &right_type,
        );

        let (left, right) = if matches!(expr.code, ILCode::DivUn | ILCode::RemUn) {
            let left = self.reinterpret_unsigned(left);
            let right = self.reinterpret_unsigned(right);
            if let Some(unsigned) = TypeOracle::numeric_kind(&result)
                .filter(|kind| kind.is_integral())
                .and_then(|kind| kind.to_unsigned())
            {
                result = types.primitive(unsigned);
            }
            (left, right)
        } else {
            (left, right)
        };

        if op == BinaryOperator::Mul && self.is_exact_multiply(&left, &right, &result) {
            return Ok(AstNode::build(
                NodeKind::ExactMultiply {
                    signed: TypeOracle::is_signed(&result),
                },
                vec![left, right],
            ));
        }

        Ok(AstNode::binary(op, left, right, &result))
    }

    fn is_exact_multiply(&self, left: &AstNode, right: &AstNode, result: &TypeRc) -> bool {
        let types = self.types();
        let narrow = |ty: &TypeRc| TypeOracle::is_integral(ty) && TypeOracle::size_of(ty) <= 4;
        narrow(&left.computed_type(types)) && narrow(&right.computed_type(types)) && narrow(result)
    }

    fn pointer_arithmetic(
        &mut self,
        expr: &ILExpression,
        op: BinaryOperator,
        left: AstNode,
        right: AstNode,
        left_type: &TypeRc,
        right_type: &TypeRc,
    ) -> Result<AstNode> {
        let pointer_add = |pointer: AstNode, delta: AstNode, ty: &TypeRc| {
            AstNode::build(NodeKind::PointerAdd { ty: ty.clone() }, vec![pointer, delta])
        };

        match (op, left_type.is_pointer(), right_type.is_pointer()) {
            (BinaryOperator::Add, true, false) => Ok(pointer_add(left, right, left_type)),
            (BinaryOperator::Add, false, true) => Ok(pointer_add(right, left, right_type)),
            (BinaryOperator::Sub, true, false) => {
                let negated = AstNode::unary(UnaryOperator::Negate, right, right_type);
                Ok(pointer_add(left, negated, left_type))
            }
            (BinaryOperator::Sub, true, true) => {
                Ok(AstNode::build(NodeKind::PointerDelta, vec![left, right]))
            }
            // Native-width integers keep their width instead of being promoted.
            (_, false, false) => {
                let native = if TypeOracle::is_pointer_like(left_type) {
                    left_type
                } else {
                    right_type
                };
                if matches!(expr.code, ILCode::DivUn | ILCode::RemUn) {
                    let left = self.reinterpret_unsigned(left);
                    let right = self.reinterpret_unsigned(right);
                    let unsigned = self.types().primitive(PrimitiveKind::U);
                    return Ok(AstNode::binary(op, left, right, &unsigned));
                }
                Ok(AstNode::binary(op, left, right, native))
            }
            _ => {
                self.warn(
                    expr,
                    DiagnosticCategory::Instruction,
                    format!("No pointer arithmetic rule for '{}'", op.symbol()),
                );
                Ok(AstNode::untranslatable(expr.code.to_string(), vec![left, right]))
            }
        }
    }

    pub(super) fn unary_arithmetic(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let op = match expr.code {
            ILCode::Neg => UnaryOperator::Negate,
            _ => UnaryOperator::BitwiseNot,
        };
        let operand = self.expression(argument(expr, 0)?)?;
        let result = expr
            .inferred_type
            .clone()
            .unwrap_or_else(|| operand.computed_type(self.types()));
        Ok(AstNode::unary(op, operand, &result))
    }

    pub(super) fn logic_not(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let operand = self.condition(argument(expr, 0)?)?;
        Ok(AstNode::logical_not(operand, self.types()))
    }

    pub(super) fn logic_binary(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let op = match expr.code {
            ILCode::LogicAnd => BinaryOperator::LogicalAnd,
            _ => BinaryOperator::LogicalOr,
        };
        let left = self.condition(argument(expr, 0)?)?;
        let right = self.condition(argument(expr, 1)?)?;
        Ok(AstNode::binary(op, left, right, &self.types().boolean()))
    }

    pub(super) fn ternary(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let condition = self.condition(argument(expr, 0)?)?;
        let when_true = self.expression(argument(expr, 1)?)?;
        let result = expr
            .inferred_type
            .clone()
            .or_else(|| expr.expected_type.clone())
            .unwrap_or_else(|| when_true.computed_type(self.types()));
        let when_true = self.coerce(when_true, &result);
        let when_false = self.expression_expecting(argument(expr, 2)?, &result)?;
        Ok(AstNode::ternary(condition, when_true, when_false, &result))
    }

    /// Translates a value used as a condition.
    pub(super) fn condition(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let boolean = self.types().boolean();
        self.expression_expecting(expr, &boolean)
    }
}
