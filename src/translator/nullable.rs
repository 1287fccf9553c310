//! Nullable values and lifted operations.

use crate::{
    ast::{AstNode, BinaryOperator, NodeKind},
    il::ILExpression,
    translator::{argument, Translation},
    typesystem::TypeRc,
    Result,
};

impl Translation<'_> {
    /// `Wrap(value)` converts `T` to `T?`.
    pub(super) fn nullable_wrap(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let value = self.expression(argument(expr, 0)?)?;
        let types = self.types();
        let value_type = value.computed_type(types);
        if value_type.is_nullable() {
            return Ok(value);
        }

        let ty = expr
            .inferred_type
            .clone()
            .filter(|ty| ty.is_nullable())
            .unwrap_or_else(|| types.nullable_of(&value_type));
        if value.is_null_literal() {
            return Ok(AstNode::null_literal(&ty));
        }
        Ok(AstNode::build(NodeKind::NullableWrap { ty }, vec![value]))
    }

    /// `ValueOf(value)` reads the value of a `T?`.
    pub(super) fn nullable_value(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let value = self.expression(argument(expr, 0)?)?;
        let nullable = value.computed_type(self.types());
        let Some(underlying) = nullable.nullable_argument() else {
            return Ok(value);
        };
        Ok(AstNode::build(
            NodeKind::NullableUnwrap { ty: underlying },
            vec![value],
        ))
    }

    /// `NullableOf(op(ValueOf a, ValueOf b))` becomes
    /// `a == null || b == null ? null : op(a.Value, b.Value)`.
    ///
    /// Operands that are not variables are evaluated once into temporaries ahead of the
    /// test.
    pub(super) fn lifted_operation(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let mut operation = self.expression(argument(expr, 0)?)?;
        let types = self.types();
        let operation_type = operation.computed_type(types);
        let result = expr
            .inferred_type
            .clone()
            .filter(|ty| ty.is_nullable())
            .unwrap_or_else(|| types.nullable_of(&operation_type));

        let mut prelude = Vec::new();
        let mut checks = Vec::new();
        self.lift_operands(&mut operation, &mut prelude, &mut checks);

        let Some(condition) = checks.into_iter().reduce(|left, right| {
            AstNode::binary(BinaryOperator::LogicalOr, left, right, &types.boolean())
        }) else {
            return Ok(AstNode::build(
                NodeKind::NullableWrap { ty: result },
                vec![operation],
            ));
        };

        let wrapped = AstNode::build(
            NodeKind::NullableWrap { ty: result.clone() },
            vec![operation],
        );
        prelude.push(AstNode::ternary(
            condition,
            AstNode::null_literal(&result),
            wrapped,
            &result,
        ));
        Ok(AstNode::comma(prelude))
    }

    /// Collects a null check for every unwrap in `node`, hoisting unwrapped operands that
    /// are not variables. Nested lifted operations keep their own checks.
    fn lift_operands(
        &mut self,
        node: &mut AstNode,
        prelude: &mut Vec<AstNode>,
        checks: &mut Vec<AstNode>,
    ) {
        match node.kind() {
            NodeKind::Ternary { .. } | NodeKind::NullableWrap { .. } => {}
            NodeKind::NullableUnwrap { .. } => {
                let types = self.types();
                let Some(operand) = node.operands_mut().first_mut() else {
                    return;
                };
                let nullable: TypeRc = operand.computed_type(types);
                if operand.as_variable().is_none() {
                    let temporary = AstNode::variable(&self.ctx.declare_temporary(&nullable));
                    let value = std::mem::replace(operand, temporary.clone());
                    prelude.push(AstNode::binary(
                        BinaryOperator::Assign,
                        temporary,
                        value,
                        &nullable,
                    ));
                }
                checks.push(AstNode::binary(
                    BinaryOperator::Equal,
                    operand.clone(),
                    AstNode::null_literal(&nullable),
                    &types.boolean(),
                ));
            }
            _ => {
                for child in node.operands_mut() {
                    self.lift_operands(child, prelude, checks);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        il::{ILCode, ILVariable, ILVariableKind, ILVariableRc},
        test::factories::{method_body, static_method, TestTypes},
    };

    #[test]
    fn test_lifted_addition() {
        let t = TestTypes::new();
        let int = t.types.int32();
        let nullable = t.types.nullable_of(&int);
        let method = static_method(&t, "Run", &t.types.void());
        let a = ILVariable::new("a", &nullable, ILVariableKind::Local(0));
        let b = ILVariable::new("b", &nullable, ILVariableKind::Local(1));
        let value_of = |v: &ILVariableRc| ILExpression::op(ILCode::ValueOf, vec![ILExpression::ldloc(v)]);

        let body = method_body(
            &method,
            vec![a.clone(), b.clone()],
            vec![ILExpression::op(
                ILCode::NullableOf,
                vec![ILExpression::op(ILCode::Add, vec![value_of(&a), value_of(&b)])],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let ternary = &method.body.operands()[0].operands()[0];
        assert!(matches!(ternary.kind(), NodeKind::Ternary { .. }));
        assert_eq!(
            ternary.operands()[0].to_string(),
            "Binary[||](left: Binary[==](left: a, right: null), right: Binary[==](left: b, right: null))"
        );
        assert!(ternary.operands()[1].is_null_literal());
        assert_eq!(ternary.computed_type(&t.types), nullable);
        assert!(method.temporaries.is_empty());
    }

    #[test]
    fn test_lifted_operand_evaluated_once() {
        let t = TestTypes::new();
        let int = t.types.int32();
        let nullable = t.types.nullable_of(&int);
        let source = static_method(&t, "Next", &nullable);
        let method = static_method(&t, "Run", &t.types.void());
        let a = ILVariable::new("a", &nullable, ILVariableKind::Local(0));

        let call = ILExpression::with_method(ILCode::Call, &source, Vec::new());
        let body = method_body(
            &method,
            vec![a.clone()],
            vec![ILExpression::op(
                ILCode::NullableOf,
                vec![ILExpression::op(
                    ILCode::Add,
                    vec![
                        ILExpression::op(ILCode::ValueOf, vec![call]),
                        ILExpression::op(ILCode::ValueOf, vec![ILExpression::ldloc(&a)]),
                    ],
                )],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let comma = &method.body.operands()[0].operands()[0];
        assert!(matches!(comma.kind(), NodeKind::Comma));
        let calls = comma
            .all_descendants()
            .filter(|n| matches!(n.kind(), NodeKind::Invocation { .. }))
            .count();
        assert_eq!(calls, 1);
        assert_eq!(method.temporaries.len(), 1);
    }

    #[test]
    fn test_wrap_null_is_null() {
        let t = TestTypes::new();
        let nullable = t.types.nullable_of(&t.types.int32());
        let method = static_method(&t, "Run", &t.types.void());
        let body = method_body(
            &method,
            Vec::new(),
            vec![ILExpression::op(ILCode::Wrap, vec![ILExpression::ldnull()]).inferred(&nullable)],
        );

        let method = t.translator.translate(&body).unwrap();
        let value = &method.body.operands()[0].operands()[0];
        assert!(value.is_null_literal());
        assert_eq!(value.computed_type(&t.types), nullable);
    }
}
