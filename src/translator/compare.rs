//! Comparisons.
//!
//! Operands are translated with auto-casting suppressed: a comparison is decided on the
//! operands' own representations, and the canonical forms below depend on seeing them
//! unwrapped.

use crate::{
    ast::{AstNode, BinaryOperator, NodeKind},
    il::{ILCode, ILExpression},
    translator::{argument, memory::first_operand, Translation},
    typesystem::{TypeOracle, TypeRc},
    Result,
};

fn comparison_operator(code: ILCode) -> Option<(BinaryOperator, bool)> {
    Some(match code {
        ILCode::Ceq => (BinaryOperator::Equal, false),
        ILCode::Cne => (BinaryOperator::NotEqual, false),
        ILCode::Cgt => (BinaryOperator::Greater, false),
        ILCode::CgtUn => (BinaryOperator::Greater, true),
        ILCode::Cge => (BinaryOperator::GreaterEqual, false),
        ILCode::CgeUn => (BinaryOperator::GreaterEqual, true),
        ILCode::Clt => (BinaryOperator::Less, false),
        ILCode::CltUn => (BinaryOperator::Less, true),
        ILCode::Cle => (BinaryOperator::LessEqual, false),
        ILCode::CleUn => (BinaryOperator::LessEqual, true),
        _ => return None,
    })
}

impl Translation<'_> {
    pub(super) fn comparison(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let (mut op, unsigned) = comparison_operator(expr.code)
            .ok_or_else(|| malformed_error!("{} is not a comparison", expr.code))?;
        let mut left = self.expression_uncast(argument(expr, 0)?)?;
        let mut right = self.expression_uncast(argument(expr, 1)?)?;
        let types = self.types();
        let boolean = types.boolean();

        if let Some(collapsed) = self.collapse_boolean(op, &left, &right) {
            return Ok(collapsed);
        }

        // x > null, x >= null and friends are null checks.
        if left.is_null_literal() || right.is_null_literal() {
            op = match op {
                BinaryOperator::Less | BinaryOperator::Greater => BinaryOperator::NotEqual,
                BinaryOperator::LessEqual | BinaryOperator::GreaterEqual => BinaryOperator::Equal,
                op => op,
            };
            if let Some(test) = type_test(op, &left, &right) {
                return Ok(if op == BinaryOperator::Equal {
                    AstNode::logical_not(test, types)
                } else {
                    test
                });
            }
            return Ok(AstNode::binary(op, left, right, &boolean));
        }

        let left_type = left.computed_type(types);
        let right_type = right.computed_type(types);
        let relational = !matches!(op, BinaryOperator::Equal | BinaryOperator::NotEqual);

        if left_type.is_pointer() && right_type.is_pointer() {
            left = AstNode::build(NodeKind::PointerOffset, vec![left]);
            right = AstNode::build(NodeKind::PointerOffset, vec![right]);
        } else if unsigned && relational {
            let narrow_signed = |ty: &TypeRc| {
                TypeOracle::is_integral(ty) && TypeOracle::is_signed(ty) && TypeOracle::size_of(ty) <= 4
            };
            if narrow_signed(&left_type) || narrow_signed(&right_type) {
                left = self.reinterpret_unsigned(left);
                right = self.reinterpret_unsigned(right);
            }
        }

        Ok(AstNode::binary(op, left, right, &boolean))
    }

    /// `b == true` is `b`, `b == false` is `!b`, and likewise for `!=`.
    fn collapse_boolean(
        &self,
        op: BinaryOperator,
        left: &AstNode,
        right: &AstNode,
    ) -> Option<AstNode> {
        let equality = match op {
            BinaryOperator::Equal => true,
            BinaryOperator::NotEqual => false,
            _ => return None,
        };
        let types = self.types();
        let constant = |node: &AstNode| node.as_literal().and_then(|literal| literal.as_i64());
        let is_boolean = |node: &AstNode| TypeOracle::is_boolean(&node.computed_type(types));

        let (value, constant) = match (constant(left), constant(right)) {
            (None, Some(c)) if is_boolean(left) => (left, c),
            (Some(c), None) if is_boolean(right) => (right, c),
            _ => return None,
        };

        if (constant != 0) == equality {
            Some(value.clone())
        } else {
            Some(AstNode::logical_not(value.clone(), types))
        }
    }
}

/// `(x as T) != null` is `x is T`.
fn type_test(op: BinaryOperator, left: &AstNode, right: &AstNode) -> Option<AstNode> {
    if !matches!(op, BinaryOperator::Equal | BinaryOperator::NotEqual) {
        return None;
    }
    let cast = if right.is_null_literal() { left } else { right };
    let NodeKind::AsCast { ty } = cast.kind() else {
        return None;
    };
    let ty = ty.clone();
    Some(AstNode::build(
        NodeKind::TypeTest { ty },
        vec![first_operand(cast.clone())],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        il::{ILVariable, ILVariableKind},
        test::factories::{int_local, method_body, static_method, TestTypes},
        typesystem::{PrimitiveKind, TypeDescriptor},
    };

    #[test]
    fn test_pointer_equality_compares_offsets() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let pointer = TypeDescriptor::pointer(&t.types.int32());
        let p = ILVariable::new("p", &pointer, ILVariableKind::Local(0));
        let q = ILVariable::new("q", &pointer, ILVariableKind::Local(1));
        let body = method_body(
            &method,
            vec![p.clone(), q.clone()],
            vec![ILExpression::op(
                ILCode::Ceq,
                vec![ILExpression::ldloc(&p), ILExpression::ldloc(&q)],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let compare = &method.body.operands()[0].operands()[0];
        assert!(matches!(
            compare.kind(),
            NodeKind::Binary {
                op: BinaryOperator::Equal,
                ..
            }
        ));
        assert!(compare
            .operands()
            .iter()
            .all(|side| matches!(side.kind(), NodeKind::PointerOffset)));
    }

    #[test]
    fn test_bool_compare_to_zero_is_not() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let flag = ILVariable::new("flag", &t.types.boolean(), ILVariableKind::Local(0));
        let body = method_body(
            &method,
            vec![flag.clone()],
            vec![ILExpression::op(
                ILCode::Ceq,
                vec![ILExpression::ldloc(&flag), ILExpression::ldc_i4(0)],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Unary[!](operand: flag)))"
        );
    }

    #[test]
    fn test_relational_null_compare() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let s = ILVariable::new("s", &t.types.string(), ILVariableKind::Local(0));
        let body = method_body(
            &method,
            vec![s.clone()],
            vec![ILExpression::op(
                ILCode::CgtUn,
                vec![ILExpression::ldloc(&s), ILExpression::ldnull()],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Binary[!=](left: s, right: null)))"
        );
    }

    #[test]
    fn test_isinst_null_compare_is_type_test() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let o = ILVariable::new("o", &t.types.object(), ILVariableKind::Local(0));
        let isinst = ILExpression::with_type(
            ILCode::Isinst,
            &t.types.string(),
            vec![ILExpression::ldloc(&o)],
        );
        let body = method_body(
            &method,
            vec![o.clone()],
            vec![ILExpression::op(ILCode::Ceq, vec![isinst, ILExpression::ldnull()])],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Unary[!](operand: TypeTest[System.String](value: o))))"
        );
    }

    #[test]
    fn test_unsigned_compare_reinterprets() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let body = method_body(
            &method,
            vec![x.clone()],
            vec![ILExpression::op(
                ILCode::CltUn,
                vec![ILExpression::ldloc(&x), ILExpression::ldc_i4(-1)],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let compare = method
            .body
            .all_descendants()
            .find(|n| matches!(n.kind(), NodeKind::Binary { .. }))
            .unwrap();
        let uint = t.types.primitive(PrimitiveKind::U4);
        assert_eq!(compare.left().unwrap().computed_type(&t.types), uint);
        assert_eq!(
            compare.right().unwrap().as_literal().and_then(|l| l.as_i64()),
            Some(4_294_967_295)
        );
    }
}
