//! Numeric conversions.
//!
//! Conversions are table driven by destination primitive and overflow flag (see
//! [`ILCode::conversion_target`](crate::il::ILCode::conversion_target)). A conversion whose operand already has the destination
//! representation is dropped; a literal operand is folded.

use crate::{
    ast::{AstNode, ConversionKind, Literal},
    il::ILExpression,
    translator::{argument, Translation},
    typesystem::{PrimitiveKind, TypeOracle, TypeRc},
    Result,
};

/// Wraps `value` into the range of `kind`, the way a store into a slot of that width would.
///
/// Native integers are 32 bits wide. Non-integral kinds return `value` unchanged.
#[must_use]
pub fn wrap_integer(kind: PrimitiveKind, value: i64) -> i64 {
    match kind {
        PrimitiveKind::Boolean => i64::from(value != 0),
        PrimitiveKind::I1 => i64::from(value as i8),
        PrimitiveKind::U1 => i64::from(value as u8),
        PrimitiveKind::I2 => i64::from(value as i16),
        PrimitiveKind::U2 | PrimitiveKind::Char => i64::from(value as u16),
        PrimitiveKind::I4 | PrimitiveKind::I => i64::from(value as i32),
        PrimitiveKind::U4 | PrimitiveKind::U => i64::from(value as u32),
        _ => value,
    }
}

/// Returns true if a value of `source` is stored exactly like one of `target`.
fn same_representation(source: &TypeRc, target: PrimitiveKind) -> bool {
    match source.primitive() {
        Some(kind) if kind == target => true,
        Some(kind) => {
            kind.is_integral()
                && target.is_integral()
                && kind != PrimitiveKind::Char
                && target != PrimitiveKind::Char
                && kind.size_of() == target.size_of()
                && kind.is_signed() == target.is_signed()
        }
        None => false,
    }
}

impl Translation<'_> {
    pub(super) fn conversion(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let (kind, checked) = expr
            .code
            .conversion_target()
            .ok_or_else(|| malformed_error!("{} is not a conversion", expr.code))?;
        let target = self.types().primitive(kind);

        let mut value = self.expression_raw(argument(expr, 0)?)?;
        if expr.code.is_unsigned_source() {
            value = self.reinterpret_unsigned(value);
        }

        let source = value.computed_type(self.types());
        if same_representation(&source, kind) {
            return Ok(value);
        }
        if let Some(folded) = value
            .as_literal()
            .and_then(|literal| fold_conversion(literal, kind, &target, checked))
        {
            return Ok(AstNode::literal(folded));
        }
        Ok(AstNode::cast(value, &target, checked))
    }

    /// Reads a signed integer as the unsigned integer of the same width.
    ///
    /// Literals are folded; other values get a reinterpreting conversion. Values that are
    /// already unsigned, or not integral, are returned unchanged.
    pub(super) fn reinterpret_unsigned(&self, node: AstNode) -> AstNode {
        let ty = node.computed_type(self.types());
        let Some(unsigned) = TypeOracle::numeric_kind(&ty)
            .filter(|kind| kind.is_integral() && kind.is_signed())
            .and_then(|kind| kind.to_unsigned())
        else {
            return node;
        };

        let target = self.types().primitive(unsigned);
        if let Some(value) = node
            .as_literal()
            .filter(|literal| matches!(literal, Literal::Integer { .. }))
            .and_then(Literal::as_i64)
        {
            return AstNode::literal(Literal::Integer {
                value: wrap_integer(unsigned, value),
                ty: target,
            });
        }
        AstNode::conversion(node, ConversionKind::Reinterpret, &target, false)
    }
}

/// Folds a conversion of a literal. Checked conversions fold only when the value fits.
fn fold_conversion(
    literal: &Literal,
    kind: PrimitiveKind,
    target: &TypeRc,
    checked: bool,
) -> Option<Literal> {
    if let Literal::Float { value, .. } = literal {
        if kind.is_floating_point() {
            let value = if kind == PrimitiveKind::R4 {
                f64::from(*value as f32)
            } else {
                *value
            };
            return Some(Literal::Float {
                value,
                ty: target.clone(),
            });
        }
        if !value.is_finite() || value.abs() >= 9.2e18 {
            return None;
        }
        return fold_integer(value.trunc() as i64, kind, target, checked);
    }

    let value = match literal {
        Literal::Integer { .. } | Literal::Char(_) | Literal::Boolean(_) => literal.as_i64()?,
        _ => return None,
    };
    if kind.is_floating_point() {
        return Some(Literal::Float {
            value: value as f64,
            ty: target.clone(),
        });
    }
    fold_integer(value, kind, target, checked)
}

fn fold_integer(value: i64, kind: PrimitiveKind, target: &TypeRc, checked: bool) -> Option<Literal> {
    if !kind.is_integral() {
        return None;
    }
    let wrapped = wrap_integer(kind, value);
    // A checked conversion to an unsigned kind rejects every negative source.
    if checked && (wrapped != value || (value < 0 && !kind.is_signed())) {
        return None;
    }
    Some(match kind {
        PrimitiveKind::Char => Literal::Char(wrapped as u16),
        PrimitiveKind::Boolean => Literal::Boolean(wrapped != 0),
        _ => Literal::Integer {
            value: wrapped,
            ty: target.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::NodeKind,
        il::ILCode,
        test::factories::{int_local, method_body, static_method, TestTypes},
    };

    #[test]
    fn test_wrap_integer() {
        assert_eq!(wrap_integer(PrimitiveKind::U1, 300), 44);
        assert_eq!(wrap_integer(PrimitiveKind::I1, 200), -56);
        assert_eq!(wrap_integer(PrimitiveKind::U4, -1), 4_294_967_295);
        assert_eq!(wrap_integer(PrimitiveKind::I, 1 << 32), 0);
        assert_eq!(wrap_integer(PrimitiveKind::Char, 65601), 65);
        assert_eq!(wrap_integer(PrimitiveKind::I8, -1), -1);
    }

    #[test]
    fn test_redundant_conversion_is_elided() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let y = int_local(&t, "y", 1);
        let body = method_body(
            &method,
            vec![x.clone(), y.clone()],
            vec![ILExpression::stloc(
                &y,
                ILExpression::op(ILCode::ConvI4, vec![ILExpression::ldloc(&x)]),
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Binary[=](left: y, right: x)))"
        );
    }

    #[test]
    fn test_narrowing_conversion_casts() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let body = method_body(
            &method,
            vec![x.clone()],
            vec![ILExpression::op(
                ILCode::ConvU1,
                vec![ILExpression::ldloc(&x)],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let cast = method
            .body
            .all_descendants()
            .find(|n| matches!(n.kind(), NodeKind::Cast { .. }))
            .unwrap();
        assert_eq!(cast.computed_type(&t.types), t.types.primitive(PrimitiveKind::U1));
    }

    #[test]
    fn test_literal_conversion_folds() {
        let types = crate::typesystem::TypeSystem::new();
        let byte = types.primitive(PrimitiveKind::U1);
        let literal = Literal::integer(&types, PrimitiveKind::I4, 300);
        assert_eq!(
            fold_conversion(&literal, PrimitiveKind::U1, &byte, false),
            Some(Literal::integer(&types, PrimitiveKind::U1, 44))
        );
        assert_eq!(fold_conversion(&literal, PrimitiveKind::U1, &byte, true), None);

        let ulong = types.primitive(PrimitiveKind::U8);
        let negative = Literal::integer(&types, PrimitiveKind::I4, -1);
        assert_eq!(fold_conversion(&negative, PrimitiveKind::U8, &ulong, true), None);
        assert_eq!(
            fold_conversion(&negative, PrimitiveKind::U8, &ulong, false),
            Some(Literal::integer(&types, PrimitiveKind::U8, -1))
        );

        let double = types.primitive(PrimitiveKind::R8);
        let float = Literal::Float {
            value: 2.75,
            ty: double,
        };
        assert_eq!(
            fold_conversion(&float, PrimitiveKind::I4, &types.int32(), false),
            Some(Literal::integer(&types, PrimitiveKind::I4, 2))
        );
    }
}
