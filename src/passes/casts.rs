//! Lowering of generic casts.
//!
//! The translator records every value cast as a [`NodeKind::Cast`]. This pass decides what
//! each one actually does and replaces it with the concrete representation change, or with
//! nothing when the cast is an upcast or an identity.

use crate::{
    ast::{AstNode, BinaryOperator, ConversionKind, Literal, NodeKind},
    config::TranslatorConfig,
    passes::{rewrite_tree, AstPass, PassContext, Rewriter},
    translator::{retype_literal, TranslatedMethod},
    typesystem::{PrimitiveKind, TypeOracle, TypeRc, TypeSystem},
    Result,
};

/// Replaces casts with conversions, comparisons and type changes.
pub struct ExpandCastsPass;

impl AstPass for ExpandCastsPass {
    fn name(&self) -> &'static str {
        "expand casts"
    }

    fn description(&self) -> &'static str {
        "Lowers casts to numeric conversions, boolean coercions and enum wrapping"
    }

    fn run_on_method(&self, method: &mut TranslatedMethod, ctx: &PassContext) -> Result<bool> {
        let limit = ctx.config.max_rewrites_per_node;
        let mut rewriter = CastRewriter {
            oracle: &ctx.oracle,
            config: &ctx.config,
        };
        rewrite_tree(&mut method.body, &mut rewriter, limit)
    }
}

struct CastRewriter<'a> {
    oracle: &'a TypeOracle,
    config: &'a TranslatorConfig,
}

impl Rewriter for CastRewriter<'_> {
    fn name(&self) -> &'static str {
        "expand casts"
    }

    fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>> {
        let NodeKind::Cast { ty, checked } = node.kind() else {
            return Ok(None);
        };
        let Some(value) = node.operand(0) else {
            return Ok(None);
        };
        Ok(self.expand(value, ty, *checked))
    }
}

impl CastRewriter<'_> {
    fn expand(&self, value: &AstNode, target: &TypeRc, checked: bool) -> Option<AstNode> {
        let types = self.oracle.types();
        let source = value.computed_type(types);

        if value.is_null_literal() && (!target.is_value_type() || target.is_nullable()) {
            return Some(AstNode::null_literal(target));
        }
        if self.oracle.equal(target, &source, true) {
            return Some(value.clone());
        }
        if let Some(literal) = value.as_literal() {
            let scalar = TypeOracle::numeric_kind(&source).is_some();
            if scalar {
                if let Some(retyped) = retype_literal(literal, target) {
                    return Some(AstNode::literal(retyped));
                }
            }
        }

        let target_kind = TypeOracle::numeric_kind(target);
        let source_kind = TypeOracle::numeric_kind(&source);
        match (source_kind, target_kind) {
            (None, None) => self.reference_cast(value, &source, target),
            (_, Some(PrimitiveKind::Boolean)) => self.to_boolean(value, &source),
            (Some(PrimitiveKind::Boolean), Some(_)) => Some(self.from_boolean(value, target)),
            (Some(_), Some(_)) if source.enum_underlying().is_some() => {
                Some(self.unwrap_enum(value, &source, target, checked))
            }
            (Some(_), Some(kind)) if target.enum_underlying().is_some() => {
                Some(self.wrap_enum(value, &source, target, kind, checked))
            }
            (Some(from), Some(to)) => Some(self.numeric(value, from, to, target, checked)),
            _ => None,
        }
    }

    /// Upcasts are elided. Downcasts stay casts.
    fn reference_cast(&self, value: &AstNode, source: &TypeRc, target: &TypeRc) -> Option<AstNode> {
        if !self.oracle.assignable(target, source) {
            return None;
        }
        if self.oracle.equal(target, source, false) {
            return Some(value.clone());
        }
        Some(AstNode::change_type(value.clone(), target))
    }

    /// `(bool)value` is `value != default`.
    fn to_boolean(&self, value: &AstNode, source: &TypeRc) -> Option<AstNode> {
        let types = self.oracle.types();
        if TypeOracle::is_boolean(source) {
            return Some(value.clone());
        }
        let zero = match TypeOracle::numeric_kind(source) {
            Some(_) => zero_of(self.oracle, source)?,
            None => AstNode::null_literal(source),
        };
        Some(AstNode::binary(
            BinaryOperator::NotEqual,
            value.clone(),
            zero,
            &types.boolean(),
        ))
    }

    /// `(int)flag` is `flag ? 1 : 0`.
    fn from_boolean(&self, value: &AstNode, target: &TypeRc) -> AstNode {
        let types = self.oracle.types();
        let one = Literal::integer(types, PrimitiveKind::I4, 1);
        let zero = Literal::integer(types, PrimitiveKind::I4, 0);
        match (retype_literal(&one, target), retype_literal(&zero, target)) {
            (Some(one), Some(zero)) => AstNode::ternary(
                value.clone(),
                AstNode::literal(one),
                AstNode::literal(zero),
                target,
            ),
            _ => AstNode::change_type(value.clone(), target),
        }
    }

    /// An enum source is read as its underlying integer, then converted to the target.
    fn unwrap_enum(
        &self,
        value: &AstNode,
        source: &TypeRc,
        target: &TypeRc,
        checked: bool,
    ) -> AstNode {
        let types = self.oracle.types();
        let Some(kind) = source.enum_underlying() else {
            return value.clone();
        };
        let underlying = types.primitive(kind);

        let inner = innermost(value, kind, types);
        let inner_type = inner.computed_type(types);
        let integer = if self.oracle.equal(&inner_type, &underlying, true) {
            inner.clone()
        } else if inner_type.enum_underlying().is_some() {
            AstNode::conversion(inner.clone(), ConversionKind::EnumToInt, &underlying, false)
        } else {
            AstNode::change_type(inner.clone(), &underlying)
        };

        if self.oracle.equal(target, &underlying, true) {
            return integer;
        }
        AstNode::cast(integer, target, checked)
    }

    /// An integer is converted to the underlying type of the enum, then wrapped.
    fn wrap_enum(
        &self,
        value: &AstNode,
        source: &TypeRc,
        target: &TypeRc,
        kind: PrimitiveKind,
        checked: bool,
    ) -> AstNode {
        let underlying = self.oracle.types().primitive(kind);
        let integer = if self.oracle.equal(source, &underlying, true) {
            value.clone()
        } else {
            AstNode::cast(value.clone(), &underlying, checked)
        };
        AstNode::conversion(integer, ConversionKind::IntToEnum, target, false)
    }

    fn numeric(
        &self,
        value: &AstNode,
        from: PrimitiveKind,
        to: PrimitiveKind,
        target: &TypeRc,
        checked: bool,
    ) -> AstNode {
        if self.config.emulate_int64 && (from.is_int64() || to.is_int64()) {
            let name = match (from.is_int64(), to.is_int64()) {
                (true, true) => "Int64Reinterpret",
                (false, true) => "Int64FromNumber",
                _ => "Int64ToNumber",
            };
            return AstNode::intrinsic(name, target, vec![value.clone()]);
        }

        let kind = match (from.is_floating_point(), to.is_floating_point()) {
            (false, true) => ConversionKind::IntToFloat,
            (true, false) => ConversionKind::FloatToInt,
            _ if to.size_of() < from.size_of() => ConversionKind::Truncate,
            _ if to.size_of() > from.size_of() => ConversionKind::Widen,
            _ if to.is_signed() != from.is_signed() => ConversionKind::Reinterpret,
            // Same width and signedness, such as Char and UInt16.
            _ => return AstNode::change_type(value.clone(), target),
        };
        AstNode::conversion(value.clone(), kind, target, checked)
    }
}

/// Strips casts whose operand already has the width and signedness of `kind`.
fn innermost<'n>(
    mut node: &'n AstNode,
    kind: PrimitiveKind,
    types: &TypeSystem,
) -> &'n AstNode {
    loop {
        let transparent = match node.kind() {
            NodeKind::Cast { .. } | NodeKind::ChangeType { .. } => true,
            NodeKind::Conversion {
                kind: conversion, ..
            } => matches!(
                conversion,
                ConversionKind::Reinterpret | ConversionKind::EnumToInt | ConversionKind::IntToEnum
            ),
            _ => false,
        };
        if !transparent {
            return node;
        }
        let Some(operand) = node.operand(0) else {
            return node;
        };
        let same_shape = TypeOracle::numeric_kind(&operand.computed_type(types)).is_some_and(
            |inner| inner.size_of() == kind.size_of() && inner.is_signed() == kind.is_signed(),
        );
        if !same_shape {
            return node;
        }
        node = operand;
    }
}

fn zero_of(oracle: &TypeOracle, ty: &TypeRc) -> Option<AstNode> {
    let types = oracle.types();
    let zero = if TypeOracle::is_floating_point(ty) {
        Literal::Float {
            value: 0.0,
            ty: ty.clone(),
        }
    } else {
        retype_literal(&Literal::integer(types, PrimitiveKind::I4, 0), ty)?
    };
    Some(AstNode::literal(zero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Variable, VariableKind},
        test::factories::TestTypes,
        typesystem::{TypeCategory, TypeDefinition},
    };

    fn expand(t: &TestTypes, config: &TranslatorConfig, node: AstNode) -> AstNode {
        let oracle = TypeOracle::new(t.types.clone());
        let mut rewriter = CastRewriter {
            oracle: &oracle,
            config,
        };
        let mut root = AstNode::expression_statement(node);
        rewrite_tree(&mut root, &mut rewriter, 16).unwrap();
        root.into_operands().remove(0)
    }

    fn local(name: &str, ty: &TypeRc) -> AstNode {
        AstNode::variable(&Variable::new(0, name, VariableKind::Local, ty))
    }

    #[test]
    fn test_narrowing_and_widening() {
        let t = TestTypes::new();
        let config = TranslatorConfig::native_int64();
        let byte = t.types.primitive(PrimitiveKind::U1);
        let long = t.types.primitive(PrimitiveKind::I8);
        let x = local("x", &t.types.int32());

        let narrowed = expand(&t, &config, AstNode::cast(x.clone(), &byte, false));
        assert!(matches!(
            narrowed.kind(),
            NodeKind::Conversion {
                kind: ConversionKind::Truncate,
                ..
            }
        ));

        let widened = expand(&t, &config, AstNode::cast(x, &long, false));
        assert!(matches!(
            widened.kind(),
            NodeKind::Conversion {
                kind: ConversionKind::Widen,
                ..
            }
        ));
    }

    #[test]
    fn test_boolean_coercions() {
        let t = TestTypes::new();
        let config = TranslatorConfig::default();
        let boolean = t.types.boolean();
        let int = t.types.int32();

        let coerced = expand(&t, &config, AstNode::cast(local("x", &int), &boolean, false));
        assert_eq!(coerced.to_string(), "Binary[!=](left: x, right: 0:System.Int32)");

        let counted = expand(&t, &config, AstNode::cast(local("b", &boolean), &int, false));
        assert!(matches!(counted.kind(), NodeKind::Ternary { .. }));
        assert_eq!(counted.computed_type(&t.types), int);
    }

    #[test]
    fn test_upcast_is_elided() {
        let t = TestTypes::new();
        let config = TranslatorConfig::default();
        let widget = t.widget();
        let value = local("w", &widget);

        let upcast = expand(&t, &config, AstNode::cast(value.clone(), &t.types.object(), false));
        assert!(matches!(upcast.kind(), NodeKind::ChangeType { .. }));
        assert_eq!(upcast.operands()[0], value);

        let downcast = expand(
            &t,
            &config,
            AstNode::cast(local("o", &t.types.object()), &widget, false),
        );
        assert!(matches!(downcast.kind(), NodeKind::Cast { .. }));
    }

    #[test]
    fn test_enum_unwrap_collapses_same_shape_casts() {
        let t = TestTypes::new();
        let config = TranslatorConfig::default();
        let int = t.types.int32();
        let color = t.types.define(
            TypeDefinition::new("App", "Color", t.types.core_scope(), TypeCategory::Enum(PrimitiveKind::I4))
                .with_enum_values(vec![("Red", 0), ("Green", 1)]),
            Some(&t.types.enum_base()),
        );
        let x = local("x", &int);

        // (int)(Color)x reads x directly.
        let uint = t.types.primitive(PrimitiveKind::U4);
        let inner = AstNode::conversion(x.clone(), ConversionKind::IntToEnum, &color, false);
        let unwrapped = expand(&t, &config, AstNode::cast(inner, &int, false));
        assert_eq!(unwrapped, x);

        let wrapped = expand(&t, &config, AstNode::cast(local("u", &uint), &color, false));
        assert!(matches!(
            wrapped.kind(),
            NodeKind::Conversion {
                kind: ConversionKind::IntToEnum,
                ..
            }
        ));
        assert!(matches!(
            wrapped.operands()[0].kind(),
            NodeKind::Conversion {
                kind: ConversionKind::Reinterpret,
                ..
            }
        ));
    }

    #[test]
    fn test_int64_emulation() {
        let t = TestTypes::new();
        let config = TranslatorConfig::default();
        let long = t.types.primitive(PrimitiveKind::I8);
        let x = local("x", &t.types.int32());

        let emulated = expand(&t, &config, AstNode::cast(x.clone(), &long, false));
        assert!(matches!(
            emulated.kind(),
            NodeKind::IntrinsicCall {
                name: "Int64FromNumber",
                ..
            }
        ));

        let native = TranslatorConfig::native_int64();
        let converted = expand(&t, &native, AstNode::cast(x, &long, false));
        assert!(matches!(converted.kind(), NodeKind::Conversion { .. }));
    }

    #[test]
    fn test_null_is_retyped() {
        let t = TestTypes::new();
        let config = TranslatorConfig::default();
        let widget = t.widget();
        let null = AstNode::null_literal(&t.types.object());

        let retyped = expand(&t, &config, AstNode::cast(null, &widget, true));
        assert!(retyped.is_null_literal());
        assert_eq!(retyped.computed_type(&t.types), widget);
    }
}
