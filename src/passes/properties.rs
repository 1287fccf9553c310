//! Compound assignments to properties.
//!
//! A property has no storage, so `obj.P += x` must read through the getter and write
//! through the setter. The receiver and any index arguments are evaluated once:
//!
//! ```text
//! ($this = obj, $result = $this.P + x, $this.P = $result, $result)
//! ```

use crate::{
    ast::{AstNode, NodeKind},
    passes::{rewrite_tree, AstPass, PassContext, Rewriter},
    translator::TranslatedMethod,
    typesystem::TypeSystem,
    Result,
};

/// Splits compound assignments to properties into a read and a write.
pub struct PropertyCompoundPass;

impl AstPass for PropertyCompoundPass {
    fn name(&self) -> &'static str {
        "property compound"
    }

    fn description(&self) -> &'static str {
        "Rewrites compound assignments to properties as explicit get and set sequences"
    }

    fn run_on_method(&self, method: &mut TranslatedMethod, ctx: &PassContext) -> Result<bool> {
        let mut body = std::mem::replace(&mut method.body, AstNode::null());
        let changed = {
            let mut rewriter = PropertyRewriter {
                method: &mut *method,
                types: ctx.types(),
            };
            rewrite_tree(&mut body, &mut rewriter, ctx.config.max_rewrites_per_node)
        };
        method.body = body;
        changed
    }
}

struct PropertyRewriter<'a> {
    method: &'a mut TranslatedMethod,
    types: &'a TypeSystem,
}

impl Rewriter for PropertyRewriter<'_> {
    fn name(&self) -> &'static str {
        "property compound"
    }

    fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>> {
        let NodeKind::Binary { op, .. } = node.kind() else {
            return Ok(None);
        };
        let Some(base) = op.compound_base() else {
            return Ok(None);
        };
        let [target, value] = node.operands() else {
            return Ok(None);
        };
        let NodeKind::PropertyAccess { property } = target.kind() else {
            return Ok(None);
        };

        let mut sequence = Vec::new();
        let mut operands = Vec::with_capacity(target.operands().len());
        for (slot, operand) in target.operands().iter().enumerate() {
            let keep = match operand.kind() {
                NodeKind::TypeIdentifier(_) | NodeKind::Variable(_) | NodeKind::Null => true,
                _ => slot > 0 && operand.is_constant(),
            };
            if keep {
                operands.push(operand.clone());
                continue;
            }
            let ty = operand.computed_type(self.types);
            let temporary = AstNode::variable(&self.method.new_temporary(&ty));
            sequence.push(AstNode::assign(temporary.clone(), operand.clone(), self.types)?);
            operands.push(temporary);
        }

        let mut operands = operands.into_iter();
        let receiver = operands.next().unwrap_or_else(AstNode::null);
        let indices: Vec<AstNode> = operands.collect();
        let access = || AstNode::property_access(property, receiver.clone(), indices.clone());

        let ty = property.property_type.clone();
        let result = AstNode::variable(&self.method.new_temporary(&ty));
        let computed = AstNode::binary(base, access(), value.clone(), &ty);
        sequence.push(AstNode::assign(result.clone(), computed, self.types)?);
        sequence.push(AstNode::assign(access(), result.clone(), self.types)?);
        sequence.push(result);
        Ok(Some(AstNode::comma(sequence)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::TranslatorConfig,
        diagnostics::Diagnostics,
        il::{ILCode, ILExpression, ILVariable, ILVariableKind},
        metadata::{
            MetadataOracle, MethodDescriptor, MethodFlags, MethodRc, ParameterDescriptor,
            PropertyDescriptor, PropertyRc,
        },
        test::factories::{method_body, static_method, TestTypes},
        typesystem::TypeOracle,
    };

    /// Resolves both accessors of `Widget.Count`.
    struct CountProperty(PropertyRc);

    impl MetadataOracle for CountProperty {
        fn property_for(&self, method: &MethodDescriptor) -> Option<PropertyRc> {
            method.name.ends_with("_Count").then(|| self.0.clone())
        }
    }

    fn is_property_compound(node: &AstNode) -> bool {
        matches!(node.kind(), NodeKind::Binary { op, .. } if op.compound_base().is_some())
            && node
                .left()
                .is_some_and(|target| matches!(target.kind(), NodeKind::PropertyAccess { .. }))
    }

    #[test]
    fn test_receiver_evaluated_once() {
        let t = TestTypes::new();
        let widget = t.widget();
        let int = t.types.int32();
        let get_count: MethodRc = MethodDescriptor::new("get_Count", &widget, &int)
            .with_flags(MethodFlags::SPECIAL_NAME)
            .into_rc();
        let set_count = MethodDescriptor::new("set_Count", &widget, &t.types.void())
            .with_parameters(vec![ParameterDescriptor::new("value", &int)])
            .with_flags(MethodFlags::SPECIAL_NAME)
            .into_rc();
        let count = Arc::new(PropertyDescriptor {
            name: "Count".to_string(),
            declaring_type: widget.clone(),
            property_type: int.clone(),
            getter: Some(get_count.clone()),
            setter: Some(set_count),
            is_static: false,
        });
        let translator = t.translator_with(Arc::new(CountProperty(count)));
        let make = static_method(&t, "Make", &widget);
        let method = static_method(&t, "Run", &t.types.void());
        let w = ILVariable::new("w", &widget, ILVariableKind::Local(0));

        let load = ILExpression::with_method(
            ILCode::CallvirtGetter,
            &get_count,
            vec![ILExpression::with_method(ILCode::Call, &make, Vec::new())],
        );
        let body = method_body(
            &method,
            vec![w],
            vec![ILExpression::op(
                ILCode::CompoundAssignment,
                vec![ILExpression::op(
                    ILCode::Add,
                    vec![load, ILExpression::ldc_i4(2)],
                )],
            )],
        );
        let mut translated = translator.translate(&body).unwrap();
        let statement = &translated.body.operands()[0];
        assert!(is_property_compound(&statement.operands()[0]));

        let ctx = PassContext::new(
            Arc::new(TypeOracle::new(t.types.clone())),
            Arc::new(TranslatorConfig::default()),
            Arc::new(Diagnostics::new()),
        );
        assert!(PropertyCompoundPass.run_on_method(&mut translated, &ctx).unwrap());

        let sequence = &translated.body.operands()[0].operands()[0];
        assert!(matches!(sequence.kind(), NodeKind::Comma));
        assert_eq!(sequence.operands().len(), 4);
        let calls = sequence
            .all_descendants()
            .filter(|n| matches!(n.kind(), NodeKind::Invocation { .. }))
            .count();
        assert_eq!(calls, 1);
        assert_eq!(translated.temporaries.len(), 2);
        assert!(!translated.body.all_descendants().any(is_property_compound));

        assert!(!PropertyCompoundPass.run_on_method(&mut translated, &ctx).unwrap());
    }
}
