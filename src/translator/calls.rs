//! Calls, object construction, method pointers, casts and boxing.
//!
//! A call passes through an ordered chain of replacement hooks before an invocation node
//! is built:
//!
//! 1. verbatim script text from the metadata oracle
//! 2. the ignored-member placeholder
//! 3. proxy redirection to another method
//! 4. `Type.GetTypeFromHandle(ldtoken T)` becomes `typeof(T)`
//! 5. the intrinsic recognizers shared with the intrinsics pass
//! 6. property accessors become property accesses

use std::sync::Arc;

use crate::{
    ast::{AstNode, Dispatch, Literal, NodeKind},
    il::{ILCode, ILExpression, ILOperand},
    metadata::MethodRc,
    passes::intrinsics,
    translator::{argument, memory::by_ref, operand_method, operand_type, Translation},
    Result,
};

impl Translation<'_> {
    pub(super) fn call(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let mut method = operand_method(expr)?.clone();
        let info = self.metadata().method_info(&method);

        if let Some(text) = info.as_ref().and_then(|info| info.replacement.as_deref()) {
            return self.verbatim(expr, &method, text);
        }
        if self.metadata().is_ignored(&method) {
            return Ok(ignored_call(&method));
        }
        if let Some(proxy) = info.as_ref().and_then(|info| info.proxy.clone()) {
            method = proxy;
        }
        if let Some(type_of) = type_from_handle(expr, &method) {
            return Ok(type_of);
        }

        let has_this = !method.is_static();
        let (this, explicit_this) = if has_this {
            self.call_receiver(argument(expr, 0)?, &method)?
        } else {
            (AstNode::null(), false)
        };
        let arguments = self.call_arguments(expr, &method, usize::from(has_this))?;

        let dispatch = self.dispatch_of(expr.code, &method, &this);
        let explicit_this = explicit_this || dispatch == Dispatch::Base;
        let node = AstNode::invocation(&method, dispatch, explicit_this, this, arguments);

        if self.config().early_intrinsics {
            if let Some(replaced) = intrinsics::replace_call(&node, self.oracle()) {
                return Ok(replaced);
            }
        }
        if dispatch != Dispatch::Base {
            if let Some(access) = self.property_accessor(&method, &node)? {
                return Ok(access);
            }
        }
        if info.is_some_and(|info| info.packed_return) {
            return Ok(self.packed(node, &method.return_type));
        }
        Ok(node)
    }

    pub(super) fn new_object(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let constructor = operand_method(expr)?.clone();
        let info = self.metadata().method_info(&constructor);
        if let Some(text) = info.as_ref().and_then(|info| info.replacement.as_deref()) {
            return self.verbatim(expr, &constructor, text);
        }
        if self.metadata().is_ignored(&constructor) {
            return Ok(ignored_call(&constructor));
        }
        let constructor = info
            .and_then(|info| info.proxy.clone())
            .unwrap_or(constructor);

        let arguments = self.call_arguments(expr, &constructor, 0)?;
        let node = AstNode::build(
            NodeKind::New {
                ty: constructor.declaring_type.clone(),
                constructor,
            },
            arguments,
        );
        if self.config().early_intrinsics {
            if let Some(replaced) = intrinsics::replace_call(&node, self.oracle()) {
                return Ok(replaced);
            }
        }
        Ok(node)
    }

    pub(super) fn method_pointer(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let method = operand_method(expr)?;
        let identifier = AstNode::method_identifier(method);
        if expr.code == ILCode::Ldftn {
            return Ok(identifier);
        }
        let target = self.expression(argument(expr, 0)?)?;
        Ok(AstNode::intrinsic(
            "GetVirtualMethod",
            &self.types().native_int(),
            vec![target, identifier],
        ))
    }

    // ------------------------------------------------------------------------
    // Receivers, arguments, dispatch
    // ------------------------------------------------------------------------

    /// Translates the receiver of an instance call.
    ///
    /// A value-type receiver must arrive as a genuine reference, so that mutations made by
    /// the callee are visible to the caller; it is then passed explicitly.
    fn call_receiver(&mut self, expr: &ILExpression, method: &MethodRc) -> Result<(AstNode, bool)> {
        let node = self.expression_raw(expr)?;
        if !method.declaring_type.is_value_type() {
            return Ok((node, false));
        }

        let reference = self.reference_of(node, &format!("receiver of {}", method.full_name()))?;
        Ok((self.lvalue_of(reference), true))
    }

    fn call_arguments(
        &mut self,
        expr: &ILExpression,
        method: &MethodRc,
        skip: usize,
    ) -> Result<Vec<AstNode>> {
        let sources = expr.arguments.get(skip..).unwrap_or_default();
        let mut arguments = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let Some(parameter) = method.parameters.get(index) else {
                arguments.push(self.expression(source)?);
                continue;
            };

            if parameter.ty.is_by_ref() {
                let node = self.expression_raw(source)?;
                let context = format!("argument '{}' of {}", parameter.name, method.full_name());
                let reference = self.reference_of(node, &context)?;
                arguments.push(AstNode::pass_by_reference(reference)?);
            } else {
                let value = self.expression_expecting(source, &parameter.ty)?;
                arguments.push(self.copy_value(value));
            }
        }
        Ok(arguments)
    }

    fn dispatch_of(&self, code: ILCode, method: &MethodRc, this: &AstNode) -> Dispatch {
        let declaring = &method.declaring_type;
        if method.is_static() {
            return Dispatch::Static;
        }
        if declaring.is_delegate() && method.name == "Invoke" {
            return Dispatch::Delegate;
        }
        if declaring.is_interface() {
            return Dispatch::Interface;
        }

        let virtual_call = matches!(
            code,
            ILCode::Callvirt | ILCode::CallvirtGetter | ILCode::CallvirtSetter
        );
        if !virtual_call && method.is_virtual() {
            let on_this = this.as_variable().is_some_and(|v| v.is_this());
            let foreign = !self
                .oracle()
                .equal(declaring, &self.method.declaring_type, false);
            if on_this && foreign {
                return Dispatch::Base;
            }
        }
        if virtual_call && method.is_overridable() {
            return Dispatch::Virtual;
        }
        Dispatch::Instance
    }

    /// Rewrites a call of a property accessor into a property access or an assignment to one.
    fn property_accessor(&self, method: &MethodRc, node: &AstNode) -> Result<Option<AstNode>> {
        let Some(property) = self.metadata().property_for(method) else {
            return Ok(None);
        };
        let NodeKind::Invocation { .. } = node.kind() else {
            return Ok(None);
        };

        let target = if method.is_static() {
            self.type_target(&method.declaring_type)
        } else {
            node.operand(0).cloned().unwrap_or_else(AstNode::null)
        };
        let arguments = node.arguments();

        let is_getter = property
            .getter
            .as_ref()
            .is_some_and(|getter| getter.name == method.name);
        if is_getter {
            return Ok(Some(AstNode::property_access(
                &property,
                target,
                arguments.to_vec(),
            )));
        }

        let Some((value, indices)) = arguments.split_last() else {
            return Ok(None);
        };
        let access = AstNode::property_access(&property, target, indices.to_vec());
        AstNode::assign(access, value.clone(), self.types()).map(Some)
    }

    /// Splices the verbatim replacement text of a method, binding `$this` and the
    /// parameter names to the translated operands.
    fn verbatim(&mut self, expr: &ILExpression, method: &MethodRc, text: &str) -> Result<AstNode> {
        let has_this = !method.is_static() && expr.code != ILCode::Newobj;
        let mut names: Vec<Arc<str>> = Vec::with_capacity(expr.arguments.len());
        if has_this {
            names.push(Arc::from("this"));
        }
        names.extend(
            method
                .parameters
                .iter()
                .map(|parameter| Arc::from(parameter.name.as_str())),
        );

        let mut operands = Vec::with_capacity(names.len());
        for source in expr.arguments.iter().take(names.len()) {
            operands.push(self.expression(source)?);
        }
        names.truncate(operands.len());

        let result = if expr.code == ILCode::Newobj {
            method.declaring_type.clone()
        } else {
            method.return_type.clone()
        };
        Ok(AstNode::build(
            NodeKind::Verbatim {
                text: Arc::from(text),
                names,
                result,
            },
            operands,
        ))
    }

    // ------------------------------------------------------------------------
    // Casts and boxing
    // ------------------------------------------------------------------------

    pub(super) fn type_cast(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let value = self.expression_raw(argument(expr, 0)?)?;

        if is_null_through_casts(&value) && (!ty.is_value_type() || ty.is_nullable()) {
            return Ok(AstNode::null_literal(ty));
        }
        Ok(match expr.code {
            ILCode::Isinst => AstNode::build(NodeKind::AsCast { ty: ty.clone() }, vec![value]),
            _ => AstNode::cast(value, ty, false),
        })
    }

    pub(super) fn box_value(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let value = self.expression_expecting(argument(expr, 0)?, ty)?;
        let value = self.copy_value(value);
        Ok(AstNode::change_type(value, &self.types().object()))
    }

    pub(super) fn unbox(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let value = self.expression(argument(expr, 0)?)?;
        Ok(AstNode::change_type(value, &by_ref(ty)))
    }
}

fn ignored_call(method: &MethodRc) -> AstNode {
    let result = if method.is_constructor() {
        method.declaring_type.clone()
    } else {
        method.return_type.clone()
    };
    AstNode::build(
        NodeKind::IgnoredMember {
            name: Arc::from(method.name.as_str()),
            result,
        },
        Vec::new(),
    )
}

/// `Type.GetTypeFromHandle(ldtoken T)` is `typeof(T)`.
fn type_from_handle(expr: &ILExpression, method: &MethodRc) -> Option<AstNode> {
    if method.name != "GetTypeFromHandle" || !method.is_declared_by("System", "Type") {
        return None;
    }
    match expr.arguments.first() {
        Some(ILExpression {
            code: ILCode::Ldtoken,
            operand: ILOperand::Type(ty),
            ..
        }) => Some(AstNode::literal(Literal::TypeOf(ty.clone()))),
        _ => None,
    }
}

/// Returns true for a null literal seen through any chain of casts.
fn is_null_through_casts(node: &AstNode) -> bool {
    match node.kind() {
        NodeKind::Cast { .. } | NodeKind::AsCast { .. } | NodeKind::ChangeType { .. } => {
            node.operand(0).is_some_and(is_null_through_casts)
        }
        _ => node.is_null_literal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::BinaryOperator,
        il::{ILVariable, ILVariableKind},
        metadata::{
            MetadataOracle, MethodDescriptor, MethodFlags, MethodInfo, ParameterDescriptor,
            StaticOracle,
        },
        test::factories::{instance_method, method_body, static_method, TestTypes},
        Error,
    };

    #[test]
    fn test_null_through_casts_is_null_of_target() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let s = ILVariable::new("s", &t.types.string(), ILVariableKind::Local(0));
        let cast = ILExpression::with_type(
            ILCode::Castclass,
            &t.types.string(),
            vec![ILExpression::with_type(
                ILCode::Castclass,
                &t.types.object(),
                vec![ILExpression::ldnull()],
            )],
        );
        let body = method_body(&method, vec![s.clone()], vec![ILExpression::stloc(&s, cast)]);

        let method = t.translator.translate(&body).unwrap();
        let store = &method.body.operands()[0].operands()[0];
        let value = store.right().unwrap();
        assert!(value.is_null_literal());
        assert_eq!(value.computed_type(&t.types), t.types.string());
    }

    #[test]
    fn test_value_type_receiver_requires_reference() {
        let t = TestTypes::new();
        let point = t.point();
        let length = MethodDescriptor::new("Length", &point, &t.types.int32()).into_rc();
        let method = static_method(&t, "Run", &t.types.void());
        let p = ILVariable::new("p", &point, ILVariableKind::Local(0));

        let by_value = method_body(
            &method,
            vec![p.clone()],
            vec![ILExpression::with_method(
                ILCode::Call,
                &length,
                vec![ILExpression::ldloc(&p)],
            )],
        );
        assert!(matches!(
            t.translator.translate(&by_value),
            Err(Error::ReferenceRequired(_))
        ));

        let by_reference = method_body(
            &method,
            vec![p.clone()],
            vec![ILExpression::with_method(
                ILCode::Call,
                &length,
                vec![ILExpression::ldloca(&p)],
            )],
        );
        let translated = t.translator.translate(&by_reference).unwrap();
        assert_eq!(
            translated.body.to_string(),
            "Block(ExpressionStatement(Invocation[Instance Length](this: p)))"
        );
    }

    #[test]
    fn test_base_call_dispatch() {
        let t = TestTypes::new();
        let base_method = MethodDescriptor::new("ToString", &t.types.object(), &t.types.string())
            .with_flags(MethodFlags::VIRTUAL)
            .into_rc();
        let derived = t.widget();
        let method = instance_method(&t, &derived, "ToString", &t.types.string());
        let body = crate::il::MethodBody::new(
            &method,
            Vec::new(),
            crate::il::ILBlock::new(vec![crate::il::ILNode::Expression(
                ILExpression::op(
                    ILCode::Ret,
                    vec![ILExpression::with_method(
                        ILCode::Call,
                        &base_method,
                        vec![ILExpression::new(
                            ILCode::Ldloc,
                            ILOperand::Variable(
                                crate::il::ILVariable::new("this", &derived, ILVariableKind::This),
                            ),
                            Vec::new(),
                        )],
                    )],
                ),
            )]),
        );

        let translated = t.translator.translate(&body).unwrap();
        let invocation = translated
            .body
            .all_descendants()
            .find(|n| matches!(n.kind(), NodeKind::Invocation { .. }))
            .unwrap();
        assert!(matches!(
            invocation.kind(),
            NodeKind::Invocation {
                dispatch: Dispatch::Base,
                explicit_this: true,
                ..
            }
        ));
    }

    #[test]
    fn test_verbatim_replacement_and_setter() {
        let t = TestTypes::new();
        let widget = t.widget();
        let log = MethodDescriptor::new("Log", &widget, &t.types.void())
            .with_parameters(vec![ParameterDescriptor::new("message", &t.types.string())])
            .with_flags(MethodFlags::STATIC);
        let setter = MethodDescriptor::new("set_Size", &widget, &t.types.void())
            .with_parameters(vec![ParameterDescriptor::new("value", &t.types.int32())])
            .with_flags(MethodFlags::SPECIAL_NAME);
        let oracle: Arc<dyn MetadataOracle> = Arc::new(StaticOracle::new().with_method(
            &log,
            MethodInfo {
                replacement: Some("console.log($message)".to_string()),
                ..MethodInfo::default()
            },
        ));
        let translator = t.translator_with(oracle);
        let (log, setter) = (log.into_rc(), setter.into_rc());

        let method = instance_method(&t, &widget, "Run", &t.types.void());
        let this = ILVariable::new("this", &widget, ILVariableKind::This);
        let body = crate::il::MethodBody::new(
            &method,
            Vec::new(),
            crate::il::ILBlock::new(vec![
                crate::il::ILNode::Expression(ILExpression::with_method(
                    ILCode::Call,
                    &log,
                    vec![ILExpression::ldstr("hi")],
                )),
                crate::il::ILNode::Expression(ILExpression::with_method(
                    ILCode::CallSetter,
                    &setter,
                    vec![ILExpression::ldloc(&this), ILExpression::ldc_i4(3)],
                )),
            ]),
        );

        let translated = translator.translate(&body).unwrap();
        let statements = translated.body.operands();
        assert!(matches!(
            statements[0].operands()[0].kind(),
            NodeKind::Verbatim { .. }
        ));
        let assignment = &statements[1].operands()[0];
        assert!(matches!(
            assignment.kind(),
            NodeKind::Binary {
                op: BinaryOperator::Assign,
                ..
            }
        ));
        assert!(matches!(
            assignment.left().unwrap().kind(),
            NodeKind::PropertyAccess { .. }
        ));
    }
}
