//! Locals, fields, array elements and indirect access.
//!
//! Address-of forms collapse to plain accesses wherever the consumer only reads or writes
//! the location. A genuine reference node survives only where one is required: explicit
//! address-of, pinning, and by-ref argument passing.

use crate::{
    ast::{AstNode, BinaryOperator, NodeKind, OffsetUnit},
    il::ILExpression,
    metadata::FieldRc,
    translator::{
        argument, compound::with_prelude, operand_field, operand_type, operand_variable,
        Translation,
    },
    typesystem::{TypeDescriptor, TypeOracle, TypeRc},
    Error, Result,
};

impl Translation<'_> {
    // ------------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------------

    pub(super) fn load_local(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let variable = self.variable(operand_variable(expr)?)?;
        Ok(AstNode::variable(&variable))
    }

    pub(super) fn store_local(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let variable = self.variable(operand_variable(expr)?)?;
        let value = self.expression_expecting(argument(expr, 0)?, &variable.ty())?;

        // A packed array stored into a plain array local changes the local's
        // representation for the rest of the method.
        let value_type = value.computed_type(self.types());
        if value_type.is_packed_array() && variable.ty().is_array() {
            variable.retype(&value_type);
        }

        let value = self.copy_value(value);
        self.store(AstNode::variable(&variable), value)
    }

    pub(super) fn local_address(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let variable = self.variable(operand_variable(expr)?)?;
        AstNode::take_reference(AstNode::variable(&variable))
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    pub(super) fn load_field(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let field = operand_field(expr)?;
        let info = self.metadata().field_info(field);
        if info.as_ref().is_some_and(|info| info.is_ignored) {
            return Ok(ignored_field(field));
        }

        let target = self.field_target(expr, field)?;
        let access = AstNode::field_access(field, target);
        if info.is_some_and(|info| info.is_packed_array) {
            return Ok(self.packed(access, &field.field_type));
        }
        Ok(access)
    }

    pub(super) fn store_field(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let field = operand_field(expr)?;
        if self
            .metadata()
            .field_info(field)
            .is_some_and(|info| info.is_ignored)
        {
            return Ok(ignored_field(field));
        }

        let value_index = usize::from(!field.is_static);
        let target = self.field_target(expr, field)?;
        let value = self.expression_expecting(argument(expr, value_index)?, &field.field_type)?;
        let value = self.copy_value(value);
        self.store(AstNode::field_access(field, target), value)
    }

    pub(super) fn field_address(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let field = operand_field(expr)?;
        let target = self.field_target(expr, field)?;
        AstNode::member_reference(field, target)
    }

    fn field_target(&mut self, expr: &ILExpression, field: &FieldRc) -> Result<AstNode> {
        if field.is_static {
            return Ok(self.type_target(&field.declaring_type));
        }
        self.receiver(argument(expr, 0)?)
    }

    /// The target of a static member access: the type, or its verbatim replacement.
    pub(super) fn type_target(&self, ty: &TypeRc) -> AstNode {
        match self
            .metadata()
            .type_info(ty)
            .and_then(|info| info.replacement.clone())
        {
            Some(text) => AstNode::build(
                NodeKind::Verbatim {
                    text: text.into(),
                    names: Vec::new(),
                    result: self.types().type_type(),
                },
                Vec::new(),
            ),
            None => AstNode::type_identifier(ty),
        }
    }

    /// Marks a value as a packed array of the element type of `declared`.
    pub(super) fn packed(&self, value: AstNode, declared: &TypeRc) -> AstNode {
        match declared.element_type() {
            Some(element) if declared.is_array() => {
                AstNode::change_type(value, &self.types().packed_array_of(&element))
            }
            _ => value,
        }
    }

    // ------------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------------

    pub(super) fn new_array(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let element = operand_type(expr)?;
        let int32 = self.types().int32();
        let mut dimensions = Vec::with_capacity(expr.arguments.len());
        for argument in &expr.arguments {
            dimensions.push(self.expression_expecting(argument, &int32)?);
        }
        if dimensions.is_empty() {
            return Err(malformed_error!("{} without dimensions", expr.code));
        }

        let rank = u32::try_from(dimensions.len())
            .map_err(|_| malformed_error!("{} with too many dimensions", expr.code))?;
        Ok(AstNode::build(
            NodeKind::NewArray {
                element: element.clone(),
                rank,
            },
            dimensions,
        ))
    }

    pub(super) fn init_array(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let element = operand_type(expr)?;
        let mut elements = Vec::with_capacity(expr.arguments.len());
        for argument in &expr.arguments {
            let value = self.expression_expecting(argument, element)?;
            elements.push(self.copy_value(value));
        }
        Ok(AstNode::build(
            NodeKind::ArrayLiteral {
                element: element.clone(),
            },
            elements,
        ))
    }

    pub(super) fn array_length(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let array = self.expression(argument(expr, 0)?)?;
        Ok(AstNode::intrinsic(
            "ArrayLength",
            &self.types().int32(),
            vec![array],
        ))
    }

    pub(super) fn load_element(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let (array, indices, element) = self.element_operands(expr, expr.arguments.len())?;
        Ok(AstNode::element_access(&element, array, indices))
    }

    pub(super) fn store_element(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let value_index = expr
            .arguments
            .len()
            .checked_sub(1)
            .ok_or_else(|| malformed_error!("{} without arguments", expr.code))?;
        let (array, indices, element) = self.element_operands(expr, value_index)?;
        let value = self.expression_expecting(argument(expr, value_index)?, &element)?;
        let value = self.copy_value(value);
        self.store(AstNode::element_access(&element, array, indices), value)
    }

    pub(super) fn element_address(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let (array, indices, element) = self.element_operands(expr, expr.arguments.len())?;
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(array);
        operands.extend(indices);
        Ok(AstNode::build(NodeKind::ElementReference { element }, operands))
    }

    /// Translates the array and the indices `1..end` of an element instruction.
    fn element_operands(
        &mut self,
        expr: &ILExpression,
        end: usize,
    ) -> Result<(AstNode, Vec<AstNode>, TypeRc)> {
        let array = self.expression(argument(expr, 0)?)?;
        let mut indices = Vec::with_capacity(end.saturating_sub(1));
        for index in expr.arguments.get(1..end).unwrap_or_default() {
            indices.push(self.expression(index)?);
        }
        if indices.is_empty() {
            return Err(malformed_error!("{} without indices", expr.code));
        }

        let element = match expr.type_operand() {
            Some(ty) => ty.clone(),
            None => array
                .computed_type(self.types())
                .element_type()
                .ok_or_else(|| malformed_error!("{} on a non-array value", expr.code))?,
        };
        Ok((array, indices, element))
    }

    // ------------------------------------------------------------------------
    // Indirect access
    // ------------------------------------------------------------------------

    pub(super) fn load_indirect(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let address = self.expression_raw(argument(expr, 0)?)?;
        let address_type = address.computed_type(self.types());
        if address_type.is_pointer() {
            let element = self.indirect_type(expr, &address_type)?;
            return Ok(self.pointer_read(address, &element));
        }
        Ok(self.lvalue_of(address))
    }

    pub(super) fn store_indirect(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let address = self.expression_raw(argument(expr, 0)?)?;
        let address_type = address.computed_type(self.types());
        let element = self.indirect_type(expr, &address_type)?;
        let value = self.expression_expecting(argument(expr, 1)?, &element)?;
        let value = self.copy_value(value);
        self.store_through(address, value, &element)
    }

    pub(super) fn init_object(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let address = self.expression_raw(argument(expr, 0)?)?;
        self.store_through(address, AstNode::default_value(ty), ty)
    }

    pub(super) fn copy_object(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let destination = self.expression_raw(argument(expr, 0)?)?;
        let source = self.expression_raw(argument(expr, 1)?)?;
        let value = self.lvalue_of(source);
        let value = self.copy_value(value);
        self.store_through(destination, value, ty)
    }

    pub(super) fn address_of(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let value = self.expression_raw(argument(expr, 0)?)?;
        let value = match value.into_parts() {
            (NodeKind::StructCopy, operands) => operands.into_iter().next().unwrap_or_else(AstNode::null),
            (kind, operands) => AstNode::build(kind, operands),
        };
        if value.is_lvalue() {
            return AstNode::take_reference(value);
        }

        // The address of a temporary value: spill it first.
        let ty = value.computed_type(self.types());
        let temporary = AstNode::variable(&self.ctx.declare_temporary(&ty));
        let spill = AstNode::assign(temporary.clone(), value, self.types())?;
        Ok(AstNode::comma(vec![spill, AstNode::take_reference(temporary)?]))
    }

    fn indirect_type(&self, expr: &ILExpression, address_type: &TypeRc) -> Result<TypeRc> {
        if let Some(ty) = expr.type_operand() {
            return Ok(ty.clone());
        }
        if let Some(ty) = address_type.element_type() {
            return Ok(ty);
        }
        expr.inferred_type
            .clone()
            .ok_or_else(|| malformed_error!("Cannot determine the type read by {}", expr.code))
    }

    /// Writes `value` through a reference or pointer.
    fn store_through(
        &mut self,
        address: AstNode,
        value: AstNode,
        element: &TypeRc,
    ) -> Result<AstNode> {
        let types = self.types();
        if address.computed_type(types).is_pointer() {
            let (pointer, offset, unit) = self.split_pointer(address, element);
            return Ok(AstNode::build(
                NodeKind::PointerWrite {
                    unit,
                    element: element.clone(),
                },
                vec![pointer, offset, value],
            ));
        }

        match address.kind() {
            NodeKind::TakeReference
            | NodeKind::MemberReference { .. }
            | NodeKind::ElementReference { .. } => {
                let target = self.lvalue_of(address);
                self.store(target, value)
            }
            NodeKind::Variable(variable) if variable.is_this() => {
                AstNode::assign(AstNode::dereference(address), value, types)
            }
            _ => Ok(AstNode::build(NodeKind::WriteThrough, vec![address, value])),
        }
    }

    // ------------------------------------------------------------------------
    // Pointers
    // ------------------------------------------------------------------------

    fn pointer_read(&self, address: AstNode, element: &TypeRc) -> AstNode {
        let (pointer, offset, unit) = self.split_pointer(address, element);
        AstNode::build(
            NodeKind::PointerRead {
                unit,
                element: element.clone(),
            },
            vec![pointer, offset],
        )
    }

    /// Splits `p + delta` into pointer and offset. A delta of the form `index * sizeof(T)`
    /// becomes an element offset.
    fn split_pointer(&self, address: AstNode, element: &TypeRc) -> (AstNode, AstNode, OffsetUnit) {
        if !matches!(address.kind(), NodeKind::PointerAdd { .. }) {
            return (address, AstNode::null(), OffsetUnit::Bytes);
        }

        let mut operands = address.into_operands();
        let delta = operands.pop().unwrap_or_else(AstNode::null);
        let pointer = operands.pop().unwrap_or_else(AstNode::null);

        let size = TypeOracle::size_of(element);
        if let NodeKind::Binary {
            op: BinaryOperator::Mul,
            ..
        } = delta.kind()
        {
            let scaled_by_element = delta
                .right()
                .and_then(AstNode::as_literal)
                .and_then(|literal| literal.as_i64())
                .is_some_and(|factor| size > 0 && usize::try_from(factor) == Ok(size));
            if scaled_by_element {
                let mut factors = delta.into_operands();
                factors.truncate(1);
                let index = factors.pop().unwrap_or_else(AstNode::null);
                return (pointer, index, OffsetUnit::Elements);
            }
        }
        (pointer, delta, OffsetUnit::Bytes)
    }

    // ------------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------------

    /// Translates the receiver of a member access, collapsing address forms.
    pub(super) fn receiver(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let node = self.expression_raw(expr)?;
        Ok(self.lvalue_of(node))
    }

    /// The storage location a reference designates.
    ///
    /// Address-of forms collapse to the location itself; reference variables and by-ref
    /// results are dereferenced explicitly. `this` of a value type stays as is, since it
    /// is bound to the instance.
    pub(super) fn lvalue_of(&self, node: AstNode) -> AstNode {
        let types = self.types();
        match node.kind() {
            NodeKind::TakeReference => first_operand(node),
            NodeKind::MemberReference { field } => {
                let field = field.clone();
                AstNode::field_access(&field, first_operand(node))
            }
            NodeKind::ElementReference { element } => {
                let element = element.clone();
                let mut operands = node.into_operands().into_iter();
                let array = operands.next().unwrap_or_else(AstNode::null);
                AstNode::element_access(&element, array, operands.collect())
            }
            NodeKind::Variable(variable) if variable.is_this() => node,
            NodeKind::Variable(variable) if variable.is_reference() => AstNode::dereference(node),
            NodeKind::Invocation { method, .. } if method.return_type.is_by_ref() => {
                AstNode::build(NodeKind::ResultDereference, vec![node])
            }
            _ if node.computed_type(types).is_by_ref() => AstNode::dereference(node),
            _ => node,
        }
    }

    /// A genuine reference to the location `node` reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReferenceRequired`] if `node` is neither a reference nor a
    /// location whose address can be taken.
    pub(super) fn reference_of(&self, node: AstNode, context: &str) -> Result<AstNode> {
        if node.is_reference(self.types()) {
            return Ok(node);
        }
        Err(Error::ReferenceRequired(format!("{context}: {node}")))
    }

    /// Copies value types read from a storage location, so that the copy and the
    /// original do not alias.
    pub(super) fn copy_value(&self, node: AstNode) -> AstNode {
        if node.is_lvalue() && node.computed_type(self.types()).is_struct() {
            return AstNode::struct_copy(node);
        }
        node
    }

    /// `target = value`, folded into `target op= y` when `value` is `target op y`.
    ///
    /// A target with side effects or global reads keeps the plain assignment.
    pub(super) fn store(&mut self, target: AstNode, value: AstNode) -> Result<AstNode> {
        let types = self.types();
        if let NodeKind::Binary { op, result } = value.kind() {
            let compound = op.to_compound();
            let same_target = value.left() == Some(&target);
            let same_type = self
                .oracle()
                .equal(result, &target.computed_type(types), false);
            let stable = !target.has_global_dependency() && !target.has_side_effects();
            if let (Some(compound), true, true, true) = (compound, same_target, same_type, stable)
            {
                let right = value.into_operands().pop().unwrap_or_else(AstNode::null);
                let (prelude, target) = self.hoist_indices(target);
                let assignment = AstNode::compound_assign(compound, target, right, types)?;
                if prelude.is_empty() {
                    return Ok(assignment);
                }
                return Ok(with_prelude(prelude, assignment));
            }
        }
        AstNode::assign(target, value, types)
    }
}

/// The single operand of a wrapper node.
pub(super) fn first_operand(node: AstNode) -> AstNode {
    node.into_operands()
        .into_iter()
        .next()
        .unwrap_or_else(AstNode::null)
}

fn ignored_field(field: &FieldRc) -> AstNode {
    AstNode::build(
        NodeKind::IgnoredMember {
            name: field.name.as_str().into(),
            result: field.field_type.clone(),
        },
        Vec::new(),
    )
}

/// A by-ref type over `ty`, unless it already is one.
pub(super) fn by_ref(ty: &TypeRc) -> TypeRc {
    if ty.is_by_ref() {
        ty.clone()
    } else {
        TypeDescriptor::by_ref(ty)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{BinaryOperator, NodeKind, UnaryOperator},
        il::{ILCode, ILExpression, ILOperand, ILVariable, ILVariableKind},
        metadata::{FieldDescriptor, FieldInfo, MetadataOracle, StaticOracle},
        test::factories::{int_local, method_body, static_method, TestTypes},
    };
    use std::sync::Arc;

    #[test]
    fn test_store_folds_into_compound_assignment() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let body = method_body(
            &method,
            vec![x.clone()],
            vec![ILExpression::stloc(
                &x,
                ILExpression::op(
                    ILCode::Add,
                    vec![ILExpression::ldloc(&x), ILExpression::ldc_i4(5)],
                ),
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Binary[+=](left: x, right: 5:System.Int32)))"
        );
    }

    #[test]
    fn test_side_effecting_index_keeps_plain_assignment() {
        let t = TestTypes::new();
        let int = t.types.int32();
        let method = static_method(&t, "Run", &t.types.void());
        let a = ILVariable::new("a", &t.types.array_of(&int, 1), ILVariableKind::Local(0));
        let i = int_local(&t, "i", 1);
        let bump = || {
            ILExpression::new(
                ILCode::PostIncrement,
                ILOperand::Int32(1),
                vec![ILExpression::ldloca(&i)],
            )
        };
        // a[i++] = a[i++] + 1
        let load = ILExpression::with_type(ILCode::Ldelem, &int, vec![ILExpression::ldloc(&a), bump()]);
        let body = method_body(
            &method,
            vec![a.clone(), i.clone()],
            vec![ILExpression::with_type(
                ILCode::Stelem,
                &int,
                vec![
                    ILExpression::ldloc(&a),
                    bump(),
                    ILExpression::op(ILCode::Add, vec![load, ILExpression::ldc_i4(1)]),
                ],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let increments = method
            .body
            .self_and_descendants()
            .filter(|n| {
                matches!(
                    n.kind(),
                    NodeKind::Unary {
                        op: UnaryOperator::PostIncrement,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(increments, 2);
        assert!(!method.body.self_and_descendants().any(|n| matches!(
            n.kind(),
            NodeKind::Binary {
                op: BinaryOperator::AddAssign,
                ..
            }
        )));
    }

    #[test]
    fn test_two_dimensional_store_hoists_indices() {
        let t = TestTypes::new();
        let int = t.types.int32();
        let method = static_method(&t, "Run", &t.types.void());
        let grid = ILVariable::new("grid", &t.types.array_of(&int, 2), ILVariableKind::Local(0));
        let i = int_local(&t, "i", 1);
        let next = || {
            ILExpression::op(
                ILCode::Add,
                vec![ILExpression::ldloc(&i), ILExpression::ldc_i4(1)],
            )
        };
        // grid[i + 1, i + 1] = grid[i + 1, i + 1] + 5
        let load = ILExpression::with_type(
            ILCode::LdelemMd,
            &int,
            vec![ILExpression::ldloc(&grid), next(), next()],
        );
        let body = method_body(
            &method,
            vec![grid.clone(), i.clone()],
            vec![ILExpression::with_type(
                ILCode::StelemMd,
                &int,
                vec![
                    ILExpression::ldloc(&grid),
                    next(),
                    next(),
                    ILExpression::op(ILCode::Add, vec![load, ILExpression::ldc_i4(5)]),
                ],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let comma = &method.body.operands()[0].operands()[0];
        assert!(matches!(comma.kind(), NodeKind::Comma));
        assert_eq!(comma.operands().len(), 3);
        assert!(matches!(
            comma.operands()[2].kind(),
            NodeKind::Binary {
                op: BinaryOperator::AddAssign,
                ..
            }
        ));
        assert_eq!(method.temporaries.len(), 2);
    }

    #[test]
    fn test_address_forms_collapse() {
        let t = TestTypes::new();
        let point = t.point();
        let field = FieldDescriptor::new("X", &point, &t.types.int32()).into_rc();
        let method = static_method(&t, "Run", &t.types.void());
        let p = ILVariable::new("p", &point, ILVariableKind::Local(0));
        let body = method_body(
            &method,
            vec![p.clone()],
            vec![ILExpression::with_field(
                ILCode::Stfld,
                &field,
                vec![ILExpression::ldloca(&p), ILExpression::ldc_i4(1)],
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        assert_eq!(
            method.body.to_string(),
            "Block(ExpressionStatement(Binary[=](left: FieldAccess[X](target: p), right: 1:System.Int32)))"
        );
    }

    #[test]
    fn test_packed_array_retypes_local() {
        let t = TestTypes::new();
        let owner = t.point();
        let bytes = t.types.array_of(&t.types.primitive(crate::typesystem::PrimitiveKind::U1), 1);
        let field = FieldDescriptor::new("Data", &owner, &bytes)
            .into_static()
            .into_rc();
        let oracle: Arc<dyn MetadataOracle> = Arc::new(StaticOracle::new().with_field(
            &field,
            FieldInfo {
                is_packed_array: true,
                ..FieldInfo::default()
            },
        ));
        let translator = t.translator_with(oracle);

        let method = static_method(&t, "Run", &t.types.void());
        let local = ILVariable::new("buffer", &bytes, ILVariableKind::Local(0));
        let body = method_body(
            &method,
            vec![local.clone()],
            vec![ILExpression::stloc(
                &local,
                ILExpression::with_field(ILCode::Ldsfld, &field, Vec::new()),
            )],
        );

        let method = translator.translate(&body).unwrap();
        let buffer = method.locals.iter().find(|v| v.name() == "buffer").unwrap();
        assert!(buffer.ty().is_packed_array());
        assert!(method
            .body
            .all_descendants()
            .any(|n| matches!(n.kind(), NodeKind::ChangeType { .. })));
    }
}
