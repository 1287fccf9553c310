//! Calls that are really intrinsics or plain operators.
//!
//! The recognizers are shared with the translator, which applies them while building call
//! nodes when [`TranslatorConfig::early_intrinsics`](crate::TranslatorConfig) is set.
//! Otherwise [`IntrinsicsPass`] applies them to the raw tree.

use crate::{
    ast::{AstNode, BinaryOperator, Dispatch, Literal, NodeKind},
    metadata::MethodRc,
    passes::{rewrite_tree, AstPass, PassContext, Rewriter},
    translator::TranslatedMethod,
    typesystem::{PrimitiveKind, TypeOracle, TypeRc},
    Result,
};

/// Replaces intrinsic calls with their dedicated node forms.
pub struct IntrinsicsPass;

impl AstPass for IntrinsicsPass {
    fn name(&self) -> &'static str {
        "intrinsics"
    }

    fn description(&self) -> &'static str {
        "Lowers object identity, delegate, array initializer, string concatenation and nullable calls"
    }

    fn run_on_method(&self, method: &mut TranslatedMethod, ctx: &PassContext) -> Result<bool> {
        let limit = ctx.config.max_rewrites_per_node;
        let mut rewriter = IntrinsicRewriter {
            oracle: &ctx.oracle,
        };
        rewrite_tree(&mut method.body, &mut rewriter, limit)
    }
}

struct IntrinsicRewriter<'a> {
    oracle: &'a TypeOracle,
}

impl Rewriter for IntrinsicRewriter<'_> {
    fn name(&self) -> &'static str {
        "intrinsics"
    }

    fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>> {
        Ok(replace_call(node, self.oracle))
    }
}

/// Returns the intrinsic form of a call, object construction or property read, or `None`
/// if `node` is an ordinary one.
pub(crate) fn replace_call(node: &AstNode, oracle: &TypeOracle) -> Option<AstNode> {
    match node.kind() {
        NodeKind::Invocation {
            method, dispatch, ..
        } => {
            let method = method.clone();
            object_call(node, &method, oracle)
                .or_else(|| delegate_invoke(node, &method, *dispatch))
                .or_else(|| initialize_array(node, &method, oracle))
                .or_else(|| string_concat(node, &method, oracle))
                .or_else(|| nullable_call(node, &method, oracle))
        }
        NodeKind::New { constructor, ty } => {
            ty.nullable_argument()?;
            if constructor.parameters.len() != 1 || node.operands().len() != 1 {
                return None;
            }
            Some(AstNode::build(
                NodeKind::NullableWrap { ty: ty.clone() },
                node.operands().to_vec(),
            ))
        }
        NodeKind::PropertyAccess { property } => {
            let getter = property.getter.as_ref()?;
            if !property.declaring_type.is_nullable() || !node.arguments().is_empty() {
                return None;
            }
            let target = node.operand(0)?;
            nullable_member(getter, target, None, oracle)
        }
        _ => None,
    }
}

/// `Equals`, `ReferenceEquals` and `GetType` declared by `System.Object`.
fn object_call(node: &AstNode, method: &MethodRc, oracle: &TypeOracle) -> Option<AstNode> {
    if !method.is_declared_by("System", "Object") {
        return None;
    }
    let types = oracle.types();
    let operands = node.operands();

    match (method.name.as_str(), method.is_static()) {
        ("Equals", false) => {
            let [this, other] = operands else { return None };
            Some(AstNode::intrinsic(
                "ObjectEquals",
                &types.boolean(),
                vec![this.clone(), other.clone()],
            ))
        }
        ("Equals", true) => {
            let [_, left, right] = operands else { return None };
            Some(AstNode::intrinsic(
                "ObjectEquals",
                &types.boolean(),
                vec![left.clone(), right.clone()],
            ))
        }
        ("ReferenceEquals", true) => {
            let [_, left, right] = operands else { return None };
            Some(AstNode::binary(
                BinaryOperator::Equal,
                left.clone(),
                right.clone(),
                &types.boolean(),
            ))
        }
        ("GetType", false) => {
            let [this] = operands else { return None };
            Some(AstNode::intrinsic(
                "GetType",
                &types.type_type(),
                vec![this.clone()],
            ))
        }
        _ => None,
    }
}

/// `Invoke` on a delegate.
///
/// Invoking a delegate constructed in place calls its target directly. Any other receiver
/// keeps the call, with delegate dispatch.
fn delegate_invoke(node: &AstNode, method: &MethodRc, dispatch: Dispatch) -> Option<AstNode> {
    if method.name != "Invoke" || !method.declaring_type.is_delegate() || method.is_static() {
        return None;
    }
    let receiver = node.operand(0)?;

    if let NodeKind::New { ty, .. } = receiver.kind() {
        if ty.is_delegate() {
            if let [target, pointer] = receiver.operands() {
                if let NodeKind::MethodIdentifier(callee) = pointer.kind() {
                    let (dispatch, this) = if callee.is_static() {
                        (Dispatch::Static, AstNode::null())
                    } else {
                        (Dispatch::Instance, target.clone())
                    };
                    return Some(AstNode::invocation(
                        callee,
                        dispatch,
                        false,
                        this,
                        node.arguments().to_vec(),
                    ));
                }
            }
        }
    }

    if dispatch == Dispatch::Delegate {
        return None;
    }
    Some(AstNode::invocation(
        method,
        Dispatch::Delegate,
        false,
        receiver.clone(),
        node.arguments().to_vec(),
    ))
}

/// `RuntimeHelpers.InitializeArray(array, ldtoken field)` over a field with an initial data
/// blob becomes an array literal.
///
/// A freshly allocated array is replaced by the literal; an array held in a storage
/// location is overwritten with it.
fn initialize_array(node: &AstNode, method: &MethodRc, oracle: &TypeOracle) -> Option<AstNode> {
    if method.name != "InitializeArray"
        || !method.is_declared_by("System.Runtime.CompilerServices", "RuntimeHelpers")
    {
        return None;
    }
    let [_, array, handle] = node.operands() else {
        return None;
    };
    let Some(Literal::FieldHandle(field)) = handle.as_literal() else {
        return None;
    };
    let data = field.initial_data.as_deref()?;

    let types = oracle.types();
    let array_type = array.computed_type(types);
    let element = array_type.element_type()?;
    let kind = TypeOracle::numeric_kind(&element)?;
    let size = element_size(kind)?;

    let count = match array.kind() {
        NodeKind::NewArray { rank: 1, .. } => array
            .operand(0)
            .and_then(AstNode::as_literal)
            .and_then(Literal::as_i64)
            .and_then(|length| usize::try_from(length).ok())
            .unwrap_or(data.len() / size),
        NodeKind::NewArray { .. } => return None,
        _ if array.is_lvalue() => data.len() / size,
        _ => return None,
    };
    if count.checked_mul(size)? > data.len() {
        return None;
    }

    let elements = data
        .chunks_exact(size)
        .take(count)
        .map(|bytes| element_literal(oracle, &element, kind, bytes))
        .collect::<Option<Vec<_>>>()?;
    let literal = AstNode::build(NodeKind::ArrayLiteral { element }, elements);

    if array.is_lvalue() {
        return AstNode::assign(array.clone(), literal, types).ok();
    }
    Some(literal)
}

fn element_size(kind: PrimitiveKind) -> Option<usize> {
    match kind {
        PrimitiveKind::I | PrimitiveKind::U => None,
        _ => Some(kind.size_of()),
    }
}

/// Decodes one little-endian element.
fn element_literal(
    oracle: &TypeOracle,
    element: &TypeRc,
    kind: PrimitiveKind,
    bytes: &[u8],
) -> Option<AstNode> {
    let types = oracle.types();
    let mut raw = [0u8; 8];
    raw.get_mut(..bytes.len())?.copy_from_slice(bytes);
    let bits = u64::from_le_bytes(raw);

    let literal = match kind {
        PrimitiveKind::Boolean => Literal::Boolean(bits != 0),
        PrimitiveKind::Char => Literal::Char(u16::try_from(bits).ok()?),
        PrimitiveKind::R4 => Literal::Float {
            value: f64::from(f32::from_bits(u32::try_from(bits).ok()?)),
            ty: types.primitive(kind),
        },
        PrimitiveKind::R8 => Literal::Float {
            value: f64::from_bits(bits),
            ty: types.primitive(kind),
        },
        _ => {
            let width = kind.size_of() * 8;
            #[allow(clippy::cast_possible_wrap)]
            let value = if kind.is_signed() && width < 64 {
                let shift = 64 - width;
                ((bits << shift) as i64) >> shift
            } else {
                bits as i64
            };
            if element.enum_underlying().is_some() {
                Literal::enumeration(element, value)
            } else {
                Literal::integer(types, kind, value)
            }
        }
    };
    Some(AstNode::literal(literal))
}

/// `String.Concat(a, b, ...)` over string operands becomes `a + b + ...`.
fn string_concat(node: &AstNode, method: &MethodRc, oracle: &TypeOracle) -> Option<AstNode> {
    if method.name != "Concat" || !method.is_declared_by("System", "String") || !method.is_static()
    {
        return None;
    }
    let arguments = node.arguments();
    if arguments.len() < 2 {
        return None;
    }
    let types = oracle.types();
    if !arguments
        .iter()
        .all(|argument| oracle.is_string(&argument.computed_type(types)))
    {
        return None;
    }

    let string = types.string();
    arguments
        .iter()
        .cloned()
        .reduce(|left, right| AstNode::binary(BinaryOperator::Add, left, right, &string))
}

/// `HasValue`, `Value` and `GetValueOrDefault` called on a `Nullable<T>`.
fn nullable_call(node: &AstNode, method: &MethodRc, oracle: &TypeOracle) -> Option<AstNode> {
    if !method.declaring_type.is_nullable() || method.is_static() {
        return None;
    }
    let target = node.operand(0)?;
    nullable_member(method, target, node.arguments().first(), oracle)
}

fn nullable_member(
    method: &MethodRc,
    target: &AstNode,
    fallback: Option<&AstNode>,
    oracle: &TypeOracle,
) -> Option<AstNode> {
    let types = oracle.types();
    let nullable = method.declaring_type.clone();
    let underlying = nullable.nullable_argument()?;
    let unwrap = || {
        AstNode::build(
            NodeKind::NullableUnwrap {
                ty: underlying.clone(),
            },
            vec![target.clone()],
        )
    };
    let has_value = || {
        AstNode::binary(
            BinaryOperator::NotEqual,
            target.clone(),
            AstNode::null_literal(&nullable),
            &types.boolean(),
        )
    };

    match method.name.as_str() {
        "get_HasValue" => Some(has_value()),
        "get_Value" => Some(unwrap()),
        "GetValueOrDefault" => {
            // The receiver is read twice.
            if !is_repeatable(target) {
                return None;
            }
            let fallback = fallback
                .cloned()
                .unwrap_or_else(|| AstNode::default_value(&underlying));
            Some(AstNode::ternary(has_value(), unwrap(), fallback, &underlying))
        }
        _ => None,
    }
}

/// Returns true for variables and field chains over them.
fn is_repeatable(node: &AstNode) -> bool {
    match node.kind() {
        NodeKind::Variable(_) | NodeKind::TypeIdentifier(_) => true,
        NodeKind::FieldAccess { .. } => node.operand(0).is_some_and(is_repeatable),
        _ => false,
    }
}
