//! Translation of decompiled method bodies into the output syntax tree.
//!
//! [`MethodTranslator`] walks one [`MethodBody`] in a single recursive descent. Every
//! [`ILCode`] has an explicit arm in one exhaustive `match`, which dispatches to a rule
//! function grouped by concern:
//!
//! - `arithmetic` - binary and unary operators, pointer arithmetic, width promotion
//! - `compare` - comparisons and their canonical forms
//! - `convert` - numeric conversions and literal folding
//! - `memory` - locals, fields, elements and indirect access
//! - `calls` - invocations, replacement hooks, casts and boxing
//! - `compound` - compound assignment and post-increment reconstruction
//! - `nullable` - lifted nullable operations
//! - `flow` - statements and structured control flow
//!
//! # Failure Tiers
//!
//! A single instruction without a translation rule degrades locally: it becomes an
//! untranslatable node and a warning is recorded. A violated invariant (a value-type
//! receiver that is not a reference, an assignment to a non-storage location, a variable
//! redeclared with another type) aborts the whole method with an [`Error`].
//! [`MethodTranslator::translate_or_stub`] is the only place such errors are caught; the
//! method is replaced with a stub body that throws at runtime.

mod arithmetic;
mod calls;
mod compare;
mod compound;
mod context;
mod convert;
mod flow;
mod memory;
mod nullable;

use std::sync::Arc;

use log::warn;

pub use context::{BlockTarget, TranslationContext};
pub(crate) use convert::wrap_integer;

use crate::{
    ast::{AstNode, Literal, NodeKind, Variable, VariableKind, VariableRc},
    config::TranslatorConfig,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    il::{ILCode, ILExpression, ILOperand, ILVariableKind, ILVariableRc, MethodBody},
    metadata::{FieldRc, MetadataCache, MetadataOracle, MethodRc, NullOracle},
    typesystem::{PrimitiveKind, TypeOracle, TypeRc, TypeSystem},
    Error, Result,
};

/// The translation of one method.
#[derive(Debug, Clone)]
pub struct TranslatedMethod {
    /// The translated method
    pub method: MethodRc,
    /// Root statement block
    pub body: AstNode,
    /// `this` (for instance methods) followed by the declared parameters
    pub parameters: Vec<VariableRc>,
    /// Declared locals
    pub locals: Vec<VariableRc>,
    /// Temporaries synthesized by the translator and the rewrite passes
    pub temporaries: Vec<VariableRc>,
    /// Set once a declaration statement has been prepended to the body
    pub variables_declared: bool,
    next_variable_id: usize,
    next_temporary: usize,
}

impl TranslatedMethod {
    /// Creates a fresh temporary for use by a rewrite pass.
    pub fn new_temporary(&mut self, ty: &TypeRc) -> VariableRc {
        loop {
            let name = format!("$temp{}", self.next_temporary);
            self.next_temporary += 1;
            if self.variables().any(|v| v.name() == name) {
                continue;
            }
            let variable = Variable::new(self.next_variable_id, name, VariableKind::Temporary, ty);
            self.next_variable_id += 1;
            self.temporaries.push(variable.clone());
            return variable;
        }
    }

    /// All variables: parameters, locals, then temporaries.
    pub fn variables(&self) -> impl Iterator<Item = &VariableRc> {
        self.parameters
            .iter()
            .chain(&self.locals)
            .chain(&self.temporaries)
    }
}

/// Result of translating a method at the per-method boundary.
#[derive(Debug, Clone)]
pub enum MethodOutcome {
    /// The method translated successfully
    Translated(TranslatedMethod),
    /// Translation aborted; the method body throws at runtime instead
    Stubbed {
        /// The stub
        method: TranslatedMethod,
        /// Why translation aborted
        error: Error,
    },
}

impl MethodOutcome {
    /// The translated or stubbed method.
    #[must_use]
    pub fn method(&self) -> &TranslatedMethod {
        match self {
            MethodOutcome::Translated(method) | MethodOutcome::Stubbed { method, .. } => method,
        }
    }

    /// Mutable access to the translated or stubbed method.
    pub fn method_mut(&mut self) -> &mut TranslatedMethod {
        match self {
            MethodOutcome::Translated(method) | MethodOutcome::Stubbed { method, .. } => method,
        }
    }

    /// Consumes the outcome, returning the method.
    #[must_use]
    pub fn into_method(self) -> TranslatedMethod {
        match self {
            MethodOutcome::Translated(method) | MethodOutcome::Stubbed { method, .. } => method,
        }
    }

    /// Returns true if the method was replaced by a stub.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        matches!(self, MethodOutcome::Stubbed { .. })
    }

    /// The error that caused the stub, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            MethodOutcome::Translated(_) => None,
            MethodOutcome::Stubbed { error, .. } => Some(error),
        }
    }
}

/// Translates method bodies. Shared by all methods of a run.
pub struct MethodTranslator {
    oracle: Arc<TypeOracle>,
    metadata: Arc<MetadataCache>,
    config: Arc<TranslatorConfig>,
    diagnostics: Arc<Diagnostics>,
}

impl MethodTranslator {
    /// Creates a translator.
    ///
    /// # Arguments
    ///
    /// * `oracle` - Type compatibility oracle, shared with the rewrite passes
    /// * `metadata` - Memoizing front for the caller's metadata oracle
    /// * `config` - Translation settings
    /// * `diagnostics` - Collector for warnings and stub errors
    #[must_use]
    pub fn new(
        oracle: Arc<TypeOracle>,
        metadata: Arc<MetadataCache>,
        config: Arc<TranslatorConfig>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            oracle,
            metadata,
            config,
            diagnostics,
        }
    }

    /// Creates a translator over `types` with default settings and no metadata directives.
    #[must_use]
    pub fn with_types(types: Arc<TypeSystem>) -> Self {
        Self::with_oracle(types, Arc::new(NullOracle), TranslatorConfig::default())
    }

    /// Creates a translator over `types` with the given metadata oracle and settings.
    #[must_use]
    pub fn with_oracle(
        types: Arc<TypeSystem>,
        metadata: Arc<dyn MetadataOracle>,
        config: TranslatorConfig,
    ) -> Self {
        Self::new(
            Arc::new(TypeOracle::new(types)),
            Arc::new(MetadataCache::new(metadata)),
            Arc::new(config),
            Arc::new(Diagnostics::new()),
        )
    }

    /// The type oracle.
    #[must_use]
    pub fn oracle(&self) -> &Arc<TypeOracle> {
        &self.oracle
    }

    /// The type system.
    #[must_use]
    pub fn types(&self) -> &TypeSystem {
        self.oracle.types()
    }

    /// The metadata cache.
    #[must_use]
    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<TranslatorConfig> {
        &self.config
    }

    /// The diagnostics collector.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Translates a method body.
    ///
    /// # Errors
    ///
    /// Returns an error if the method violates a translation invariant. The error applies
    /// to the method as a whole; see [`MethodTranslator::translate_or_stub`].
    pub fn translate(&self, body: &MethodBody) -> Result<TranslatedMethod> {
        let mut translation = Translation::new(self, &body.method);

        let declared = body
            .this_variable
            .iter()
            .chain(&body.parameters)
            .chain(&body.locals);
        for variable in declared {
            translation.ctx.resolve(variable, &self.oracle)?;
        }

        let root = translation.block(&body.body)?;
        let (parameters, locals, temporaries, next_variable_id, next_temporary) =
            translation.ctx.into_variables();

        Ok(TranslatedMethod {
            method: body.method.clone(),
            body: root,
            parameters,
            locals,
            temporaries,
            variables_declared: false,
            next_variable_id,
            next_temporary,
        })
    }

    /// Translates a method body, replacing it with a throwing stub on failure.
    ///
    /// Never fails. A failure is logged and recorded as an error diagnostic.
    pub fn translate_or_stub(&self, body: &MethodBody) -> MethodOutcome {
        match self.translate(body) {
            Ok(method) => MethodOutcome::Translated(method),
            Err(error) => {
                let name = body.method.full_name();
                warn!("Replacing {name} with a stub: {error}");
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Error,
                        DiagnosticCategory::Method,
                        error.to_string(),
                    )
                    .with_method(name),
                );
                MethodOutcome::Stubbed {
                    method: self.stub(body),
                    error,
                }
            }
        }
    }

    /// Builds a stub for a method: its parameters and a body that throws.
    #[must_use]
    pub fn stub(&self, body: &MethodBody) -> TranslatedMethod {
        let parameters: Vec<VariableRc> = body
            .this_variable
            .iter()
            .chain(&body.parameters)
            .enumerate()
            .map(|(id, variable)| {
                let kind = match variable.kind {
                    ILVariableKind::This => VariableKind::This,
                    _ => VariableKind::Parameter,
                };
                Variable::new(id, variable.name.as_str(), kind, &variable.ty)
            })
            .collect();
        let next_variable_id = parameters.len();

        let throw = AstNode::throw(AstNode::string(&self.config.stub_message));
        TranslatedMethod {
            method: body.method.clone(),
            body: AstNode::block(vec![AstNode::expression_statement(throw)]),
            parameters,
            locals: Vec::new(),
            temporaries: Vec::new(),
            variables_declared: false,
            next_variable_id,
            next_temporary: 0,
        }
    }
}

// ============================================================================
// Translation of one method
// ============================================================================

/// The state of one running method translation. Rule functions live in the submodules.
pub(crate) struct Translation<'a> {
    translator: &'a MethodTranslator,
    method: &'a MethodRc,
    ctx: TranslationContext,
}

impl<'a> Translation<'a> {
    fn new(translator: &'a MethodTranslator, method: &'a MethodRc) -> Self {
        Self {
            translator,
            method,
            ctx: TranslationContext::new(
                translator.config.auto_cast,
                translator.config.max_recursion_depth,
            ),
        }
    }

    fn types(&self) -> &'a TypeSystem {
        self.translator.oracle.types()
    }

    fn oracle(&self) -> &'a TypeOracle {
        &self.translator.oracle
    }

    fn metadata(&self) -> &'a MetadataCache {
        &self.translator.metadata
    }

    fn config(&self) -> &'a TranslatorConfig {
        &self.translator.config
    }

    /// Translates an expression and applies the auto-cast to its expected type.
    fn expression(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let node = self.expression_raw(expr)?;
        Ok(match &expr.expected_type {
            Some(expected) => self.coerce(node, expected),
            None => node,
        })
    }

    /// Translates an expression and coerces it to `ty`.
    fn expression_expecting(&mut self, expr: &ILExpression, ty: &TypeRc) -> Result<AstNode> {
        let node = self.expression_raw(expr)?;
        Ok(self.coerce(node, ty))
    }

    /// Translates an expression with auto-casting suppressed for its whole subtree.
    fn expression_uncast(&mut self, expr: &ILExpression) -> Result<AstNode> {
        self.ctx.push_auto_cast(false);
        let result = self.expression_raw(expr);
        self.ctx.pop_auto_cast();
        result
    }

    /// Translates an expression without applying its own expected type.
    fn expression_raw(&mut self, expr: &ILExpression) -> Result<AstNode> {
        self.ctx.enter()?;
        let result = self.dispatch(expr);
        self.ctx.leave();
        result
    }

    fn dispatch(&mut self, expr: &ILExpression) -> Result<AstNode> {
        match expr.code {
            ILCode::Nop | ILCode::Endfinally => Ok(AstNode::null()),
            ILCode::LdcI4
            | ILCode::LdcI8
            | ILCode::LdcR4
            | ILCode::LdcR8
            | ILCode::LdcDecimal
            | ILCode::Ldstr
            | ILCode::Ldnull
            | ILCode::DefaultValue
            | ILCode::Ldtoken => self.constant(expr),
            ILCode::Sizeof => self.size_of(expr),

            ILCode::Ldloc => self.load_local(expr),
            ILCode::Stloc => self.store_local(expr),
            ILCode::Ldloca => self.local_address(expr),
            ILCode::Ldfld | ILCode::Ldsfld => self.load_field(expr),
            ILCode::Stfld | ILCode::Stsfld => self.store_field(expr),
            ILCode::Ldflda | ILCode::Ldsflda => self.field_address(expr),

            ILCode::Newarr | ILCode::NewarrMd => self.new_array(expr),
            ILCode::InitArray => self.init_array(expr),
            ILCode::Ldlen => self.array_length(expr),
            ILCode::Ldelem | ILCode::LdelemMd => self.load_element(expr),
            ILCode::Stelem | ILCode::StelemMd => self.store_element(expr),
            ILCode::Ldelema | ILCode::LdelemaMd => self.element_address(expr),

            ILCode::Ldind | ILCode::Ldobj => self.load_indirect(expr),
            ILCode::Stind | ILCode::Stobj => self.store_indirect(expr),
            ILCode::Initobj => self.init_object(expr),
            ILCode::Cpobj => self.copy_object(expr),
            ILCode::AddressOf => self.address_of(expr),

            ILCode::Add
            | ILCode::AddOvf
            | ILCode::AddOvfUn
            | ILCode::Sub
            | ILCode::SubOvf
            | ILCode::SubOvfUn
            | ILCode::Mul
            | ILCode::MulOvf
            | ILCode::MulOvfUn
            | ILCode::Div
            | ILCode::DivUn
            | ILCode::Rem
            | ILCode::RemUn
            | ILCode::And
            | ILCode::Or
            | ILCode::Xor
            | ILCode::Shl
            | ILCode::Shr
            | ILCode::ShrUn => self.binary_arithmetic(expr),
            ILCode::Neg | ILCode::Not => self.unary_arithmetic(expr),
            ILCode::LogicNot => self.logic_not(expr),
            ILCode::LogicAnd | ILCode::LogicOr => self.logic_binary(expr),
            ILCode::TernaryOp => self.ternary(expr),
            ILCode::CompoundAssignment => self.compound_assignment(expr),
            ILCode::PostIncrement => self.post_increment(expr),

            ILCode::Ceq
            | ILCode::Cne
            | ILCode::Cgt
            | ILCode::CgtUn
            | ILCode::Cge
            | ILCode::CgeUn
            | ILCode::Clt
            | ILCode::CltUn
            | ILCode::Cle
            | ILCode::CleUn => self.comparison(expr),

            ILCode::ConvI1
            | ILCode::ConvI2
            | ILCode::ConvI4
            | ILCode::ConvI8
            | ILCode::ConvU1
            | ILCode::ConvU2
            | ILCode::ConvU4
            | ILCode::ConvU8
            | ILCode::ConvI
            | ILCode::ConvU
            | ILCode::ConvR4
            | ILCode::ConvR8
            | ILCode::ConvRUn
            | ILCode::ConvOvfI1
            | ILCode::ConvOvfI2
            | ILCode::ConvOvfI4
            | ILCode::ConvOvfI8
            | ILCode::ConvOvfU1
            | ILCode::ConvOvfU2
            | ILCode::ConvOvfU4
            | ILCode::ConvOvfU8
            | ILCode::ConvOvfI
            | ILCode::ConvOvfU
            | ILCode::ConvOvfI1Un
            | ILCode::ConvOvfI2Un
            | ILCode::ConvOvfI4Un
            | ILCode::ConvOvfI8Un
            | ILCode::ConvOvfU1Un
            | ILCode::ConvOvfU2Un
            | ILCode::ConvOvfU4Un
            | ILCode::ConvOvfU8Un
            | ILCode::ConvOvfIUn
            | ILCode::ConvOvfUUn => self.conversion(expr),

            ILCode::Newobj => self.new_object(expr),
            ILCode::Call
            | ILCode::Callvirt
            | ILCode::CallGetter
            | ILCode::CallSetter
            | ILCode::CallvirtGetter
            | ILCode::CallvirtSetter => self.call(expr),
            ILCode::Ldftn | ILCode::Ldvirtftn => self.method_pointer(expr),
            ILCode::Castclass | ILCode::Isinst | ILCode::UnboxAny => self.type_cast(expr),
            ILCode::Box => self.box_value(expr),
            ILCode::Unbox => self.unbox(expr),

            ILCode::Wrap => self.nullable_wrap(expr),
            ILCode::ValueOf => self.nullable_value(expr),
            ILCode::NullableOf => self.lifted_operation(expr),

            ILCode::Br | ILCode::Leave => self.goto(expr),
            ILCode::LoopOrSwitchBreak => self.break_loop(expr),
            ILCode::LoopContinue => self.continue_loop(expr),
            ILCode::Ret => self.return_value(expr),
            ILCode::Throw => self.throw(expr),
            ILCode::Rethrow => Ok(AstNode::build(NodeKind::Rethrow, Vec::new())),
            ILCode::Dup => self.expression(argument(expr, 0)?),

            ILCode::Arglist
            | ILCode::Localloc
            | ILCode::Mkrefany
            | ILCode::Refanyval
            | ILCode::Refanytype
            | ILCode::Ckfinite
            | ILCode::Cpblk
            | ILCode::Initblk
            | ILCode::Jmp
            | ILCode::Calli => self.unsupported(expr),
        }
    }

    // ------------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------------

    fn constant(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let types = self.types();
        let literal = match (expr.code, &expr.operand) {
            (ILCode::LdcI4, ILOperand::Int32(value)) => {
                let literal = Literal::integer(types, PrimitiveKind::I4, i64::from(*value));
                return Ok(AstNode::literal(
                    expr.inferred_type
                        .as_ref()
                        .and_then(|ty| retype_literal(&literal, ty))
                        .unwrap_or(literal),
                ));
            }
            (ILCode::LdcI8, ILOperand::Int64(value)) => {
                Literal::integer(types, PrimitiveKind::I8, *value)
            }
            (ILCode::LdcR4, ILOperand::Float32(value)) => Literal::Float {
                value: f64::from(*value),
                ty: types.primitive(PrimitiveKind::R4),
            },
            (ILCode::LdcR8, ILOperand::Float64(value)) => Literal::Float {
                value: *value,
                ty: types.primitive(PrimitiveKind::R8),
            },
            (ILCode::LdcDecimal, ILOperand::Decimal(value)) => {
                Literal::Decimal(Arc::from(value.as_str()))
            }
            (ILCode::Ldstr, ILOperand::String(value)) => Literal::String(Arc::from(value.as_str())),
            (ILCode::Ldnull, _) => Literal::Null(
                expr.inferred_type
                    .clone()
                    .filter(|ty| !ty.is_value_type() || ty.is_nullable())
                    .unwrap_or_else(|| types.object()),
            ),
            (ILCode::DefaultValue, ILOperand::Type(ty)) => Literal::Default(ty.clone()),
            (ILCode::Ldtoken, ILOperand::Type(ty)) => Literal::TypeHandle(ty.clone()),
            (ILCode::Ldtoken, ILOperand::Method(method)) => Literal::MethodHandle(method.clone()),
            (ILCode::Ldtoken, ILOperand::Field(field)) => Literal::FieldHandle(field.clone()),
            _ => {
                return Err(malformed_error!(
                    "{} cannot take operand {:?}",
                    expr.code,
                    expr.operand
                ))
            }
        };
        Ok(AstNode::literal(literal))
    }

    fn size_of(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let ty = operand_type(expr)?;
        let size = TypeOracle::size_of(ty);
        if size > 0 {
            return Ok(AstNode::integer(
                self.types(),
                PrimitiveKind::I4,
                i64::try_from(size).unwrap_or(i64::MAX),
            ));
        }
        Ok(AstNode::intrinsic(
            "SizeOf",
            &self.types().int32(),
            vec![AstNode::type_identifier(ty)],
        ))
    }

    fn unsupported(&mut self, expr: &ILExpression) -> Result<AstNode> {
        let mut arguments = Vec::with_capacity(expr.arguments.len());
        for argument in &expr.arguments {
            arguments.push(self.expression(argument)?);
        }
        self.warn(
            expr,
            DiagnosticCategory::Instruction,
            format!("No translation for {}", expr.code),
        );
        Ok(AstNode::untranslatable(expr.code.to_string(), arguments))
    }

    // ------------------------------------------------------------------------
    // Auto-cast
    // ------------------------------------------------------------------------

    /// Adjusts a translated value to the type its consumer expects.
    ///
    /// Integer and boolean literals are retyped in place. Other values whose numeric
    /// representation differs from the expected one are wrapped in a cast, which the cast
    /// expansion pass later lowers.
    fn coerce(&self, node: AstNode, expected: &TypeRc) -> AstNode {
        if !self.ctx.auto_cast_enabled() {
            return node;
        }

        let actual = node.computed_type(self.types());
        if self.oracle().equal(expected, &actual, false) {
            return node;
        }
        if expected.is_pointer() || expected.is_by_ref() || actual.is_pointer() || actual.is_by_ref()
        {
            return node;
        }

        if let Some(literal) = node.as_literal() {
            if literal.is_null() && (!expected.is_value_type() || expected.is_nullable()) {
                return AstNode::null_literal(expected);
            }
            if let Some(retyped) = retype_literal(literal, expected) {
                return AstNode::literal(retyped);
            }
        }

        match (
            TypeOracle::numeric_kind(expected),
            TypeOracle::numeric_kind(&actual),
        ) {
            (Some(_), Some(_)) => AstNode::cast(node, expected, false),
            _ => node,
        }
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    fn warn(&self, expr: &ILExpression, category: DiagnosticCategory, message: String) {
        let method = self.method.full_name();
        warn!("{method}: {message}");

        let mut diagnostic =
            Diagnostic::new(DiagnosticSeverity::Warning, category, message).with_method(method);
        if let Some(offset) = expr.il_offset {
            diagnostic = diagnostic.with_il_offset(offset);
        }
        self.translator.diagnostics.push(diagnostic);
    }

    fn variable(&mut self, variable: &ILVariableRc) -> Result<VariableRc> {
        self.ctx.resolve(variable, &self.translator.oracle)
    }
}

/// Retypes an integer, enum, char or boolean literal to `target`.
///
/// Returns `None` when `target` has no literal form for the value.
pub(crate) fn retype_literal(literal: &Literal, target: &TypeRc) -> Option<Literal> {
    if matches!(literal, Literal::Float { .. }) {
        return None;
    }
    let value = literal.as_i64()?;

    if TypeOracle::is_boolean(target) {
        return Some(Literal::Boolean(value != 0));
    }
    if let Some(kind) = target.enum_underlying() {
        return Some(Literal::enumeration(target, wrap_integer(kind, value)));
    }
    match target.primitive()? {
        PrimitiveKind::Char => Some(Literal::Char(wrap_integer(PrimitiveKind::Char, value) as u16)),
        PrimitiveKind::R4 | PrimitiveKind::R8 => Some(Literal::Float {
            value: value as f64,
            ty: target.clone(),
        }),
        kind if kind.is_integral() => Some(Literal::Integer {
            value: wrap_integer(kind, value),
            ty: target.clone(),
        }),
        _ => None,
    }
}

// ============================================================================
// Operand access
// ============================================================================

fn argument(expr: &ILExpression, index: usize) -> Result<&ILExpression> {
    expr.arguments
        .get(index)
        .ok_or_else(|| malformed_error!("{} is missing argument {}", expr.code, index))
}

fn operand_variable(expr: &ILExpression) -> Result<&ILVariableRc> {
    expr.variable()
        .ok_or_else(|| malformed_error!("{} requires a variable operand", expr.code))
}

fn operand_field(expr: &ILExpression) -> Result<&FieldRc> {
    expr.field()
        .ok_or_else(|| malformed_error!("{} requires a field operand", expr.code))
}

fn operand_method(expr: &ILExpression) -> Result<&MethodRc> {
    expr.method()
        .ok_or_else(|| malformed_error!("{} requires a method operand", expr.code))
}

fn operand_type(expr: &ILExpression) -> Result<&TypeRc> {
    expr.type_operand()
        .ok_or_else(|| malformed_error!("{} requires a type operand", expr.code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{int_local, method_body, static_method, TestTypes};

    #[test]
    fn test_retype_literal() {
        let types = TypeSystem::new();
        let one = Literal::integer(&types, PrimitiveKind::I4, 1);
        assert_eq!(retype_literal(&one, &types.boolean()), Some(Literal::Boolean(true)));
        assert_eq!(
            retype_literal(&Literal::integer(&types, PrimitiveKind::I4, 300), &types.primitive(PrimitiveKind::U1)),
            Some(Literal::integer(&types, PrimitiveKind::U1, 44))
        );
        assert_eq!(
            retype_literal(&Literal::integer(&types, PrimitiveKind::I4, 65), &types.primitive(PrimitiveKind::Char)),
            Some(Literal::Char(65))
        );
        assert_eq!(retype_literal(&one, &types.string()), None);
    }

    #[test]
    fn test_unsupported_instruction_degrades() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let body = method_body(
            &method,
            vec![x.clone()],
            vec![ILExpression::stloc(
                &x,
                ILExpression::op(ILCode::Localloc, vec![ILExpression::ldc_i4(16)]),
            )],
        );

        let method = t.translator.translate(&body).unwrap();
        let untranslatable = method
            .body
            .all_descendants()
            .find(|n| matches!(n.kind(), NodeKind::Untranslatable { .. }));
        assert!(untranslatable.is_some());
        assert_eq!(t.translator.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_stub_on_hard_failure() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let body = method_body(
            &method,
            Vec::new(),
            vec![ILExpression::op(
                ILCode::Stloc,
                vec![ILExpression::ldc_i4(1)],
            )],
        );

        let outcome = t.translator.translate_or_stub(&body);
        assert!(outcome.is_stub());
        assert!(matches!(outcome.error(), Some(Error::Malformed { .. })));
        let stub = outcome.method();
        assert_eq!(
            stub.body.to_string(),
            "Block(ExpressionStatement(Throw(exception: \"Method could not be translated\")))"
        );
        assert!(t.translator.diagnostics().has_errors());
    }
}
