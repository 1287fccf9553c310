//! The structured instruction tree consumed by the translator.
//!
//! A method body arrives already decompiled: stack operations are folded into nested
//! expressions, and control flow is recovered into blocks, conditions, loops, switches and
//! exception regions. Every expression carries the type the decompiler expected at that
//! position and the type it inferred for the value. Both annotations are hints; the
//! translator cross-checks them instead of trusting them.
//!
//! # Structure
//!
//! ```text
//! MethodBody
//!  └─ ILBlock
//!      ├─ ILNode::Expression(ILExpression { code, operand, arguments, .. })
//!      ├─ ILNode::Label("IL_0010")
//!      ├─ ILNode::Condition { condition, true_block, false_block }
//!      ├─ ILNode::While { condition, body }
//!      ├─ ILNode::Switch { condition, cases }
//!      ├─ ILNode::TryCatch { try_block, catch_blocks, finally_block, fault_block }
//!      └─ ILNode::Fixed { initializers, body }
//! ```

use std::{fmt, sync::Arc};

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    metadata::{FieldRc, MethodRc},
    typesystem::{PrimitiveKind, TypeRc},
};

/// A reference counted pointer to an [`ILVariable`]
pub type ILVariableRc = Arc<ILVariable>;

/// Instruction kinds of the structured instruction tree.
///
/// Beyond the plain CIL opcodes, the decompiler introduces a few synthetic kinds
/// (`CompoundAssignment`, `PostIncrement`, the nullable markers, the `Md` array forms, the
/// accessor calls) that carry information lost when the stack form was folded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
#[allow(missing_docs)]
pub enum ILCode {
    // ========================================================================
    // Constants
    // ========================================================================
    Nop,
    LdcI4,
    LdcI8,
    LdcR4,
    LdcR8,
    LdcDecimal,
    Ldstr,
    Ldnull,
    DefaultValue,
    Ldtoken,
    Sizeof,

    // ========================================================================
    // Variables and fields
    // ========================================================================
    Ldloc,
    Stloc,
    Ldloca,
    Ldfld,
    Stfld,
    Ldflda,
    Ldsfld,
    Stsfld,
    Ldsflda,

    // ========================================================================
    // Arrays
    // ========================================================================
    Newarr,
    NewarrMd,
    InitArray,
    Ldlen,
    Ldelem,
    Stelem,
    Ldelema,
    LdelemMd,
    StelemMd,
    LdelemaMd,

    // ========================================================================
    // Indirect access
    // ========================================================================
    Ldind,
    Stind,
    Ldobj,
    Stobj,
    Initobj,
    Cpobj,
    AddressOf,

    // ========================================================================
    // Arithmetic and logic
    // ========================================================================
    Add,
    AddOvf,
    AddOvfUn,
    Sub,
    SubOvf,
    SubOvfUn,
    Mul,
    MulOvf,
    MulOvfUn,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    Neg,
    Not,
    LogicNot,
    LogicAnd,
    LogicOr,
    TernaryOp,
    CompoundAssignment,
    PostIncrement,

    // ========================================================================
    // Comparisons
    // ========================================================================
    Ceq,
    Cne,
    Cgt,
    CgtUn,
    Cge,
    CgeUn,
    Clt,
    CltUn,
    Cle,
    CleUn,

    // ========================================================================
    // Conversions
    // ========================================================================
    ConvI1,
    ConvI2,
    ConvI4,
    ConvI8,
    ConvU1,
    ConvU2,
    ConvU4,
    ConvU8,
    ConvI,
    ConvU,
    ConvR4,
    ConvR8,
    ConvRUn,
    ConvOvfI1,
    ConvOvfI2,
    ConvOvfI4,
    ConvOvfI8,
    ConvOvfU1,
    ConvOvfU2,
    ConvOvfU4,
    ConvOvfU8,
    ConvOvfI,
    ConvOvfU,
    ConvOvfI1Un,
    ConvOvfI2Un,
    ConvOvfI4Un,
    ConvOvfI8Un,
    ConvOvfU1Un,
    ConvOvfU2Un,
    ConvOvfU4Un,
    ConvOvfU8Un,
    ConvOvfIUn,
    ConvOvfUUn,

    // ========================================================================
    // Objects and calls
    // ========================================================================
    Newobj,
    Call,
    Callvirt,
    CallGetter,
    CallSetter,
    CallvirtGetter,
    CallvirtSetter,
    Ldftn,
    Ldvirtftn,
    Castclass,
    Isinst,
    Box,
    Unbox,
    UnboxAny,

    // ========================================================================
    // Nullable markers
    // ========================================================================
    Wrap,
    ValueOf,
    NullableOf,

    // ========================================================================
    // Control flow
    // ========================================================================
    Br,
    Leave,
    LoopOrSwitchBreak,
    LoopContinue,
    Ret,
    Throw,
    Rethrow,
    Endfinally,
    Dup,

    // ========================================================================
    // Unsupported
    // ========================================================================
    Arglist,
    Localloc,
    Mkrefany,
    Refanyval,
    Refanytype,
    Ckfinite,
    Cpblk,
    Initblk,
    Jmp,
    Calli,
}

impl ILCode {
    /// Returns true for instructions that read a storage location.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(
            self,
            ILCode::Ldloc
                | ILCode::Ldfld
                | ILCode::Ldsfld
                | ILCode::Ldelem
                | ILCode::LdelemMd
                | ILCode::Ldobj
                | ILCode::Ldind
                | ILCode::CallGetter
                | ILCode::CallvirtGetter
        )
    }

    /// Destination primitive and overflow check flag of a conversion instruction.
    #[must_use]
    pub const fn conversion_target(&self) -> Option<(PrimitiveKind, bool)> {
        Some(match self {
            ILCode::ConvI1 => (PrimitiveKind::I1, false),
            ILCode::ConvI2 => (PrimitiveKind::I2, false),
            ILCode::ConvI4 => (PrimitiveKind::I4, false),
            ILCode::ConvI8 => (PrimitiveKind::I8, false),
            ILCode::ConvU1 => (PrimitiveKind::U1, false),
            ILCode::ConvU2 => (PrimitiveKind::U2, false),
            ILCode::ConvU4 => (PrimitiveKind::U4, false),
            ILCode::ConvU8 => (PrimitiveKind::U8, false),
            ILCode::ConvI => (PrimitiveKind::I, false),
            ILCode::ConvU => (PrimitiveKind::U, false),
            ILCode::ConvR4 => (PrimitiveKind::R4, false),
            ILCode::ConvR8 | ILCode::ConvRUn => (PrimitiveKind::R8, false),
            ILCode::ConvOvfI1 | ILCode::ConvOvfI1Un => (PrimitiveKind::I1, true),
            ILCode::ConvOvfI2 | ILCode::ConvOvfI2Un => (PrimitiveKind::I2, true),
            ILCode::ConvOvfI4 | ILCode::ConvOvfI4Un => (PrimitiveKind::I4, true),
            ILCode::ConvOvfI8 | ILCode::ConvOvfI8Un => (PrimitiveKind::I8, true),
            ILCode::ConvOvfU1 | ILCode::ConvOvfU1Un => (PrimitiveKind::U1, true),
            ILCode::ConvOvfU2 | ILCode::ConvOvfU2Un => (PrimitiveKind::U2, true),
            ILCode::ConvOvfU4 | ILCode::ConvOvfU4Un => (PrimitiveKind::U4, true),
            ILCode::ConvOvfU8 | ILCode::ConvOvfU8Un => (PrimitiveKind::U8, true),
            ILCode::ConvOvfI | ILCode::ConvOvfIUn => (PrimitiveKind::I, true),
            ILCode::ConvOvfU | ILCode::ConvOvfUUn => (PrimitiveKind::U, true),
            _ => return None,
        })
    }

    /// Returns true for conversions that treat their operand as unsigned.
    #[must_use]
    pub const fn is_unsigned_source(&self) -> bool {
        matches!(
            self,
            ILCode::ConvRUn
                | ILCode::ConvOvfI1Un
                | ILCode::ConvOvfI2Un
                | ILCode::ConvOvfI4Un
                | ILCode::ConvOvfI8Un
                | ILCode::ConvOvfU1Un
                | ILCode::ConvOvfU2Un
                | ILCode::ConvOvfU4Un
                | ILCode::ConvOvfU8Un
                | ILCode::ConvOvfIUn
                | ILCode::ConvOvfUUn
        )
    }
}

/// Role of a variable in the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ILVariableKind {
    /// The implicit `this` of an instance method
    This,
    /// A declared parameter, by position
    Parameter(u16),
    /// A declared local, by slot
    Local(u16),
    /// A variable introduced by the decompiler
    Generated,
}

/// A variable of the instruction tree.
#[derive(Debug)]
pub struct ILVariable {
    /// Name, unique within the method
    pub name: String,
    /// Declared type
    pub ty: TypeRc,
    /// Role of the variable
    pub kind: ILVariableKind,
    /// Pinned locals of `fixed` statements
    pub is_pinned: bool,
}

impl ILVariable {
    /// Creates a shared variable.
    pub fn new(name: impl Into<String>, ty: &TypeRc, kind: ILVariableKind) -> ILVariableRc {
        Arc::new(Self {
            name: name.into(),
            ty: ty.clone(),
            kind,
            is_pinned: false,
        })
    }

    /// Creates a shared pinned local.
    pub fn pinned(name: impl Into<String>, ty: &TypeRc, slot: u16) -> ILVariableRc {
        Arc::new(Self {
            name: name.into(),
            ty: ty.clone(),
            kind: ILVariableKind::Local(slot),
            is_pinned: true,
        })
    }
}

/// Operand of an instruction.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub enum ILOperand {
    #[default]
    None,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Decimal constant in invariant textual form
    Decimal(String),
    String(String),
    Variable(ILVariableRc),
    Field(FieldRc),
    Method(MethodRc),
    Type(TypeRc),
    Label(String),
}

/// An expression node of the instruction tree.
#[derive(Debug, Clone)]
pub struct ILExpression {
    /// Instruction kind
    pub code: ILCode,
    /// Instruction operand
    pub operand: ILOperand,
    /// Folded argument expressions, in stack order
    pub arguments: Vec<ILExpression>,
    /// Type expected by the consumer of this expression
    pub expected_type: Option<TypeRc>,
    /// Type inferred for the value of this expression
    pub inferred_type: Option<TypeRc>,
    /// IL offset of the instruction, for diagnostics
    pub il_offset: Option<u32>,
}

impl ILExpression {
    /// Creates an expression without type annotations.
    pub fn new(code: ILCode, operand: ILOperand, arguments: Vec<ILExpression>) -> Self {
        Self {
            code,
            operand,
            arguments,
            expected_type: None,
            inferred_type: None,
            il_offset: None,
        }
    }

    /// Creates an expression without operand.
    pub fn op(code: ILCode, arguments: Vec<ILExpression>) -> Self {
        Self::new(code, ILOperand::None, arguments)
    }

    /// Sets the expected type.
    #[must_use]
    pub fn expecting(mut self, ty: &TypeRc) -> Self {
        self.expected_type = Some(ty.clone());
        self
    }

    /// Sets the inferred type.
    #[must_use]
    pub fn inferred(mut self, ty: &TypeRc) -> Self {
        self.inferred_type = Some(ty.clone());
        self
    }

    /// Sets the IL offset.
    #[must_use]
    pub fn at(mut self, offset: u32) -> Self {
        self.il_offset = Some(offset);
        self
    }

    /// `ldc.i4 value`
    pub fn ldc_i4(value: i32) -> Self {
        Self::new(ILCode::LdcI4, ILOperand::Int32(value), Vec::new())
    }

    /// `ldc.i8 value`
    pub fn ldc_i8(value: i64) -> Self {
        Self::new(ILCode::LdcI8, ILOperand::Int64(value), Vec::new())
    }

    /// `ldc.r8 value`
    pub fn ldc_r8(value: f64) -> Self {
        Self::new(ILCode::LdcR8, ILOperand::Float64(value), Vec::new())
    }

    /// `ldstr value`
    pub fn ldstr(value: &str) -> Self {
        Self::new(ILCode::Ldstr, ILOperand::String(value.to_string()), Vec::new())
    }

    /// `ldnull`
    pub fn ldnull() -> Self {
        Self::op(ILCode::Ldnull, Vec::new())
    }

    /// `ldloc variable`
    pub fn ldloc(variable: &ILVariableRc) -> Self {
        Self::new(ILCode::Ldloc, ILOperand::Variable(variable.clone()), Vec::new())
    }

    /// `ldloca variable`
    pub fn ldloca(variable: &ILVariableRc) -> Self {
        Self::new(ILCode::Ldloca, ILOperand::Variable(variable.clone()), Vec::new())
    }

    /// `stloc variable, value`
    pub fn stloc(variable: &ILVariableRc, value: ILExpression) -> Self {
        Self::new(ILCode::Stloc, ILOperand::Variable(variable.clone()), vec![value])
    }

    /// An instruction with a type operand.
    pub fn with_type(code: ILCode, ty: &TypeRc, arguments: Vec<ILExpression>) -> Self {
        Self::new(code, ILOperand::Type(ty.clone()), arguments)
    }

    /// An instruction with a field operand.
    pub fn with_field(code: ILCode, field: &FieldRc, arguments: Vec<ILExpression>) -> Self {
        Self::new(code, ILOperand::Field(field.clone()), arguments)
    }

    /// An instruction with a method operand.
    pub fn with_method(code: ILCode, method: &MethodRc, arguments: Vec<ILExpression>) -> Self {
        Self::new(code, ILOperand::Method(method.clone()), arguments)
    }

    /// The variable operand, if any.
    #[must_use]
    pub fn variable(&self) -> Option<&ILVariableRc> {
        match &self.operand {
            ILOperand::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The field operand, if any.
    #[must_use]
    pub fn field(&self) -> Option<&FieldRc> {
        match &self.operand {
            ILOperand::Field(f) => Some(f),
            _ => None,
        }
    }

    /// The method operand, if any.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRc> {
        match &self.operand {
            ILOperand::Method(m) => Some(m),
            _ => None,
        }
    }

    /// The type operand, if any.
    #[must_use]
    pub fn type_operand(&self) -> Option<&TypeRc> {
        match &self.operand {
            ILOperand::Type(t) => Some(t),
            _ => None,
        }
    }

    /// The label operand, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match &self.operand {
            ILOperand::Label(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for ILExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        match &self.operand {
            ILOperand::None => {}
            ILOperand::Int32(v) => write!(f, " {v}")?,
            ILOperand::Int64(v) => write!(f, " {v}L")?,
            ILOperand::Float32(v) => write!(f, " {v}f")?,
            ILOperand::Float64(v) => write!(f, " {v}")?,
            ILOperand::Decimal(v) => write!(f, " {v}m")?,
            ILOperand::String(v) => write!(f, " {v:?}")?,
            ILOperand::Variable(v) => write!(f, " {}", v.name)?,
            ILOperand::Field(v) => write!(f, " {}", v.name)?,
            ILOperand::Method(v) => write!(f, " {}", v.name)?,
            ILOperand::Type(v) => write!(f, " {v}")?,
            ILOperand::Label(v) => write!(f, " {v}")?,
        }
        if !self.arguments.is_empty() {
            write!(f, "(")?;
            for (index, argument) in self.arguments.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{argument}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A sequence of nodes.
#[derive(Debug, Clone, Default)]
pub struct ILBlock {
    /// Statements, in order
    pub body: Vec<ILNode>,
}

impl ILBlock {
    /// Creates a block.
    pub fn new(body: Vec<ILNode>) -> Self {
        Self { body }
    }
}

/// One `case` of a switch. A case without values is the default case.
#[derive(Debug, Clone)]
pub struct ILSwitchCase {
    /// Case values
    pub values: Vec<i64>,
    /// Case body
    pub body: ILBlock,
}

/// One typed `catch` clause.
#[derive(Debug, Clone)]
pub struct ILCatchBlock {
    /// Caught exception type
    pub exception_type: TypeRc,
    /// Variable receiving the exception, if used
    pub variable: Option<ILVariableRc>,
    /// Handler body
    pub body: ILBlock,
}

/// A statement node of the instruction tree.
#[derive(Debug, Clone)]
pub enum ILNode {
    /// An expression evaluated for its effect
    Expression(ILExpression),
    /// A jump target
    Label(String),
    /// A nested block
    Block(ILBlock),
    /// `if`/`else`
    Condition {
        /// Condition
        condition: ILExpression,
        /// Taken when true
        true_block: ILBlock,
        /// Taken when false
        false_block: Option<ILBlock>,
    },
    /// A loop; a missing condition loops until broken out of
    While {
        /// Loop condition
        condition: Option<ILExpression>,
        /// Loop body
        body: ILBlock,
    },
    /// A switch over an integer
    Switch {
        /// Switch value
        condition: ILExpression,
        /// Cases
        cases: Vec<ILSwitchCase>,
    },
    /// A protected region
    TryCatch {
        /// Protected block
        try_block: ILBlock,
        /// Typed handlers, in order
        catch_blocks: Vec<ILCatchBlock>,
        /// `finally` handler
        finally_block: Option<ILBlock>,
        /// `fault` handler
        fault_block: Option<ILBlock>,
    },
    /// A `fixed` statement pinning storage for the duration of its body
    Fixed {
        /// Pinned variables and the references they are initialized with
        initializers: Vec<(ILVariableRc, ILExpression)>,
        /// Body
        body: ILBlock,
    },
}

/// A decompiled method body, the unit of translation.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// The method being translated
    pub method: MethodRc,
    /// The `this` variable of instance methods
    pub this_variable: Option<ILVariableRc>,
    /// Declared parameters
    pub parameters: Vec<ILVariableRc>,
    /// Declared locals
    pub locals: Vec<ILVariableRc>,
    /// The body
    pub body: ILBlock,
}

impl MethodBody {
    /// Creates a body; `this` is synthesized for instance methods.
    pub fn new(method: &MethodRc, parameters: Vec<ILVariableRc>, body: ILBlock) -> Self {
        let this_variable = (!method.is_static()).then(|| {
            let declaring = &method.declaring_type;
            let ty = if declaring.is_value_type() {
                crate::typesystem::TypeDescriptor::by_ref(declaring)
            } else {
                declaring.clone()
            };
            ILVariable::new("this", &ty, ILVariableKind::This)
        });

        Self {
            method: method.clone(),
            this_variable,
            parameters,
            locals: Vec::new(),
            body,
        }
    }

    /// Sets the declared locals.
    #[must_use]
    pub fn with_locals(mut self, locals: Vec<ILVariableRc>) -> Self {
        self.locals = locals;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::TypeSystem;

    #[test]
    fn test_conversion_table() {
        assert_eq!(
            ILCode::ConvI2.conversion_target(),
            Some((PrimitiveKind::I2, false))
        );
        assert_eq!(
            ILCode::ConvOvfU1Un.conversion_target(),
            Some((PrimitiveKind::U1, true))
        );
        assert!(ILCode::ConvOvfU1Un.is_unsigned_source());
        assert!(!ILCode::ConvU1.is_unsigned_source());
        assert_eq!(ILCode::Add.conversion_target(), None);
    }

    #[test]
    fn test_display() {
        let types = TypeSystem::new();
        let x = ILVariable::new("x", &types.int32(), ILVariableKind::Local(0));
        let expr = ILExpression::stloc(
            &x,
            ILExpression::op(
                ILCode::Add,
                vec![ILExpression::ldloc(&x), ILExpression::ldc_i4(1)],
            ),
        );
        assert_eq!(expr.to_string(), "Stloc x(Add(Ldloc x, LdcI4 1))");
    }
}
