use std::{fmt, sync::Arc};

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
    ast::{Literal, VariableRc},
    metadata::{FieldRc, MethodRc, PropertyRc},
    typesystem::{PrimitiveKind, TypeDescriptor, TypeRc, TypeSystem},
    Error, Result,
};

// ============================================================================
// Operators and tags
// ============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
pub enum UnaryOperator {
    /// `-x`
    Negate,
    /// `~x`
    BitwiseNot,
    /// `!x`
    LogicalNot,
    /// `++x`
    PreIncrement,
    /// `--x`
    PreDecrement,
    /// `x++`
    PostIncrement,
    /// `x--`
    PostDecrement,
}

impl UnaryOperator {
    /// Source form of the operator.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::BitwiseNot => "~",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::PreIncrement | UnaryOperator::PostIncrement => "++",
            UnaryOperator::PreDecrement | UnaryOperator::PostDecrement => "--",
        }
    }

    /// Returns true for the increment and decrement operators.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        matches!(
            self,
            UnaryOperator::PreIncrement
                | UnaryOperator::PreDecrement
                | UnaryOperator::PostIncrement
                | UnaryOperator::PostDecrement
        )
    }
}

/// Binary operators, including assignment and compound assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
#[allow(missing_docs)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitwiseAnd,
    BitwiseOr,
    Xor,
    Shl,
    Shr,
    ShrUnsigned,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    ShrUnsignedAssign,
}

impl BinaryOperator {
    /// Source form of the operator.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::BitwiseAnd => "&",
            BinaryOperator::BitwiseOr => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::ShrUnsigned => ">>>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::Assign => "=",
            BinaryOperator::AddAssign => "+=",
            BinaryOperator::SubAssign => "-=",
            BinaryOperator::MulAssign => "*=",
            BinaryOperator::DivAssign => "/=",
            BinaryOperator::RemAssign => "%=",
            BinaryOperator::AndAssign => "&=",
            BinaryOperator::OrAssign => "|=",
            BinaryOperator::XorAssign => "^=",
            BinaryOperator::ShlAssign => "<<=",
            BinaryOperator::ShrAssign => ">>=",
            BinaryOperator::ShrUnsignedAssign => ">>>=",
        }
    }

    /// Returns true for `=` and every compound assignment.
    #[must_use]
    pub const fn is_assignment(&self) -> bool {
        matches!(self, BinaryOperator::Assign) || self.compound_base().is_some()
    }

    /// The compound assignment form of an arithmetic operator.
    #[must_use]
    pub const fn to_compound(&self) -> Option<BinaryOperator> {
        Some(match self {
            BinaryOperator::Add => BinaryOperator::AddAssign,
            BinaryOperator::Sub => BinaryOperator::SubAssign,
            BinaryOperator::Mul => BinaryOperator::MulAssign,
            BinaryOperator::Div => BinaryOperator::DivAssign,
            BinaryOperator::Rem => BinaryOperator::RemAssign,
            BinaryOperator::BitwiseAnd => BinaryOperator::AndAssign,
            BinaryOperator::BitwiseOr => BinaryOperator::OrAssign,
            BinaryOperator::Xor => BinaryOperator::XorAssign,
            BinaryOperator::Shl => BinaryOperator::ShlAssign,
            BinaryOperator::Shr => BinaryOperator::ShrAssign,
            BinaryOperator::ShrUnsigned => BinaryOperator::ShrUnsignedAssign,
            _ => return None,
        })
    }

    /// The arithmetic operator underlying a compound assignment.
    #[must_use]
    pub const fn compound_base(&self) -> Option<BinaryOperator> {
        Some(match self {
            BinaryOperator::AddAssign => BinaryOperator::Add,
            BinaryOperator::SubAssign => BinaryOperator::Sub,
            BinaryOperator::MulAssign => BinaryOperator::Mul,
            BinaryOperator::DivAssign => BinaryOperator::Div,
            BinaryOperator::RemAssign => BinaryOperator::Rem,
            BinaryOperator::AndAssign => BinaryOperator::BitwiseAnd,
            BinaryOperator::OrAssign => BinaryOperator::BitwiseOr,
            BinaryOperator::XorAssign => BinaryOperator::Xor,
            BinaryOperator::ShlAssign => BinaryOperator::Shl,
            BinaryOperator::ShrAssign => BinaryOperator::Shr,
            BinaryOperator::ShrUnsignedAssign => BinaryOperator::ShrUnsigned,
            _ => return None,
        })
    }

}

/// How an invocation selects its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Dispatch {
    /// Static method
    Static,
    /// Direct call of a known instance method
    Instance,
    /// Virtual call through the receiver
    Virtual,
    /// Call through an interface slot
    Interface,
    /// Call of a base class implementation on `this`
    Base,
    /// Invocation of a delegate value
    Delegate,
}

/// Unit of a pointer offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OffsetUnit {
    /// Offset counted in bytes
    Bytes,
    /// Offset counted in elements of the pointee type
    Elements,
}

/// Concrete numeric representation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
pub enum ConversionKind {
    /// Narrow to fewer bits, dropping the high bits
    Truncate,
    /// Extend to more bits using the signedness of the source
    Widen,
    /// Same width, other signedness
    Reinterpret,
    /// Integer to floating point
    IntToFloat,
    /// Floating point to integer, truncating toward zero
    FloatToInt,
    /// Enum to its underlying integer
    EnumToInt,
    /// Integer to enum
    IntToEnum,
}

// ============================================================================
// Node kinds
// ============================================================================

/// The kind of an [`AstNode`], with the data that is not a child node.
///
/// Child nodes live in the operand array of the node. For kinds with fixed slots,
/// [`NodeKind::slot_names`] names them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum NodeKind {
    // Literals and identifiers
    /// A constant
    Literal(Literal),
    /// A variable
    Variable(VariableRc),
    /// A method used as a value
    MethodIdentifier(MethodRc),
    /// A field used as a value
    FieldIdentifier(FieldRc),
    /// A type used as a value or as the target of a static access
    TypeIdentifier(TypeRc),
    /// A property used as a value
    PropertyIdentifier(PropertyRc),

    // Operators
    /// `[operand]`
    Unary {
        /// Operator
        op: UnaryOperator,
        /// Result type
        result: TypeRc,
    },
    /// `[left, right]`
    Binary {
        /// Operator
        op: BinaryOperator,
        /// Result type
        result: TypeRc,
    },
    /// `[condition, true, false]`
    Ternary {
        /// Result type
        result: TypeRc,
    },

    // Invocations
    /// `[this | Null, arguments...]`
    Invocation {
        /// Target method
        method: MethodRc,
        /// Dispatch form
        dispatch: Dispatch,
        /// The receiver is passed explicitly rather than bound as `this`
        explicit_this: bool,
    },
    /// `[arguments...]`
    New {
        /// Constructor
        constructor: MethodRc,
        /// Constructed type
        ty: TypeRc,
    },
    /// `[arguments...]`, a call into the runtime support library
    IntrinsicCall {
        /// Intrinsic name
        name: &'static str,
        /// Result type
        result: TypeRc,
    },
    /// `[left, right]`, 32-bit multiplication without precision loss
    ExactMultiply {
        /// Signed or unsigned product
        signed: bool,
    },

    // Memory and references
    /// `[lvalue]`
    TakeReference,
    /// `[reference]`
    Dereference,
    /// `[invocation]`, dereference of a by-ref return value
    ResultDereference,
    /// `[target]`, reference to a field
    MemberReference {
        /// Field
        field: FieldRc,
    },
    /// `[array, indices...]`, reference to an array element
    ElementReference {
        /// Element type
        element: TypeRc,
    },
    /// `[reference]`, a reference passed as a by-ref argument
    PassByReference,
    /// `[reference, value]`
    WriteThrough,
    /// `[reference]`, pins storage and yields a pointer to it
    Pin,
    /// `[pointer variable]`
    Unpin,
    /// `[pointer, offset | Null]`
    PointerRead {
        /// Unit of the offset
        unit: OffsetUnit,
        /// Pointee type
        element: TypeRc,
    },
    /// `[pointer, offset | Null, value]`
    PointerWrite {
        /// Unit of the offset
        unit: OffsetUnit,
        /// Pointee type
        element: TypeRc,
    },
    /// `[pointer, byte delta]`
    PointerAdd {
        /// Pointer type
        ty: TypeRc,
    },
    /// `[left, right]`, byte distance between two pointers
    PointerDelta,
    /// `[pointer]`, byte offset of a pointer within its buffer
    PointerOffset,
    /// `[value]`, copy of a value type
    StructCopy,
    /// `[initial value]`, a heap cell holding a variable whose address is taken
    NewBoxedVariable {
        /// Type of the cell contents
        ty: TypeRc,
    },

    // Casts and conversions
    /// `[value]`, a cast yet to be lowered
    Cast {
        /// Target type
        ty: TypeRc,
        /// Overflow checked
        checked: bool,
    },
    /// `[value]`, a type change that keeps the runtime representation
    ChangeType {
        /// Target type
        ty: TypeRc,
    },
    /// `[value]`, a concrete numeric representation change
    Conversion {
        /// Conversion performed
        kind: ConversionKind,
        /// Target type
        ty: TypeRc,
        /// Overflow checked
        checked: bool,
    },
    /// `[value]`, `value is T`
    TypeTest {
        /// Tested type
        ty: TypeRc,
    },
    /// `[value]`, `value as T`
    AsCast {
        /// Target type
        ty: TypeRc,
    },
    /// `[value]`, `T` to `T?`
    NullableWrap {
        /// Nullable type
        ty: TypeRc,
    },
    /// `[value]`, `T?` to `T`
    NullableUnwrap {
        /// Underlying type
        ty: TypeRc,
    },

    // Member and element access
    /// `[target | TypeIdentifier]`
    FieldAccess {
        /// Field
        field: FieldRc,
    },
    /// `[target | TypeIdentifier, index arguments...]`
    PropertyAccess {
        /// Property
        property: PropertyRc,
    },
    /// `[array, indices...]`
    ElementAccess {
        /// Element type
        element: TypeRc,
    },

    // Control flow expressions
    /// Jump to a labeled block
    Goto {
        /// Target label
        label: Arc<str>,
    },
    /// `[value | Null]`
    Return,
    /// Leave the nearest loop or switch
    Break {
        /// Loop index, `None` when breaking out of a switch
        target: Option<usize>,
    },
    /// Continue the nearest loop
    Continue {
        /// Loop index
        target: Option<usize>,
    },
    /// `[exception]`
    Throw,
    /// Rethrow the exception being handled
    Rethrow,

    // Composite
    /// `[elements...]`
    ArrayLiteral {
        /// Element type
        element: TypeRc,
    },
    /// `[dimensions...]`
    NewArray {
        /// Element type
        element: TypeRc,
        /// Number of dimensions
        rank: u32,
    },
    /// `[values...]`, one value per key
    ObjectLiteral {
        /// Keys, in order
        keys: Vec<Arc<str>>,
    },
    /// `[values...]`, script text with `$name` placeholders, one value per name
    Verbatim {
        /// Script text
        text: Arc<str>,
        /// Placeholder names, in operand order
        names: Vec<Arc<str>>,
        /// Result type
        result: TypeRc,
    },
    /// `[expressions...]`, evaluates all, yields the last
    Comma,
    /// `[translated arguments...]`, stands in for an instruction that could not be translated
    Untranslatable {
        /// What was not translated
        description: Arc<str>,
    },
    /// Stands in for a call of an ignored member
    IgnoredMember {
        /// Member name
        name: Arc<str>,
        /// Result type
        result: TypeRc,
    },
    /// An empty slot
    Null,

    // Statements
    /// `[statements...]`
    Block {
        /// Label making the block a jump target
        label: Option<Arc<str>>,
    },
    /// `[expression]`
    ExpressionStatement,
    /// `[condition, then, else | Null]`
    If,
    /// `[value, cases...]`
    Switch,
    /// `[body]`
    SwitchCase {
        /// Case values
        values: Vec<i64>,
        /// Default case marker
        is_default: bool,
    },
    /// `[body, catch | Null, finally | Null, fault | Null]`
    Try {
        /// Variable receiving the caught exception
        catch_variable: Option<VariableRc>,
    },
    /// `[condition, body]`
    While {
        /// Loop index, targeted by `break` and `continue`
        index: usize,
    },
    /// `[declarations...]`, each a variable or an assignment to one
    VariableDeclaration,
}

impl NodeKind {
    /// Number of operands for fixed-slot kinds, `None` for variadic kinds.
    #[must_use]
    pub fn fixed_arity(&self) -> Option<usize> {
        Some(match self {
            NodeKind::Literal(_)
            | NodeKind::Variable(_)
            | NodeKind::MethodIdentifier(_)
            | NodeKind::FieldIdentifier(_)
            | NodeKind::TypeIdentifier(_)
            | NodeKind::PropertyIdentifier(_)
            | NodeKind::Goto { .. }
            | NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Rethrow
            | NodeKind::IgnoredMember { .. }
            | NodeKind::Null => 0,
            NodeKind::Unary { .. }
            | NodeKind::TakeReference
            | NodeKind::Dereference
            | NodeKind::ResultDereference
            | NodeKind::MemberReference { .. }
            | NodeKind::PassByReference
            | NodeKind::Pin
            | NodeKind::Unpin
            | NodeKind::PointerOffset
            | NodeKind::StructCopy
            | NodeKind::NewBoxedVariable { .. }
            | NodeKind::Cast { .. }
            | NodeKind::ChangeType { .. }
            | NodeKind::Conversion { .. }
            | NodeKind::TypeTest { .. }
            | NodeKind::AsCast { .. }
            | NodeKind::NullableWrap { .. }
            | NodeKind::NullableUnwrap { .. }
            | NodeKind::FieldAccess { .. }
            | NodeKind::Return
            | NodeKind::Throw
            | NodeKind::ExpressionStatement
            | NodeKind::SwitchCase { .. } => 1,
            NodeKind::Binary { .. }
            | NodeKind::ExactMultiply { .. }
            | NodeKind::WriteThrough
            | NodeKind::PointerRead { .. }
            | NodeKind::PointerAdd { .. }
            | NodeKind::PointerDelta
            | NodeKind::While { .. } => 2,
            NodeKind::Ternary { .. } | NodeKind::PointerWrite { .. } | NodeKind::If => 3,
            NodeKind::Try { .. } => 4,
            NodeKind::ObjectLiteral { keys } => keys.len(),
            NodeKind::Verbatim { names, .. } => names.len(),
            NodeKind::Invocation { .. }
            | NodeKind::New { .. }
            | NodeKind::IntrinsicCall { .. }
            | NodeKind::ElementReference { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::ElementAccess { .. }
            | NodeKind::ArrayLiteral { .. }
            | NodeKind::NewArray { .. }
            | NodeKind::Comma
            | NodeKind::Untranslatable { .. }
            | NodeKind::Block { .. }
            | NodeKind::Switch
            | NodeKind::VariableDeclaration => return None,
        })
    }

    /// Minimum number of operands for variadic kinds.
    #[must_use]
    pub fn min_arity(&self) -> usize {
        match self {
            NodeKind::Invocation { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::Switch
            | NodeKind::NewArray { .. } => 1,
            NodeKind::ElementReference { .. } | NodeKind::ElementAccess { .. } => 2,
            _ => self.fixed_arity().unwrap_or(0),
        }
    }

    /// Display names of the leading operand slots.
    #[must_use]
    pub fn slot_names(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Unary { .. } => &["operand"],
            NodeKind::Binary { .. }
            | NodeKind::ExactMultiply { .. }
            | NodeKind::PointerDelta => &["left", "right"],
            NodeKind::Ternary { .. } => &["condition", "true", "false"],
            NodeKind::Invocation { .. } => &["this"],
            NodeKind::WriteThrough => &["reference", "value"],
            NodeKind::PointerRead { .. } => &["pointer", "offset"],
            NodeKind::PointerWrite { .. } => &["pointer", "offset", "value"],
            NodeKind::PointerAdd { .. } => &["pointer", "delta"],
            NodeKind::FieldAccess { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::MemberReference { .. } => &["target"],
            NodeKind::ElementAccess { .. } | NodeKind::ElementReference { .. } => &["array"],
            NodeKind::If => &["condition", "then", "else"],
            NodeKind::While { .. } => &["condition", "body"],
            NodeKind::Try { .. } => &["body", "catch", "finally", "fault"],
            NodeKind::Switch => &["value"],
            NodeKind::Return => &["value"],
            NodeKind::Throw => &["exception"],
            NodeKind::Cast { .. }
            | NodeKind::ChangeType { .. }
            | NodeKind::Conversion { .. }
            | NodeKind::TypeTest { .. }
            | NodeKind::AsCast { .. }
            | NodeKind::NullableWrap { .. }
            | NodeKind::NullableUnwrap { .. }
            | NodeKind::StructCopy => &["value"],
            _ => &[],
        }
    }

    /// Returns true for the reference wrapper kinds that may not wrap themselves.
    #[must_use]
    pub fn is_reference_wrapper(&self) -> bool {
        matches!(
            self,
            NodeKind::TakeReference | NodeKind::PassByReference | NodeKind::MemberReference { .. }
        )
    }

    /// Returns true for statement kinds.
    #[must_use]
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Block { .. }
                | NodeKind::ExpressionStatement
                | NodeKind::If
                | NodeKind::Switch
                | NodeKind::SwitchCase { .. }
                | NodeKind::Try { .. }
                | NodeKind::While { .. }
                | NodeKind::VariableDeclaration
        )
    }

    /// Variant name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A node of the output syntax tree.
///
/// Every node is a [`NodeKind`] plus one ordered operand array. Generic algorithms
/// (traversal, replacement, equality, hashing) work on the operand array and need no
/// per-kind code; kind-specific accessors view fixed operand indices.
///
/// Children are owned, so a node can never contain itself. Reference wrappers
/// ([`NodeKind::TakeReference`], [`NodeKind::PassByReference`],
/// [`NodeKind::MemberReference`]) refuse to wrap a node of their own kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AstNode {
    kind: NodeKind,
    operands: Vec<AstNode>,
}

impl AstNode {
    /// Creates a node, validating operand count and the reference wrapper invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if the operand count does not fit the kind, or if a
    /// reference wrapper would directly wrap a node of its own kind.
    pub fn new(kind: NodeKind, operands: Vec<AstNode>) -> Result<Self> {
        let count = operands.len();
        match kind.fixed_arity() {
            Some(expected) if expected != count => {
                return Err(Error::InvalidNode(format!(
                    "{} takes {} operands, got {}",
                    kind.name(),
                    expected,
                    count
                )));
            }
            None if count < kind.min_arity() => {
                return Err(Error::InvalidNode(format!(
                    "{} takes at least {} operands, got {}",
                    kind.name(),
                    kind.min_arity(),
                    count
                )));
            }
            _ => {}
        }

        Self::check_wrapper(&kind, operands.first())?;
        Ok(Self { kind, operands })
    }

    /// Creates a node whose shape is correct by construction.
    pub(crate) fn build(kind: NodeKind, operands: Vec<AstNode>) -> Self {
        debug_assert!(kind.fixed_arity().map_or(true, |n| n == operands.len()));
        Self { kind, operands }
    }

    fn check_wrapper(kind: &NodeKind, child: Option<&AstNode>) -> Result<()> {
        if !kind.is_reference_wrapper() {
            return Ok(());
        }
        match child {
            Some(child)
                if std::mem::discriminant(&child.kind) == std::mem::discriminant(kind) =>
            {
                Err(Error::InvalidNode(format!(
                    "{} cannot directly wrap another {}",
                    kind.name(),
                    kind.name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Validates this node against its own invariants, not recursing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] on an operand count mismatch or a self-wrapping
    /// reference wrapper.
    pub fn validate(&self) -> Result<()> {
        if let Some(expected) = self.kind.fixed_arity() {
            if expected != self.operands.len() {
                return Err(Error::InvalidNode(format!(
                    "{} takes {} operands, got {}",
                    self.kind.name(),
                    expected,
                    self.operands.len()
                )));
            }
        }
        Self::check_wrapper(&self.kind, self.operands.first())
    }

    // ------------------------------------------------------------------------
    // Leaf constructors
    // ------------------------------------------------------------------------

    /// An empty slot.
    #[must_use]
    pub fn null() -> Self {
        Self::build(NodeKind::Null, Vec::new())
    }

    /// A literal.
    #[must_use]
    pub fn literal(literal: Literal) -> Self {
        Self::build(NodeKind::Literal(literal), Vec::new())
    }

    /// A boolean literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::literal(Literal::Boolean(value))
    }

    /// An integer literal of a primitive kind.
    #[must_use]
    pub fn integer(types: &TypeSystem, kind: PrimitiveKind, value: i64) -> Self {
        Self::literal(Literal::integer(types, kind, value))
    }

    /// A string literal.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self::literal(Literal::String(Arc::from(value)))
    }

    /// `null` of the given type.
    #[must_use]
    pub fn null_literal(ty: &TypeRc) -> Self {
        Self::literal(Literal::Null(ty.clone()))
    }

    /// `default(T)`.
    #[must_use]
    pub fn default_value(ty: &TypeRc) -> Self {
        Self::literal(Literal::Default(ty.clone()))
    }

    /// A variable.
    #[must_use]
    pub fn variable(variable: &VariableRc) -> Self {
        Self::build(NodeKind::Variable(variable.clone()), Vec::new())
    }

    /// A type used as a value or as the target of a static member access.
    #[must_use]
    pub fn type_identifier(ty: &TypeRc) -> Self {
        Self::build(NodeKind::TypeIdentifier(ty.clone()), Vec::new())
    }

    /// A method used as a value.
    #[must_use]
    pub fn method_identifier(method: &MethodRc) -> Self {
        Self::build(NodeKind::MethodIdentifier(method.clone()), Vec::new())
    }

    /// A placeholder for something that could not be translated.
    #[must_use]
    pub fn untranslatable(description: impl Into<String>, operands: Vec<AstNode>) -> Self {
        let description: String = description.into();
        Self::build(
            NodeKind::Untranslatable {
                description: Arc::from(description),
            },
            operands,
        )
    }

    // ------------------------------------------------------------------------
    // Expression constructors
    // ------------------------------------------------------------------------

    /// A unary operation.
    #[must_use]
    pub fn unary(op: UnaryOperator, operand: AstNode, result: &TypeRc) -> Self {
        Self::build(
            NodeKind::Unary {
                op,
                result: result.clone(),
            },
            vec![operand],
        )
    }

    /// `!operand`, removing a double negation instead of stacking one.
    #[must_use]
    pub fn logical_not(operand: AstNode, types: &TypeSystem) -> Self {
        if let NodeKind::Unary {
            op: UnaryOperator::LogicalNot,
            ..
        } = operand.kind
        {
            if let Some(inner) = operand.operands.into_iter().next() {
                return inner;
            }
            return Self::boolean(true);
        }
        Self::unary(UnaryOperator::LogicalNot, operand, &types.boolean())
    }

    /// A binary operation with an explicit result type.
    #[must_use]
    pub fn binary(op: BinaryOperator, left: AstNode, right: AstNode, result: &TypeRc) -> Self {
        Self::build(
            NodeKind::Binary {
                op,
                result: result.clone(),
            },
            vec![left, right],
        )
    }

    /// `target = value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLValue`] if `target` is not a storage location.
    pub fn assign(target: AstNode, value: AstNode, types: &TypeSystem) -> Result<Self> {
        Self::compound_assign(BinaryOperator::Assign, target, value, types)
    }

    /// `target op= value`, or a plain assignment for [`BinaryOperator::Assign`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLValue`] if `target` is not a storage location, and
    /// [`Error::CompoundAssignment`] if `op` is not an assignment operator.
    pub fn compound_assign(
        op: BinaryOperator,
        target: AstNode,
        value: AstNode,
        types: &TypeSystem,
    ) -> Result<Self> {
        if !op.is_assignment() {
            return Err(Error::CompoundAssignment(format!(
                "'{}' is not an assignment operator",
                op.symbol()
            )));
        }
        if !target.is_lvalue() {
            return Err(Error::InvalidLValue(target.to_string()));
        }
        let result = target.computed_type(types);
        Ok(Self::binary(op, target, value, &result))
    }

    /// `condition ? when_true : when_false`.
    #[must_use]
    pub fn ternary(
        condition: AstNode,
        when_true: AstNode,
        when_false: AstNode,
        result: &TypeRc,
    ) -> Self {
        Self::build(
            NodeKind::Ternary {
                result: result.clone(),
            },
            vec![condition, when_true, when_false],
        )
    }

    /// A comma sequence; a single expression is returned unchanged.
    #[must_use]
    pub fn comma(mut expressions: Vec<AstNode>) -> Self {
        if expressions.len() == 1 {
            if let Some(only) = expressions.pop() {
                return only;
            }
        }
        Self::build(NodeKind::Comma, expressions)
    }

    /// A cast yet to be lowered.
    #[must_use]
    pub fn cast(value: AstNode, ty: &TypeRc, checked: bool) -> Self {
        Self::build(
            NodeKind::Cast {
                ty: ty.clone(),
                checked,
            },
            vec![value],
        )
    }

    /// A representation-preserving type change.
    #[must_use]
    pub fn change_type(value: AstNode, ty: &TypeRc) -> Self {
        Self::build(NodeKind::ChangeType { ty: ty.clone() }, vec![value])
    }

    /// A numeric representation change.
    #[must_use]
    pub fn conversion(value: AstNode, kind: ConversionKind, ty: &TypeRc, checked: bool) -> Self {
        Self::build(
            NodeKind::Conversion {
                kind,
                ty: ty.clone(),
                checked,
            },
            vec![value],
        )
    }

    /// A call.
    #[must_use]
    pub fn invocation(
        method: &MethodRc,
        dispatch: Dispatch,
        explicit_this: bool,
        this: AstNode,
        arguments: Vec<AstNode>,
    ) -> Self {
        let mut operands = Vec::with_capacity(arguments.len() + 1);
        operands.push(this);
        operands.extend(arguments);
        Self::build(
            NodeKind::Invocation {
                method: method.clone(),
                dispatch,
                explicit_this,
            },
            operands,
        )
    }

    /// A call into the runtime support library.
    #[must_use]
    pub fn intrinsic(name: &'static str, result: &TypeRc, arguments: Vec<AstNode>) -> Self {
        Self::build(
            NodeKind::IntrinsicCall {
                name,
                result: result.clone(),
            },
            arguments,
        )
    }

    /// `target.field`; static fields take a type identifier as target.
    #[must_use]
    pub fn field_access(field: &FieldRc, target: AstNode) -> Self {
        Self::build(
            NodeKind::FieldAccess {
                field: field.clone(),
            },
            vec![target],
        )
    }

    /// `array[indices...]`.
    #[must_use]
    pub fn element_access(element: &TypeRc, array: AstNode, indices: Vec<AstNode>) -> Self {
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(array);
        operands.extend(indices);
        Self::build(
            NodeKind::ElementAccess {
                element: element.clone(),
            },
            operands,
        )
    }

    /// `target.Property[indices...]`.
    #[must_use]
    pub fn property_access(property: &PropertyRc, target: AstNode, indices: Vec<AstNode>) -> Self {
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(target);
        operands.extend(indices);
        Self::build(
            NodeKind::PropertyAccess {
                property: property.clone(),
            },
            operands,
        )
    }

    /// A reference to a storage location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] when wrapping another take-reference node.
    pub fn take_reference(lvalue: AstNode) -> Result<Self> {
        Self::new(NodeKind::TakeReference, vec![lvalue])
    }

    /// A reference passed as a by-ref argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] when wrapping another pass-by-reference node.
    pub fn pass_by_reference(reference: AstNode) -> Result<Self> {
        Self::new(NodeKind::PassByReference, vec![reference])
    }

    /// A reference to a field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] when wrapping another member reference node.
    pub fn member_reference(field: &FieldRc, target: AstNode) -> Result<Self> {
        Self::new(
            NodeKind::MemberReference {
                field: field.clone(),
            },
            vec![target],
        )
    }

    /// Reads through a managed reference.
    #[must_use]
    pub fn dereference(reference: AstNode) -> Self {
        Self::build(NodeKind::Dereference, vec![reference])
    }

    /// A copy of a value type.
    #[must_use]
    pub fn struct_copy(value: AstNode) -> Self {
        Self::build(NodeKind::StructCopy, vec![value])
    }

    // ------------------------------------------------------------------------
    // Statement constructors
    // ------------------------------------------------------------------------

    /// An unlabeled block.
    #[must_use]
    pub fn block(statements: Vec<AstNode>) -> Self {
        Self::build(NodeKind::Block { label: None }, statements)
    }

    /// A labeled block.
    #[must_use]
    pub fn labeled_block(label: &str, statements: Vec<AstNode>) -> Self {
        Self::build(
            NodeKind::Block {
                label: Some(Arc::from(label)),
            },
            statements,
        )
    }

    /// An expression evaluated for its effect.
    #[must_use]
    pub fn expression_statement(expression: AstNode) -> Self {
        Self::build(NodeKind::ExpressionStatement, vec![expression])
    }

    /// `return value`, or a bare return for an empty slot.
    #[must_use]
    pub fn return_value(value: AstNode) -> Self {
        Self::build(NodeKind::Return, vec![value])
    }

    /// `throw exception`.
    #[must_use]
    pub fn throw(exception: AstNode) -> Self {
        Self::build(NodeKind::Throw, vec![exception])
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The kind.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// All operands, in slot order.
    #[must_use]
    pub fn operands(&self) -> &[AstNode] {
        &self.operands
    }

    /// Mutable operands. Callers re-validate with [`AstNode::validate`].
    pub(crate) fn operands_mut(&mut self) -> &mut Vec<AstNode> {
        &mut self.operands
    }

    /// The operand at `index`.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<&AstNode> {
        self.operands.get(index)
    }

    /// Splits the node into kind and operands.
    #[must_use]
    pub fn into_parts(self) -> (NodeKind, Vec<AstNode>) {
        (self.kind, self.operands)
    }

    /// Consumes the node, returning its operands.
    #[must_use]
    pub fn into_operands(self) -> Vec<AstNode> {
        self.operands
    }

    /// First operand of binary-shaped nodes.
    #[must_use]
    pub fn left(&self) -> Option<&AstNode> {
        self.operands.first()
    }

    /// Second operand of binary-shaped nodes.
    #[must_use]
    pub fn right(&self) -> Option<&AstNode> {
        self.operands.get(1)
    }

    /// Arguments of invocations, excluding the receiver slot.
    #[must_use]
    pub fn arguments(&self) -> &[AstNode] {
        match self.kind {
            NodeKind::Invocation { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::ElementAccess { .. }
            | NodeKind::ElementReference { .. } => self.operands.get(1..).unwrap_or(&[]),
            _ => &self.operands,
        }
    }

    /// The variable of a variable node.
    #[must_use]
    pub fn as_variable(&self) -> Option<&VariableRc> {
        match &self.kind {
            NodeKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The literal of a literal node.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            NodeKind::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// Returns true for empty slots.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Null)
    }

    /// Returns true for `null` literals.
    #[must_use]
    pub fn is_null_literal(&self) -> bool {
        self.as_literal().is_some_and(Literal::is_null)
    }

    // ------------------------------------------------------------------------
    // Derived properties
    // ------------------------------------------------------------------------

    /// The static type of the value this node produces.
    pub fn computed_type(&self, types: &TypeSystem) -> TypeRc {
        let child = |index: usize| {
            self.operands
                .get(index)
                .map_or_else(|| types.void(), |n| n.computed_type(types))
        };
        let referent = |ty: TypeRc| ty.element_type().unwrap_or(ty);

        match &self.kind {
            NodeKind::Literal(literal) => literal.ty(types),
            NodeKind::Variable(variable) => variable.ty(),
            NodeKind::MethodIdentifier(_) => types.native_int(),
            NodeKind::FieldIdentifier(field) => field.field_type.clone(),
            NodeKind::TypeIdentifier(_) => types.type_type(),
            NodeKind::PropertyIdentifier(property) => property.property_type.clone(),
            NodeKind::Unary { result, .. }
            | NodeKind::Binary { result, .. }
            | NodeKind::Ternary { result }
            | NodeKind::IntrinsicCall { result, .. }
            | NodeKind::Verbatim { result, .. }
            | NodeKind::IgnoredMember { result, .. } => result.clone(),
            NodeKind::Invocation { method, .. } => method.return_type.clone(),
            NodeKind::New { ty, .. } => ty.clone(),
            NodeKind::ExactMultiply { signed: true } => types.primitive(PrimitiveKind::I4),
            NodeKind::ExactMultiply { signed: false } => types.primitive(PrimitiveKind::U4),
            NodeKind::TakeReference => TypeDescriptor::by_ref(&child(0)),
            NodeKind::MemberReference { field } => TypeDescriptor::by_ref(&field.field_type),
            NodeKind::ElementReference { element } => TypeDescriptor::by_ref(element),
            NodeKind::NewBoxedVariable { ty } => TypeDescriptor::by_ref(ty),
            NodeKind::Dereference | NodeKind::ResultDereference => referent(child(0)),
            NodeKind::PassByReference | NodeKind::StructCopy => child(0),
            NodeKind::WriteThrough => child(1),
            NodeKind::Pin => TypeDescriptor::pointer(&referent(child(0))),
            NodeKind::PointerRead { element, .. } => element.clone(),
            NodeKind::PointerAdd { ty } => ty.clone(),
            NodeKind::PointerDelta | NodeKind::PointerOffset => types.native_int(),
            NodeKind::Cast { ty, .. }
            | NodeKind::ChangeType { ty }
            | NodeKind::Conversion { ty, .. }
            | NodeKind::AsCast { ty }
            | NodeKind::NullableWrap { ty }
            | NodeKind::NullableUnwrap { ty } => ty.clone(),
            NodeKind::TypeTest { .. } => types.boolean(),
            NodeKind::FieldAccess { field } => field.field_type.clone(),
            NodeKind::PropertyAccess { property } => property.property_type.clone(),
            NodeKind::ElementAccess { element } => element.clone(),
            NodeKind::ArrayLiteral { element } => TypeDescriptor::array(element, 1),
            NodeKind::NewArray { element, rank } => TypeDescriptor::array(element, *rank),
            NodeKind::ObjectLiteral { .. } => types.object(),
            NodeKind::Comma => self
                .operands
                .last()
                .map_or_else(|| types.void(), |n| n.computed_type(types)),
            NodeKind::Unpin
            | NodeKind::PointerWrite { .. }
            | NodeKind::Goto { .. }
            | NodeKind::Return
            | NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Throw
            | NodeKind::Rethrow
            | NodeKind::Untranslatable { .. }
            | NodeKind::Null
            | NodeKind::Block { .. }
            | NodeKind::ExpressionStatement
            | NodeKind::If
            | NodeKind::Switch
            | NodeKind::SwitchCase { .. }
            | NodeKind::Try { .. }
            | NodeKind::While { .. }
            | NodeKind::VariableDeclaration => types.void(),
        }
    }

    /// Returns true if the node always evaluates to the same value without side effects.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            NodeKind::Literal(_) | NodeKind::TypeIdentifier(_) | NodeKind::MethodIdentifier(_) => {
                true
            }
            NodeKind::Unary { op, .. } => {
                !op.is_mutating() && self.operands.iter().all(AstNode::is_constant)
            }
            NodeKind::Binary { op, .. } => {
                !op.is_assignment() && self.operands.iter().all(AstNode::is_constant)
            }
            NodeKind::Ternary { .. }
            | NodeKind::ExactMultiply { .. }
            | NodeKind::Cast { .. }
            | NodeKind::ChangeType { .. }
            | NodeKind::Conversion { .. }
            | NodeKind::NullableWrap { .. } => self.operands.iter().all(AstNode::is_constant),
            _ => false,
        }
    }

    /// Returns true if evaluating the node may read or write state outside the method.
    #[must_use]
    pub fn has_global_dependency(&self) -> bool {
        let direct = match &self.kind {
            NodeKind::FieldAccess { field } | NodeKind::MemberReference { field } => field.is_static,
            NodeKind::Invocation { .. }
            | NodeKind::New { .. }
            | NodeKind::IntrinsicCall { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::Verbatim { .. } => true,
            _ => false,
        };
        direct || self.operands.iter().any(AstNode::has_global_dependency)
    }

    /// Returns true if evaluating the node twice could differ from evaluating it once.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        let direct = match &self.kind {
            NodeKind::Unary { op, .. } => op.is_mutating(),
            NodeKind::Binary { op, .. } => op.is_assignment(),
            NodeKind::Invocation { .. }
            | NodeKind::New { .. }
            | NodeKind::IntrinsicCall { .. }
            | NodeKind::PropertyAccess { .. }
            | NodeKind::Verbatim { .. }
            | NodeKind::WriteThrough
            | NodeKind::PointerWrite { .. }
            | NodeKind::Pin
            | NodeKind::Unpin
            | NodeKind::NewBoxedVariable { .. }
            | NodeKind::NewArray { .. }
            | NodeKind::Throw
            | NodeKind::Rethrow
            | NodeKind::Untranslatable { .. } => true,
            _ => false,
        };
        direct || self.operands.iter().any(AstNode::has_side_effects)
    }

    /// Returns true if the node names a storage location that can be assigned.
    #[must_use]
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            NodeKind::Variable(_)
            | NodeKind::FieldAccess { .. }
            | NodeKind::ElementAccess { .. }
            | NodeKind::Dereference
            | NodeKind::ResultDereference => true,
            NodeKind::PropertyAccess { property } => property.setter.is_some(),
            _ => false,
        }
    }

    /// Returns true if the node yields a genuine reference rather than a value.
    #[must_use]
    pub fn is_reference(&self, types: &TypeSystem) -> bool {
        match &self.kind {
            NodeKind::TakeReference
            | NodeKind::MemberReference { .. }
            | NodeKind::ElementReference { .. }
            | NodeKind::PassByReference
            | NodeKind::NewBoxedVariable { .. } => true,
            _ => self.computed_type(types).is_by_ref(),
        }
    }

    // ------------------------------------------------------------------------
    // Replacement
    // ------------------------------------------------------------------------

    /// Replaces every direct child structurally equal to `old` with a copy of `new`.
    ///
    /// Returns the number of replaced children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if the replacement would make a reference wrapper
    /// wrap a node of its own kind. The node is left unchanged in that case.
    pub fn replace_child(&mut self, old: &AstNode, new: &AstNode) -> Result<usize> {
        if self
            .operands
            .first()
            .is_some_and(|first| first == old)
        {
            Self::check_wrapper(&self.kind, Some(new))?;
        }

        let mut replaced = 0;
        for operand in &mut self.operands {
            if operand == old {
                *operand = new.clone();
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(literal) => return write!(f, "{literal}"),
            NodeKind::Variable(variable) => return write!(f, "{variable}"),
            NodeKind::MethodIdentifier(method) => return write!(f, "{}", method.name),
            NodeKind::FieldIdentifier(field) => return write!(f, "{}", field.name),
            NodeKind::TypeIdentifier(ty) => return write!(f, "{ty}"),
            NodeKind::PropertyIdentifier(property) => return write!(f, "{}", property.name),
            NodeKind::Null => return write!(f, "_"),
            NodeKind::Unary { op, .. } => write!(f, "Unary[{}]", op.symbol())?,
            NodeKind::Binary { op, .. } => write!(f, "Binary[{}]", op.symbol())?,
            NodeKind::Invocation {
                method, dispatch, ..
            } => write!(f, "Invocation[{dispatch} {}]", method.name)?,
            NodeKind::IntrinsicCall { name, .. } => write!(f, "IntrinsicCall[{name}]")?,
            NodeKind::Cast { ty, .. }
            | NodeKind::ChangeType { ty }
            | NodeKind::TypeTest { ty }
            | NodeKind::AsCast { ty }
            | NodeKind::NullableWrap { ty }
            | NodeKind::NullableUnwrap { ty } => write!(f, "{}[{ty}]", self.kind.name())?,
            NodeKind::Conversion { kind, ty, .. } => write!(f, "Conversion[{kind} {ty}]")?,
            NodeKind::FieldAccess { field } | NodeKind::MemberReference { field } => {
                write!(f, "{}[{}]", self.kind.name(), field.name)?;
            }
            NodeKind::PropertyAccess { property } => write!(f, "PropertyAccess[{}]", property.name)?,
            NodeKind::Goto { label } => return write!(f, "Goto[{label}]"),
            NodeKind::Block { label: Some(label) } => write!(f, "Block[{label}]")?,
            kind => write!(f, "{}", kind.name())?,
        }

        write!(f, "(")?;
        let names = self.kind.slot_names();
        for (index, operand) in self.operands.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            if let Some(name) = names.get(index) {
                write!(f, "{name}: ")?;
            }
            operand.fmt_node(f)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Variable, VariableKind};

    fn local(types: &TypeSystem, name: &str) -> VariableRc {
        Variable::new(0, name, VariableKind::Local, &types.int32())
    }

    #[test]
    fn test_reference_wrappers_do_not_nest() {
        let types = TypeSystem::new();
        let x = AstNode::variable(&local(&types, "x"));
        let reference = AstNode::take_reference(x.clone()).unwrap();
        assert!(matches!(
            AstNode::take_reference(reference.clone()),
            Err(Error::InvalidNode(_))
        ));
        // Different wrapper kinds may nest.
        assert!(AstNode::pass_by_reference(reference).is_ok());
    }

    #[test]
    fn test_replace_child_keeps_wrapper_invariant() {
        let types = TypeSystem::new();
        let x = AstNode::variable(&local(&types, "x"));
        let mut reference = AstNode::take_reference(x.clone()).unwrap();
        let nested = AstNode::take_reference(x.clone()).unwrap();
        assert!(reference.replace_child(&x, &nested).is_err());
        assert_eq!(reference.operands()[0], x);

        let y = AstNode::variable(&local(&types, "y"));
        assert_eq!(reference.replace_child(&x, &y).unwrap(), 1);
        assert_eq!(reference.operands()[0], y);
    }

    #[test]
    fn test_arity_is_checked() {
        assert!(AstNode::new(NodeKind::Return, Vec::new()).is_err());
        assert!(AstNode::new(NodeKind::Return, vec![AstNode::null()]).is_ok());
        assert!(AstNode::new(NodeKind::Comma, Vec::new()).is_ok());
    }

    #[test]
    fn test_assign_requires_lvalue() {
        let types = TypeSystem::new();
        let literal = AstNode::integer(&types, PrimitiveKind::I4, 1);
        assert!(matches!(
            AstNode::assign(literal.clone(), literal.clone(), &types),
            Err(Error::InvalidLValue(_))
        ));
        let x = AstNode::variable(&local(&types, "x"));
        let assignment = AstNode::assign(x, literal, &types).unwrap();
        assert_eq!(
            assignment.computed_type(&types).full_name(),
            "System.Int32"
        );
    }

    #[test]
    fn test_structural_equality() {
        let types = TypeSystem::new();
        let x = local(&types, "x");
        let a = AstNode::binary(
            BinaryOperator::Add,
            AstNode::variable(&x),
            AstNode::integer(&types, PrimitiveKind::I4, 1),
            &types.int32(),
        );
        let b = AstNode::binary(
            BinaryOperator::Add,
            AstNode::variable(&x),
            AstNode::integer(&types, PrimitiveKind::I4, 1),
            &types.int32(),
        );
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Binary[+](left: x, right: 1:System.Int32)");
    }

    #[test]
    fn test_properties() {
        let types = TypeSystem::new();
        let one = AstNode::integer(&types, PrimitiveKind::I4, 1);
        let sum = AstNode::binary(BinaryOperator::Add, one.clone(), one.clone(), &types.int32());
        assert!(sum.is_constant());
        assert!(!sum.has_global_dependency());
        assert!(!sum.is_lvalue());

        let x = AstNode::variable(&local(&types, "x"));
        assert!(x.is_lvalue());
        assert!(!x.is_constant());
        let reference = AstNode::take_reference(x).unwrap();
        assert!(reference.computed_type(&types).is_by_ref());
        assert!(reference.is_reference(&types));
    }

    #[test]
    fn test_side_effects_are_found_in_operands() {
        let types = TypeSystem::new();
        let int = types.int32();
        let x = AstNode::variable(&local(&types, "x"));
        let one = AstNode::integer(&types, PrimitiveKind::I4, 1);
        let sum = AstNode::binary(BinaryOperator::Add, x.clone(), one, &int);
        assert!(!sum.has_side_effects());

        let bump = AstNode::unary(UnaryOperator::PostIncrement, x.clone(), &int);
        let mixed = AstNode::binary(BinaryOperator::Mul, x, bump, &int);
        assert!(mixed.has_side_effects());
        assert!(!mixed.has_global_dependency());
    }

    #[test]
    fn test_double_negation_cancels() {
        let types = TypeSystem::new();
        let flag = Variable::new(0, "flag", VariableKind::Local, &types.boolean());
        let not = AstNode::logical_not(AstNode::variable(&flag), &types);
        let back = AstNode::logical_not(not, &types);
        assert_eq!(back, AstNode::variable(&flag));
    }

    #[test]
    fn test_compound_operator_tables() {
        use strum::IntoEnumIterator;
        for op in BinaryOperator::iter() {
            if let Some(compound) = op.to_compound() {
                assert_eq!(compound.compound_base(), Some(op));
                assert!(compound.is_assignment());
            }
        }
        assert!(BinaryOperator::Assign.is_assignment());
        assert!(!BinaryOperator::Add.is_assignment());
    }
}
