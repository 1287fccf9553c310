//! The output syntax tree.
//!
//! A translated method body is a tree of [`AstNode`]s. Every node is one [`NodeKind`]
//! plus an ordered operand array, so traversal, structural equality and child
//! replacement are uniform across kinds.
//!
//! - [`Literal`] holds constant values.
//! - [`Variable`] is a method-scoped slot whose type may change once, when a packed
//!   array representation is stored into it.
//! - [`traverse`] provides lazy and eager child enumeration.

mod literal;
mod node;
pub mod traverse;
mod variable;

pub use literal::Literal;
pub use node::{
    AstNode, BinaryOperator, ConversionKind, Dispatch, NodeKind, OffsetUnit, UnaryOperator,
};
pub use variable::{Variable, VariableKind, VariableRc};
