//! # dotscript Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotscript library. Import this module to get quick access to the essential
//! types for translating method bodies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotscript operations
pub use crate::Error;

/// The result type used throughout dotscript
pub use crate::Result;

/// Translation settings
pub use crate::TranslatorConfig;

/// Warnings and stub errors collected during a run
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Batch translation with the standard pass pipeline
pub use crate::driver::TranslationDriver;

/// Translation of single methods
pub use crate::translator::{MethodOutcome, MethodTranslator, TranslatedMethod};

// ================================================================================================
// Type System
// ================================================================================================

/// Type descriptors, the registry of well-known types and the compatibility oracle
pub use crate::typesystem::{
    ModuleScope, PrimitiveKind, TypeCategory, TypeDefinition, TypeDescriptor, TypeOracle, TypeRc,
    TypeSystem,
};

// ================================================================================================
// Metadata
// ================================================================================================

/// Member descriptors
pub use crate::metadata::{
    FieldDescriptor, FieldRc, MethodDescriptor, MethodFlags, MethodRc, ParameterDescriptor,
    PropertyDescriptor, PropertyRc,
};

/// Metadata directives
pub use crate::metadata::{MetadataOracle, MethodInfo, NullOracle, StaticOracle};

// ================================================================================================
// Instruction Tree
// ================================================================================================

/// Input of the translator
pub use crate::il::{
    ILBlock, ILCode, ILExpression, ILNode, ILOperand, ILVariable, ILVariableKind, ILVariableRc,
    MethodBody,
};

// ================================================================================================
// Syntax Tree
// ================================================================================================

/// Output of the translator
pub use crate::ast::{
    AstNode, BinaryOperator, Dispatch, Literal, NodeKind, UnaryOperator, Variable, VariableKind,
    VariableRc,
};

// ================================================================================================
// Rewrite Passes
// ================================================================================================

/// The pass framework
pub use crate::passes::{AstPass, PassContext, PassScheduler, Rewriter};
