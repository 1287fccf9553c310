//! Factories for the type system, member descriptors and method bodies used by unit tests.

use std::sync::Arc;

use crate::{
    config::TranslatorConfig,
    il::{ILBlock, ILExpression, ILNode, ILVariable, ILVariableKind, ILVariableRc, MethodBody},
    metadata::{MetadataOracle, MethodDescriptor, MethodFlags, MethodRc, NullOracle},
    translator::MethodTranslator,
    typesystem::{ModuleScope, TypeCategory, TypeDefinition, TypeRc, TypeSystem},
};

/// A fresh type system and a translator over it.
pub struct TestTypes {
    pub types: Arc<TypeSystem>,
    pub translator: MethodTranslator,
}

impl TestTypes {
    pub fn new() -> Self {
        let types = Arc::new(TypeSystem::new());
        let translator = MethodTranslator::with_oracle(
            types.clone(),
            Arc::new(NullOracle),
            TranslatorConfig::default(),
        );
        Self { types, translator }
    }

    /// A translator over the same types, consulting `oracle`.
    pub fn translator_with(&self, oracle: Arc<dyn MetadataOracle>) -> MethodTranslator {
        MethodTranslator::with_oracle(self.types.clone(), oracle, TranslatorConfig::default())
    }

    // Helper function to create the `App.Point` struct
    pub fn point(&self) -> TypeRc {
        let scope = ModuleScope::new("App");
        self.types.define(
            TypeDefinition::new("App", "Point", &scope, TypeCategory::ValueType),
            Some(&self.types.value_type()),
        )
    }

    // Helper function to create the `App.Widget` class
    pub fn widget(&self) -> TypeRc {
        let scope = ModuleScope::new("App");
        self.types.define(
            TypeDefinition::new("App", "Widget", &scope, TypeCategory::Class),
            Some(&self.types.object()),
        )
    }

    // Helper function to create a `System` exception class
    pub fn exception_subtype(&self, name: &str) -> TypeRc {
        self.types.define(
            TypeDefinition::new("System", name, self.types.core_scope(), TypeCategory::Class),
            Some(&self.types.exception()),
        )
    }
}

// Helper function to create an int local
pub fn int_local(t: &TestTypes, name: &str, slot: u16) -> ILVariableRc {
    ILVariable::new(name, &t.types.int32(), ILVariableKind::Local(slot))
}

// Helper function to create a static method of `App.Program`
pub fn static_method(t: &TestTypes, name: &str, return_type: &TypeRc) -> MethodRc {
    let scope = ModuleScope::new("App");
    let program = t.types.define(
        TypeDefinition::new("App", "Program", &scope, TypeCategory::Class),
        Some(&t.types.object()),
    );
    MethodDescriptor::new(name, &program, return_type)
        .with_flags(MethodFlags::STATIC)
        .into_rc()
}

// Helper function to create an instance method
pub fn instance_method(
    _t: &TestTypes,
    declaring: &TypeRc,
    name: &str,
    return_type: &TypeRc,
) -> MethodRc {
    MethodDescriptor::new(name, declaring, return_type).into_rc()
}

// Helper function to create a method body of expression statements
pub fn method_body(
    method: &MethodRc,
    locals: Vec<ILVariableRc>,
    expressions: Vec<ILExpression>,
) -> MethodBody {
    let statements = expressions.into_iter().map(ILNode::Expression).collect();
    MethodBody::new(method, Vec::new(), ILBlock::new(statements)).with_locals(locals)
}
