//! Registry of well-known and user supplied types.
//!
//! The translator needs a handful of core types by identity (the universal object type,
//! the primitives, `System.Nullable<T>`, the reflection handle types, the generic
//! collection interfaces arrays implement). [`TypeSystem`] creates these once and keeps
//! every other registered type in a lock-free map keyed by full name.
//!
//! # Thread Safety
//!
//! - Lock-free primary storage using `SkipMap`
//! - Concurrent secondary index by simple name using `DashMap`
//! - Registration is get-or-insert, so racing registrations of the same full name agree
//!   on a single descriptor

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use strum::IntoEnumIterator;

use crate::typesystem::{
    ModuleScope, PrimitiveKind, TypeCategory, TypeDefinition, TypeDescriptor, TypeFlags, TypeRc,
};

/// Full names of the single-parameter collection interfaces every array implements.
pub(crate) const ARRAY_INTERFACES: [&str; 5] = [
    "System.Collections.Generic.IEnumerable`1",
    "System.Collections.Generic.ICollection`1",
    "System.Collections.Generic.IList`1",
    "System.Collections.Generic.IReadOnlyCollection`1",
    "System.Collections.Generic.IReadOnlyList`1",
];

/// Central registry of types known to the translator.
///
/// Creating a `TypeSystem` populates the core module with the primitive value types and
/// the well-known reference types. Additional definitions are added with
/// [`TypeSystem::define`] or [`TypeSystem::register`].
pub struct TypeSystem {
    core: Arc<ModuleScope>,
    types: SkipMap<String, TypeRc>,
    types_by_name: DashMap<String, Vec<TypeRc>>,
    primitives: Vec<TypeRc>,
    object: TypeRc,
    value_type: TypeRc,
    enum_base: TypeRc,
    array_base: TypeRc,
    string: TypeRc,
    void: TypeRc,
    decimal: TypeRc,
    delegate: TypeRc,
    multicast_delegate: TypeRc,
    nullable: TypeRc,
    type_type: TypeRc,
    exception: TypeRc,
    runtime_type_handle: TypeRc,
    runtime_field_handle: TypeRc,
    runtime_method_handle: TypeRc,
    packed_array: TypeRc,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    /// Creates a registry with the core types of `mscorlib`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_core_module("mscorlib")
    }

    /// Creates a registry whose core types live in the named module.
    #[must_use]
    pub fn with_core_module(module: &str) -> Self {
        let core = ModuleScope::new(module);
        let types = SkipMap::new();
        let types_by_name = DashMap::new();

        let define = |def: TypeDefinition| -> TypeRc {
            let ty = TypeDescriptor::definition_rc(def);
            Self::insert_into(&types, &types_by_name, &ty)
        };
        let class = |name: &str| TypeDefinition::new("System", name, &core, TypeCategory::Class);
        let value = |name: &str| TypeDefinition::new("System", name, &core, TypeCategory::ValueType);

        let object = define(class("Object"));
        let value_type = define(class("ValueType").with_flags(TypeFlags::ABSTRACT));
        let enum_base = define(class("Enum").with_flags(TypeFlags::ABSTRACT));
        let array_base = define(class("Array").with_flags(TypeFlags::ABSTRACT));
        let string = define(class("String").with_flags(TypeFlags::SEALED));
        let void = define(value("Void"));
        let decimal = define(value("Decimal"));
        let delegate = define(class("Delegate").with_flags(TypeFlags::ABSTRACT));
        let multicast_delegate = define(class("MulticastDelegate").with_flags(TypeFlags::ABSTRACT));
        let nullable = define(value("Nullable`1").with_generic_parameters(["T"]));
        let type_type = define(class("Type").with_flags(TypeFlags::ABSTRACT));
        let exception = define(class("Exception"));
        let runtime_type_handle = define(value("RuntimeTypeHandle"));
        let runtime_field_handle = define(value("RuntimeFieldHandle"));
        let runtime_method_handle = define(value("RuntimeMethodHandle"));

        let primitives: Vec<TypeRc> = PrimitiveKind::iter()
            .map(|kind| define(value(kind.name()).with_primitive(kind)))
            .collect();

        let runtime = ModuleScope::new("Dotscript.Runtime");
        let packed_array = define(
            TypeDefinition::new("Dotscript.Runtime", "PackedArray`1", &runtime, TypeCategory::Class)
                .with_generic_parameters(["T"])
                .with_flags(TypeFlags::SEALED | TypeFlags::PACKED_ARRAY),
        );

        for ty in [&value_type, &array_base, &string, &delegate, &type_type, &exception] {
            Self::wire_base(ty, &object);
        }
        for ty in [&enum_base, &void, &decimal, &nullable] {
            Self::wire_base(ty, &value_type);
        }
        for ty in [&runtime_type_handle, &runtime_field_handle, &runtime_method_handle] {
            Self::wire_base(ty, &value_type);
        }
        for ty in &primitives {
            Self::wire_base(ty, &value_type);
        }
        Self::wire_base(&multicast_delegate, &delegate);
        Self::wire_base(&packed_array, &object);

        // IEnumerable`1 <- IReadOnlyCollection`1 <- IReadOnlyList`1,
        // IEnumerable`1 <- ICollection`1 <- IList`1
        let interface = |full: &str| {
            let (namespace, name) = full.rsplit_once('.').unwrap_or(("", full));
            TypeDefinition::new(namespace, name, &core, TypeCategory::Interface)
                .with_generic_parameters(["T"])
        };
        let generic_interfaces: Vec<TypeRc> = ARRAY_INTERFACES
            .iter()
            .map(|full| define(interface(full)))
            .collect();
        let parent_of = [None, Some(0), Some(1), Some(0), Some(3)];
        for (index, parent) in parent_of.iter().enumerate() {
            let Some(parent) = parent else {
                continue;
            };
            let child = &generic_interfaces[index];
            let argument = TypeDescriptor::type_parameter(child, 0);
            let inherited = TypeDescriptor::instance(&generic_interfaces[*parent], vec![argument]);
            if let Some(def) = child.definition() {
                def.add_interface(&inherited);
            }
        }

        Self {
            core,
            types,
            types_by_name,
            primitives,
            object,
            value_type,
            enum_base,
            array_base,
            string,
            void,
            decimal,
            delegate,
            multicast_delegate,
            nullable,
            type_type,
            exception,
            runtime_type_handle,
            runtime_field_handle,
            runtime_method_handle,
            packed_array,
        }
    }

    fn wire_base(ty: &TypeRc, base: &TypeRc) {
        if let Some(def) = ty.definition() {
            def.set_base(base);
        }
    }

    fn insert_into(
        types: &SkipMap<String, TypeRc>,
        types_by_name: &DashMap<String, Vec<TypeRc>>,
        ty: &TypeRc,
    ) -> TypeRc {
        let entry = types.get_or_insert(ty.full_name(), ty.clone());
        let stored = entry.value().clone();
        if Arc::ptr_eq(&stored, ty) {
            if let Some(def) = ty.definition() {
                types_by_name
                    .entry(def.name.clone())
                    .or_default()
                    .push(ty.clone());
            }
        }
        stored
    }

    /// The module scope the core types are declared in.
    #[must_use]
    pub fn core_scope(&self) -> &Arc<ModuleScope> {
        &self.core
    }

    /// Registers a type by full name.
    ///
    /// Returns the already registered descriptor if a type of the same full name exists.
    pub fn register(&self, ty: &TypeRc) -> TypeRc {
        Self::insert_into(&self.types, &self.types_by_name, ty)
    }

    /// Wraps and registers a definition, deriving it from `base` if given.
    pub fn define(&self, definition: TypeDefinition, base: Option<&TypeRc>) -> TypeRc {
        let ty = self.register(&TypeDescriptor::definition_rc(definition));
        if let Some(base) = base {
            Self::wire_base(&ty, base);
        }
        ty
    }

    /// Looks up a type by full name.
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<TypeRc> {
        self.types.get(full_name).map(|entry| entry.value().clone())
    }

    /// Looks up all types with the given simple name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Vec<TypeRc> {
        self.types_by_name
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The descriptor of a primitive value type.
    #[must_use]
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeRc {
        self.primitives[kind as usize].clone()
    }

    /// `System.Object`
    #[must_use]
    pub fn object(&self) -> TypeRc {
        self.object.clone()
    }

    /// `System.ValueType`
    #[must_use]
    pub fn value_type(&self) -> TypeRc {
        self.value_type.clone()
    }

    /// `System.Enum`
    #[must_use]
    pub fn enum_base(&self) -> TypeRc {
        self.enum_base.clone()
    }

    /// `System.Array`
    #[must_use]
    pub fn array_base(&self) -> TypeRc {
        self.array_base.clone()
    }

    /// `System.String`
    #[must_use]
    pub fn string(&self) -> TypeRc {
        self.string.clone()
    }

    /// `System.Void`
    #[must_use]
    pub fn void(&self) -> TypeRc {
        self.void.clone()
    }

    /// `System.Decimal`
    #[must_use]
    pub fn decimal(&self) -> TypeRc {
        self.decimal.clone()
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean(&self) -> TypeRc {
        self.primitive(PrimitiveKind::Boolean)
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32(&self) -> TypeRc {
        self.primitive(PrimitiveKind::I4)
    }

    /// `System.IntPtr`
    #[must_use]
    pub fn native_int(&self) -> TypeRc {
        self.primitive(PrimitiveKind::I)
    }

    /// `System.Delegate`
    #[must_use]
    pub fn delegate(&self) -> TypeRc {
        self.delegate.clone()
    }

    /// `System.MulticastDelegate`
    #[must_use]
    pub fn multicast_delegate(&self) -> TypeRc {
        self.multicast_delegate.clone()
    }

    /// `System.Type`
    #[must_use]
    pub fn type_type(&self) -> TypeRc {
        self.type_type.clone()
    }

    /// `System.Exception`
    #[must_use]
    pub fn exception(&self) -> TypeRc {
        self.exception.clone()
    }

    /// `System.RuntimeTypeHandle`
    #[must_use]
    pub fn runtime_type_handle(&self) -> TypeRc {
        self.runtime_type_handle.clone()
    }

    /// `System.RuntimeFieldHandle`
    #[must_use]
    pub fn runtime_field_handle(&self) -> TypeRc {
        self.runtime_field_handle.clone()
    }

    /// `System.RuntimeMethodHandle`
    #[must_use]
    pub fn runtime_method_handle(&self) -> TypeRc {
        self.runtime_method_handle.clone()
    }

    /// The generic `System.Nullable<T>` definition.
    #[must_use]
    pub fn nullable_definition(&self) -> TypeRc {
        self.nullable.clone()
    }

    /// `System.Nullable<T>` instantiated with `argument`.
    #[must_use]
    pub fn nullable_of(&self, argument: &TypeRc) -> TypeRc {
        TypeDescriptor::instance(&self.nullable, vec![argument.clone()])
    }

    /// `T[]` or a multi-dimensional array of `T`.
    #[must_use]
    pub fn array_of(&self, element: &TypeRc, rank: u32) -> TypeRc {
        TypeDescriptor::array(element, rank)
    }

    /// The packed-array representation of a single-dimension `T[]`.
    #[must_use]
    pub fn packed_array_of(&self, element: &TypeRc) -> TypeRc {
        TypeDescriptor::instance(&self.packed_array, vec![element.clone()])
    }

    /// The generic collection interface definitions that arrays implement.
    pub fn array_interfaces(&self) -> impl Iterator<Item = TypeRc> + '_ {
        ARRAY_INTERFACES.iter().filter_map(|name| self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_types_registered() {
        let types = TypeSystem::new();
        for kind in PrimitiveKind::iter() {
            let ty = types.primitive(kind);
            assert_eq!(ty.primitive(), Some(kind));
            assert!(ty.is_value_type());
            assert_eq!(
                types.get(&format!("System.{}", kind.name())).map(|t| t.full_name()),
                Some(ty.full_name())
            );
        }
        assert_eq!(types.object().full_name(), "System.Object");
        assert!(types.string().is_sealed());
        assert_eq!(types.array_interfaces().count(), 5);
    }

    #[test]
    fn test_register_is_get_or_insert() {
        let types = TypeSystem::new();
        let scope = ModuleScope::new("App");
        let first = types.define(
            TypeDefinition::new("App", "Widget", &scope, TypeCategory::Class),
            Some(&types.object()),
        );
        let second = types.define(
            TypeDefinition::new("App", "Widget", &scope, TypeCategory::Class),
            None,
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(types.get_by_name("Widget").len(), 1);
    }

    #[test]
    fn test_base_chain() {
        let types = TypeSystem::new();
        let int = types.int32();
        let base = int.definition().and_then(|d| d.base().cloned()).unwrap();
        assert_eq!(base.full_name(), "System.ValueType");
        let root = base.definition().and_then(|d| d.base().cloned()).unwrap();
        assert_eq!(root.full_name(), "System.Object");
    }

    #[test]
    fn test_nullable_of() {
        let types = TypeSystem::new();
        let nullable = types.nullable_of(&types.int32());
        assert!(nullable.is_nullable());
        assert!(nullable.is_value_type());
        assert_eq!(nullable.nullable_argument().unwrap().full_name(), "System.Int32");
    }
}
