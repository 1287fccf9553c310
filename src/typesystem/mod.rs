//! Type descriptors and the type compatibility oracle.
//!
//! Every expression produced by the translator carries a [`TypeRc`], a shared handle to
//! an immutable [`TypeDescriptor`]. Descriptors are supplied by the caller (usually
//! produced from assembly metadata) and are never mutated by the translator, except for
//! the one-time wiring of base types and interfaces performed while a type graph is built.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ TypeDescriptor │ ◄── │    TypeSystem    │ ◄── │    TypeOracle    │
//! │  (shape only)  │     │ (well-known +    │     │ (equal /         │
//! │                │     │  registry)       │     │  assignable memo)│
//! └────────────────┘     └──────────────────┘     └──────────────────┘
//! ```
//!
//! - [`TypeDescriptor`] describes the shape of a type: a named definition, or one of the
//!   wrapper kinds (array, by-ref, pointer, modifier, pinned), a generic instance, a
//!   generic parameter or a function pointer.
//! - [`TypeSystem`] owns the well-known core types and a lock-free registry by full name.
//! - [`TypeOracle`] answers structural equality and assignability, and memoizes the latter.
//! - [`PrimitiveKind`] is the fixed numeric classification table.
//!
//! # Cycles
//!
//! A generic parameter refers back to the type or method declaring it, and a generic base
//! type may mention the parameters of the type deriving from it. Owner links are therefore
//! weak ([`TypeRef`]) and base types are set once after construction.

mod oracle;
mod primitives;
mod registry;

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock, Weak},
};

use bitflags::bitflags;

pub use oracle::TypeOracle;
pub use primitives::PrimitiveKind;
pub use registry::TypeSystem;

/// A reference counted pointer to a [`TypeDescriptor`]
pub type TypeRc = Arc<TypeDescriptor>;

/// Non-owning reference to a [`TypeDescriptor`], used for back links such as the owner of a
/// generic parameter.
#[derive(Clone, Debug)]
pub struct TypeRef {
    weak_ref: Weak<TypeDescriptor>,
}

impl TypeRef {
    /// Create a new `TypeRef` from a strong reference
    pub fn new(strong_ref: &TypeRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<TypeRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced type is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }
}

impl From<&TypeRc> for TypeRef {
    fn from(strong_ref: &TypeRc) -> Self {
        Self::new(strong_ref)
    }
}

/// The module a type is declared in.
///
/// Different reference objects (an assembly reference, a module reference, the defining
/// module itself) may all resolve to the same physical module. Comparison goes through
/// [`ModuleScope::normalized`], never through the reference name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleScope {
    /// The name used by the reference that resolved to this module
    pub reference: String,
    /// The file name of the physical module
    pub module: String,
}

impl ModuleScope {
    /// Creates a scope whose reference name and physical module name are the same.
    pub fn new(module: impl Into<String>) -> Arc<Self> {
        let module = module.into();
        Arc::new(Self {
            reference: module.clone(),
            module,
        })
    }

    /// Creates a scope reached through a differently named reference.
    pub fn via(reference: impl Into<String>, module: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reference: reference.into(),
            module: module.into(),
        })
    }

    /// The physical module name, case folded and without its file extension.
    #[must_use]
    pub fn normalized(&self) -> String {
        let lower = self.module.to_ascii_lowercase();
        match lower.strip_suffix(".dll").or_else(|| lower.strip_suffix(".exe")) {
            Some(stem) => stem.to_string(),
            None => lower,
        }
    }

    /// Returns true if both scopes resolve to the same physical module.
    #[must_use]
    pub fn same_module(&self, other: &ModuleScope) -> bool {
        self.normalized() == other.normalized()
    }
}

/// Broad category of a named type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// A reference type
    Class,
    /// A value type with copy semantics
    ValueType,
    /// An interface
    Interface,
    /// An enumeration with the given underlying integer kind
    Enum(PrimitiveKind),
    /// A delegate type
    Delegate,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
    #[allow(missing_docs)]
    /// Attributes of a named type definition that matter to translation
    pub struct TypeFlags: u32 {
        #[allow(missing_docs)]
        const SEALED = 0x0001;
        #[allow(missing_docs)]
        const ABSTRACT = 0x0002;
        /// Enum whose values combine as bit flags
        const FLAGS_ENUM = 0x0004;
        /// Array representation backed by a typed element buffer
        const PACKED_ARRAY = 0x0008;
    }
}

/// A named type: class, struct, interface, enum or delegate.
pub struct TypeDefinition {
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Simple name, including the generic arity suffix (`` List`1 ``)
    pub name: String,
    /// Module declaring the type
    pub scope: Arc<ModuleScope>,
    /// Enclosing type for nested types
    pub declaring_type: Option<TypeRc>,
    /// Broad category
    pub category: TypeCategory,
    /// Attributes relevant to translation
    pub flags: TypeFlags,
    /// Names of the generic parameters, in declaration order
    pub generic_parameters: Vec<String>,
    /// Named constants of an enumeration, in declaration order
    pub enum_values: Vec<(String, i64)>,
    /// Set for the primitive value types of the core module
    pub primitive: Option<PrimitiveKind>,
    base: OnceLock<TypeRc>,
    interfaces: boxcar::Vec<TypeRc>,
}

impl TypeDefinition {
    /// Creates a new top-level definition with no base type.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        scope: &Arc<ModuleScope>,
        category: TypeCategory,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            scope: scope.clone(),
            declaring_type: None,
            category,
            flags: TypeFlags::empty(),
            generic_parameters: Vec::new(),
            enum_values: Vec::new(),
            primitive: None,
            base: OnceLock::new(),
            interfaces: boxcar::Vec::new(),
        }
    }

    /// Sets the enclosing type.
    #[must_use]
    pub fn with_declaring_type(mut self, declaring: &TypeRc) -> Self {
        self.declaring_type = Some(declaring.clone());
        self
    }

    /// Sets the generic parameter names.
    #[must_use]
    pub fn with_generic_parameters<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the attribute flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the named constants of an enumeration.
    #[must_use]
    pub fn with_enum_values<S: Into<String>>(
        mut self,
        values: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        self.enum_values = values.into_iter().map(|(n, v)| (n.into(), v)).collect();
        self
    }

    /// Marks the definition as one of the core primitive types.
    #[must_use]
    pub fn with_primitive(mut self, kind: PrimitiveKind) -> Self {
        self.primitive = Some(kind);
        self
    }

    /// The base type, if one was set.
    pub fn base(&self) -> Option<&TypeRc> {
        self.base.get()
    }

    /// Sets the base type. Returns false if a base was already set.
    pub fn set_base(&self, base: &TypeRc) -> bool {
        self.base.set(base.clone()).is_ok()
    }

    /// Adds an implemented interface.
    pub fn add_interface(&self, interface: &TypeRc) {
        self.interfaces.push(interface.clone());
    }

    /// The implemented interfaces, in the order they were added.
    pub fn interfaces(&self) -> impl Iterator<Item = &TypeRc> {
        self.interfaces.iter().map(|(_, t)| t)
    }

    /// Full name, using `/` as nested type separator.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }
}

/// The entity that declares a generic parameter.
#[derive(Clone, Debug)]
pub enum GenericOwner {
    /// A generic type definition
    Type(TypeRef),
    /// A generic method
    Method {
        /// Type declaring the method
        declaring_type: TypeRef,
        /// Method name
        name: String,
        /// Generic parameter names of the method, in declaration order
        parameters: Arc<[String]>,
    },
}

impl GenericOwner {
    /// The owning type, or the type declaring the owning method.
    #[must_use]
    pub fn owner_type(&self) -> Option<TypeRc> {
        match self {
            GenericOwner::Type(t) => t.upgrade(),
            GenericOwner::Method { declaring_type, .. } => declaring_type.upgrade(),
        }
    }

    /// Returns true for method-level parameters.
    #[must_use]
    pub fn is_method(&self) -> bool {
        matches!(self, GenericOwner::Method { .. })
    }

    fn parameter_name(&self, position: u32) -> Option<String> {
        let index = position as usize;
        match self {
            GenericOwner::Type(t) => t.upgrade().and_then(|owner| {
                owner
                    .definition()
                    .and_then(|def| def.generic_parameters.get(index).cloned())
            }),
            GenericOwner::Method { parameters, .. } => parameters.get(index).cloned(),
        }
    }
}

/// A generic parameter, either named (`T`) or positional (`!0`, `!!0`).
#[derive(Clone, Debug)]
pub struct GenericParameter {
    /// Zero based position in the owner's parameter list
    pub position: u32,
    /// Parameter name, `None` for the positional form
    pub name: Option<String>,
    /// Declaring type or method
    pub owner: GenericOwner,
}

impl GenericParameter {
    /// Expands the positional form to the named form by looking the name up on the owner.
    ///
    /// Named parameters are returned unchanged. A positional parameter whose owner has no
    /// parameter at that position stays positional.
    #[must_use]
    pub fn expand(&self) -> GenericParameter {
        if self.name.is_some() {
            return self.clone();
        }

        GenericParameter {
            position: self.position,
            name: self.owner.parameter_name(self.position),
            owner: self.owner.clone(),
        }
    }

    fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None if self.owner.is_method() => format!("!!{}", self.position),
            None => format!("!{}", self.position),
        }
    }
}

/// Shape of a type.
pub enum TypeDescriptor {
    /// A named type definition
    Definition(TypeDefinition),
    /// An array; rank 1 is a single-dimension zero-based vector
    Array {
        /// Element type
        element: TypeRc,
        /// Number of dimensions
        rank: u32,
    },
    /// A managed reference (`T&`)
    ByRef(TypeRc),
    /// An unmanaged pointer (`T*`)
    Pointer(TypeRc),
    /// A type annotated with a custom modifier
    Modified {
        /// The modified type
        element: TypeRc,
        /// The modifier type
        modifier: TypeRc,
        /// `modreq` when true, `modopt` otherwise
        required: bool,
    },
    /// A pinned local type
    Pinned(TypeRc),
    /// A generic type instantiated with arguments
    GenericInstance {
        /// The generic type definition
        definition: TypeRc,
        /// Type arguments, in parameter order
        arguments: Vec<TypeRc>,
    },
    /// A generic parameter
    GenericParameter(GenericParameter),
    /// A pointer to a method
    FunctionPointer {
        /// Return type of the pointee
        return_type: TypeRc,
        /// Parameter types of the pointee
        parameters: Vec<TypeRc>,
    },
}

/// Wrapper kinds that are compared by the shared "same wrapper, recurse on element" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    /// Array with rank
    Array(u32),
    /// Managed reference
    ByRef,
    /// Unmanaged pointer
    Pointer,
    /// Custom modifier, `required` distinguishes modreq from modopt
    Modifier {
        /// `modreq` when true
        required: bool,
    },
    /// Pinned local
    Pinned,
}

impl TypeDescriptor {
    /// Wraps a definition into a shared descriptor.
    pub fn definition_rc(definition: TypeDefinition) -> TypeRc {
        Arc::new(TypeDescriptor::Definition(definition))
    }

    /// Creates an array type.
    pub fn array(element: &TypeRc, rank: u32) -> TypeRc {
        Arc::new(TypeDescriptor::Array {
            element: element.clone(),
            rank: rank.max(1),
        })
    }

    /// Creates a managed reference type.
    pub fn by_ref(element: &TypeRc) -> TypeRc {
        Arc::new(TypeDescriptor::ByRef(element.clone()))
    }

    /// Creates an unmanaged pointer type.
    pub fn pointer(element: &TypeRc) -> TypeRc {
        Arc::new(TypeDescriptor::Pointer(element.clone()))
    }

    /// Creates a modifier-annotated type.
    pub fn modified(element: &TypeRc, modifier: &TypeRc, required: bool) -> TypeRc {
        Arc::new(TypeDescriptor::Modified {
            element: element.clone(),
            modifier: modifier.clone(),
            required,
        })
    }

    /// Creates a pinned type.
    pub fn pinned(element: &TypeRc) -> TypeRc {
        Arc::new(TypeDescriptor::Pinned(element.clone()))
    }

    /// Instantiates a generic definition.
    pub fn instance(definition: &TypeRc, arguments: Vec<TypeRc>) -> TypeRc {
        Arc::new(TypeDescriptor::GenericInstance {
            definition: definition.clone(),
            arguments,
        })
    }

    /// Creates a named type-level generic parameter.
    pub fn type_parameter(owner: &TypeRc, position: u32) -> TypeRc {
        let param = GenericParameter {
            position,
            name: None,
            owner: GenericOwner::Type(TypeRef::new(owner)),
        };
        Arc::new(TypeDescriptor::GenericParameter(param.expand()))
    }

    /// Creates a positional (`!n`) type-level generic parameter.
    pub fn positional_parameter(owner: &TypeRc, position: u32) -> TypeRc {
        Arc::new(TypeDescriptor::GenericParameter(GenericParameter {
            position,
            name: None,
            owner: GenericOwner::Type(TypeRef::new(owner)),
        }))
    }

    /// Returns the named definition, looking through generic instances.
    #[must_use]
    pub fn definition(&self) -> Option<&TypeDefinition> {
        match self {
            TypeDescriptor::Definition(def) => Some(def),
            TypeDescriptor::GenericInstance { definition, .. } => definition.definition(),
            _ => None,
        }
    }

    /// Returns the wrapper kind and wrapped element for wrapper descriptors.
    #[must_use]
    pub fn wrapper(&self) -> Option<(WrapperKind, &TypeRc)> {
        match self {
            TypeDescriptor::Array { element, rank } => Some((WrapperKind::Array(*rank), element)),
            TypeDescriptor::ByRef(element) => Some((WrapperKind::ByRef, element)),
            TypeDescriptor::Pointer(element) => Some((WrapperKind::Pointer, element)),
            TypeDescriptor::Modified {
                element, required, ..
            } => Some((
                WrapperKind::Modifier {
                    required: *required,
                },
                element,
            )),
            TypeDescriptor::Pinned(element) => Some((WrapperKind::Pinned, element)),
            _ => None,
        }
    }

    /// Removes modifier and pinned wrappers from the outside of a type.
    pub fn strip_modifiers(ty: &TypeRc) -> TypeRc {
        let mut current = ty.clone();
        loop {
            let next = match &*current {
                TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                    element.clone()
                }
                _ => return current,
            };
            current = next;
        }
    }

    /// The primitive kind of this type, looking through modifiers.
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeDescriptor::Definition(def) => def.primitive,
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.primitive()
            }
            _ => None,
        }
    }

    /// Returns true for unmanaged pointer types, looking through modifiers.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        match self {
            TypeDescriptor::Pointer(_) => true,
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.is_pointer()
            }
            _ => false,
        }
    }

    /// Returns true for managed reference types, looking through modifiers.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        match self {
            TypeDescriptor::ByRef(_) => true,
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.is_by_ref()
            }
            _ => false,
        }
    }

    /// Returns true for array types, looking through modifiers.
    #[must_use]
    pub fn is_array(&self) -> bool {
        match self {
            TypeDescriptor::Array { .. } => true,
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.is_array()
            }
            _ => false,
        }
    }

    /// Array rank, or `None` for non-array types.
    #[must_use]
    pub fn array_rank(&self) -> Option<u32> {
        match self {
            TypeDescriptor::Array { rank, .. } => Some(*rank),
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.array_rank()
            }
            _ => None,
        }
    }

    /// Element type of arrays, pointers and references, looking through modifiers.
    #[must_use]
    pub fn element_type(&self) -> Option<TypeRc> {
        match self {
            TypeDescriptor::Array { element, .. }
            | TypeDescriptor::ByRef(element)
            | TypeDescriptor::Pointer(element) => Some(element.clone()),
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.element_type()
            }
            _ => None,
        }
    }

    /// Returns true for generic parameters.
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self, TypeDescriptor::GenericParameter(_))
    }

    /// Returns true if the type has copy semantics.
    ///
    /// Primitives, enums and structs are value types. Generic parameters are not, since
    /// nothing is known about their instantiation.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                element.is_value_type()
            }
            _ => self.definition().is_some_and(|def| {
                matches!(def.category, TypeCategory::ValueType | TypeCategory::Enum(_))
            }),
        }
    }

    /// Returns true for value types that are neither primitives nor enums.
    #[must_use]
    pub fn is_struct(&self) -> bool {
        self.definition()
            .is_some_and(|def| def.category == TypeCategory::ValueType && def.primitive.is_none())
    }

    /// The underlying integer kind of an enumeration.
    #[must_use]
    pub fn enum_underlying(&self) -> Option<PrimitiveKind> {
        match self {
            TypeDescriptor::Modified { element, .. } => element.enum_underlying(),
            _ => match self.definition()?.category {
                TypeCategory::Enum(kind) => Some(kind),
                _ => None,
            },
        }
    }

    /// Returns true for delegate types.
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.definition()
            .is_some_and(|def| def.category == TypeCategory::Delegate)
    }

    /// Returns true for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.definition()
            .is_some_and(|def| def.category == TypeCategory::Interface)
    }

    /// Returns true for sealed definitions. Value types are always sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.definition().is_some_and(|def| {
            def.flags.contains(TypeFlags::SEALED)
                || matches!(def.category, TypeCategory::ValueType | TypeCategory::Enum(_))
        })
    }

    /// Returns true if this is a `System.Nullable<T>` instance or definition.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.definition()
            .is_some_and(|def| def.namespace == "System" && def.name == "Nullable`1")
    }

    /// The argument of a `System.Nullable<T>` instance.
    #[must_use]
    pub fn nullable_argument(&self) -> Option<TypeRc> {
        match self {
            TypeDescriptor::GenericInstance { arguments, .. } if self.is_nullable() => {
                arguments.first().cloned()
            }
            _ => None,
        }
    }

    /// Returns true for packed-array instances.
    #[must_use]
    pub fn is_packed_array(&self) -> bool {
        self.definition()
            .is_some_and(|def| def.flags.contains(TypeFlags::PACKED_ARRAY))
    }

    /// Returns true if the definition lives in `namespace` and is called `name`.
    #[must_use]
    pub fn is_named(&self, namespace: &str, name: &str) -> bool {
        self.definition()
            .is_some_and(|def| def.namespace == namespace && def.name == name)
    }

    /// Generic arguments of an instance, empty otherwise.
    #[must_use]
    pub fn generic_arguments(&self) -> &[TypeRc] {
        match self {
            TypeDescriptor::GenericInstance { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Full name in ECMA-335 textual form.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeDescriptor::Definition(def) => def.full_name(),
            TypeDescriptor::Array { element, rank } => {
                let commas = ",".repeat((*rank).saturating_sub(1) as usize);
                format!("{}[{}]", element.full_name(), commas)
            }
            TypeDescriptor::ByRef(element) => format!("{}&", element.full_name()),
            TypeDescriptor::Pointer(element) => format!("{}*", element.full_name()),
            TypeDescriptor::Modified {
                element,
                modifier,
                required,
            } => format!(
                "{} {}({})",
                element.full_name(),
                if *required { "modreq" } else { "modopt" },
                modifier.full_name()
            ),
            TypeDescriptor::Pinned(element) => format!("{} pinned", element.full_name()),
            TypeDescriptor::GenericInstance {
                definition,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.full_name()).collect();
                format!("{}<{}>", definition.full_name(), args.join(","))
            }
            TypeDescriptor::GenericParameter(param) => param.display_name(),
            TypeDescriptor::FunctionPointer {
                return_type,
                parameters,
            } => {
                let params: Vec<String> = parameters.iter().map(|p| p.full_name()).collect();
                format!("method {} *({})", return_type.full_name(), params.join(","))
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.full_name())
    }
}

// Syntactic equality. Structural compatibility questions go through `TypeOracle`.
impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.full_name() == other.full_name()
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Arc<ModuleScope> {
        ModuleScope::new("mscorlib")
    }

    #[test]
    fn test_scope_normalization() {
        let a = ModuleScope::via("mscorlib", "mscorlib.dll");
        let b = ModuleScope::via("System.Private.CoreLib", "MSCORLIB");
        let c = ModuleScope::new("System.Runtime");
        assert!(a.same_module(&b));
        assert!(!a.same_module(&c));
    }

    #[test]
    fn test_full_names() {
        let scope = core();
        let int = TypeDescriptor::definition_rc(
            TypeDefinition::new("System", "Int32", &scope, TypeCategory::ValueType)
                .with_primitive(PrimitiveKind::I4),
        );
        let list = TypeDescriptor::definition_rc(
            TypeDefinition::new("System.Collections.Generic", "List`1", &scope, TypeCategory::Class)
                .with_generic_parameters(["T"]),
        );

        assert_eq!(TypeDescriptor::array(&int, 1).full_name(), "System.Int32[]");
        assert_eq!(TypeDescriptor::array(&int, 3).full_name(), "System.Int32[,,]");
        assert_eq!(TypeDescriptor::by_ref(&int).full_name(), "System.Int32&");
        assert_eq!(
            TypeDescriptor::instance(&list, vec![int.clone()]).full_name(),
            "System.Collections.Generic.List`1<System.Int32>"
        );
        assert_eq!(TypeDescriptor::type_parameter(&list, 0).full_name(), "T");
        assert_eq!(TypeDescriptor::positional_parameter(&list, 0).full_name(), "!0");
    }

    #[test]
    fn test_nested_full_name() {
        let scope = core();
        let outer = TypeDescriptor::definition_rc(TypeDefinition::new(
            "App",
            "Outer",
            &scope,
            TypeCategory::Class,
        ));
        let inner = TypeDescriptor::definition_rc(
            TypeDefinition::new("", "Inner", &scope, TypeCategory::Class)
                .with_declaring_type(&outer),
        );
        assert_eq!(inner.full_name(), "App.Outer/Inner");
    }

    #[test]
    fn test_positional_expansion() {
        let scope = core();
        let dict = TypeDescriptor::definition_rc(
            TypeDefinition::new("System.Collections.Generic", "Dictionary`2", &scope, TypeCategory::Class)
                .with_generic_parameters(["TKey", "TValue"]),
        );
        let TypeDescriptor::GenericParameter(param) =
            &*TypeDescriptor::positional_parameter(&dict, 1)
        else {
            panic!("expected generic parameter");
        };
        assert_eq!(param.expand().name.as_deref(), Some("TValue"));
    }

    #[test]
    fn test_wrapper_predicates_see_through_modifiers() {
        let scope = core();
        let int = TypeDescriptor::definition_rc(
            TypeDefinition::new("System", "Int32", &scope, TypeCategory::ValueType)
                .with_primitive(PrimitiveKind::I4),
        );
        let volatile = TypeDescriptor::definition_rc(TypeDefinition::new(
            "System.Runtime.CompilerServices",
            "IsVolatile",
            &scope,
            TypeCategory::Class,
        ));
        let modified = TypeDescriptor::modified(&TypeDescriptor::pointer(&int), &volatile, true);
        assert!(modified.is_pointer());
        assert_eq!(
            TypeDescriptor::modified(&int, &volatile, false).primitive(),
            Some(PrimitiveKind::I4)
        );
        assert!(TypeDescriptor::strip_modifiers(&modified).is_pointer());
    }
}
