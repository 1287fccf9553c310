//! Member descriptors and the injectable metadata oracle.
//!
//! Methods, fields and properties referenced by the instruction tree are described by
//! immutable descriptors shared through `Arc`. Anything beyond their signatures (whether a
//! member is ignored, redirected to a proxy, or replaced with verbatim script text) comes
//! from a [`MetadataOracle`] supplied by the caller. The oracle is consulted through a
//! [`MetadataCache`], which memoizes answers in concurrent maps so that parallel method
//! translations share lookups.
//!
//! # Key Components
//!
//! - [`MethodDescriptor`], [`FieldDescriptor`], [`PropertyDescriptor`] - member signatures
//! - [`MethodInfo`], [`FieldInfo`], [`TypeInfo`] - declarative translation directives
//! - [`MetadataOracle`] - lookup trait resolving members to their directives
//! - [`NullOracle`], [`StaticOracle`] - ready made oracle implementations
//! - [`MetadataCache`] - memoizing front for an oracle

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use bitflags::bitflags;
use dashmap::DashMap;

use crate::typesystem::{TypeDescriptor, TypeRc};

/// A reference counted pointer to a [`MethodDescriptor`]
pub type MethodRc = Arc<MethodDescriptor>;
/// A reference counted pointer to a [`FieldDescriptor`]
pub type FieldRc = Arc<FieldDescriptor>;
/// A reference counted pointer to a [`PropertyDescriptor`]
pub type PropertyRc = Arc<PropertyDescriptor>;

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
    #[allow(missing_docs)]
    /// Method attributes relevant to call translation
    pub struct MethodFlags: u32 {
        #[allow(missing_docs)]
        const STATIC = 0x0001;
        #[allow(missing_docs)]
        const VIRTUAL = 0x0002;
        /// Sealed override, cannot be overridden further
        const FINAL = 0x0004;
        #[allow(missing_docs)]
        const ABSTRACT = 0x0008;
        #[allow(missing_docs)]
        const NEW_SLOT = 0x0010;
        /// Property accessors, operators and constructors
        const SPECIAL_NAME = 0x0020;
    }
}

/// A method parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Declared type, a by-ref type for `ref`/`out` parameters
    pub ty: TypeRc,
}

impl ParameterDescriptor {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, ty: &TypeRc) -> Self {
        Self {
            name: name.into(),
            ty: ty.clone(),
        }
    }
}

/// Signature and attributes of a method.
pub struct MethodDescriptor {
    /// Method name, `.ctor` for constructors
    pub name: String,
    /// Declaring type, a generic instance for members of instantiated generic types
    pub declaring_type: TypeRc,
    /// Return type
    pub return_type: TypeRc,
    /// Parameters, excluding the implicit `this`
    pub parameters: Vec<ParameterDescriptor>,
    /// Generic method arguments
    pub generic_arguments: Vec<TypeRc>,
    /// Attributes
    pub flags: MethodFlags,
}

impl MethodDescriptor {
    /// Creates an instance method with no parameters.
    pub fn new(name: impl Into<String>, declaring_type: &TypeRc, return_type: &TypeRc) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.clone(),
            return_type: return_type.clone(),
            parameters: Vec::new(),
            generic_arguments: Vec::new(),
            flags: MethodFlags::empty(),
        }
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<ParameterDescriptor>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the generic method arguments.
    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<TypeRc>) -> Self {
        self.generic_arguments = arguments;
        self
    }

    /// Wraps the descriptor into a shared handle.
    #[must_use]
    pub fn into_rc(self) -> MethodRc {
        Arc::new(self)
    }

    /// Returns true for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Returns true for virtual methods that can still be overridden.
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
            && !self.flags.contains(MethodFlags::FINAL)
            && !self.declaring_type.is_sealed()
    }

    /// Returns true for virtual methods.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    /// Returns true for instance and static constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// Returns true if the declaring type is `namespace.name` (looking through instances).
    #[must_use]
    pub fn is_declared_by(&self, namespace: &str, name: &str) -> bool {
        self.declaring_type.is_named(namespace, name)
    }

    /// Full name including the parameter list, unique within an assembly.
    #[must_use]
    pub fn full_name(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.full_name()).collect();
        format!(
            "{} {}::{}({})",
            self.return_type.full_name(),
            self.declaring_type.full_name(),
            self.name,
            params.join(",")
        )
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodDescriptor({})", self.full_name())
    }
}

impl PartialEq for MethodDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.full_name() == other.full_name()
    }
}

impl Eq for MethodDescriptor {}

impl Hash for MethodDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name().hash(state);
    }
}

/// Signature of a field.
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declaring type
    pub declaring_type: TypeRc,
    /// Field type
    pub field_type: TypeRc,
    /// True for static fields
    pub is_static: bool,
    /// Raw initial data for fields mapped to a data blob (array initializers)
    pub initial_data: Option<Arc<[u8]>>,
}

impl FieldDescriptor {
    /// Creates an instance field.
    pub fn new(name: impl Into<String>, declaring_type: &TypeRc, field_type: &TypeRc) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.clone(),
            field_type: field_type.clone(),
            is_static: false,
            initial_data: None,
        }
    }

    /// Marks the field static.
    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attaches an initial data blob.
    #[must_use]
    pub fn with_initial_data(mut self, data: &[u8]) -> Self {
        self.initial_data = Some(Arc::from(data));
        self
    }

    /// Wraps the descriptor into a shared handle.
    #[must_use]
    pub fn into_rc(self) -> FieldRc {
        Arc::new(self)
    }

    /// Full name, unique within an assembly.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{} {}::{}",
            self.field_type.full_name(),
            self.declaring_type.full_name(),
            self.name
        )
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldDescriptor({})", self.full_name())
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.full_name() == other.full_name()
    }
}

impl Eq for FieldDescriptor {}

impl Hash for FieldDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name().hash(state);
    }
}

/// A property and its accessors.
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Declaring type
    pub declaring_type: TypeRc,
    /// Property type
    pub property_type: TypeRc,
    /// Getter, if any
    pub getter: Option<MethodRc>,
    /// Setter, if any
    pub setter: Option<MethodRc>,
    /// True for static properties
    pub is_static: bool,
}

impl PropertyDescriptor {
    /// Full name, unique within an assembly.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{} {}::{}",
            self.property_type.full_name(),
            self.declaring_type.full_name(),
            self.name
        )
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyDescriptor({})", self.full_name())
    }
}

impl PartialEq for PropertyDescriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.full_name() == other.full_name()
    }
}

impl Eq for PropertyDescriptor {}

impl Hash for PropertyDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_name().hash(state);
    }
}

/// Translation directives attached to a method.
#[derive(Debug, Clone, Default)]
pub struct MethodInfo {
    /// Calls to the method are dropped and replaced by a placeholder
    pub is_ignored: bool,
    /// Verbatim script text replacing calls; `$this` and `$<parameter name>` are substituted
    pub replacement: Option<String>,
    /// Calls are redirected to this method instead
    pub proxy: Option<MethodRc>,
    /// The method returns a packed array
    pub packed_return: bool,
}

/// Translation directives attached to a field.
#[derive(Debug, Clone, Default)]
pub struct FieldInfo {
    /// Accesses are replaced by a placeholder
    pub is_ignored: bool,
    /// The field stores a packed array
    pub is_packed_array: bool,
}

/// Translation directives attached to a type.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    /// Members of this type are ignored
    pub is_ignored: bool,
    /// Verbatim script expression standing in for the type
    pub replacement: Option<String>,
}

/// Resolves members to their translation directives.
///
/// Implementations are shared by all method translations and must be thread-safe. Every
/// method has a default returning "no directive", so an implementation only overrides
/// what it knows about.
pub trait MetadataOracle: Send + Sync {
    /// Directives for a method.
    fn method_info(&self, _method: &MethodDescriptor) -> Option<Arc<MethodInfo>> {
        None
    }

    /// Directives for a field.
    fn field_info(&self, _field: &FieldDescriptor) -> Option<Arc<FieldInfo>> {
        None
    }

    /// Directives for a type.
    fn type_info(&self, _ty: &TypeDescriptor) -> Option<Arc<TypeInfo>> {
        None
    }

    /// The property a method is an accessor of.
    ///
    /// The default recognizes special-name `get_X`/`set_X` methods.
    fn property_for(&self, method: &MethodDescriptor) -> Option<PropertyRc> {
        accessor_property(method)
    }
}

/// Derives the property of a special-name `get_X`/`set_X` accessor from its signature.
#[must_use]
pub fn accessor_property(method: &MethodDescriptor) -> Option<PropertyRc> {
    if !method.flags.contains(MethodFlags::SPECIAL_NAME) {
        return None;
    }

    let (name, property_type, is_getter) = if let Some(name) = method.name.strip_prefix("get_") {
        (name, method.return_type.clone(), true)
    } else if let Some(name) = method.name.strip_prefix("set_") {
        (name, method.parameters.last()?.ty.clone(), false)
    } else {
        return None;
    };

    let accessor = Arc::new(MethodDescriptor {
        name: method.name.clone(),
        declaring_type: method.declaring_type.clone(),
        return_type: method.return_type.clone(),
        parameters: method.parameters.clone(),
        generic_arguments: method.generic_arguments.clone(),
        flags: method.flags,
    });

    Some(Arc::new(PropertyDescriptor {
        name: name.to_string(),
        declaring_type: method.declaring_type.clone(),
        property_type,
        getter: is_getter.then(|| accessor.clone()),
        setter: (!is_getter).then_some(accessor),
        is_static: method.is_static(),
    }))
}

/// Oracle without any directives.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOracle;

impl MetadataOracle for NullOracle {}

/// Oracle backed by maps keyed by member full name.
#[derive(Debug, Default)]
pub struct StaticOracle {
    methods: HashMap<String, Arc<MethodInfo>>,
    fields: HashMap<String, Arc<FieldInfo>>,
    types: HashMap<String, Arc<TypeInfo>>,
}

impl StaticOracle {
    /// Creates an empty oracle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds directives for a method.
    #[must_use]
    pub fn with_method(mut self, method: &MethodDescriptor, info: MethodInfo) -> Self {
        self.methods.insert(method.full_name(), Arc::new(info));
        self
    }

    /// Adds directives for a field.
    #[must_use]
    pub fn with_field(mut self, field: &FieldDescriptor, info: FieldInfo) -> Self {
        self.fields.insert(field.full_name(), Arc::new(info));
        self
    }

    /// Adds directives for a type.
    #[must_use]
    pub fn with_type(mut self, ty: &TypeDescriptor, info: TypeInfo) -> Self {
        self.types.insert(ty.full_name(), Arc::new(info));
        self
    }
}

impl MetadataOracle for StaticOracle {
    fn method_info(&self, method: &MethodDescriptor) -> Option<Arc<MethodInfo>> {
        self.methods.get(&method.full_name()).cloned()
    }

    fn field_info(&self, field: &FieldDescriptor) -> Option<Arc<FieldInfo>> {
        self.fields.get(&field.full_name()).cloned()
    }

    fn type_info(&self, ty: &TypeDescriptor) -> Option<Arc<TypeInfo>> {
        self.types.get(&ty.full_name()).cloned()
    }
}

/// Memoizing front for a [`MetadataOracle`].
///
/// Lookups are get-or-create by member full name. Negative answers are cached as well.
pub struct MetadataCache {
    oracle: Arc<dyn MetadataOracle>,
    methods: DashMap<String, Option<Arc<MethodInfo>>>,
    fields: DashMap<String, Option<Arc<FieldInfo>>>,
    types: DashMap<String, Option<Arc<TypeInfo>>>,
    properties: DashMap<String, Option<PropertyRc>>,
}

impl MetadataCache {
    /// Creates a cache in front of `oracle`.
    pub fn new(oracle: Arc<dyn MetadataOracle>) -> Self {
        Self {
            oracle,
            methods: DashMap::new(),
            fields: DashMap::new(),
            types: DashMap::new(),
            properties: DashMap::new(),
        }
    }

    /// Directives for a method.
    pub fn method_info(&self, method: &MethodDescriptor) -> Option<Arc<MethodInfo>> {
        self.methods
            .entry(method.full_name())
            .or_insert_with(|| self.oracle.method_info(method))
            .clone()
    }

    /// Directives for a field.
    pub fn field_info(&self, field: &FieldDescriptor) -> Option<Arc<FieldInfo>> {
        self.fields
            .entry(field.full_name())
            .or_insert_with(|| self.oracle.field_info(field))
            .clone()
    }

    /// Directives for a type.
    pub fn type_info(&self, ty: &TypeDescriptor) -> Option<Arc<TypeInfo>> {
        self.types
            .entry(ty.full_name())
            .or_insert_with(|| self.oracle.type_info(ty))
            .clone()
    }

    /// The property a method is an accessor of.
    pub fn property_for(&self, method: &MethodDescriptor) -> Option<PropertyRc> {
        self.properties
            .entry(method.full_name())
            .or_insert_with(|| self.oracle.property_for(method))
            .clone()
    }

    /// Returns true if calls to the method or members of its type are ignored.
    pub fn is_ignored(&self, method: &MethodDescriptor) -> bool {
        self.method_info(method).is_some_and(|info| info.is_ignored)
            || self
                .type_info(&method.declaring_type)
                .is_some_and(|info| info.is_ignored)
    }

    /// Number of memoized method lookups.
    pub fn cached_methods(&self) -> usize {
        self.methods.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::typesystem::TypeSystem;

    #[test]
    fn test_accessor_property() {
        let types = TypeSystem::new();
        let getter = MethodDescriptor::new("get_Length", &types.string(), &types.int32())
            .with_flags(MethodFlags::SPECIAL_NAME);
        let property = accessor_property(&getter).unwrap();
        assert_eq!(property.name, "Length");
        assert!(property.getter.is_some());
        assert!(property.setter.is_none());

        let plain = MethodDescriptor::new("get_Length", &types.string(), &types.int32());
        assert!(accessor_property(&plain).is_none());
    }

    #[test]
    fn test_full_names() {
        let types = TypeSystem::new();
        let method = MethodDescriptor::new("Substring", &types.string(), &types.string())
            .with_parameters(vec![ParameterDescriptor::new("start", &types.int32())]);
        assert_eq!(
            method.full_name(),
            "System.String System.String::Substring(System.Int32)"
        );
    }

    struct CountingOracle(AtomicUsize);

    impl MetadataOracle for CountingOracle {
        fn method_info(&self, _method: &MethodDescriptor) -> Option<Arc<MethodInfo>> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Some(Arc::new(MethodInfo {
                is_ignored: true,
                ..MethodInfo::default()
            }))
        }
    }

    #[test]
    fn test_cache_queries_oracle_once() {
        let types = TypeSystem::new();
        let oracle = Arc::new(CountingOracle(AtomicUsize::new(0)));
        let cache = MetadataCache::new(oracle.clone());
        let method = MethodDescriptor::new("Trace", &types.object(), &types.void());

        assert!(cache.is_ignored(&method));
        assert!(cache.is_ignored(&method));
        assert_eq!(oracle.0.load(Ordering::Relaxed), 1);
        assert_eq!(cache.cached_methods(), 1);
    }
}
