//! Structural type equality and assignability.
//!
//! A wrong answer here is silent: a missing cast corrupts values at runtime, a spurious
//! one produces the wrong representation. Both questions are therefore answered purely
//! from descriptor structure, with no heuristics.
//!
//! # Equality
//!
//! [`TypeOracle::equal`] compares:
//! - named definitions by name, namespace, normalized module scope and declaring type
//! - wrapper kinds (array, by-ref, pointer, modifier, pinned) by wrapper data, then element
//! - generic instances by definition and pairwise arguments
//! - generic parameters after expanding positional forms, by position, owner kind and
//!   owner compatibility (equal, or one in the other's base chain)
//! - function pointers by return and parameter types
//!
//! Non-strict comparison ignores custom modifiers and the pinned wrapper.
//!
//! # Assignability
//!
//! [`TypeOracle::assignable`] is asymmetric and memoized by the pair of full names in a
//! concurrent map, so that parallel method translations share one memo.

use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;

use crate::typesystem::{
    registry::ARRAY_INTERFACES, GenericOwner, GenericParameter, PrimitiveKind, TypeDefinition,
    TypeDescriptor, TypeRc, TypeSystem,
};

/// Upper bound on base-chain walks, guarding against malformed cyclic hierarchies.
const MAX_BASE_DEPTH: usize = 64;

/// Answers type compatibility questions for the translator and the rewrite passes.
pub struct TypeOracle {
    types: Arc<TypeSystem>,
    assignable_cache: DashMap<(String, String), bool>,
}

impl TypeOracle {
    /// Creates an oracle over a type system.
    #[must_use]
    pub fn new(types: Arc<TypeSystem>) -> Self {
        Self {
            types,
            assignable_cache: DashMap::new(),
        }
    }

    /// The underlying type system.
    #[must_use]
    pub fn types(&self) -> &TypeSystem {
        &self.types
    }

    /// Shared handle to the underlying type system.
    #[must_use]
    pub fn types_rc(&self) -> Arc<TypeSystem> {
        self.types.clone()
    }

    /// Number of memoized assignability answers.
    #[must_use]
    pub fn cached_answers(&self) -> usize {
        self.assignable_cache.len()
    }

    /// Returns true if `target` and `source` describe the same type.
    ///
    /// # Arguments
    ///
    /// * `target` - First type
    /// * `source` - Second type
    /// * `strict` - Compare custom modifiers and pinned wrappers instead of ignoring them
    #[must_use]
    pub fn equal(&self, target: &TypeRc, source: &TypeRc, strict: bool) -> bool {
        if Arc::ptr_eq(target, source) {
            return true;
        }

        let (target, source) = if strict {
            (target.clone(), source.clone())
        } else {
            (
                TypeDescriptor::strip_modifiers(target),
                TypeDescriptor::strip_modifiers(source),
            )
        };

        if Arc::ptr_eq(&target, &source) {
            return true;
        }

        match (&*target, &*source) {
            (TypeDescriptor::Definition(a), TypeDescriptor::Definition(b)) => {
                self.definitions_equal(a, b)
            }
            (
                TypeDescriptor::GenericInstance {
                    definition: def_a,
                    arguments: args_a,
                },
                TypeDescriptor::GenericInstance {
                    definition: def_b,
                    arguments: args_b,
                },
            ) => {
                args_a.len() == args_b.len()
                    && self.equal(def_a, def_b, strict)
                    && args_a
                        .iter()
                        .zip(args_b)
                        .all(|(a, b)| self.equal(a, b, strict))
            }
            (TypeDescriptor::GenericParameter(a), TypeDescriptor::GenericParameter(b)) => {
                self.parameters_equal(a, b)
            }
            (
                TypeDescriptor::FunctionPointer {
                    return_type: ret_a,
                    parameters: params_a,
                },
                TypeDescriptor::FunctionPointer {
                    return_type: ret_b,
                    parameters: params_b,
                },
            ) => {
                params_a.len() == params_b.len()
                    && self.equal(ret_a, ret_b, strict)
                    && params_a
                        .iter()
                        .zip(params_b)
                        .all(|(a, b)| self.equal(a, b, strict))
            }
            (
                TypeDescriptor::Modified {
                    modifier: mod_a, ..
                },
                TypeDescriptor::Modified {
                    modifier: mod_b, ..
                },
            ) if !self.equal(mod_a, mod_b, strict) => false,
            _ => match (target.wrapper(), source.wrapper()) {
                (Some((kind_a, elem_a)), Some((kind_b, elem_b))) if kind_a == kind_b => {
                    self.equal(elem_a, elem_b, strict)
                }
                _ => false,
            },
        }
    }

    fn definitions_equal(&self, a: &TypeDefinition, b: &TypeDefinition) -> bool {
        if a.name != b.name || a.namespace != b.namespace || !a.scope.same_module(&b.scope) {
            return false;
        }

        match (&a.declaring_type, &b.declaring_type) {
            (None, None) => true,
            (Some(da), Some(db)) => self.equal(da, db, false),
            _ => false,
        }
    }

    fn parameters_equal(&self, a: &GenericParameter, b: &GenericParameter) -> bool {
        let a = a.expand();
        let b = b.expand();

        if a.position != b.position || a.owner.is_method() != b.owner.is_method() {
            return false;
        }

        if let (Some(name_a), Some(name_b)) = (&a.name, &b.name) {
            if name_a != name_b {
                return false;
            }
        }

        if let (
            GenericOwner::Method { name: method_a, .. },
            GenericOwner::Method { name: method_b, .. },
        ) = (&a.owner, &b.owner)
        {
            if method_a != method_b {
                return false;
            }
        }

        let (Some(owner_a), Some(owner_b)) = (a.owner.owner_type(), b.owner.owner_type()) else {
            return false;
        };

        self.equal(&owner_a, &owner_b, false)
            || self.type_in_bases(&owner_a, &owner_b, false)
            || self.type_in_bases(&owner_b, &owner_a, false)
    }

    /// Returns true if a value of type `source` can be stored in a location of type `target`
    /// without a representation-changing cast.
    #[must_use]
    pub fn assignable(&self, target: &TypeRc, source: &TypeRc) -> bool {
        let key = (target.full_name(), source.full_name());
        if let Some(answer) = self.assignable_cache.get(&key) {
            return *answer;
        }

        let answer = self.compute_assignable(target, source);
        *self.assignable_cache.entry(key).or_insert(answer)
    }

    fn compute_assignable(&self, target: &TypeRc, source: &TypeRc) -> bool {
        if self.equal(target, source, false) {
            return true;
        }

        let target = TypeDescriptor::strip_modifiers(target);
        let source = TypeDescriptor::strip_modifiers(source);

        if self.equal(&target, &self.types.object(), false) {
            return true;
        }

        let (target_element, target_depth) = Self::dereference(&target);
        let (source_element, source_depth) = Self::dereference(&source);
        if target_depth > 0
            && target_depth == source_depth
            && self.equal(&target_element, &source_element, false)
        {
            return true;
        }

        match (&*target, &*source) {
            (_, TypeDescriptor::Array { .. })
                if self.equal(&target, &self.types.array_base(), false) =>
            {
                return true;
            }
            (
                TypeDescriptor::GenericInstance {
                    definition,
                    arguments,
                },
                TypeDescriptor::Array { element, rank: 1 },
            ) if arguments.len() == 1 => {
                let name = definition.full_name();
                if ARRAY_INTERFACES.contains(&name.as_str())
                    && self.equal(&arguments[0], element, false)
                {
                    return true;
                }
            }
            (_, TypeDescriptor::Pointer(_))
                if target.primitive().is_some_and(|kind| kind.is_native()) =>
            {
                return true;
            }
            (TypeDescriptor::Pointer(target_elem), TypeDescriptor::ByRef(source_elem))
                if self.equal(target_elem, source_elem, false) =>
            {
                return true;
            }
            _ => {}
        }

        if self.type_in_bases(&source, &target, false) {
            return true;
        }

        let mut candidates = vec![source.clone()];
        candidates.extend(self.base_types(&source));
        self.implemented_interfaces(&candidates)
            .iter()
            .any(|interface| {
                self.equal(&target, interface, false)
                    || self.type_in_bases(interface, &target, false)
            })
    }

    /// Every interface reachable from `types`, each visited once, so a malformed cyclic
    /// interface list terminates.
    fn implemented_interfaces(&self, types: &[TypeRc]) -> Vec<TypeRc> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut pending: Vec<TypeRc> = types
            .iter()
            .flat_map(|ty| self.interfaces_of(ty))
            .collect();
        while let Some(interface) = pending.pop() {
            if !seen.insert(interface.full_name()) {
                continue;
            }
            pending.extend(self.interfaces_of(&interface));
            found.push(interface);
        }
        found
    }

    /// Strips every by-ref and pointer layer, returning the element and the number of
    /// layers removed. Modifiers are ignored.
    #[must_use]
    pub fn dereference(ty: &TypeRc) -> (TypeRc, usize) {
        let mut current = TypeDescriptor::strip_modifiers(ty);
        let mut depth = 0;
        loop {
            let next = match &*current {
                TypeDescriptor::ByRef(element) | TypeDescriptor::Pointer(element) => {
                    TypeDescriptor::strip_modifiers(element)
                }
                _ => return (current, depth),
            };
            current = next;
            depth += 1;
        }
    }

    /// Returns true if `base` appears in the base chain of `ty` (excluding `ty` itself).
    #[must_use]
    pub fn type_in_bases(&self, ty: &TypeRc, base: &TypeRc, strict: bool) -> bool {
        self.base_types(ty)
            .iter()
            .any(|candidate| self.equal(candidate, base, strict))
    }

    /// The base chain of a type, nearest first, with generic arguments substituted.
    #[must_use]
    pub fn base_types(&self, ty: &TypeRc) -> Vec<TypeRc> {
        let mut chain = Vec::new();
        let mut current = self.base_of(ty);
        while let Some(base) = current {
            if chain.len() >= MAX_BASE_DEPTH {
                break;
            }
            current = self.base_of(&base);
            chain.push(base);
        }
        chain
    }

    fn base_of(&self, ty: &TypeRc) -> Option<TypeRc> {
        match &**ty {
            TypeDescriptor::Definition(def) => def.base().cloned(),
            TypeDescriptor::GenericInstance {
                definition,
                arguments,
            } => {
                let base = definition.definition()?.base()?;
                Some(Self::substitute(base, definition, arguments))
            }
            TypeDescriptor::Array { .. } => Some(self.types.array_base()),
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                self.base_of(element)
            }
            _ => None,
        }
    }

    /// The interfaces directly implemented by a type, with generic arguments substituted.
    #[must_use]
    pub fn interfaces_of(&self, ty: &TypeRc) -> Vec<TypeRc> {
        match &**ty {
            TypeDescriptor::Definition(def) => def.interfaces().cloned().collect(),
            TypeDescriptor::GenericInstance {
                definition,
                arguments,
            } => definition
                .definition()
                .map(|def| {
                    def.interfaces()
                        .map(|iface| Self::substitute(iface, definition, arguments))
                        .collect()
                })
                .unwrap_or_default(),
            TypeDescriptor::Modified { element, .. } | TypeDescriptor::Pinned(element) => {
                self.interfaces_of(element)
            }
            _ => Vec::new(),
        }
    }

    /// Replaces type-level generic parameters of `owner` inside `ty` with `arguments`.
    #[must_use]
    pub fn substitute(ty: &TypeRc, owner: &TypeRc, arguments: &[TypeRc]) -> TypeRc {
        let owner_name = owner.full_name();
        Self::substitute_named(ty, &owner_name, arguments)
    }

    fn substitute_named(ty: &TypeRc, owner: &str, arguments: &[TypeRc]) -> TypeRc {
        let recurse = |t: &TypeRc| Self::substitute_named(t, owner, arguments);
        match &**ty {
            TypeDescriptor::GenericParameter(param) => {
                let matches_owner = matches!(&param.owner, GenericOwner::Type(t)
                    if t.upgrade().is_some_and(|o| o.full_name() == owner));
                match arguments.get(param.position as usize) {
                    Some(argument) if matches_owner => argument.clone(),
                    _ => ty.clone(),
                }
            }
            TypeDescriptor::Definition(_) => ty.clone(),
            TypeDescriptor::Array { element, rank } => TypeDescriptor::array(&recurse(element), *rank),
            TypeDescriptor::ByRef(element) => TypeDescriptor::by_ref(&recurse(element)),
            TypeDescriptor::Pointer(element) => TypeDescriptor::pointer(&recurse(element)),
            TypeDescriptor::Pinned(element) => TypeDescriptor::pinned(&recurse(element)),
            TypeDescriptor::Modified {
                element,
                modifier,
                required,
            } => TypeDescriptor::modified(&recurse(element), modifier, *required),
            TypeDescriptor::GenericInstance {
                definition,
                arguments: inner,
            } => TypeDescriptor::instance(definition, inner.iter().map(recurse).collect()),
            TypeDescriptor::FunctionPointer {
                return_type,
                parameters,
            } => Arc::new(TypeDescriptor::FunctionPointer {
                return_type: recurse(return_type),
                parameters: parameters.iter().map(recurse).collect(),
            }),
        }
    }

    /// The primitive kind used for numeric reasoning; enums report their underlying kind.
    #[must_use]
    pub fn numeric_kind(ty: &TypeRc) -> Option<PrimitiveKind> {
        ty.primitive().or_else(|| ty.enum_underlying())
    }

    /// Returns true for integer types, including `Char`, native integers and enums.
    #[must_use]
    pub fn is_integral(ty: &TypeRc) -> bool {
        Self::numeric_kind(ty).is_some_and(|kind| kind.is_integral())
    }

    /// Returns true for `Single` and `Double`.
    #[must_use]
    pub fn is_floating_point(ty: &TypeRc) -> bool {
        Self::numeric_kind(ty).is_some_and(|kind| kind.is_floating_point())
    }

    /// Returns true for signed integers and floating point types.
    #[must_use]
    pub fn is_signed(ty: &TypeRc) -> bool {
        Self::numeric_kind(ty).is_some_and(|kind| kind.is_signed())
    }

    /// Returns true for any numeric type.
    #[must_use]
    pub fn is_numeric(ty: &TypeRc) -> bool {
        Self::numeric_kind(ty).is_some_and(|kind| kind.is_numeric())
    }

    /// Size in bytes; pointers and references are native width; `0` when unknown.
    #[must_use]
    pub fn size_of(ty: &TypeRc) -> usize {
        if ty.is_pointer() || ty.is_by_ref() {
            return PrimitiveKind::I.size_of();
        }
        Self::numeric_kind(ty).map_or(0, |kind| kind.size_of())
    }

    /// Returns true for pointers and native-width integers.
    #[must_use]
    pub fn is_pointer_like(ty: &TypeRc) -> bool {
        ty.is_pointer() || ty.primitive().is_some_and(|kind| kind.is_native())
    }

    /// Returns true for 64-bit integers, looking through enums.
    #[must_use]
    pub fn is_int64(ty: &TypeRc) -> bool {
        Self::numeric_kind(ty).is_some_and(|kind| kind.is_int64())
    }

    /// Returns true for `System.Boolean`.
    #[must_use]
    pub fn is_boolean(ty: &TypeRc) -> bool {
        ty.primitive() == Some(PrimitiveKind::Boolean)
    }

    /// Returns true for `System.Object`.
    #[must_use]
    pub fn is_object(&self, ty: &TypeRc) -> bool {
        self.equal(ty, &self.types.object(), false)
    }

    /// Returns true for `System.String`.
    #[must_use]
    pub fn is_string(&self, ty: &TypeRc) -> bool {
        self.equal(ty, &self.types.string(), false)
    }

    /// Returns true for `System.Void`.
    #[must_use]
    pub fn is_void(&self, ty: &TypeRc) -> bool {
        self.equal(ty, &self.types.void(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::{ModuleScope, TypeCategory};

    fn oracle() -> TypeOracle {
        TypeOracle::new(Arc::new(TypeSystem::new()))
    }

    #[test]
    fn test_cyclic_interface_list_terminates() {
        let oracle = oracle();
        let scope = ModuleScope::new("App");
        let looped = oracle.types().define(
            TypeDefinition::new("App", "ILooped", &scope, TypeCategory::Interface),
            None,
        );
        if let Some(def) = looped.definition() {
            def.add_interface(&looped);
        }
        let widget = oracle.types().define(
            TypeDefinition::new("App", "Widget", &scope, TypeCategory::Class),
            Some(&oracle.types().object()),
        );
        if let Some(def) = widget.definition() {
            def.add_interface(&looped);
        }

        assert!(oracle.assignable(&looped, &widget));
        assert!(!oracle.assignable(&oracle.types().string(), &looped));
    }

    #[test]
    fn test_equal_across_scope_references() {
        let oracle = oracle();
        let a = TypeDescriptor::definition_rc(TypeDefinition::new(
            "App",
            "Point",
            &ModuleScope::via("App", "App.dll"),
            TypeCategory::ValueType,
        ));
        let b = TypeDescriptor::definition_rc(TypeDefinition::new(
            "App",
            "Point",
            &ModuleScope::via("AppAlias", "app"),
            TypeCategory::ValueType,
        ));
        assert!(oracle.equal(&a, &b, true));
    }

    #[test]
    fn test_modifiers_only_matter_when_strict() {
        let oracle = oracle();
        let int = oracle.types().int32();
        let volatile = oracle.types().object();
        let modified = TypeDescriptor::modified(&int, &volatile, true);
        assert!(oracle.equal(&int, &modified, false));
        assert!(!oracle.equal(&int, &modified, true));
        assert!(oracle.equal(&modified, &modified.clone(), true));
    }

    #[test]
    fn test_array_rank_matters() {
        let oracle = oracle();
        let int = oracle.types().int32();
        assert!(oracle.equal(
            &TypeDescriptor::array(&int, 2),
            &TypeDescriptor::array(&int, 2),
            false
        ));
        assert!(!oracle.equal(
            &TypeDescriptor::array(&int, 1),
            &TypeDescriptor::array(&int, 2),
            false
        ));
    }

    #[test]
    fn test_generic_substitution_in_bases() {
        let oracle = oracle();
        let scope = ModuleScope::new("App");
        let base = oracle.types().define(
            TypeDefinition::new("App", "Base`1", &scope, TypeCategory::Class)
                .with_generic_parameters(["T"]),
            Some(&oracle.types().object()),
        );
        let derived = oracle.types().define(
            TypeDefinition::new("App", "Derived`1", &scope, TypeCategory::Class)
                .with_generic_parameters(["U"]),
            None,
        );
        let u = TypeDescriptor::type_parameter(&derived, 0);
        derived
            .definition()
            .unwrap()
            .set_base(&TypeDescriptor::instance(&base, vec![u]));

        let int = oracle.types().int32();
        let derived_int = TypeDescriptor::instance(&derived, vec![int.clone()]);
        let base_int = TypeDescriptor::instance(&base, vec![int]);
        let base_string = TypeDescriptor::instance(&base, vec![oracle.types().string()]);

        assert!(oracle.assignable(&base_int, &derived_int));
        assert!(!oracle.assignable(&base_string, &derived_int));
        assert!(!oracle.assignable(&derived_int, &base_int));
    }

    #[test]
    fn test_memo_is_populated() {
        let oracle = oracle();
        let string = oracle.types().string();
        let object = oracle.types().object();
        assert_eq!(oracle.cached_answers(), 0);
        assert!(oracle.assignable(&object, &string));
        assert!(oracle.assignable(&object, &string));
        assert_eq!(oracle.cached_answers(), 1);
    }

    #[test]
    fn test_dereference_depth() {
        let oracle = oracle();
        let int = oracle.types().int32();
        let ptr_ptr = TypeDescriptor::pointer(&TypeDescriptor::pointer(&int));
        let (element, depth) = TypeOracle::dereference(&ptr_ptr);
        assert_eq!(depth, 2);
        assert!(oracle.equal(&element, &int, true));
    }
}
