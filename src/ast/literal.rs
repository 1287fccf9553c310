//! Literal values.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    metadata::{FieldRc, MethodRc},
    typesystem::{PrimitiveKind, TypeRc, TypeSystem},
};

/// A constant value carried by a literal node.
///
/// Integer literals remember the type they were written as, so that `(byte)200` and
/// `(sbyte)-56` stay distinguishable even though they share a bit pattern.
#[derive(Debug, Clone)]
pub enum Literal {
    /// `true` / `false`
    Boolean(bool),
    /// An integer of the given integral type; unsigned 64-bit values are stored as bits
    Integer {
        /// Value, sign-extended from the original width
        value: i64,
        /// Original type
        ty: TypeRc,
    },
    /// A floating point value of type `Single` or `Double`
    Float {
        /// Value, widened to double precision
        value: f64,
        /// Original type
        ty: TypeRc,
    },
    /// A string constant
    String(Arc<str>),
    /// A UTF-16 code unit
    Char(u16),
    /// An enum value together with the names of the members it is composed of
    Enum {
        /// Underlying value
        value: i64,
        /// Enum type
        ty: TypeRc,
        /// Member names; several for flag combinations, empty if no member matches
        names: Vec<String>,
    },
    /// `default(T)`
    Default(TypeRc),
    /// `null` of a reference or nullable type
    Null(TypeRc),
    /// A constant unmanaged pointer
    Pointer {
        /// Address
        address: i64,
        /// Pointer type
        ty: TypeRc,
    },
    /// A decimal constant in invariant textual form
    Decimal(Arc<str>),
    /// `ldtoken` of a type
    TypeHandle(TypeRc),
    /// `ldtoken` of a method
    MethodHandle(MethodRc),
    /// `ldtoken` of a field
    FieldHandle(FieldRc),
    /// `typeof(T)`
    TypeOf(TypeRc),
}

impl Literal {
    /// An integer literal of a primitive kind.
    pub fn integer(types: &TypeSystem, kind: PrimitiveKind, value: i64) -> Self {
        Literal::Integer {
            value,
            ty: types.primitive(kind),
        }
    }

    /// Builds an enum literal, resolving the member names that make up `value`.
    pub fn enumeration(ty: &TypeRc, value: i64) -> Self {
        let names = ty
            .definition()
            .map(|def| {
                if let Some((name, _)) = def.enum_values.iter().find(|(_, v)| *v == value) {
                    return vec![name.clone()];
                }
                if !def.flags.contains(crate::typesystem::TypeFlags::FLAGS_ENUM) {
                    return Vec::new();
                }
                let mut remaining = value;
                let mut names = Vec::new();
                for (name, member) in &def.enum_values {
                    if *member != 0 && value & member == *member {
                        names.push(name.clone());
                        remaining &= !member;
                    }
                }
                if remaining == 0 {
                    names
                } else {
                    Vec::new()
                }
            })
            .unwrap_or_default();

        Literal::Enum {
            value,
            ty: ty.clone(),
            names,
        }
    }

    /// The type of the literal.
    pub fn ty(&self, types: &TypeSystem) -> TypeRc {
        match self {
            Literal::Boolean(_) => types.boolean(),
            Literal::Integer { ty, .. }
            | Literal::Float { ty, .. }
            | Literal::Enum { ty, .. }
            | Literal::Pointer { ty, .. } => ty.clone(),
            Literal::Default(ty) | Literal::Null(ty) => ty.clone(),
            Literal::String(_) => types.string(),
            Literal::Char(_) => types.primitive(PrimitiveKind::Char),
            Literal::Decimal(_) => types.decimal(),
            Literal::TypeHandle(_) => types.runtime_type_handle(),
            Literal::MethodHandle(_) => types.runtime_method_handle(),
            Literal::FieldHandle(_) => types.runtime_field_handle(),
            Literal::TypeOf(_) => types.type_type(),
        }
    }

    /// The integer value of integer, enum, char and boolean literals.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Integer { value, .. } | Literal::Enum { value, .. } => Some(*value),
            Literal::Char(c) => Some(i64::from(*c)),
            Literal::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Returns true for `null` literals.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null(_))
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::Boolean(a), Literal::Boolean(b)) => a == b,
            (
                Literal::Integer { value: a, ty: ta },
                Literal::Integer { value: b, ty: tb },
            ) => a == b && ta == tb,
            (Literal::Float { value: a, ty: ta }, Literal::Float { value: b, ty: tb }) => {
                a.to_bits() == b.to_bits() && ta == tb
            }
            (Literal::String(a), Literal::String(b)) | (Literal::Decimal(a), Literal::Decimal(b)) => {
                a == b
            }
            (Literal::Char(a), Literal::Char(b)) => a == b,
            (Literal::Enum { value: a, ty: ta, .. }, Literal::Enum { value: b, ty: tb, .. }) => {
                a == b && ta == tb
            }
            (Literal::Default(a), Literal::Default(b))
            | (Literal::Null(a), Literal::Null(b))
            | (Literal::TypeHandle(a), Literal::TypeHandle(b))
            | (Literal::TypeOf(a), Literal::TypeOf(b)) => a == b,
            (
                Literal::Pointer { address: a, ty: ta },
                Literal::Pointer { address: b, ty: tb },
            ) => a == b && ta == tb,
            (Literal::MethodHandle(a), Literal::MethodHandle(b)) => a == b,
            (Literal::FieldHandle(a), Literal::FieldHandle(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Boolean(b) => b.hash(state),
            Literal::Integer { value, ty } | Literal::Pointer { address: value, ty } => {
                value.hash(state);
                ty.hash(state);
            }
            Literal::Float { value, ty } => {
                value.to_bits().hash(state);
                ty.hash(state);
            }
            Literal::String(s) | Literal::Decimal(s) => s.hash(state),
            Literal::Char(c) => c.hash(state),
            Literal::Enum { value, ty, .. } => {
                value.hash(state);
                ty.hash(state);
            }
            Literal::Default(ty)
            | Literal::Null(ty)
            | Literal::TypeHandle(ty)
            | Literal::TypeOf(ty) => ty.hash(state),
            Literal::MethodHandle(m) => m.hash(state),
            Literal::FieldHandle(f) => f.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer { value, ty } => write!(f, "{value}:{}", ty.full_name()),
            Literal::Float { value, .. } => write!(f, "{value:?}"),
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Char(c) => write!(f, "'\\u{c:04x}'"),
            Literal::Enum { value, ty, names } if names.is_empty() => {
                write!(f, "{}({value})", ty.full_name())
            }
            Literal::Enum { ty, names, .. } => write!(f, "{}.{}", ty.full_name(), names.join("|")),
            Literal::Default(ty) => write!(f, "default({ty})"),
            Literal::Null(_) => write!(f, "null"),
            Literal::Pointer { address, .. } => write!(f, "0x{address:x}p"),
            Literal::Decimal(d) => write!(f, "{d}m"),
            Literal::TypeHandle(ty) => write!(f, "typehandle({ty})"),
            Literal::MethodHandle(m) => write!(f, "methodhandle({})", m.name),
            Literal::FieldHandle(field) => write!(f, "fieldhandle({})", field.name),
            Literal::TypeOf(ty) => write!(f, "typeof({ty})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::{ModuleScope, TypeCategory, TypeDefinition, TypeFlags};

    #[test]
    fn test_flags_enum_names() {
        let types = TypeSystem::new();
        let scope = ModuleScope::new("App");
        let access = types.define(
            TypeDefinition::new("App", "Access", &scope, TypeCategory::Enum(PrimitiveKind::I4))
                .with_flags(TypeFlags::FLAGS_ENUM)
                .with_enum_values([("None", 0), ("Read", 1), ("Write", 2), ("Execute", 4)]),
            Some(&types.enum_base()),
        );

        let Literal::Enum { names, .. } = Literal::enumeration(&access, 3) else {
            panic!("expected enum literal");
        };
        assert_eq!(names, vec!["Read".to_string(), "Write".to_string()]);

        let Literal::Enum { names, .. } = Literal::enumeration(&access, 8) else {
            panic!("expected enum literal");
        };
        assert!(names.is_empty());
    }

    #[test]
    fn test_integer_equality_includes_type() {
        let types = TypeSystem::new();
        let a = Literal::integer(&types, PrimitiveKind::I4, 1);
        let b = Literal::integer(&types, PrimitiveKind::I8, 1);
        assert_ne!(a, b);
        assert_eq!(a, Literal::integer(&types, PrimitiveKind::I4, 1));
        assert_eq!(a.ty(&types).full_name(), "System.Int32");
    }

    #[test]
    fn test_float_equality_by_bits() {
        let types = TypeSystem::new();
        let nan = Literal::Float {
            value: f64::NAN,
            ty: types.primitive(PrimitiveKind::R8),
        };
        assert_eq!(nan, nan.clone());
    }
}
