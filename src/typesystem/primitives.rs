//! Primitive numeric classification.
//!
//! The translator reasons about numeric representation through a fixed table of the
//! CLR primitive value types. The table is deliberately independent of any type
//! descriptor so it can be verified exhaustively on its own.
//!
//! # Native integers
//!
//! The script runtime addresses memory with 32-bit offsets, so `System.IntPtr` and
//! `System.UIntPtr` are classified as 4-byte integers. The integer-width promotion rule
//! and the exact-multiply rule both depend on this size.

use strum::{Display, EnumIter, IntoStaticStr};

/// The CLR primitive value types known to the numeric table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, IntoStaticStr)]
pub enum PrimitiveKind {
    /// System.Boolean - true/false value
    Boolean,
    /// System.Char - UTF-16 code unit
    Char,
    /// System.SByte - signed 8-bit integer
    I1,
    /// System.Byte - unsigned 8-bit integer
    U1,
    /// System.Int16 - signed 16-bit integer
    I2,
    /// System.UInt16 - unsigned 16-bit integer
    U2,
    /// System.Int32 - signed 32-bit integer
    I4,
    /// System.UInt32 - unsigned 32-bit integer
    U4,
    /// System.Int64 - signed 64-bit integer
    I8,
    /// System.UInt64 - unsigned 64-bit integer
    U8,
    /// System.IntPtr - native sized signed integer
    I,
    /// System.UIntPtr - native sized unsigned integer
    U,
    /// System.Single - 32-bit floating point
    R4,
    /// System.Double - 64-bit floating point
    R8,
}

impl PrimitiveKind {
    /// Looks up a primitive by its type name within the `System` namespace.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Boolean" => PrimitiveKind::Boolean,
            "Char" => PrimitiveKind::Char,
            "SByte" => PrimitiveKind::I1,
            "Byte" => PrimitiveKind::U1,
            "Int16" => PrimitiveKind::I2,
            "UInt16" => PrimitiveKind::U2,
            "Int32" => PrimitiveKind::I4,
            "UInt32" => PrimitiveKind::U4,
            "Int64" => PrimitiveKind::I8,
            "UInt64" => PrimitiveKind::U8,
            "IntPtr" => PrimitiveKind::I,
            "UIntPtr" => PrimitiveKind::U,
            "Single" => PrimitiveKind::R4,
            "Double" => PrimitiveKind::R8,
            _ => return None,
        })
    }

    /// The type name within the `System` namespace.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::I1 => "SByte",
            PrimitiveKind::U1 => "Byte",
            PrimitiveKind::I2 => "Int16",
            PrimitiveKind::U2 => "UInt16",
            PrimitiveKind::I4 => "Int32",
            PrimitiveKind::U4 => "UInt32",
            PrimitiveKind::I8 => "Int64",
            PrimitiveKind::U8 => "UInt64",
            PrimitiveKind::I => "IntPtr",
            PrimitiveKind::U => "UIntPtr",
            PrimitiveKind::R4 => "Single",
            PrimitiveKind::R8 => "Double",
        }
    }

    /// Returns true for integer kinds, including `Char` and the native integers.
    #[must_use]
    pub const fn is_integral(&self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Boolean | PrimitiveKind::R4 | PrimitiveKind::R8
        )
    }

    /// Returns true for `Single` and `Double`.
    #[must_use]
    pub const fn is_floating_point(&self) -> bool {
        matches!(self, PrimitiveKind::R4 | PrimitiveKind::R8)
    }

    /// Returns true for kinds that take part in arithmetic.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, PrimitiveKind::Boolean)
    }

    /// Returns true for the native-width integers.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, PrimitiveKind::I | PrimitiveKind::U)
    }

    /// Returns true for the 64-bit integers.
    #[must_use]
    pub const fn is_int64(&self) -> bool {
        matches!(self, PrimitiveKind::I8 | PrimitiveKind::U8)
    }

    /// Returns true for signed integers and floating point kinds.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::I1
                | PrimitiveKind::I2
                | PrimitiveKind::I4
                | PrimitiveKind::I8
                | PrimitiveKind::I
                | PrimitiveKind::R4
                | PrimitiveKind::R8
        )
    }

    /// Size of the representation in bytes.
    #[must_use]
    pub const fn size_of(&self) -> usize {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::I1 | PrimitiveKind::U1 => 1,
            PrimitiveKind::Char | PrimitiveKind::I2 | PrimitiveKind::U2 => 2,
            PrimitiveKind::I4
            | PrimitiveKind::U4
            | PrimitiveKind::I
            | PrimitiveKind::U
            | PrimitiveKind::R4 => 4,
            PrimitiveKind::I8 | PrimitiveKind::U8 | PrimitiveKind::R8 => 8,
        }
    }

    /// The unsigned integer kind of the same width, if any.
    #[must_use]
    pub const fn to_unsigned(&self) -> Option<Self> {
        Some(match self {
            PrimitiveKind::I1 | PrimitiveKind::U1 => PrimitiveKind::U1,
            PrimitiveKind::I2 | PrimitiveKind::U2 | PrimitiveKind::Char => PrimitiveKind::U2,
            PrimitiveKind::I4 | PrimitiveKind::U4 => PrimitiveKind::U4,
            PrimitiveKind::I8 | PrimitiveKind::U8 => PrimitiveKind::U8,
            PrimitiveKind::I | PrimitiveKind::U => PrimitiveKind::U,
            PrimitiveKind::Boolean | PrimitiveKind::R4 | PrimitiveKind::R8 => return None,
        })
    }

    /// The signed integer kind of the same width, if any.
    #[must_use]
    pub const fn to_signed(&self) -> Option<Self> {
        Some(match self {
            PrimitiveKind::I1 | PrimitiveKind::U1 => PrimitiveKind::I1,
            PrimitiveKind::I2 | PrimitiveKind::U2 | PrimitiveKind::Char => PrimitiveKind::I2,
            PrimitiveKind::I4 | PrimitiveKind::U4 => PrimitiveKind::I4,
            PrimitiveKind::I8 | PrimitiveKind::U8 => PrimitiveKind::I8,
            PrimitiveKind::I | PrimitiveKind::U => PrimitiveKind::I,
            PrimitiveKind::Boolean | PrimitiveKind::R4 | PrimitiveKind::R8 => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for kind in PrimitiveKind::iter() {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_name("String"), None);
    }

    #[test]
    fn test_char_is_unsigned_16() {
        let c = PrimitiveKind::Char;
        assert!(c.is_integral());
        assert!(!c.is_signed());
        assert_eq!(c.size_of(), 2);
    }

    #[test]
    fn test_boolean_not_numeric() {
        let b = PrimitiveKind::Boolean;
        assert!(!b.is_integral());
        assert!(!b.is_floating_point());
        assert!(!b.is_numeric());
        assert_eq!(b.to_unsigned(), None);
    }

    #[test]
    fn test_counterparts_keep_width() {
        for kind in PrimitiveKind::iter().filter(PrimitiveKind::is_integral) {
            let unsigned = kind.to_unsigned().unwrap();
            let signed = kind.to_signed().unwrap();
            assert_eq!(unsigned.size_of(), kind.size_of());
            assert_eq!(signed.size_of(), kind.size_of());
            assert!(!unsigned.is_signed());
            assert!(signed.is_signed());
        }
    }
}
