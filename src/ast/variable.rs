//! Method-scoped variables.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, RwLock},
};

use crate::typesystem::TypeRc;

/// A reference counted pointer to a [`Variable`]
pub type VariableRc = Arc<Variable>;

/// Role of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// The implicit receiver of an instance method
    This,
    /// A declared parameter
    Parameter,
    /// A declared local
    Local,
    /// A temporary synthesized by the translator or a rewrite pass
    Temporary,
}

/// A named slot within one method.
///
/// The type sits behind a lock because a local can be re-typed after creation, when a
/// packed array representation is stored into it. Identity is the pair of id and name;
/// ids are unique within one method.
pub struct Variable {
    id: usize,
    name: String,
    kind: VariableKind,
    is_reference: bool,
    ty: RwLock<TypeRc>,
}

impl Variable {
    /// Creates a variable. Variables of by-ref type are reference variables.
    pub fn new(id: usize, name: impl Into<String>, kind: VariableKind, ty: &TypeRc) -> VariableRc {
        Arc::new(Self {
            id,
            name: name.into(),
            kind,
            is_reference: ty.is_by_ref(),
            ty: RwLock::new(ty.clone()),
        })
    }

    /// Id, unique within the method.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Name, unique within the method.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role of the variable.
    #[must_use]
    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Returns true if reads need an explicit dereference and stores an explicit
    /// write-through.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    /// Returns true for `this`.
    #[must_use]
    pub fn is_this(&self) -> bool {
        self.kind == VariableKind::This
    }

    /// Returns true for parameters and `this`.
    #[must_use]
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, VariableKind::Parameter | VariableKind::This)
    }

    /// The current type.
    pub fn ty(&self) -> TypeRc {
        match self.ty.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the type for the remainder of the method.
    pub fn retype(&self, ty: &TypeRc) {
        let mut guard = match self.ty.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = ty.clone();
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable({}#{}: {})", self.name, self.id, self.ty())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesystem::{TypeDescriptor, TypeSystem};

    #[test]
    fn test_retype() {
        let types = TypeSystem::new();
        let array = types.array_of(&types.int32(), 1);
        let variable = Variable::new(0, "values", VariableKind::Local, &array);
        assert!(variable.ty().is_array());

        variable.retype(&types.packed_array_of(&types.int32()));
        assert!(variable.ty().is_packed_array());
    }

    #[test]
    fn test_reference_flag() {
        let types = TypeSystem::new();
        let by_ref = TypeDescriptor::by_ref(&types.int32());
        assert!(Variable::new(0, "x", VariableKind::Parameter, &by_ref).is_reference());
        assert!(!Variable::new(1, "y", VariableKind::Parameter, &types.int32()).is_reference());
    }
}
