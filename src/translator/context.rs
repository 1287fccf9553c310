//! Per-method translation state.

use std::collections::HashMap;

use crate::{
    ast::{Variable, VariableKind, VariableRc},
    il::{ILVariable, ILVariableKind},
    typesystem::{TypeOracle, TypeRc},
    Error, Result,
};

/// An enclosing construct that `break` and `continue` can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    /// A loop with its stable index
    Loop(usize),
    /// A switch statement
    Switch,
    /// A protected region
    Try,
}

/// Mutable state of one method translation.
///
/// Owned by exactly one translation and dropped with it. Holds the variable table, the
/// stack of enclosing break/continue targets, the auto-cast stack and the recursion depth.
pub struct TranslationContext {
    variables: HashMap<String, VariableRc>,
    parameters: Vec<VariableRc>,
    locals: Vec<VariableRc>,
    temporaries: Vec<VariableRc>,
    next_id: usize,
    next_temporary: usize,
    next_loop: usize,
    targets: Vec<BlockTarget>,
    auto_cast: Vec<bool>,
    auto_cast_default: bool,
    depth: usize,
    max_depth: usize,
}

impl TranslationContext {
    /// Creates an empty context.
    ///
    /// # Arguments
    ///
    /// * `auto_cast` - Whether implicit conversions are inserted outside explicit overrides
    /// * `max_depth` - Maximum expression nesting depth
    #[must_use]
    pub fn new(auto_cast: bool, max_depth: usize) -> Self {
        Self {
            variables: HashMap::new(),
            parameters: Vec::new(),
            locals: Vec::new(),
            temporaries: Vec::new(),
            next_id: 0,
            next_temporary: 0,
            next_loop: 0,
            targets: Vec::new(),
            auto_cast: Vec::new(),
            auto_cast_default: auto_cast,
            depth: 0,
            max_depth,
        }
    }

    // ------------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------------

    /// Declares a variable, or returns the existing one of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VariableRedeclared`] if a variable of the same name exists with a
    /// different type.
    pub fn declare(
        &mut self,
        name: &str,
        kind: VariableKind,
        ty: &TypeRc,
        oracle: &TypeOracle,
    ) -> Result<VariableRc> {
        if let Some(existing) = self.variables.get(name) {
            let existing_ty = existing.ty();
            if !oracle.equal(&existing_ty, ty, false) && !existing_ty.is_packed_array() {
                return Err(Error::VariableRedeclared {
                    name: name.to_string(),
                    existing: existing_ty.full_name(),
                    requested: ty.full_name(),
                });
            }
            return Ok(existing.clone());
        }

        let variable = Variable::new(self.next_id, name, kind, ty);
        self.next_id += 1;
        self.variables.insert(name.to_string(), variable.clone());
        match kind {
            VariableKind::This | VariableKind::Parameter => self.parameters.push(variable.clone()),
            VariableKind::Local => self.locals.push(variable.clone()),
            VariableKind::Temporary => self.temporaries.push(variable.clone()),
        }
        Ok(variable)
    }

    /// Resolves a variable of the instruction tree, declaring it on first encounter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VariableRedeclared`] on a type mismatch with an earlier encounter.
    pub fn resolve(&mut self, variable: &ILVariable, oracle: &TypeOracle) -> Result<VariableRc> {
        let kind = match variable.kind {
            ILVariableKind::This => VariableKind::This,
            ILVariableKind::Parameter(_) => VariableKind::Parameter,
            ILVariableKind::Local(_) => VariableKind::Local,
            ILVariableKind::Generated => VariableKind::Temporary,
        };
        self.declare(&variable.name, kind, &variable.ty, oracle)
    }

    /// Looks up a variable by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&VariableRc> {
        self.variables.get(name)
    }

    /// Creates a fresh temporary named `$temp<n>`.
    pub fn declare_temporary(&mut self, ty: &TypeRc) -> VariableRc {
        loop {
            let name = format!("$temp{}", self.next_temporary);
            self.next_temporary += 1;
            if self.variables.contains_key(&name) {
                continue;
            }
            let variable = Variable::new(self.next_id, name.as_str(), VariableKind::Temporary, ty);
            self.next_id += 1;
            self.variables.insert(name, variable.clone());
            self.temporaries.push(variable.clone());
            return variable;
        }
    }

    /// Consumes the context, returning parameters, locals, temporaries and the next free
    /// variable id and temporary number.
    #[must_use]
    pub fn into_variables(
        self,
    ) -> (Vec<VariableRc>, Vec<VariableRc>, Vec<VariableRc>, usize, usize) {
        (
            self.parameters,
            self.locals,
            self.temporaries,
            self.next_id,
            self.next_temporary,
        )
    }

    // ------------------------------------------------------------------------
    // Break and continue targets
    // ------------------------------------------------------------------------

    /// Allocates the index of the next loop.
    pub fn next_loop_index(&mut self) -> usize {
        let index = self.next_loop;
        self.next_loop += 1;
        index
    }

    /// Enters a construct that `break` or `continue` may target.
    pub fn push_target(&mut self, target: BlockTarget) {
        self.targets.push(target);
    }

    /// Leaves the innermost construct.
    pub fn pop_target(&mut self) {
        self.targets.pop();
    }

    /// The target of a `break`: the loop index of the nearest loop, or `None` inside a switch.
    ///
    /// Returns `None` for the outer option when no loop or switch encloses the break.
    #[must_use]
    pub fn resolve_break(&self) -> Option<Option<usize>> {
        self.targets.iter().rev().find_map(|target| match target {
            BlockTarget::Loop(index) => Some(Some(*index)),
            BlockTarget::Switch => Some(None),
            BlockTarget::Try => None,
        })
    }

    /// The loop index targeted by a `continue`.
    #[must_use]
    pub fn resolve_continue(&self) -> Option<usize> {
        self.targets.iter().rev().find_map(|target| match target {
            BlockTarget::Loop(index) => Some(*index),
            _ => None,
        })
    }

    // ------------------------------------------------------------------------
    // Auto-cast and recursion
    // ------------------------------------------------------------------------

    /// Overrides auto-casting until the matching [`TranslationContext::pop_auto_cast`].
    pub fn push_auto_cast(&mut self, enabled: bool) {
        self.auto_cast.push(enabled);
    }

    /// Restores the previous auto-cast setting.
    pub fn pop_auto_cast(&mut self) {
        self.auto_cast.pop();
    }

    /// Returns true if implicit conversions are currently inserted.
    #[must_use]
    pub fn auto_cast_enabled(&self) -> bool {
        self.auto_cast
            .last()
            .copied()
            .unwrap_or(self.auto_cast_default)
    }

    /// Descends one level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecursionLimit`] beyond the configured depth.
    pub fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Ascends one level.
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::typesystem::TypeSystem;

    fn oracle() -> TypeOracle {
        TypeOracle::new(Arc::new(TypeSystem::new()))
    }

    #[test]
    fn test_redeclaration_with_other_type_fails() {
        let oracle = oracle();
        let types = oracle.types_rc();
        let mut ctx = TranslationContext::new(true, 16);

        let first = ctx
            .declare("x", VariableKind::Local, &types.int32(), &oracle)
            .unwrap();
        let again = ctx
            .declare("x", VariableKind::Local, &types.int32(), &oracle)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let err = ctx
            .declare("x", VariableKind::Local, &types.string(), &oracle)
            .unwrap_err();
        assert!(matches!(err, Error::VariableRedeclared { .. }));
    }

    #[test]
    fn test_temporaries_are_unique() {
        let oracle = oracle();
        let types = oracle.types_rc();
        let mut ctx = TranslationContext::new(true, 16);
        ctx.declare("$temp0", VariableKind::Local, &types.int32(), &oracle)
            .unwrap();

        let a = ctx.declare_temporary(&types.int32());
        let b = ctx.declare_temporary(&types.int32());
        assert_eq!(a.name(), "$temp1");
        assert_eq!(b.name(), "$temp2");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_break_resolution_walks_outward() {
        let mut ctx = TranslationContext::new(true, 16);
        assert_eq!(ctx.resolve_break(), None);

        let outer = ctx.next_loop_index();
        ctx.push_target(BlockTarget::Loop(outer));
        ctx.push_target(BlockTarget::Try);
        assert_eq!(ctx.resolve_break(), Some(Some(outer)));

        ctx.push_target(BlockTarget::Switch);
        assert_eq!(ctx.resolve_break(), Some(None));
        assert_eq!(ctx.resolve_continue(), Some(outer));

        ctx.pop_target();
        ctx.pop_target();
        ctx.pop_target();
        assert_eq!(ctx.resolve_continue(), None);
    }

    #[test]
    fn test_recursion_limit() {
        let mut ctx = TranslationContext::new(true, 2);
        ctx.enter().unwrap();
        ctx.enter().unwrap();
        assert_eq!(ctx.enter(), Err(Error::RecursionLimit(2)));
        ctx.leave();
        assert!(ctx.enter().is_ok());
    }

    #[test]
    fn test_auto_cast_stack() {
        let mut ctx = TranslationContext::new(true, 2);
        assert!(ctx.auto_cast_enabled());
        ctx.push_auto_cast(false);
        assert!(!ctx.auto_cast_enabled());
        ctx.pop_auto_cast();
        assert!(ctx.auto_cast_enabled());
    }
}
