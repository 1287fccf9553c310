//! Rewrite passes over translated method bodies.
//!
//! Raw translation output is canonicalized by a fixed list of passes. Each pass is an
//! [`AstPass`] run by the [`PassScheduler`]; most are implemented as a [`Rewriter`] driven by
//! [`rewrite_tree`], a depth-first pre-order walk that splices replacements in and re-visits
//! them until the touched subtree is stable.
//!
//! # Passes
//!
//! - [`IntrinsicsPass`] - calls that are really runtime intrinsics or plain operators
//! - [`PropertyCompoundPass`] - compound assignments to properties
//! - [`ExpandCastsPass`] - generic casts to concrete representation changes
//! - [`DeclareVariablesPass`] - one declaration statement for locals and temporaries
//!
//! # Scheduling
//!
//! The first three run in order, repeatedly, until none of them changes the method or
//! [`TranslatorConfig::max_pass_iterations`] is reached. Cleanup passes such as variable
//! declaration run once afterwards, so that they see every temporary.

mod casts;
mod declarations;
pub(crate) mod intrinsics;
mod properties;

use std::sync::Arc;

use log::debug;

pub use casts::ExpandCastsPass;
pub use declarations::DeclareVariablesPass;
pub use intrinsics::IntrinsicsPass;
pub use properties::PropertyCompoundPass;

use crate::{
    ast::AstNode,
    config::TranslatorConfig,
    diagnostics::Diagnostics,
    translator::TranslatedMethod,
    typesystem::{TypeOracle, TypeSystem},
    Error, Result,
};

/// Shared, read-only state handed to every pass.
pub struct PassContext {
    /// Type compatibility oracle
    pub oracle: Arc<TypeOracle>,
    /// Translation settings
    pub config: Arc<TranslatorConfig>,
    /// Collector for warnings raised by passes
    pub diagnostics: Arc<Diagnostics>,
}

impl PassContext {
    /// Creates a pass context.
    #[must_use]
    pub fn new(
        oracle: Arc<TypeOracle>,
        config: Arc<TranslatorConfig>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            oracle,
            config,
            diagnostics,
        }
    }

    /// The type system.
    #[must_use]
    pub fn types(&self) -> &TypeSystem {
        self.oracle.types()
    }
}

/// A rewrite pass over one translated method.
///
/// Passes must be thread-safe, since the driver runs methods in parallel and shares one
/// scheduler between them.
pub trait AstPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on the given method?
    fn should_run(&self, _method: &TranslatedMethod, _ctx: &PassContext) -> bool {
        true
    }

    /// Runs the pass on one method.
    ///
    /// Returns `true` if the method changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a rewrite would break a node invariant or does not converge.
    fn run_on_method(&self, method: &mut TranslatedMethod, ctx: &PassContext) -> Result<bool>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}

/// A node-level rewrite rule.
pub trait Rewriter {
    /// Name reported when the rewriter does not converge.
    fn name(&self) -> &'static str;

    /// Returns the replacement for `node`, or `None` to keep it.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be rewritten consistently.
    fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>>;
}

/// Applies `rewriter` to every node of `root`, depth-first and pre-order.
///
/// A replacement is validated, spliced in and offered to the rewriter again before its
/// children are visited. Returns `true` if anything was replaced.
///
/// # Errors
///
/// Returns [`Error::RewriteLimit`] if one position is rewritten more than `limit` times, and
/// [`Error::InvalidNode`] if a replacement violates a node invariant.
pub fn rewrite_tree<R: Rewriter + ?Sized>(
    root: &mut AstNode,
    rewriter: &mut R,
    limit: usize,
) -> Result<bool> {
    let mut changed = false;
    let mut rewrites = 0;
    while let Some(replacement) = rewriter.rewrite(root)? {
        rewrites += 1;
        if rewrites > limit {
            return Err(Error::RewriteLimit(rewriter.name()));
        }
        replacement.validate()?;
        *root = replacement;
        changed = true;
    }

    for child in root.operands_mut() {
        changed |= rewrite_tree(child, rewriter, limit)?;
    }
    Ok(changed)
}

/// Orchestrates the rewrite passes of one method.
pub struct PassScheduler {
    /// Maximum rounds over the fixpoint passes.
    max_iterations: usize,
    /// Passes run in order, repeatedly, until stable.
    pub passes: Vec<Box<dyn AstPass>>,
    /// Passes run once after the fixpoint.
    pub cleanup: Vec<Box<dyn AstPass>>,
}

impl PassScheduler {
    /// Creates an empty scheduler.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum rounds over the fixpoint passes.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// The standard pipeline: intrinsics, property compound lowering and cast expansion to
    /// a fixpoint, then variable declaration.
    #[must_use]
    pub fn standard(config: &TranslatorConfig) -> Self {
        let mut scheduler = Self::new(config.max_pass_iterations);
        scheduler.passes.push(Box::new(IntrinsicsPass));
        scheduler.passes.push(Box::new(PropertyCompoundPass));
        scheduler.passes.push(Box::new(ExpandCastsPass));
        scheduler.cleanup.push(Box::new(DeclareVariablesPass));
        scheduler
    }

    /// Runs the pipeline on one method.
    ///
    /// Returns `true` if any pass changed the method.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass. The method may be partially rewritten.
    pub fn run(&self, method: &mut TranslatedMethod, ctx: &PassContext) -> Result<bool> {
        let mut any_changed = false;

        for iteration in 0..self.max_iterations {
            let changed = Self::run_passes_once(&self.passes, method, ctx)?;
            if !changed {
                break;
            }
            any_changed = true;
            debug!(
                "{}: pass round {} changed the method",
                method.method.full_name(),
                iteration + 1
            );
        }

        any_changed |= Self::run_passes_once(&self.cleanup, method, ctx)?;
        Ok(any_changed)
    }

    fn run_passes_once(
        passes: &[Box<dyn AstPass>],
        method: &mut TranslatedMethod,
        ctx: &PassContext,
    ) -> Result<bool> {
        let mut changed = false;
        for pass in passes {
            if !pass.should_run(method, ctx) {
                continue;
            }
            if pass.run_on_method(method, ctx)? {
                debug!("{} changed {}", pass.name(), method.method.full_name());
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{BinaryOperator, NodeKind},
        typesystem::PrimitiveKind,
    };

    /// Replaces every integer literal 1 with 2, then 2 with 3, up to 3.
    struct CountUp;

    impl Rewriter for CountUp {
        fn name(&self) -> &'static str {
            "count up"
        }

        fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>> {
            let Some(value) = node.as_literal().and_then(|l| l.as_i64()) else {
                return Ok(None);
            };
            if value >= 3 {
                return Ok(None);
            }
            let types = TypeSystem::new();
            Ok(Some(AstNode::integer(&types, PrimitiveKind::I4, value + 1)))
        }
    }

    /// Never settles.
    struct Flip;

    impl Rewriter for Flip {
        fn name(&self) -> &'static str {
            "flip"
        }

        fn rewrite(&mut self, node: &AstNode) -> Result<Option<AstNode>> {
            match node.as_literal() {
                Some(crate::ast::Literal::Boolean(value)) => Ok(Some(AstNode::boolean(!value))),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_replacements_are_revisited() {
        let types = TypeSystem::new();
        let int = types.int32();
        let mut root = AstNode::binary(
            BinaryOperator::Add,
            AstNode::integer(&types, PrimitiveKind::I4, 1),
            AstNode::integer(&types, PrimitiveKind::I4, 7),
            &int,
        );

        assert!(rewrite_tree(&mut root, &mut CountUp, 8).unwrap());
        assert_eq!(
            root.left().and_then(|n| n.as_literal()).and_then(|l| l.as_i64()),
            Some(3)
        );
        assert!(!rewrite_tree(&mut root, &mut CountUp, 8).unwrap());
        assert!(matches!(root.kind(), NodeKind::Binary { .. }));
    }

    #[test]
    fn test_rewrite_limit() {
        let mut root = AstNode::block(vec![AstNode::expression_statement(AstNode::boolean(true))]);
        assert!(matches!(
            rewrite_tree(&mut root, &mut Flip, 4),
            Err(Error::RewriteLimit("flip"))
        ));
    }
}
