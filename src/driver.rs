//! Whole-run orchestration: translation followed by the rewrite passes.
//!
//! The driver owns one [`MethodTranslator`] and one [`PassScheduler`] and applies both to
//! every method body it is given. Methods are independent, so a batch is translated in
//! parallel with `rayon` unless [`TranslatorConfig::parallel`] is off. Each worker builds
//! its own translation context; the caches and the diagnostics collector are shared.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotscript::{driver::TranslationDriver, translator::MethodTranslator, typesystem::TypeSystem};
//!
//! let translator = MethodTranslator::with_types(Arc::new(TypeSystem::new()));
//! let driver = TranslationDriver::new(translator);
//! let outcomes = driver.translate_all(&[]);
//! assert!(outcomes.is_empty());
//! ```

use log::warn;
use rayon::prelude::*;

use crate::{
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity},
    il::MethodBody,
    passes::{PassContext, PassScheduler},
    translator::{MethodOutcome, MethodTranslator},
    TranslatorConfig,
};

/// Translates method bodies and canonicalizes the result.
pub struct TranslationDriver {
    translator: MethodTranslator,
    scheduler: PassScheduler,
    context: PassContext,
}

impl TranslationDriver {
    /// Creates a driver running the standard pass pipeline.
    #[must_use]
    pub fn new(translator: MethodTranslator) -> Self {
        let scheduler = PassScheduler::standard(translator.config());
        Self::with_scheduler(translator, scheduler)
    }

    /// Creates a driver running a custom pass pipeline.
    #[must_use]
    pub fn with_scheduler(translator: MethodTranslator, scheduler: PassScheduler) -> Self {
        let context = PassContext::new(
            translator.oracle().clone(),
            translator.config().clone(),
            translator.diagnostics().clone(),
        );
        Self {
            translator,
            scheduler,
            context,
        }
    }

    /// The translator.
    #[must_use]
    pub fn translator(&self) -> &MethodTranslator {
        &self.translator
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &TranslatorConfig {
        self.translator.config()
    }

    /// Translates one method and runs the passes over it.
    ///
    /// Never fails. A method whose translation or passes abort is replaced by a stub.
    pub fn translate_method(&self, body: &MethodBody) -> MethodOutcome {
        let mut method = match self.translator.translate_or_stub(body) {
            MethodOutcome::Translated(method) => method,
            stubbed @ MethodOutcome::Stubbed { .. } => return stubbed,
        };

        match self.scheduler.run(&mut method, &self.context) {
            Ok(_) => MethodOutcome::Translated(method),
            Err(error) => {
                let name = body.method.full_name();
                warn!("Rewrite passes failed on {name}, replacing it with a stub: {error}");
                self.context.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Error,
                        DiagnosticCategory::Pass,
                        error.to_string(),
                    )
                    .with_method(name),
                );
                MethodOutcome::Stubbed {
                    method: self.translator.stub(body),
                    error,
                }
            }
        }
    }

    /// Translates a batch of methods, in input order.
    pub fn translate_all(&self, bodies: &[MethodBody]) -> Vec<MethodOutcome> {
        if self.config().parallel {
            bodies
                .par_iter()
                .map(|body| self.translate_method(body))
                .collect()
        } else {
            bodies
                .iter()
                .map(|body| self.translate_method(body))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::NodeKind,
        il::ILExpression,
        test::factories::{int_local, method_body, static_method, TestTypes},
        Error,
    };

    #[test]
    fn test_stubs_are_isolated() {
        let t = TestTypes::new();
        let method = static_method(&t, "Run", &t.types.void());
        let x = int_local(&t, "x", 0);
        let good = method_body(
            &method,
            vec![x.clone()],
            vec![ILExpression::stloc(&x, ILExpression::ldc_i4(1))],
        );
        let bad = method_body(
            &method,
            Vec::new(),
            vec![ILExpression::op(
                crate::il::ILCode::CompoundAssignment,
                vec![ILExpression::ldc_i4(1)],
            )],
        );

        let driver = TranslationDriver::new(t.translator);
        let outcomes = driver.translate_all(&[good, bad]);
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_stub());
        assert!(matches!(
            outcomes[0].method().body.operands()[0].kind(),
            NodeKind::VariableDeclaration
        ));
        assert!(outcomes[1].is_stub());
        assert!(matches!(outcomes[1].error(), Some(Error::CompoundAssignment(_))));
        assert!(driver.translator().diagnostics().has_errors());
    }
}
