//! Translation diagnostics.
//!
//! A method translation degrades instead of failing where it can: an instruction without a
//! rule becomes an untranslatable placeholder, and a method that cannot be translated at
//! all becomes a stub that throws. Either way something was lost, and the loss is
//! recorded here as a [`Diagnostic`] naming the method and, when known, the IL offset.
//!
//! One [`Diagnostics`] collector is shared by every worker of a parallel run. Entries are
//! appended through `boxcar::Vec`, which needs no lock, and read back in push order.
//!
//! ```rust
//! use dotscript::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.push(
//!     Diagnostic::new(
//!         DiagnosticSeverity::Warning,
//!         DiagnosticCategory::Instruction,
//!         "no rule for arglist",
//!     )
//!     .with_method("App.Program::Run")
//!     .with_il_offset(0x12),
//! );
//!
//! assert_eq!(diagnostics.warning_count(), 1);
//! assert_eq!(diagnostics.for_method("App.Program::Run").len(), 1);
//! ```

use std::fmt;

use strum::{Display, EnumIter, IntoEnumIterator};

/// How much of a method was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DiagnosticSeverity {
    /// Nothing was lost
    #[strum(serialize = "INFO")]
    Info,
    /// Part of the method is an untranslatable placeholder
    #[strum(serialize = "WARN")]
    Warning,
    /// The whole method was replaced with a stub
    #[strum(serialize = "ERROR")]
    Error,
}

/// The stage that reported a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DiagnosticCategory {
    /// An instruction without a rule or with an unrepresentable operand shape
    Instruction,
    /// A type query with an unexpected answer
    Type,
    /// A call that could not be resolved or replaced
    Call,
    /// A rewrite pass
    Pass,
    /// A method replaced with a stub
    Method,
}

/// One recorded loss.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// Reporting stage
    pub category: DiagnosticCategory,
    /// Description
    pub message: String,
    /// Full name of the method being translated
    pub method: Option<String>,
    /// IL offset of the offending instruction
    pub il_offset: Option<u32>,
}

impl Diagnostic {
    /// Creates an entry without method or offset.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            method: None,
            il_offset: None,
        }
    }

    /// Attaches the method full name.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Attaches the IL offset of the offending instruction.
    #[must_use]
    pub fn with_il_offset(mut self, offset: u32) -> Self {
        self.il_offset = Some(offset);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.category)?;
        match (&self.method, self.il_offset) {
            (Some(method), Some(offset)) => write!(f, " {method}@IL_{offset:04x}")?,
            (Some(method), None) => write!(f, " {method}")?,
            (None, Some(offset)) => write!(f, " @IL_{offset:04x}")?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Lock-free collector shared by all method translations of a run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// All entries, in push order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Total number of entries.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Number of entries with `severity`.
    pub fn count_of(&self, severity: DiagnosticSeverity) -> usize {
        self.iter().filter(|entry| entry.severity == severity).count()
    }

    /// Number of stubbed methods and failed passes.
    pub fn error_count(&self) -> usize {
        self.count_of(DiagnosticSeverity::Error)
    }

    /// Number of lossy translations.
    pub fn warning_count(&self) -> usize {
        self.count_of(DiagnosticSeverity::Warning)
    }

    /// Returns true if any method was stubbed.
    pub fn has_errors(&self) -> bool {
        self.iter()
            .any(|entry| entry.severity == DiagnosticSeverity::Error)
    }

    /// Entries reported by `category`.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|entry| entry.category == category).collect()
    }

    /// Entries recorded against the method with full name `method`.
    pub fn for_method(&self, method: &str) -> Vec<&Diagnostic> {
        self.iter()
            .filter(|entry| entry.method.as_deref() == Some(method))
            .collect()
    }

    /// A per-severity count line followed by every entry, one per line.
    pub fn summary(&self) -> String {
        let counts: Vec<String> = DiagnosticSeverity::iter()
            .map(|severity| format!("{severity}={}", self.count_of(severity)))
            .collect();
        let mut out = counts.join(" ");
        out.push('\n');
        for entry in self.iter() {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn entry(severity: DiagnosticSeverity, category: DiagnosticCategory) -> Diagnostic {
        Diagnostic::new(severity, category, "lost")
    }

    #[test]
    fn test_counts() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());

        diagnostics.push(entry(DiagnosticSeverity::Info, DiagnosticCategory::Pass));
        diagnostics.push(
            entry(DiagnosticSeverity::Warning, DiagnosticCategory::Instruction).with_method("A::B"),
        );
        diagnostics.push(entry(DiagnosticSeverity::Error, DiagnosticCategory::Method).with_method("A::B"));

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Instruction).len(), 1);
        assert_eq!(diagnostics.for_method("A::B").len(), 2);
        assert!(diagnostics.summary().starts_with("INFO=1 WARN=1 ERROR=1\n"));
    }

    #[test]
    fn test_display() {
        let located = entry(DiagnosticSeverity::Warning, DiagnosticCategory::Instruction)
            .with_method("App.Program::Run")
            .with_il_offset(0x1c);
        assert_eq!(located.to_string(), "[WARN] Instruction App.Program::Run@IL_001c: lost");

        let bare = entry(DiagnosticSeverity::Error, DiagnosticCategory::Pass);
        assert_eq!(bare.to_string(), "[ERROR] Pass: lost");
    }

    #[test]
    fn test_concurrent_push() {
        let diagnostics = Arc::new(Diagnostics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let diagnostics = Arc::clone(&diagnostics);
                thread::spawn(move || {
                    for _ in 0..25 {
                        diagnostics.push(entry(DiagnosticSeverity::Warning, DiagnosticCategory::Call));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.warning_count(), 100);
    }
}
