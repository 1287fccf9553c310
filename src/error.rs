use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes a *hard* failure: a violated invariant that makes the current
/// method untranslatable as a whole. Recoverable problems with a single instruction never
/// surface as an [`Error`]; they degrade to an untranslatable placeholder node and a
/// warning in [`crate::Diagnostics`] instead.
///
/// Hard failures are caught exactly once, at the per-method boundary
/// ([`crate::translator::MethodTranslator::translate_or_stub`]), where the method is
/// replaced with a stub body that throws at runtime.
///
/// # Error Categories
///
/// ## Translation Invariants
/// - [`Error::InvalidLValue`] - Assignment target is not a storage location
/// - [`Error::ReferenceRequired`] - A value was supplied where a genuine reference is needed
/// - [`Error::CompoundAssignment`] - Compound assignment shape cannot be reconstructed
/// - [`Error::VariableRedeclared`] - A variable was redeclared with a different type
/// - [`Error::InvalidNode`] - An AST node constructor rejected its operands
///
/// ## Input Errors
/// - [`Error::Malformed`] - The instruction tree is structurally inconsistent
///
/// ## Limits
/// - [`Error::RecursionLimit`] - Maximum recursion depth exceeded
/// - [`Error::RewriteLimit`] - A rewrite pass did not reach a fixed point
///
/// # Examples
///
/// ```rust,ignore
/// use dotscript::{Error, translator::MethodTranslator};
///
/// match translator.translate(&body) {
///     Ok(method) => println!("{} statements", method.body.operands().len()),
///     Err(Error::ReferenceRequired(what)) => eprintln!("needs a reference: {what}"),
///     Err(e) => eprintln!("method aborted: {e}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The instruction tree handed to the translator is damaged.
    ///
    /// Raised when an instruction carries the wrong number of arguments or an operand of
    /// the wrong shape for its opcode. The error includes the source location where the
    /// problem was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The target of an assignment is not a storage location.
    #[error("Invalid assignment target: {0}")]
    InvalidLValue(String),

    /// A value-type receiver or by-ref argument did not resolve to a reference.
    ///
    /// Instance calls on value types operate on the storage location of the receiver.
    /// Passing a copy would silently discard mutations made by the callee.
    #[error("A reference is required: {0}")]
    ReferenceRequired(String),

    /// A compound assignment instruction could not be rebuilt into a compound node.
    #[error("Cannot reconstruct compound assignment: {0}")]
    CompoundAssignment(String),

    /// A variable was declared twice with incompatible types.
    ///
    /// # Fields
    ///
    /// * `name` - Name of the variable
    /// * `existing` - Full name of the type it was first declared with
    /// * `requested` - Full name of the conflicting type
    #[error("Variable '{name}' redeclared as '{requested}' (was '{existing}')")]
    VariableRedeclared {
        /// Variable name
        name: String,
        /// Type of the first declaration
        existing: String,
        /// Type of the conflicting declaration
        requested: String,
    },

    /// An AST node could not be constructed from the given operands.
    ///
    /// Reference wrappers refuse to wrap a node of their own kind, which would otherwise
    /// create unbounded indirection chains.
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Encountered a tree nested deeper than the configured recursion limit.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A rewrite pass kept replacing the same subtree without settling.
    ///
    /// The associated value is the name of the offending pass.
    #[error("Rewrite pass '{0}' exceeded its rewrite limit")]
    RewriteLimit(&'static str),
}
