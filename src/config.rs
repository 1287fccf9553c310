//! Configuration for the translation pipeline.
//!
//! This module provides the knobs that control method translation and the rewrite
//! passes that follow it: which corrective casts are inserted, whether 64-bit integer
//! arithmetic is emulated, and the limits that guard against runaway recursion.

/// Configuration for method translation and the rewrite pipeline.
///
/// A single instance is shared read-only by every method translation, so all fields
/// are plain values.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Insert representation-correcting casts around translated expressions (default: true).
    ///
    /// When disabled, every auto-cast scope behaves as if suppressed, which is only useful
    /// for inspecting the raw translation.
    pub auto_cast: bool,

    /// Lower 64-bit integer arithmetic and conversions to emulation intrinsics (default: true).
    ///
    /// Script runtimes without a native 64-bit integer type need this.
    pub emulate_int64: bool,

    /// Run the call replacement hooks during translation rather than only in the
    /// intrinsics pass (default: true).
    pub early_intrinsics: bool,

    /// Maximum nesting depth of the instruction tree (default: 512).
    pub max_recursion_depth: usize,

    /// Maximum number of times a single subtree may be rewritten by one pass (default: 64).
    pub max_rewrites_per_node: usize,

    /// Maximum number of full pass-pipeline iterations per method (default: 4).
    pub max_pass_iterations: usize,

    /// Translate methods on the rayon thread pool (default: true).
    pub parallel: bool,

    /// Message thrown by stub bodies that replace methods which failed to translate.
    pub stub_message: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            auto_cast: true,
            emulate_int64: true,
            early_intrinsics: true,
            max_recursion_depth: 512,
            max_rewrites_per_node: 64,
            max_pass_iterations: 4,
            parallel: true,
            stub_message: "Method could not be translated".to_string(),
        }
    }
}

impl TranslatorConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for runtimes with native 64-bit integers.
    ///
    /// Identical to the default, except that 64-bit arithmetic is emitted directly.
    #[must_use]
    pub fn native_int64() -> Self {
        Self {
            emulate_int64: false,
            ..Self::default()
        }
    }

    /// Creates a configuration that emits the translator's raw output.
    ///
    /// This configuration uses:
    /// - No automatic casts
    /// - No early call replacement
    /// - Sequential translation
    ///
    /// Intended for debugging translation rules in isolation.
    #[must_use]
    pub fn raw() -> Self {
        Self {
            auto_cast: false,
            early_intrinsics: false,
            parallel: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranslatorConfig::default();
        assert!(config.auto_cast);
        assert!(config.emulate_int64);
        assert!(config.early_intrinsics);
        assert_eq!(config.max_recursion_depth, 512);
    }

    #[test]
    fn test_presets() {
        assert!(!TranslatorConfig::native_int64().emulate_int64);
        let raw = TranslatorConfig::raw();
        assert!(!raw.auto_cast);
        assert!(!raw.early_intrinsics);
        assert!(!raw.parallel);
    }
}
