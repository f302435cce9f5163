//! Weaving configuration
//!
//! Controls which safety checks run on generated code and where the weak event runtime
//! helpers are expected to live.

use crate::weaving::names::RUNTIME_NAMESPACE;

/// Configuration for an [`crate::weaving::EventWeaver`] and its [`crate::weaving::ModuleImporter`]
///
/// ```rust
/// use weakevents::weaving::WeavingConfig;
///
/// let config = WeavingConfig::default().with_runtime_namespace("Acme.Weak");
/// assert!(config.verify_generated);
/// assert_eq!(config.runtime_namespace, "Acme.Weak");
/// assert!(!WeavingConfig::unverified().verify_generated);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeavingConfig {
    /// Run the type-flow verifier on every synthesized unsubscribe method (recommended: always true)
    pub verify_generated: bool,

    /// Namespace declaring `WeakEventHandlerExtensions` and `DelegateConvert`
    pub runtime_namespace: String,
}

impl Default for WeavingConfig {
    fn default() -> Self {
        Self {
            verify_generated: true,
            runtime_namespace: RUNTIME_NAMESPACE.to_string(),
        }
    }
}

impl WeavingConfig {
    /// Creates a configuration that skips verification of generated methods
    ///
    /// **Warning**: A body that would fail the runtime's verifier is then only detected
    /// when the woven module is loaded.
    #[must_use]
    pub fn unverified() -> Self {
        Self {
            verify_generated: false,
            ..Self::default()
        }
    }

    /// Use `namespace` for the weak event runtime helpers
    #[must_use]
    pub fn with_runtime_namespace(mut self, namespace: &str) -> Self {
        self.runtime_namespace = namespace.to_string();
        self
    }
}
