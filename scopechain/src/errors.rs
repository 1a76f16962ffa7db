//! Error types for scoped resolution and pipeline dispatch.
//!
//! Resolution and lifecycle errors are structural defects: a bad
//! registration or a broken chaining protocol. They are never retried.
//! Errors raised by stage logic travel through [`PipelineError::Stage`]
//! untouched.

use thiserror::Error;

/// Raised when a key is registered twice in the same scope.
#[derive(Debug, Clone, Error)]
#[error("Duplicate binding: '{key}' is already registered in scope '{scope}'")]
pub struct DuplicateBindingError {
    /// The key that was already bound.
    pub key: String,
    /// The tag of the scope holding the existing binding.
    pub scope: String,
}

impl DuplicateBindingError {
    /// Creates a new duplicate binding error.
    #[must_use]
    pub fn new(key: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scope: scope.into(),
        }
    }
}

/// Raised when a lookup reaches the root without finding a binding.
#[derive(Debug, Clone, Error)]
#[error("Unresolved binding: '{key}' (searched {})", searched.join(" -> "))]
pub struct UnresolvedBindingError {
    /// The key that could not be resolved.
    pub key: String,
    /// Tags of every scope consulted, innermost first.
    pub searched: Vec<String>,
}

impl UnresolvedBindingError {
    /// Creates a new unresolved binding error.
    #[must_use]
    pub fn new(key: impl Into<String>, searched: Vec<String>) -> Self {
        Self {
            key: key.into(),
            searched,
        }
    }

    /// Returns the number of scopes that were consulted.
    #[must_use]
    pub fn depth_searched(&self) -> usize {
        self.searched.len()
    }
}

/// The specific way a scope's lifecycle was violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleViolation {
    /// `dispose` was called while child scopes were still open.
    OpenChildren(usize),
    /// `dispose` was called on a scope that was already disposed.
    AlreadyDisposed,
    /// The scope was used after it had been disposed.
    Disposed,
    /// Child scopes were dropped without being disposed.
    LeakedChildren(usize),
    /// No enclosing scope carries the tag a per-scope binding needs.
    NoMatchingScope(String),
}

impl std::fmt::Display for LifecycleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenChildren(n) => write!(f, "{n} child scope(s) still open"),
            Self::AlreadyDisposed => write!(f, "scope already disposed"),
            Self::Disposed => write!(f, "scope used after disposal"),
            Self::LeakedChildren(n) => write!(f, "{n} child scope(s) dropped without dispose"),
            Self::NoMatchingScope(tag) => write!(f, "no enclosing scope tagged '{tag}'"),
        }
    }
}

/// Raised when the open/dispose protocol of a scope is broken.
#[derive(Debug, Clone, Error)]
#[error("Scope lifecycle error in '{scope}': {violation}")]
pub struct ScopeLifecycleError {
    /// The tag of the offending scope.
    pub scope: String,
    /// What went wrong.
    pub violation: LifecycleViolation,
}

impl ScopeLifecycleError {
    /// Creates a new lifecycle error.
    #[must_use]
    pub fn new(scope: impl Into<String>, violation: LifecycleViolation) -> Self {
        Self {
            scope: scope.into(),
            violation,
        }
    }
}

/// Any failure raised by the resolution scope tree.
#[derive(Debug, Clone, Error)]
pub enum ScopeError {
    /// A key was registered twice in one scope.
    #[error("{0}")]
    Duplicate(#[from] DuplicateBindingError),

    /// No ancestor had a binding for the key.
    #[error("{0}")]
    Unresolved(#[from] UnresolvedBindingError),

    /// The open/dispose protocol was violated.
    #[error("{0}")]
    Lifecycle(#[from] ScopeLifecycleError),

    /// A binding resolved to an instance of an unexpected type.
    #[error("Type mismatch for '{key}': expected {expected}")]
    TypeMismatch {
        /// The key that was resolved.
        key: String,
        /// The type the caller asked for.
        expected: &'static str,
    },
}

impl ScopeError {
    /// Returns the lifecycle violation, if this is a lifecycle error.
    #[must_use]
    pub fn violation(&self) -> Option<&LifecycleViolation> {
        match self {
            Self::Lifecycle(err) => Some(&err.violation),
            _ => None,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text was not valid JSON for the expected shape.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The error type returned by pipeline dispatch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A resolution or lifecycle defect.
    #[error("{0}")]
    Scope(#[from] ScopeError),

    /// A configuration defect.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The request was cancelled before the chain completed.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// An error raised by stage logic, passed through unchanged.
    #[error(transparent)]
    Stage(#[from] anyhow::Error),
}

impl PipelineError {
    /// Creates a stage error from a message.
    #[must_use]
    pub fn stage(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Stage(anyhow::Error::msg(message))
    }

    /// Returns true if this is a structural scope error.
    #[must_use]
    pub fn is_scope_error(&self) -> bool {
        matches!(self, Self::Scope(_))
    }

    /// Returns the lifecycle violation, if any.
    #[must_use]
    pub fn violation(&self) -> Option<&LifecycleViolation> {
        match self {
            Self::Scope(err) => err.violation(),
            _ => None,
        }
    }
}

impl From<DuplicateBindingError> for PipelineError {
    fn from(err: DuplicateBindingError) -> Self {
        Self::Scope(err.into())
    }
}

impl From<UnresolvedBindingError> for PipelineError {
    fn from(err: UnresolvedBindingError) -> Self {
        Self::Scope(err.into())
    }
}

impl From<ScopeLifecycleError> for PipelineError {
    fn from(err: ScopeLifecycleError) -> Self {
        Self::Scope(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_binding_display() {
        let err = DuplicateBindingError::new("next", "stage:first");
        assert_eq!(
            err.to_string(),
            "Duplicate binding: 'next' is already registered in scope 'stage:first'"
        );
    }

    #[test]
    fn test_unresolved_lists_searched_scopes() {
        let err = UnresolvedBindingError::new(
            "service:db",
            vec!["stage:echo".into(), "request".into(), "root".into()],
        );
        assert_eq!(err.depth_searched(), 3);
        assert!(err.to_string().contains("stage:echo -> request -> root"));
    }

    #[test]
    fn test_lifecycle_display() {
        let err = ScopeLifecycleError::new("request", LifecycleViolation::OpenChildren(2));
        assert!(err.to_string().contains("2 child scope(s) still open"));
    }

    #[test]
    fn test_pipeline_error_violation() {
        let err: PipelineError =
            ScopeLifecycleError::new("request", LifecycleViolation::AlreadyDisposed).into();
        assert!(err.is_scope_error());
        assert_eq!(err.violation(), Some(&LifecycleViolation::AlreadyDisposed));
    }

    #[test]
    fn test_stage_error_is_transparent() {
        let err = PipelineError::stage("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_scope_error());
    }
}
