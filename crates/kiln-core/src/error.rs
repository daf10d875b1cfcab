//! Runtime error types for kiln operations.
//!
//! Every failure in the runtime core is synchronous and fail-fast. Errors are
//! returned unmodified to whatever triggered the operation (setup execution, a
//! lifecycle callback, a scheduled render or a native event dispatch).

use thiserror::Error;

/// Errors raised by the component runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KilnError {
    // Capability errors
    /// A capability was looked up but is missing from both vault layers.
    #[error("capability unavailable: {token_id} ({context})")]
    CapUnavailable {
        /// Identifier of the missing capability.
        token_id: String,
        /// Where the lookup happened, or why it failed.
        context: String,
    },

    /// A capability identifier does not follow `@scope/feature/name`.
    #[error("invalid capability id: {id}")]
    InvalidCapabilityId {
        /// The rejected identifier.
        id: String,
    },

    // Assembly errors
    /// A hard dependency names a module absent from the assembly list.
    #[error("module '{module}' depends on missing module '{dependency}'")]
    MissingModuleDependency {
        /// The module that declared the dependency.
        module: String,
        /// The missing module.
        dependency: String,
    },

    /// The module dependency graph contains a cycle.
    #[error("dependency cycle: {}", modules.join(" -> "))]
    DependencyCycle {
        /// The cycle path; the first module is repeated at the end.
        modules: Vec<String>,
    },

    /// A module asked for a dependency it never declared.
    #[error("module '{module}' did not declare a dependency on '{dependency}'")]
    UndeclaredDependency {
        /// The module performing the lookup.
        module: String,
        /// The undeclared dependency.
        dependency: String,
    },

    /// Two module definitions share a name.
    #[error("duplicate module: {name}")]
    DuplicateModule {
        /// The duplicated name.
        name: String,
    },

    /// A facade or port was requested with the wrong type.
    #[error("module '{module}' does not expose a {expected}")]
    ModuleTypeMismatch {
        /// The module that was queried.
        module: String,
        /// The requested type name.
        expected: String,
    },

    // Phase errors
    /// An operation was attempted outside of its legal phase or domain.
    #[error("{op} is not allowed during {actual} (expected one of: {})", expected.join(", "))]
    ExecPhaseViolation {
        /// The attempted operation.
        op: String,
        /// The phase or domain in effect.
        actual: String,
        /// The phases or domains that would have been legal.
        expected: Vec<String>,
    },

    /// An operation was attempted after the instance was disposed.
    #[error("{op} called after dispose")]
    Disposed {
        /// The attempted operation.
        op: String,
    },

    // State errors
    /// A state value or default does not satisfy its declared spec.
    #[error("state spec violation ({kind}): {detail}")]
    StateSpecViolation {
        /// The spec kind (`bool`, `enum`, `string`, `number.range`, `number.discrete`).
        kind: String,
        /// Why the value was rejected.
        detail: String,
    },

    // Event errors
    /// A registration targets a platform node the host never supplied.
    #[error("event target unavailable: {kind}")]
    EventTargetUnavailable {
        /// The target kind (`root` or `global`).
        kind: String,
    },
}

impl KilnError {
    /// Stable error code, independent of the Rust variant name.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CapUnavailable { .. } => "CAP_UNAVAILABLE",
            Self::InvalidCapabilityId { .. } => "INVALID_CAPABILITY_ID",
            Self::MissingModuleDependency { .. } => "MISSING_MODULE_DEPENDENCY",
            Self::DependencyCycle { .. } => "DEPENDENCY_CYCLE",
            Self::UndeclaredDependency { .. } => "UNDECLARED_DEPENDENCY",
            Self::DuplicateModule { .. } => "DUPLICATE_MODULE",
            Self::ModuleTypeMismatch { .. } => "MODULE_TYPE_MISMATCH",
            Self::ExecPhaseViolation { .. } => "EXEC_PHASE_VIOLATION",
            Self::Disposed { .. } => "DISPOSED",
            Self::StateSpecViolation { .. } => "STATE_SPEC_VIOLATION",
            Self::EventTargetUnavailable { .. } => "EVENT_TARGET_UNAVAILABLE",
        }
    }

    /// Shorthand for [`KilnError::Disposed`].
    #[must_use]
    pub fn disposed(op: impl Into<String>) -> Self {
        Self::Disposed { op: op.into() }
    }

    /// Shorthand for [`KilnError::StateSpecViolation`].
    #[must_use]
    pub fn state_spec(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::StateSpecViolation {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// Check if this error means the instance has been torn down.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}

/// Result type for runtime operations.
pub type KilnResult<T> = Result<T, KilnError>;
