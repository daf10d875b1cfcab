//! Lifecycle and execution phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse lifecycle stage of a component instance.
///
/// Monotonic, except that `Updated` may recur between `Mounted` and
/// `Unmounted`. A phase never reverts to `Setup` or `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtoPhase {
    /// The author's setup function is running.
    Setup,
    /// Setup finished; the first render has not been committed yet.
    Created,
    /// The first commit took visible effect.
    Mounted,
    /// A later commit took visible effect.
    Updated,
    /// Teardown began; the instance is not disposed yet.
    Unmounted,
}

impl ProtoPhase {
    /// Whether the lifecycle may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Setup, Self::Created)
                | (Self::Created, Self::Mounted)
                | (Self::Mounted | Self::Updated, Self::Updated)
                | (Self::Created | Self::Mounted | Self::Updated, Self::Unmounted)
        )
    }

    /// The phases that may legally follow `self`.
    #[must_use]
    pub fn successors(self) -> &'static [Self] {
        match self {
            Self::Setup => &[Self::Created],
            Self::Created => &[Self::Mounted, Self::Unmounted],
            Self::Mounted | Self::Updated => &[Self::Updated, Self::Unmounted],
            Self::Unmounted => &[],
        }
    }

    /// The domain derived from this phase.
    #[must_use]
    pub fn domain(self) -> Domain {
        if self == Self::Setup {
            Domain::Setup
        } else {
            Domain::Runtime
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Created => "created",
            Self::Mounted => "mounted",
            Self::Updated => "updated",
            Self::Unmounted => "unmounted",
        }
    }
}

impl fmt::Display for ProtoPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained execution context, maintained by the runtime driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecPhase {
    /// Inside the author's setup function.
    Setup,
    /// Inside the render function.
    Render,
    /// Inside a user callback (lifecycle callback, event handler, exposed method).
    Callback,
    /// Anywhere else, e.g. a host-driven task between callbacks.
    #[default]
    Unknown,
}

impl ExecPhase {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Render => "render",
            Self::Callback => "callback",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ExecPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Setup-vs-runtime classification, derived from [`ProtoPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// `ProtoPhase::Setup`.
    Setup,
    /// Every other phase.
    Runtime,
}

impl Domain {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Runtime => "runtime",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
