//! Real platform nodes the router binds native listeners to.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kiln_core::KilnResult;
use serde::{Deserialize, Serialize};

use crate::event::NativeEvent;

/// Native listener installed on a [`PlatformNode`]. Errors propagate back to
/// whoever fired the event.
pub type NativeHandler = Arc<dyn Fn(&Arc<NativeEvent>) -> KilnResult<()> + Send + Sync>;

/// A real event target supplied by the host (an element, a window).
///
/// Handlers are identified by `Arc` pointer identity: removal must only
/// remove the exact handler that was added.
pub trait PlatformNode: Send + Sync {
    /// Start delivering `event_type` events to `handler`.
    fn add_native_listener(&self, event_type: &str, handler: NativeHandler);

    /// Stop delivering `event_type` events to `handler`.
    fn remove_native_listener(&self, event_type: &str, handler: &NativeHandler);
}

/// Which synthetic target a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// The component's root element.
    Root,
    /// The global target (window/document).
    Global,
}

impl TargetKind {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Self::Root),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown event target '{other}', expected 'root' or 'global'")),
        }
    }
}
