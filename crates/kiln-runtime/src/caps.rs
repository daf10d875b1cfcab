//! Well-known capability tokens and the value types behind them.

use std::fmt;
use std::sync::Arc;

use kiln_capabilities::CapabilityToken;
use kiln_core::{ExecPhaseGuard, KilnResult};
use kiln_events::{NativeEvent, PlatformNode};

use crate::host::Host;

/// The instance's phase guard. Installed in the base layer at bootstrap.
pub const SYS_CAP: CapabilityToken<ExecPhaseGuard> = CapabilityToken::new("@kiln/runtime/sys");

/// The host collaborator. Installed in the base layer at bootstrap.
pub const HOST_CAP: CapabilityToken<Arc<dyn Host>> = CapabilityToken::new("@kiln/runtime/host");

/// Real node backing the root event target. Supplied by host wiring.
pub const ROOT_NODE_CAP: CapabilityToken<Arc<dyn PlatformNode>> =
    CapabilityToken::new("@kiln/event/root-node");

/// Real node backing the global event target. Supplied by host wiring.
pub const GLOBAL_NODE_CAP: CapabilityToken<Arc<dyn PlatformNode>> =
    CapabilityToken::new("@kiln/event/global-node");

/// Optional enable/disable switch for event delivery. Absent means enabled.
pub const EVENT_GATE_CAP: CapabilityToken<EventGate> = CapabilityToken::new("@kiln/event/gate");

/// Where `context.consume` looks values up.
pub const CONTEXT_SOURCE_CAP: CapabilityToken<Arc<dyn ContextSource>> =
    CapabilityToken::new("@kiln/context/source");

/// Receives `as-trigger` activations.
pub const TRIGGER_SINK_CAP: CapabilityToken<Arc<dyn TriggerSink>> =
    CapabilityToken::new("@kiln/trigger/sink");

/// Live predicate deciding whether events are delivered.
#[derive(Clone)]
pub struct EventGate {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl EventGate {
    /// Gate backed by `predicate`, evaluated on every dispatch.
    pub fn new(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the predicate.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        (self.predicate)()
    }
}

impl fmt::Debug for EventGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Host-side lookup of context values provided by ancestors.
pub trait ContextSource: Send + Sync {
    /// The value provided under `key`, if any.
    fn lookup(&self, key: &str) -> Option<serde_json::Value>;
}

/// An `as-trigger` activation.
#[derive(Debug, Clone)]
pub struct TriggerSignal {
    /// Prototype name of the triggering component.
    pub prototype: String,
    /// The native event that committed the press.
    pub event: Arc<NativeEvent>,
}

/// Host-side receiver of trigger activations.
pub trait TriggerSink: Send + Sync {
    /// Handle one activation. Errors propagate to the native dispatch.
    ///
    /// # Errors
    ///
    /// Whatever the host reports.
    fn trigger(&self, signal: TriggerSignal) -> KilnResult<()>;
}
