//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_runtime::prelude::*;` to import all essential types.

// Driver
pub use crate::{ComponentCtx, ComponentInstance, Prototype, RuntimeOptions};

// Host contract
pub use crate::{CommitSignal, Host, ScheduledTask, View, WiringApi};

// Capabilities wired by hosts
pub use crate::{
    CONTEXT_SOURCE_CAP, ContextSource, EVENT_GATE_CAP, EventGate, GLOBAL_NODE_CAP,
    ROOT_NODE_CAP, TRIGGER_SINK_CAP, TriggerSignal, TriggerSink,
};

// Events
pub use crate::EventListenerToken;
