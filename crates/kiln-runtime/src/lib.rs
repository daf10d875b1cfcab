//! Kiln Runtime - Drives a component instance through its lifecycle.
//!
//! This crate provides:
//! - The [`Host`] contract an embedding implements (props, commits, scheduling)
//! - [`Prototype`] definitions and the [`ComponentInstance`] driver
//! - Built-in modules: `props`, `state`, `lifecycle`, `event`, `expose`,
//!   `context` and `as-trigger`
//! - Well-known capability tokens the host wires (platform nodes, event
//!   gate, context source, trigger sink)
//!
//! # Lifecycle
//!
//! Mounting installs the phase guard and host as base capabilities,
//! assembles the modules, calls [`Host::on_runtime_ready`], runs setup,
//! enters `created`, and commits the first render. Each
//! [`CommitSignal::done`] then moves the instance to `mounted` or `updated`.
//! [`ComponentInstance::unmount`] runs the `unmounted` phase with the
//! instance still live, then disposes it.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use kiln_core::{KilnResult, ProtoPhase};
//! use kiln_runtime::{
//!     CommitSignal, ComponentInstance, Host, Prototype, RuntimeOptions, ScheduledTask, View,
//! };
//! use kiln_state::StateSpec;
//!
//! #[derive(Default)]
//! struct InlineHost {
//!     views: Mutex<Vec<View>>,
//! }
//!
//! impl Host for InlineHost {
//!     fn prototype_name(&self) -> &str {
//!         "counter"
//!     }
//!     fn raw_props(&self) -> serde_json::Value {
//!         serde_json::json!({ "label": "Clicks" })
//!     }
//!     fn commit(&self, view: View, signal: CommitSignal) {
//!         self.views.lock().unwrap().push(view);
//!         signal.done().unwrap();
//!     }
//!     fn schedule(&self, task: ScheduledTask) {
//!         task().unwrap();
//!     }
//! }
//!
//! let prototype = Prototype::new(
//!     "counter",
//!     |ctx| ctx.state().owned("count", StateSpec::range(0.0, 10.0, true), 0.0),
//!     |ctx, count| {
//!         let label = ctx.props().get("label")?.unwrap_or_default();
//!         Ok(serde_json::json!({ "label": label, "count": count.get()? }))
//!     },
//! );
//!
//! let host = Arc::new(InlineHost::default());
//! let instance = ComponentInstance::mount(&prototype, host.clone(), RuntimeOptions::default())
//!     .unwrap();
//! assert_eq!(instance.proto_phase(), ProtoPhase::Mounted);
//!
//! instance.unmount().unwrap();
//! assert!(instance.is_disposed());
//! assert_eq!(host.views.lock().unwrap()[0]["count"], 0.0);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod caps;
pub mod config_bridge;
pub mod modules;
pub mod prelude;

mod ctx;
mod host;
mod instance;
mod options;
mod prototype;

#[cfg(test)]
mod testing;

pub use caps::{
    CONTEXT_SOURCE_CAP, ContextSource, EVENT_GATE_CAP, EventGate, GLOBAL_NODE_CAP, HOST_CAP,
    ROOT_NODE_CAP, SYS_CAP, TRIGGER_SINK_CAP, TriggerSignal, TriggerSink,
};
pub use ctx::ComponentCtx;
pub use host::{CommitSignal, Host, ScheduledTask, View, WiringApi};
pub use instance::ComponentInstance;
pub use modules::event::EventListenerToken;
pub use options::RuntimeOptions;
pub use prototype::{Prototype, RenderFn, SetupFn};
