//! Kiln Events - Routes platform events into component-facing channels.
//!
//! The [`EventRouter`] owns two synthetic targets (`root` and `global`)
//! bound to real [`PlatformNode`]s supplied by the host. For each native
//! trigger type it installs at most one real listener per node, lazily and
//! reference-counted, and fans each firing out to three channels:
//!
//! - `native:<type>`: the raw [`NativeEvent`], verbatim
//! - semantic (`press.commit`, `key.down`, ...): a [`CustomEvent`] whose
//!   detail is the same native event, one per matching [`MappingRule`]
//! - `host.<type>`: the raw native event again, on a separate registry
//!
//! A live gate predicate is evaluated on every dispatch; when it reports
//! `false`, nothing is delivered on any channel.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use kiln_events::{
//!     EventListener, EventRouter, MappingTable, NativeEvent, NativeHandler, PlatformNode,
//!     RoutedEvent,
//! };
//!
//! #[derive(Default)]
//! struct Element(Mutex<Vec<(String, NativeHandler)>>);
//!
//! impl PlatformNode for Element {
//!     fn add_native_listener(&self, event_type: &str, handler: NativeHandler) {
//!         self.0.lock().unwrap().push((event_type.to_string(), handler));
//!     }
//!     fn remove_native_listener(&self, event_type: &str, handler: &NativeHandler) {
//!         self.0.lock().unwrap().retain(|(t, h)| t != event_type || !Arc::ptr_eq(h, handler));
//!     }
//! }
//!
//! let element = Arc::new(Element::default());
//! let root: Arc<dyn PlatformNode> = element.clone();
//! let router = EventRouter::new(Some(root), None, MappingTable::builtin(), || true);
//!
//! let pressed = Arc::new(Mutex::new(0));
//! let counter = Arc::clone(&pressed);
//! let listener: EventListener = Arc::new(move |_event: &RoutedEvent| {
//!     *counter.lock().unwrap() += 1;
//!     Ok(())
//! });
//! router.root_target().add_event_listener("press.commit", listener).unwrap();
//!
//! let click = Arc::new(NativeEvent::mouse("click"));
//! let handlers: Vec<NativeHandler> = element.0.lock().unwrap().iter()
//!     .filter(|(t, _)| t == "click")
//!     .map(|(_, h)| Arc::clone(h))
//!     .collect();
//! for handler in handlers {
//!     handler(&click).unwrap();
//! }
//! assert_eq!(*pressed.lock().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod event;
mod mapping;
mod node;
mod router;

pub use event::{
    Channel, CustomEvent, HOST_PREFIX, NATIVE_PREFIX, NativeEvent, NativeEventKind, RoutedEvent,
};
pub use mapping::{DEFAULT_PRESS_KEYS, MappingRule, MappingTable, RuleCondition};
pub use node::{NativeHandler, PlatformNode, TargetKind};
pub use router::{EventListener, EventRouter, GatePredicate, ListenerId, RouterTarget};
