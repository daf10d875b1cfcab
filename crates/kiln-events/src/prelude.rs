//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_events::prelude::*;` to import all essential types.

// Events
pub use crate::{CustomEvent, NativeEvent, NativeEventKind, RoutedEvent};

// Nodes and mapping
pub use crate::{MappingRule, MappingTable, PlatformNode, TargetKind};

// Router
pub use crate::{EventListener, EventRouter, ListenerId, RouterTarget};
