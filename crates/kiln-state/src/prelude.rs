//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_state::prelude::*;` to import all essential types.

// Specs and values
pub use crate::{StateSpec, StateType, StateValue};

// Cells
pub use crate::{OwnedStateHandle, StateChange, StateStore};
