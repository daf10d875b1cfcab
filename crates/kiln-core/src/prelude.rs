//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{KilnError, KilnResult};

// Phases
pub use crate::{Domain, ExecPhase, ProtoPhase};

// Guard
pub use crate::{CallbackCtx, ExecPhaseGuard, ExecScope};
