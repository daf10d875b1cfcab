//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_modules::prelude::*;` to import all essential types.

// Definitions and instances
pub use crate::{ModuleCtx, ModuleDefinition, ModuleHooks, ModuleInstance, ModuleScope};

// Assembly
pub use crate::{DependencyResolver, ModuleOrchestrator, ModuleRegistry};
