//! Kiln Modules - Capability-scoped modules and their orchestrator.
//!
//! A module is a named unit of behavior built once per component instance.
//! It declares hard and optional dependencies on other modules by name and
//! produces a facade (author API), lifecycle hooks, and an optional port
//! (raw cross-module access).
//!
//! The [`ModuleOrchestrator`] turns an unordered list of
//! [`ModuleDefinition`]s into a [`ModuleRegistry`]:
//!
//! 1. Reject duplicate names and hard dependencies on absent modules
//! 2. Topologically sort with a recursion-stack cycle check
//! 3. Build each module in order, handing it a [`DependencyResolver`] that
//!    only serves declared dependencies
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kiln_capabilities::CapabilityVault;
//! use kiln_modules::{ModuleDefinition, ModuleInstance, ModuleOrchestrator};
//!
//! struct Clock(u64);
//! struct Greeter(String);
//!
//! let clock = ModuleDefinition::new("clock", |_ctx| {
//!     Ok(ModuleInstance::new(Arc::new(Clock(42))))
//! });
//! let greeter = ModuleDefinition::new("greeter", |ctx| {
//!     let clock = ctx.deps().require_facade::<Clock>("clock")?;
//!     Ok(ModuleInstance::new(Arc::new(Greeter(format!("t={}", clock.0)))))
//! })
//! .with_dep("clock");
//!
//! let vault = CapabilityVault::new();
//! let registry = ModuleOrchestrator::new(vec![greeter, clock])
//!     .unwrap()
//!     .assemble(&vault.view())
//!     .unwrap();
//!
//! assert_eq!(registry.names(), ["clock", "greeter"]);
//! assert_eq!(registry.facade::<Greeter>("greeter").unwrap().0, "t=42");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod module;
mod orchestrator;
mod registry;
mod resolver;

pub use module::{
    CreateFn, DisposeHook, ModuleCtx, ModuleDefinition, ModuleHooks, ModuleInstance, ModuleScope,
    PhaseHook,
};
pub use orchestrator::ModuleOrchestrator;
pub use registry::ModuleRegistry;
pub use resolver::DependencyResolver;
