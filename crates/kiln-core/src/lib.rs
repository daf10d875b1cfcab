//! Kiln Core - Foundation types for the kiln component runtime.
//!
//! This crate provides:
//! - The [`KilnError`] taxonomy shared by every runtime crate
//! - Lifecycle phases ([`ProtoPhase`]), fine-grained execution phases
//!   ([`ExecPhase`]) and the derived [`Domain`]
//! - The [`ExecPhaseGuard`], the single source of truth for which operations
//!   are legal at any instant, including after teardown
//!
//! # Example
//!
//! ```rust
//! use kiln_core::{Domain, ExecPhase, ExecPhaseGuard, ProtoPhase};
//!
//! let guard = ExecPhaseGuard::new();
//! assert_eq!(guard.domain(), Domain::Setup);
//!
//! guard.transition(ProtoPhase::Created).unwrap();
//! assert_eq!(guard.domain(), Domain::Runtime);
//!
//! {
//!     let _scope = guard.enter(ExecPhase::Render);
//!     assert!(guard.ensure_exec_phase("render", &[ExecPhase::Render]).is_ok());
//! }
//! assert_eq!(guard.exec_phase(), ExecPhase::Unknown);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod guard;
pub mod phase;

pub use error::{KilnError, KilnResult};
pub use guard::{CallbackCtx, ExecPhaseGuard, ExecScope};
pub use phase::{Domain, ExecPhase, ProtoPhase};
