//! Kiln State - Spec-validated owned state for component instances.
//!
//! A component declares state during setup with a [`StateSpec`] describing
//! which values are valid. The returned [`OwnedStateHandle`] enforces the
//! phase policy through the instance's [`kiln_core::ExecPhaseGuard`]:
//!
//! - `get()` is legal in both domains until disposal
//! - `set_default()` is legal only during setup
//! - `set()` is legal only in the runtime domain and never during render
//!
//! Every mutating entry point validates against the spec first; a rejected
//! value never overwrites the stored one.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kiln_core::{ExecPhaseGuard, ProtoPhase};
//! use kiln_state::{StateSpec, StateStore};
//!
//! let guard = Arc::new(ExecPhaseGuard::new());
//! let store = StateStore::new(Arc::clone(&guard));
//! let size = store
//!     .owned("size", StateSpec::enumeration(["s", "m", "l"]), "m".to_string())
//!     .unwrap();
//!
//! guard.transition(ProtoPhase::Created).unwrap();
//! size.set("l".to_string()).unwrap();
//! assert!(size.set("xl".to_string()).is_err());
//! assert_eq!(size.get().unwrap(), "l");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod cell;
mod handle;
mod spec;
mod store;
mod value;

pub use cell::{StateCell, StateChange, StateWatcher, WatchSubscription};
pub use handle::OwnedStateHandle;
pub use spec::{DiscreteSpec, StateSpec};
pub use store::StateStore;
pub use value::{StateType, StateValue};
