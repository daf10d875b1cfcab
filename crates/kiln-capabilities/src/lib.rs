//! Kiln Capabilities - Capability tokens and the capability vault.
//!
//! This crate provides:
//! - Branded, globally-unique [`CapabilityToken`]s (`@scope/feature/name`)
//! - The per-instance, two-layer [`CapabilityVault`] (`base` + `attached`)
//! - A read-only [`VaultView`] handed to module code
//! - Epoch-based change notification
//!
//! # Layers
//!
//! The `base` layer is written once by the runtime driver at bootstrap and is
//! only cleared by a full reset. The `attached` layer belongs to the host
//! wiring and can be reset independently. Lookups check `attached` first.
//!
//! # Example
//!
//! ```
//! use kiln_capabilities::{CapabilityToken, CapabilityVault};
//!
//! const GREETING: CapabilityToken<String> = CapabilityToken::new("@demo/greeting/text");
//!
//! let vault = CapabilityVault::new();
//! vault.attach(vec![GREETING.entry("hello".to_string())]);
//!
//! assert!(vault.has(&GREETING));
//! assert_eq!(vault.get(&GREETING).unwrap().as_str(), "hello");
//! assert_eq!(vault.epoch(), 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod token;
mod vault;

pub use token::{CapEntry, CapabilityToken};
pub use vault::{CapabilityVault, ChangeListener, ChangeSubscription, VaultView};
