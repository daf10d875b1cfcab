//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_capabilities::prelude::*;` to import all essential types.

// Tokens
pub use crate::{CapEntry, CapabilityToken};

// Vault
pub use crate::{CapabilityVault, ChangeListener, ChangeSubscription, VaultView};
