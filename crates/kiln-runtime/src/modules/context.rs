//! Context values: provided to descendants, consumed from ancestors.
//!
//! The runtime keeps no tree of instances. Provided values are readable by
//! the host through [`ContextPort`]; lookups go through the host's
//! [`ContextSource`](crate::caps::ContextSource) capability.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_capabilities::VaultView;
use kiln_core::{ExecPhaseGuard, KilnResult};
use kiln_modules::{ModuleDefinition, ModuleHooks, ModuleInstance};
use serde_json::Value;

use crate::caps::{CONTEXT_SOURCE_CAP, SYS_CAP};

use super::CONTEXT;

struct ContextShared {
    guard: Arc<ExecPhaseGuard>,
    vault: VaultView,
    provided: Mutex<BTreeMap<String, Value>>,
}

impl ContextShared {
    fn provided(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.provided.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Facade of the `context` module.
pub struct Context {
    shared: Arc<ContextShared>,
}

impl Context {
    /// Provide `value` under `key`. Setup only.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn provide(&self, key: impl Into<String>, value: Value) -> KilnResult<()> {
        self.shared.guard.ensure_setup("context.provide")?;
        self.shared.provided().insert(key.into(), value);
        Ok(())
    }

    /// Look `key` up through the host. `None` when the host wired no
    /// context source or the source has no value for `key`.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn consume(&self, key: &str) -> KilnResult<Option<Value>> {
        self.shared.guard.ensure_not_disposed("context.consume")?;
        Ok(self
            .shared
            .vault
            .try_get(&CONTEXT_SOURCE_CAP)
            .and_then(|source| source.lookup(key)))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

/// Host-side port of the `context` module.
pub struct ContextPort {
    shared: Arc<ContextShared>,
}

impl ContextPort {
    /// Value provided under `key`.
    #[must_use]
    pub fn provided(&self, key: &str) -> Option<Value> {
        self.shared.provided().get(key).cloned()
    }

    /// Provided keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared.provided().keys().cloned().collect()
    }
}

impl fmt::Debug for ContextPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPort")
            .field("keys", &self.keys())
            .finish()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(CONTEXT, |ctx| {
        let shared = Arc::new(ContextShared {
            guard: ctx.vault().get(&SYS_CAP)?,
            vault: ctx.vault().clone(),
            provided: Mutex::new(BTreeMap::new()),
        });

        let on_dispose = Arc::clone(&shared);
        let hooks = ModuleHooks::new().on_dispose(move || on_dispose.provided().clear());

        Ok(ModuleInstance::new(Arc::new(Context {
            shared: Arc::clone(&shared),
        }))
        .with_port(Arc::new(ContextPort { shared }))
        .with_hooks(hooks))
    })
}
