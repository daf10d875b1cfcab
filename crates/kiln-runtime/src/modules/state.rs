//! Owned state, backed by a per-instance [`StateStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_core::KilnResult;
use kiln_modules::{ModuleDefinition, ModuleHooks, ModuleInstance};
use kiln_state::{
    OwnedStateHandle, StateCell, StateChange, StateSpec, StateStore, StateType, StateValue,
    WatchSubscription,
};
use tracing::debug;

use crate::caps::SYS_CAP;

use super::STATE;

/// Facade of the `state` module.
#[derive(Debug)]
pub struct StateModule {
    store: Arc<StateStore>,
}

impl StateModule {
    /// Declare an owned state cell. Setup only.
    ///
    /// # Errors
    ///
    /// See [`StateStore::owned`].
    pub fn owned<V: StateType>(
        &self,
        name: impl Into<String>,
        spec: StateSpec,
        default: V,
    ) -> KilnResult<OwnedStateHandle<V>> {
        self.store.owned(name, spec, default)
    }

    /// Current value of every declared cell.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn snapshot(&self) -> KilnResult<BTreeMap<String, StateValue>> {
        self.store.snapshot()
    }

    /// Declared cell names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.store.names()
    }
}

/// Port of the `state` module.
#[derive(Debug)]
pub struct StatePort {
    store: Arc<StateStore>,
}

impl StatePort {
    /// Watch every cell in the instance.
    pub fn watch(&self, watcher: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchSubscription {
        self.store.watch(watcher)
    }

    /// Look up a declared cell.
    #[must_use]
    pub fn cell(&self, name: &str) -> Option<Arc<StateCell>> {
        self.store.cell(name)
    }

    /// Current value of every declared cell.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn snapshot(&self) -> KilnResult<BTreeMap<String, StateValue>> {
        self.store.snapshot()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(STATE, |ctx| {
        let guard = ctx.vault().get(&SYS_CAP)?;
        let store = Arc::new(StateStore::new(guard));

        let on_dispose = Arc::clone(&store);
        let hooks = ModuleHooks::new().on_dispose(move || {
            debug!(cells = on_dispose.names().len(), "Disposing state store");
            on_dispose.dispose();
        });

        Ok(ModuleInstance::new(Arc::new(StateModule {
            store: Arc::clone(&store),
        }))
        .with_port(Arc::new(StatePort { store }))
        .with_hooks(hooks))
    })
}
