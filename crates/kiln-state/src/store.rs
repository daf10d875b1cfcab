//! Per-instance collection of state cells.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_core::{ExecPhaseGuard, KilnError, KilnResult};
use tracing::debug;

use crate::cell::{StateCell, StateChange, WatchSubscription, Watchers};
use crate::handle::OwnedStateHandle;
use crate::spec::StateSpec;
use crate::value::{StateType, StateValue};

/// Every state cell declared by one component instance.
pub struct StateStore {
    guard: Arc<ExecPhaseGuard>,
    cells: Mutex<BTreeMap<String, Arc<StateCell>>>,
    watchers: Arc<Watchers>,
}

impl StateStore {
    /// Create an empty store governed by `guard`.
    #[must_use]
    pub fn new(guard: Arc<ExecPhaseGuard>) -> Self {
        Self {
            guard,
            cells: Mutex::new(BTreeMap::new()),
            watchers: Arc::default(),
        }
    }

    fn cells(&self) -> MutexGuard<'_, BTreeMap<String, Arc<StateCell>>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare an owned state cell. Legal only during setup.
    ///
    /// # Errors
    ///
    /// `Disposed`, `ExecPhaseViolation` outside setup, or
    /// `StateSpecViolation` if the default does not satisfy `spec` or the
    /// name is already taken.
    pub fn owned<V: StateType>(
        &self,
        name: impl Into<String>,
        spec: StateSpec,
        default: V,
    ) -> KilnResult<OwnedStateHandle<V>> {
        let name = name.into();
        self.guard.ensure_setup("state.owned")?;
        let initial = spec.validate(default.into_value())?;

        let mut cells = self.cells();
        if cells.contains_key(&name) {
            return Err(KilnError::state_spec(
                spec.kind(),
                format!("state '{name}' is already declared"),
            ));
        }
        debug!(state = %name, kind = spec.kind(), "State declared");
        let cell = Arc::new(StateCell::new(
            name.clone(),
            spec,
            Arc::clone(&self.guard),
            initial,
            Arc::clone(&self.watchers),
        ));
        cells.insert(name, Arc::clone(&cell));
        Ok(OwnedStateHandle::new(cell))
    }

    /// Look up a declared cell.
    #[must_use]
    pub fn cell(&self, name: &str) -> Option<Arc<StateCell>> {
        self.cells().get(name).cloned()
    }

    /// Declared names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.cells().keys().cloned().collect()
    }

    /// Current value of every cell.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn snapshot(&self) -> KilnResult<BTreeMap<String, StateValue>> {
        self.guard.ensure_not_disposed("state.snapshot")?;
        let cells: Vec<Arc<StateCell>> = self.cells().values().cloned().collect();
        cells
            .into_iter()
            .map(|cell| Ok((cell.name().to_owned(), cell.get()?)))
            .collect()
    }

    /// Watch changes to every cell in the store.
    pub fn watch(&self, watcher: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchSubscription {
        self.watchers.subscribe(Arc::new(watcher))
    }

    /// Drop every watcher. Cells keep their values; access is governed by the
    /// guard's disposal latch.
    pub fn dispose(&self) {
        self.watchers.clear();
        for cell in self.cells().values() {
            cell.clear_watchers();
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("cells", &self.names())
            .finish_non_exhaustive()
    }
}
