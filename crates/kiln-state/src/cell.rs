//! Untyped state cells and change watchers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use kiln_core::{ExecPhase, ExecPhaseGuard, KilnResult};
use tracing::trace;

use crate::spec::StateSpec;
use crate::value::StateValue;

/// A committed change to a state cell.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Name of the cell.
    pub name: String,
    /// Value before the change.
    pub previous: StateValue,
    /// Value after the change.
    pub current: StateValue,
    /// Optional caller-supplied reason.
    pub reason: Option<String>,
}

/// Callback invoked after a cell's value changed.
pub type StateWatcher = Arc<dyn Fn(&StateChange) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Watchers {
    list: Mutex<Vec<(u64, StateWatcher)>>,
    next_id: AtomicU64,
}

impl Watchers {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, StateWatcher)>> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe(self: &Arc<Self>, watcher: StateWatcher) -> WatchSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, watcher));
        WatchSubscription {
            id,
            watchers: Arc::downgrade(self),
        }
    }

    pub(crate) fn notify(&self, change: &StateChange) {
        let snapshot: Vec<StateWatcher> = self.lock().iter().map(|(_, w)| Arc::clone(w)).collect();
        for watcher in snapshot {
            watcher(change);
        }
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

/// Handle returned by `watch`; dropping it keeps the watcher registered.
pub struct WatchSubscription {
    id: u64,
    watchers: Weak<Watchers>,
}

impl WatchSubscription {
    /// Remove the watcher. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(watchers) = self.watchers.upgrade() {
            watchers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSubscription").field("id", &self.id).finish()
    }
}

/// One named, spec-validated value owned by a component instance.
pub struct StateCell {
    name: String,
    spec: StateSpec,
    guard: Arc<ExecPhaseGuard>,
    value: Mutex<StateValue>,
    own_watchers: Arc<Watchers>,
    store_watchers: Arc<Watchers>,
}

impl StateCell {
    pub(crate) fn new(
        name: String,
        spec: StateSpec,
        guard: Arc<ExecPhaseGuard>,
        initial: StateValue,
        store_watchers: Arc<Watchers>,
    ) -> Self {
        Self {
            name,
            spec,
            guard,
            value: Mutex::new(initial),
            own_watchers: Arc::default(),
            store_watchers,
        }
    }

    fn value_lock(&self) -> MutexGuard<'_, StateValue> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cell name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared spec.
    #[must_use]
    pub fn spec(&self) -> &StateSpec {
        &self.spec
    }

    /// Current value. Legal in both domains until disposal.
    ///
    /// # Errors
    ///
    /// Returns [`kiln_core::KilnError::Disposed`] after disposal.
    pub fn get(&self) -> KilnResult<StateValue> {
        self.guard.ensure_not_disposed("state.get")?;
        Ok(self.value_lock().clone())
    }

    /// Replace the initial value. Legal only during setup.
    ///
    /// # Errors
    ///
    /// `Disposed`, `ExecPhaseViolation` outside setup, or
    /// `StateSpecViolation` if the value does not satisfy the spec.
    pub fn set_default(&self, value: StateValue) -> KilnResult<()> {
        self.guard.ensure_setup("state.set_default")?;
        let accepted = self.spec.validate(value)?;
        *self.value_lock() = accepted;
        Ok(())
    }

    /// Set a new value. Legal in the runtime domain, outside render.
    ///
    /// Watchers run after the value is stored, and only if it changed.
    ///
    /// # Errors
    ///
    /// `Disposed`, `ExecPhaseViolation` during setup or render, or
    /// `StateSpecViolation`; in every error case the stored value is
    /// unchanged.
    pub fn set(&self, value: StateValue, reason: Option<&str>) -> KilnResult<()> {
        self.guard.ensure_runtime("state.set")?;
        self.guard
            .ensure_exec_phase("state.set", &[ExecPhase::Callback, ExecPhase::Unknown])?;
        let accepted = self.spec.validate(value)?;

        let previous = {
            let mut current = self.value_lock();
            if *current == accepted {
                trace!(state = %self.name, "State unchanged");
                return Ok(());
            }
            std::mem::replace(&mut *current, accepted.clone())
        };

        trace!(state = %self.name, %previous, current = %accepted, reason, "State changed");
        let change = StateChange {
            name: self.name.clone(),
            previous,
            current: accepted,
            reason: reason.map(ToOwned::to_owned),
        };
        self.own_watchers.notify(&change);
        self.store_watchers.notify(&change);
        Ok(())
    }

    /// Watch changes to this cell only.
    pub fn watch(&self, watcher: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchSubscription {
        self.own_watchers.subscribe(Arc::new(watcher))
    }

    pub(crate) fn clear_watchers(&self) {
        self.own_watchers.clear();
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("value", &*self.value_lock())
            .finish_non_exhaustive()
    }
}
