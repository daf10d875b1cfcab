//! Typed handles over state cells.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use kiln_core::{KilnError, KilnResult};

use crate::cell::{StateCell, StateChange, WatchSubscription};
use crate::spec::StateSpec;
use crate::value::StateType;

/// Author-facing handle to a state cell holding a `V`.
pub struct OwnedStateHandle<V> {
    cell: Arc<StateCell>,
    _type: PhantomData<fn() -> V>,
}

impl<V: StateType> OwnedStateHandle<V> {
    pub(crate) fn new(cell: Arc<StateCell>) -> Self {
        Self {
            cell,
            _type: PhantomData,
        }
    }

    /// Cell name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Declared spec.
    #[must_use]
    pub fn spec(&self) -> &StateSpec {
        self.cell.spec()
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn get(&self) -> KilnResult<V> {
        let value = self.cell.get()?;
        V::from_value(&value).ok_or_else(|| {
            KilnError::state_spec(
                self.cell.spec().kind(),
                format!("stored {} does not match the handle type", value.type_name()),
            )
        })
    }

    /// Replace the initial value during setup.
    ///
    /// # Errors
    ///
    /// See [`StateCell::set_default`].
    pub fn set_default(&self, value: V) -> KilnResult<()> {
        self.cell.set_default(value.into_value())
    }

    /// Set a new value at runtime.
    ///
    /// # Errors
    ///
    /// See [`StateCell::set`].
    pub fn set(&self, value: V) -> KilnResult<()> {
        self.cell.set(value.into_value(), None)
    }

    /// Set a new value, recording why.
    ///
    /// # Errors
    ///
    /// See [`StateCell::set`].
    pub fn set_with_reason(&self, value: V, reason: &str) -> KilnResult<()> {
        self.cell.set(value.into_value(), Some(reason))
    }

    /// Watch changes to this cell.
    pub fn watch(&self, watcher: impl Fn(&StateChange) + Send + Sync + 'static) -> WatchSubscription {
        self.cell.watch(watcher)
    }

    /// The underlying untyped cell.
    #[must_use]
    pub fn cell(&self) -> &Arc<StateCell> {
        &self.cell
    }
}

impl<V> Clone for OwnedStateHandle<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _type: PhantomData,
        }
    }
}

impl<V> fmt::Debug for OwnedStateHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedStateHandle").field(&self.cell).finish()
    }
}
