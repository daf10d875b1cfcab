//! Author lifecycle callbacks.
//!
//! Callbacks are declared during setup and run by the driver after the
//! modules saw the matching phase, each inside its own callback scope.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_core::{ExecPhaseGuard, KilnResult, ProtoPhase};
use kiln_modules::{ModuleDefinition, ModuleHooks, ModuleInstance};
use tracing::debug;

use crate::caps::SYS_CAP;

use super::LIFECYCLE;

/// A lifecycle callback.
pub type LifecycleCallback = Arc<dyn Fn() -> KilnResult<()> + Send + Sync>;

struct LifecycleShared {
    guard: Arc<ExecPhaseGuard>,
    callbacks: Mutex<HashMap<ProtoPhase, Vec<LifecycleCallback>>>,
}

impl LifecycleShared {
    fn callbacks(&self) -> MutexGuard<'_, HashMap<ProtoPhase, Vec<LifecycleCallback>>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, op: &str, phase: ProtoPhase, callback: LifecycleCallback) -> KilnResult<()> {
        self.guard.ensure_setup(op)?;
        self.callbacks().entry(phase).or_default().push(callback);
        Ok(())
    }
}

/// Facade of the `lifecycle` module.
pub struct Lifecycle {
    shared: Arc<LifecycleShared>,
}

impl Lifecycle {
    /// Run `callback` once setup has finished, before the first render.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn on_created(
        &self,
        callback: impl Fn() -> KilnResult<()> + Send + Sync + 'static,
    ) -> KilnResult<()> {
        self.shared
            .register("lifecycle.on_created", ProtoPhase::Created, Arc::new(callback))
    }

    /// Run `callback` once the first commit took visible effect.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn on_mounted(
        &self,
        callback: impl Fn() -> KilnResult<()> + Send + Sync + 'static,
    ) -> KilnResult<()> {
        self.shared
            .register("lifecycle.on_mounted", ProtoPhase::Mounted, Arc::new(callback))
    }

    /// Run `callback` after every later commit.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn on_updated(
        &self,
        callback: impl Fn() -> KilnResult<()> + Send + Sync + 'static,
    ) -> KilnResult<()> {
        self.shared
            .register("lifecycle.on_updated", ProtoPhase::Updated, Arc::new(callback))
    }

    /// Run `callback` when teardown begins. State is still readable and
    /// writable while it runs.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn on_unmounted(
        &self,
        callback: impl Fn() -> KilnResult<()> + Send + Sync + 'static,
    ) -> KilnResult<()> {
        self.shared
            .register("lifecycle.on_unmounted", ProtoPhase::Unmounted, Arc::new(callback))
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").finish_non_exhaustive()
    }
}

/// Port of the `lifecycle` module, used by the driver.
pub struct LifecyclePort {
    shared: Arc<LifecycleShared>,
}

impl LifecyclePort {
    /// Run the callbacks declared for `phase`, in declaration order. The
    /// first error aborts the rest and is returned.
    ///
    /// # Errors
    ///
    /// Whatever a callback returned.
    pub fn run(&self, phase: ProtoPhase) -> KilnResult<()> {
        let callbacks: Vec<LifecycleCallback> = self
            .shared
            .callbacks()
            .get(&phase)
            .cloned()
            .unwrap_or_default();
        if callbacks.is_empty() {
            return Ok(());
        }

        debug!(phase = %phase, count = callbacks.len(), "Running lifecycle callbacks");
        for callback in callbacks {
            let _scope = self.shared.guard.enter_callback();
            callback()?;
        }
        Ok(())
    }

    /// Number of callbacks declared for `phase`.
    #[must_use]
    pub fn count(&self, phase: ProtoPhase) -> usize {
        self.shared.callbacks().get(&phase).map_or(0, Vec::len)
    }
}

impl fmt::Debug for LifecyclePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecyclePort").finish_non_exhaustive()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(LIFECYCLE, |ctx| {
        let shared = Arc::new(LifecycleShared {
            guard: ctx.vault().get(&SYS_CAP)?,
            callbacks: Mutex::new(HashMap::new()),
        });

        let on_dispose = Arc::clone(&shared);
        let hooks = ModuleHooks::new().on_dispose(move || on_dispose.callbacks().clear());

        Ok(ModuleInstance::new(Arc::new(Lifecycle {
            shared: Arc::clone(&shared),
        }))
        .with_port(Arc::new(LifecyclePort { shared }))
        .with_hooks(hooks))
    })
}
