//! Values and methods a component exposes to its host.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_core::{ExecPhaseGuard, KilnResult};
use kiln_modules::{ModuleDefinition, ModuleHooks, ModuleInstance};
use serde_json::Value;
use tracing::trace;

use crate::caps::SYS_CAP;

use super::EXPOSE;

/// A method callable by the host through [`ExposePort::call`].
pub type ExposedMethod = Arc<dyn Fn(Value) -> KilnResult<Value> + Send + Sync>;

#[derive(Default)]
struct Exposed {
    values: BTreeMap<String, Value>,
    methods: BTreeMap<String, ExposedMethod>,
}

struct ExposeShared {
    guard: Arc<ExecPhaseGuard>,
    exposed: Mutex<Exposed>,
}

impl ExposeShared {
    fn lock(&self) -> MutexGuard<'_, Exposed> {
        self.exposed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Facade of the `expose` module.
pub struct Expose {
    shared: Arc<ExposeShared>,
}

impl Expose {
    /// Expose a value under `name`. Setup only; a repeated name replaces the
    /// earlier value.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn value(&self, name: impl Into<String>, value: Value) -> KilnResult<()> {
        self.shared.guard.ensure_setup("expose.value")?;
        self.shared.lock().values.insert(name.into(), value);
        Ok(())
    }

    /// Expose a method under `name`. Setup only.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn method<F>(&self, name: impl Into<String>, method: F) -> KilnResult<()>
    where
        F: Fn(Value) -> KilnResult<Value> + Send + Sync + 'static,
    {
        self.shared.guard.ensure_setup("expose.method")?;
        self.shared.lock().methods.insert(name.into(), Arc::new(method));
        Ok(())
    }
}

impl fmt::Debug for Expose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expose").finish_non_exhaustive()
    }
}

/// Host-side port of the `expose` module.
pub struct ExposePort {
    shared: Arc<ExposeShared>,
}

impl ExposePort {
    /// Read an exposed value.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal, `ExecPhaseViolation` before setup finished.
    pub fn get(&self, name: &str) -> KilnResult<Option<Value>> {
        self.shared.guard.ensure_runtime("expose.get")?;
        Ok(self.shared.lock().values.get(name).cloned())
    }

    /// Call an exposed method inside a callback scope. `Ok(None)` when no
    /// method is exposed under `name`.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal, `ExecPhaseViolation` before setup
    /// finished, or whatever the method returned.
    pub fn call(&self, name: &str, args: Value) -> KilnResult<Option<Value>> {
        self.shared.guard.ensure_runtime("expose.call")?;
        let Some(method) = self.shared.lock().methods.get(name).cloned() else {
            return Ok(None);
        };
        trace!(method = name, "Calling exposed method");
        let _scope = self.shared.guard.enter_callback();
        method(args).map(Some)
    }

    /// Names of exposed values and methods, sorted.
    #[must_use]
    pub fn names(&self) -> (Vec<String>, Vec<String>) {
        let exposed = self.shared.lock();
        (
            exposed.values.keys().cloned().collect(),
            exposed.methods.keys().cloned().collect(),
        )
    }
}

impl fmt::Debug for ExposePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (values, methods) = self.names();
        f.debug_struct("ExposePort")
            .field("values", &values)
            .field("methods", &methods)
            .finish()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(EXPOSE, |ctx| {
        let shared = Arc::new(ExposeShared {
            guard: ctx.vault().get(&SYS_CAP)?,
            exposed: Mutex::new(Exposed::default()),
        });

        let on_dispose = Arc::clone(&shared);
        let hooks = ModuleHooks::new().on_dispose(move || {
            let mut exposed = on_dispose.lock();
            exposed.values.clear();
            exposed.methods.clear();
        });

        Ok(ModuleInstance::new(Arc::new(Expose {
            shared: Arc::clone(&shared),
        }))
        .with_port(Arc::new(ExposePort { shared }))
        .with_hooks(hooks))
    })
}
