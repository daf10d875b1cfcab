//! Per-instance registry of built modules.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kiln_core::{KilnError, KilnResult, ProtoPhase};
use tracing::{debug, trace};

use crate::module::ModuleInstance;
use crate::resolver::downcast;

/// Owns every module of one component instance, in build order.
pub struct ModuleRegistry {
    order: Vec<String>,
    modules: HashMap<String, ModuleInstance>,
    disposed: AtomicBool,
}

impl ModuleRegistry {
    pub(crate) fn new(order: Vec<String>, modules: HashMap<String, ModuleInstance>) -> Self {
        Self {
            order,
            modules,
            disposed: AtomicBool::new(false),
        }
    }

    /// Module names in build order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry holds no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a module with this name was assembled.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Look up a built module.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleInstance> {
        self.modules.get(name)
    }

    fn require(&self, name: &str) -> KilnResult<&ModuleInstance> {
        self.modules
            .get(name)
            .ok_or_else(|| KilnError::MissingModuleDependency {
                module: "registry".to_owned(),
                dependency: name.to_owned(),
            })
    }

    /// Typed facade of module `name`.
    ///
    /// # Errors
    ///
    /// [`KilnError::MissingModuleDependency`] if no such module was assembled,
    /// [`KilnError::ModuleTypeMismatch`] if its facade is not a `T`.
    pub fn facade<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        let instance = self.require(name)?;
        downcast(name, "facade", Arc::clone(&instance.facade))
    }

    /// Typed port of module `name`.
    ///
    /// # Errors
    ///
    /// [`KilnError::MissingModuleDependency`] if no such module was assembled,
    /// [`KilnError::ModuleTypeMismatch`] if it has no port of type `T`.
    pub fn port<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        let instance = self.require(name)?;
        let port = instance
            .port
            .as_ref()
            .ok_or_else(|| KilnError::ModuleTypeMismatch {
                module: name.to_owned(),
                expected: "port".to_owned(),
            })?;
        downcast(name, "port", Arc::clone(port))
    }

    /// Run every module's proto-phase hook, in build order. The first error
    /// aborts the fan-out.
    ///
    /// # Errors
    ///
    /// Whatever the failing hook returned.
    pub fn fan_out_phase(&self, phase: ProtoPhase) -> KilnResult<()> {
        for name in &self.order {
            let Some(hook) = self
                .modules
                .get(name)
                .and_then(|m| m.hooks.on_proto_phase.as_ref())
            else {
                continue;
            };
            trace!(module = %name, %phase, "Proto phase hook");
            hook(phase)?;
        }
        Ok(())
    }

    /// Run every dispose hook in reverse build order. Only the first call has
    /// an effect.
    pub fn dispose_all(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for name in self.order.iter().rev() {
            if let Some(hook) = self
                .modules
                .get(name)
                .and_then(|m| m.hooks.on_dispose.as_ref())
            {
                trace!(module = %name, "Dispose hook");
                hook();
            }
        }
        debug!(modules = self.order.len(), "Module registry disposed");
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("order", &self.order)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::module::ModuleHooks;

    fn registry_with_log(log: &Arc<Mutex<Vec<String>>>) -> ModuleRegistry {
        let mut modules = HashMap::new();
        let mut order = Vec::new();
        for name in ["a", "b", "c"] {
            let phase_log = Arc::clone(log);
            let dispose_log = Arc::clone(log);
            let hooks = ModuleHooks::new()
                .on_proto_phase(move |phase| {
                    phase_log.lock().unwrap().push(format!("{name}:{phase}"));
                    Ok(())
                })
                .on_dispose(move || dispose_log.lock().unwrap().push(format!("{name}:dispose")));
            let mut instance = ModuleInstance::new(Arc::new(name.to_string())).with_hooks(hooks);
            instance.name = name.to_string();
            modules.insert(name.to_string(), instance);
            order.push(name.to_string());
        }
        ModuleRegistry::new(order, modules)
    }

    #[test]
    fn test_fan_out_in_build_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with_log(&log);
        registry.fan_out_phase(ProtoPhase::Created).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:created", "b:created", "c:created"]
        );
    }

    #[test]
    fn test_dispose_runs_once_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with_log(&log);
        registry.dispose_all();
        registry.dispose_all();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["c:dispose", "b:dispose", "a:dispose"]
        );
    }

    #[test]
    fn test_fan_out_stops_at_first_error() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut modules = HashMap::new();
        for name in ["first", "second"] {
            let calls = Arc::clone(&calls);
            let hooks = ModuleHooks::new().on_proto_phase(move |_| {
                calls.lock().unwrap().push(name);
                Err(KilnError::disposed(name))
            });
            modules.insert(
                name.to_string(),
                ModuleInstance::new(Arc::new(())).with_hooks(hooks),
            );
        }
        let registry = ModuleRegistry::new(vec!["first".into(), "second".into()], modules);
        let err = registry.fan_out_phase(ProtoPhase::Mounted).unwrap_err();
        assert_eq!(err, KilnError::disposed("first"));
        assert_eq!(*calls.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn test_typed_lookups() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with_log(&log);
        assert_eq!(*registry.facade::<String>("b").unwrap(), "b");
        assert_eq!(
            registry.facade::<u8>("b").unwrap_err().code(),
            "MODULE_TYPE_MISMATCH"
        );
        assert_eq!(
            registry.facade::<String>("zzz").unwrap_err().code(),
            "MISSING_MODULE_DEPENDENCY"
        );
        assert_eq!(
            registry.port::<String>("a").unwrap_err().code(),
            "MODULE_TYPE_MISMATCH"
        );
        assert_eq!(registry.names(), ["a", "b", "c"]);
        assert!(registry.contains("c"));
    }
}
