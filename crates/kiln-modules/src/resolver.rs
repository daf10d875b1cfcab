//! Declared-dependency lookups handed to module factories.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use kiln_core::{KilnError, KilnResult};

use crate::module::ModuleInstance;

/// Resolves facades and ports of already-built modules for the module being
/// built.
///
/// Every lookup first checks that the name was declared as a dependency or
/// optional dependency. That check is static: it fails for undeclared names
/// even when the module happens to be present.
pub struct DependencyResolver<'a> {
    module: &'a str,
    deps: &'a [String],
    optional_deps: &'a [String],
    built: &'a HashMap<String, ModuleInstance>,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(
        module: &'a str,
        deps: &'a [String],
        optional_deps: &'a [String],
        built: &'a HashMap<String, ModuleInstance>,
    ) -> Self {
        Self {
            module,
            deps,
            optional_deps,
            built,
        }
    }

    fn declared(&self, name: &str) -> KilnResult<()> {
        let declared = self.deps.iter().chain(self.optional_deps).any(|d| d == name);
        if declared {
            Ok(())
        } else {
            Err(KilnError::UndeclaredDependency {
                module: self.module.to_owned(),
                dependency: name.to_owned(),
            })
        }
    }

    fn lookup(&self, name: &str) -> KilnResult<Option<&'a ModuleInstance>> {
        self.declared(name)?;
        Ok(self.built.get(name))
    }

    fn missing(&self, name: &str) -> KilnError {
        KilnError::MissingModuleDependency {
            module: self.module.to_owned(),
            dependency: name.to_owned(),
        }
    }

    /// The facade of a declared dependency.
    ///
    /// # Errors
    ///
    /// [`KilnError::UndeclaredDependency`] if `name` was not declared,
    /// [`KilnError::MissingModuleDependency`] if it is absent, or
    /// [`KilnError::ModuleTypeMismatch`] if the facade is not a `T`.
    pub fn require_facade<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        self.try_facade(name)?.ok_or_else(|| self.missing(name))
    }

    /// The facade of a declared dependency, or `None` if that dependency is
    /// optional and absent.
    ///
    /// # Errors
    ///
    /// [`KilnError::UndeclaredDependency`] or [`KilnError::ModuleTypeMismatch`].
    pub fn try_facade<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Option<Arc<T>>> {
        let Some(instance) = self.lookup(name)? else {
            return Ok(None);
        };
        downcast(name, "facade", Arc::clone(&instance.facade)).map(Some)
    }

    /// The port of a declared dependency.
    ///
    /// # Errors
    ///
    /// [`KilnError::UndeclaredDependency`] if `name` was not declared,
    /// [`KilnError::MissingModuleDependency`] if it is absent, or
    /// [`KilnError::ModuleTypeMismatch`] if it has no port of type `T`.
    pub fn require_port<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        let instance = self.lookup(name)?.ok_or_else(|| self.missing(name))?;
        match &instance.port {
            Some(port) => downcast(name, "port", Arc::clone(port)),
            None => Err(mismatch::<T>(name, "port")),
        }
    }

    /// The port of a declared dependency, or `None` if the dependency is
    /// absent or exposes no port.
    ///
    /// # Errors
    ///
    /// [`KilnError::UndeclaredDependency`] or [`KilnError::ModuleTypeMismatch`].
    pub fn try_port<T: Any + Send + Sync>(&self, name: &str) -> KilnResult<Option<Arc<T>>> {
        match self.lookup(name)?.and_then(|instance| instance.port.as_ref()) {
            Some(port) => downcast(name, "port", Arc::clone(port)).map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(
    module: &str,
    what: &str,
    value: Arc<dyn Any + Send + Sync>,
) -> KilnResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| mismatch::<T>(module, what))
}

fn mismatch<T>(module: &str, what: &str) -> KilnError {
    KilnError::ModuleTypeMismatch {
        module: module.to_owned(),
        expected: format!("{what} of type {}", type_name::<T>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter(u32);
    #[derive(Debug)]
    struct CounterPort;

    fn built() -> HashMap<String, ModuleInstance> {
        let mut built = HashMap::new();
        built.insert(
            "counter".to_string(),
            ModuleInstance::new(Arc::new(Counter(7))).with_port(Arc::new(CounterPort)),
        );
        built.insert("plain".to_string(), ModuleInstance::new(Arc::new(())));
        built
    }

    #[test]
    fn test_require_declared_facade() {
        let built = built();
        let deps = vec!["counter".to_string()];
        let resolver = DependencyResolver::new("reader", &deps, &[], &built);
        assert_eq!(resolver.require_facade::<Counter>("counter").unwrap().0, 7);
        assert!(resolver.require_port::<CounterPort>("counter").is_ok());
    }

    #[test]
    fn test_undeclared_lookup_fails_even_when_present() {
        let built = built();
        let resolver = DependencyResolver::new("reader", &[], &[], &built);
        let err = resolver.try_facade::<Counter>("counter").unwrap_err();
        assert_eq!(err.code(), "UNDECLARED_DEPENDENCY");
        let err = resolver.require_port::<CounterPort>("counter").unwrap_err();
        assert_eq!(err.code(), "UNDECLARED_DEPENDENCY");
    }

    #[test]
    fn test_optional_absent_resolves_to_none() {
        let built = built();
        let optional = vec!["missing".to_string()];
        let resolver = DependencyResolver::new("reader", &[], &optional, &built);
        assert!(resolver.try_facade::<Counter>("missing").unwrap().is_none());
        assert!(resolver.try_port::<CounterPort>("missing").unwrap().is_none());

        let err = resolver.require_facade::<Counter>("missing").unwrap_err();
        assert_eq!(
            err,
            KilnError::MissingModuleDependency {
                module: "reader".into(),
                dependency: "missing".into(),
            }
        );
    }

    #[test]
    fn test_wrong_type_is_a_mismatch() {
        let built = built();
        let deps = vec!["counter".to_string(), "plain".to_string()];
        let resolver = DependencyResolver::new("reader", &deps, &[], &built);
        let err = resolver.require_facade::<String>("counter").unwrap_err();
        assert_eq!(err.code(), "MODULE_TYPE_MISMATCH");

        assert!(resolver.try_port::<CounterPort>("plain").unwrap().is_none());
        let err = resolver.require_port::<CounterPort>("plain").unwrap_err();
        assert_eq!(err.code(), "MODULE_TYPE_MISMATCH");
    }
}
