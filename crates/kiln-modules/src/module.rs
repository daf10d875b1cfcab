//! Module definitions and built instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use kiln_capabilities::VaultView;
use kiln_core::{KilnResult, ProtoPhase};

use crate::resolver::DependencyResolver;

/// Factory building a module for one component instance.
pub type CreateFn = Arc<dyn Fn(&ModuleCtx<'_>) -> KilnResult<ModuleInstance> + Send + Sync>;

/// Hook invoked on every proto-phase transition.
pub type PhaseHook = Box<dyn Fn(ProtoPhase) -> KilnResult<()> + Send + Sync>;

/// Hook invoked once when the owning instance is disposed.
pub type DisposeHook = Box<dyn Fn() + Send + Sync>;

/// Declarative description of a module: its name, its dependencies and how
/// to build it.
#[derive(Clone)]
pub struct ModuleDefinition {
    name: String,
    deps: Vec<String>,
    optional_deps: Vec<String>,
    create: CreateFn,
}

impl ModuleDefinition {
    /// Create a definition with no dependencies.
    pub fn new<F>(name: impl Into<String>, create: F) -> Self
    where
        F: Fn(&ModuleCtx<'_>) -> KilnResult<ModuleInstance> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            deps: Vec::new(),
            optional_deps: Vec::new(),
            create: Arc::new(create),
        }
    }

    /// Declare a hard dependency.
    #[must_use]
    pub fn with_dep(mut self, name: impl Into<String>) -> Self {
        self.deps.push(name.into());
        self
    }

    /// Declare an optional dependency, silently skipped when absent.
    #[must_use]
    pub fn with_optional_dep(mut self, name: impl Into<String>) -> Self {
        self.optional_deps.push(name.into());
        self
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hard dependencies.
    #[must_use]
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Optional dependencies.
    #[must_use]
    pub fn optional_deps(&self) -> &[String] {
        &self.optional_deps
    }

    pub(crate) fn create(&self, ctx: &ModuleCtx<'_>) -> KilnResult<ModuleInstance> {
        (self.create)(ctx)
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("optional_deps", &self.optional_deps)
            .finish_non_exhaustive()
    }
}

/// Whether a module's state belongs to the prototype or to the instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleScope {
    /// Shared, prototype-level behavior.
    Module,
    /// State owned by a single component instance.
    #[default]
    Instance,
}

/// Lifecycle callbacks the orchestrator drives.
#[derive(Default)]
pub struct ModuleHooks {
    pub(crate) on_proto_phase: Option<PhaseHook>,
    pub(crate) on_dispose: Option<DisposeHook>,
}

impl ModuleHooks {
    /// No hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` on every proto-phase transition.
    #[must_use]
    pub fn on_proto_phase<F>(mut self, hook: F) -> Self
    where
        F: Fn(ProtoPhase) -> KilnResult<()> + Send + Sync + 'static,
    {
        self.on_proto_phase = Some(Box::new(hook));
        self
    }

    /// Run `hook` when the instance is disposed.
    #[must_use]
    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_dispose = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ModuleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHooks")
            .field("on_proto_phase", &self.on_proto_phase.is_some())
            .field("on_dispose", &self.on_dispose.is_some())
            .finish()
    }
}

/// A module built for one component instance.
pub struct ModuleInstance {
    pub(crate) name: String,
    scope: ModuleScope,
    pub(crate) facade: Arc<dyn Any + Send + Sync>,
    pub(crate) hooks: ModuleHooks,
    pub(crate) port: Option<Arc<dyn Any + Send + Sync>>,
}

impl ModuleInstance {
    /// Create an instance exposing `facade`. The orchestrator stamps the
    /// module name during assembly.
    #[must_use]
    pub fn new<F: Any + Send + Sync>(facade: Arc<F>) -> Self {
        Self {
            name: String::new(),
            scope: ModuleScope::default(),
            facade,
            hooks: ModuleHooks::default(),
            port: None,
        }
    }

    /// Attach a port for cross-module raw access.
    #[must_use]
    pub fn with_port<P: Any + Send + Sync>(mut self, port: Arc<P>) -> Self {
        self.port = Some(port);
        self
    }

    /// Attach lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ModuleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Override the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: ModuleScope) -> Self {
        self.scope = scope;
        self
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module scope.
    #[must_use]
    pub fn scope(&self) -> ModuleScope {
        self.scope
    }

    /// Whether the module exposes a port.
    #[must_use]
    pub fn has_port(&self) -> bool {
        self.port.is_some()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("hooks", &self.hooks)
            .field("has_port", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

/// Context handed to [`ModuleDefinition`] factories.
pub struct ModuleCtx<'a> {
    pub(crate) name: &'a str,
    pub(crate) vault: &'a VaultView,
    pub(crate) deps: DependencyResolver<'a>,
}

impl ModuleCtx<'_> {
    /// Name of the module being built.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Read-only capability access.
    #[must_use]
    pub fn vault(&self) -> &VaultView {
        self.vault
    }

    /// Resolver for declared dependencies.
    #[must_use]
    pub fn deps(&self) -> &DependencyResolver<'_> {
        &self.deps
    }
}
