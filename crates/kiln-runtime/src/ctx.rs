//! The context handed to setup and render functions.

use std::fmt;
use std::sync::{Arc, Weak};

use kiln_capabilities::VaultView;
use kiln_core::{CallbackCtx, ExecPhaseGuard, KilnResult};
use kiln_modules::ModuleRegistry;

use crate::instance::Core;
use crate::modules::context::Context;
use crate::modules::event::Events;
use crate::modules::expose::Expose;
use crate::modules::lifecycle::Lifecycle;
use crate::modules::props::Props;
use crate::modules::state::StateModule;
use crate::modules::trigger::AsTrigger;
use crate::modules::{AS_TRIGGER, CONTEXT, EVENT, EXPOSE, LIFECYCLE, PROPS, STATE};

/// Facades of the built-in modules, resolved once after assembly.
pub(crate) struct Facades {
    props: Arc<Props>,
    state: Arc<StateModule>,
    lifecycle: Arc<Lifecycle>,
    event: Arc<Events>,
    expose: Arc<Expose>,
    context: Arc<Context>,
    trigger: Arc<AsTrigger>,
}

impl Facades {
    pub(crate) fn resolve(registry: &ModuleRegistry) -> KilnResult<Self> {
        Ok(Self {
            props: registry.facade(PROPS)?,
            state: registry.facade(STATE)?,
            lifecycle: registry.facade(LIFECYCLE)?,
            event: registry.facade(EVENT)?,
            expose: registry.facade(EXPOSE)?,
            context: registry.facade(CONTEXT)?,
            trigger: registry.facade(AS_TRIGGER)?,
        })
    }
}

/// Author-facing view of a component instance.
///
/// Cheap to clone; event handlers and lifecycle callbacks may capture a
/// clone. It does not keep the instance alive.
#[derive(Clone)]
pub struct ComponentCtx {
    name: Arc<str>,
    guard: Arc<ExecPhaseGuard>,
    vault: VaultView,
    registry: Arc<ModuleRegistry>,
    facades: Arc<Facades>,
    core: Weak<Core>,
}

impl ComponentCtx {
    pub(crate) fn new(
        name: &str,
        guard: Arc<ExecPhaseGuard>,
        vault: VaultView,
        registry: Arc<ModuleRegistry>,
        facades: Facades,
        core: Weak<Core>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            guard,
            vault,
            registry,
            facades: Arc::new(facades),
            core,
        }
    }

    /// Prototype name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host props.
    #[must_use]
    pub fn props(&self) -> &Props {
        &self.facades.props
    }

    /// Owned state.
    #[must_use]
    pub fn state(&self) -> &StateModule {
        &self.facades.state
    }

    /// Lifecycle callbacks.
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.facades.lifecycle
    }

    /// Event registration.
    #[must_use]
    pub fn event(&self) -> &Events {
        &self.facades.event
    }

    /// Values and methods exposed to the host.
    #[must_use]
    pub fn expose(&self) -> &Expose {
        &self.facades.expose
    }

    /// Context provide/consume.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.facades.context
    }

    /// `as-trigger` behavior.
    #[must_use]
    pub fn trigger(&self) -> &AsTrigger {
        &self.facades.trigger
    }

    /// Facade of any assembled module, built-in or extra.
    ///
    /// # Errors
    ///
    /// `MissingModuleDependency` for an unknown name, `ModuleTypeMismatch`
    /// when the facade is not a `T`.
    pub fn module<T: std::any::Any + Send + Sync>(&self, name: &str) -> KilnResult<Arc<T>> {
        self.registry.facade(name)
    }

    /// Read-only capability view.
    #[must_use]
    pub fn vault(&self) -> &VaultView {
        &self.vault
    }

    /// The instance's phase guard.
    #[must_use]
    pub fn guard(&self) -> &ExecPhaseGuard {
        &self.guard
    }

    /// Handle of the running callback, `None` outside callbacks.
    #[must_use]
    pub fn callback_ctx(&self) -> Option<CallbackCtx> {
        self.guard.callback_ctx()
    }

    /// Ask for a re-render. No-op before the first render, after disposal or
    /// once the instance was dropped.
    pub fn request_update(&self) {
        if let Some(core) = self.core.upgrade() {
            core.request_update();
        }
    }
}

impl fmt::Debug for ComponentCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCtx")
            .field("name", &self.name)
            .field("modules", &self.registry.names())
            .finish_non_exhaustive()
    }
}
