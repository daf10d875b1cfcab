//! The component instance driver.
//!
//! One [`ComponentInstance`] owns one phase guard, one capability vault,
//! one module registry and, through the event module, one router. They are
//! created together at mount and destroyed together at disposal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use kiln_capabilities::{CapabilityVault, VaultView};
use kiln_core::{ExecPhase, ExecPhaseGuard, KilnError, KilnResult, ProtoPhase};
use kiln_events::EventRouter;
use kiln_modules::{ModuleOrchestrator, ModuleRegistry};
use kiln_state::StateValue;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::caps::{HOST_CAP, SYS_CAP};
use crate::ctx::{ComponentCtx, Facades};
use crate::host::{CommitSignal, Host, WiringApi};
use crate::modules::context::ContextPort;
use crate::modules::event::EventPort;
use crate::modules::expose::ExposePort;
use crate::modules::lifecycle::LifecyclePort;
use crate::modules::state::StatePort;
use crate::modules::{self, CONTEXT, EVENT, EXPOSE, LIFECYCLE, STATE};
use crate::options::RuntimeOptions;
use crate::prototype::{Prototype, RenderThunk};

/// Ports of the built-in modules the driver talks to.
struct Ports {
    lifecycle: Arc<LifecyclePort>,
    state: Arc<StatePort>,
    event: Arc<EventPort>,
    expose: Arc<ExposePort>,
    context: Arc<ContextPort>,
}

impl Ports {
    fn resolve(registry: &ModuleRegistry) -> KilnResult<Self> {
        Ok(Self {
            lifecycle: registry.port(LIFECYCLE)?,
            state: registry.port(STATE)?,
            event: registry.port(EVENT)?,
            expose: registry.port(EXPOSE)?,
            context: registry.port(CONTEXT)?,
        })
    }
}

pub(crate) struct Core {
    name: String,
    guard: Arc<ExecPhaseGuard>,
    vault: CapabilityVault,
    host: Arc<dyn Host>,
    options: RuntimeOptions,
    registry: Arc<ModuleRegistry>,
    ports: Ports,
    ctx: ComponentCtx,
    render: OnceLock<RenderThunk>,
    rendered: AtomicBool,
    update_pending: AtomicBool,
    commits: AtomicU64,
}

impl Core {
    /// Schedule a render through the host.
    pub(crate) fn request_update(self: &Arc<Self>) {
        if self.guard.is_disposed() || !self.rendered.load(Ordering::SeqCst) {
            trace!(component = %self.name, "Update request ignored");
            return;
        }
        if self.options.coalesce_updates && self.update_pending.swap(true, Ordering::SeqCst) {
            trace!(component = %self.name, "Update already pending");
            return;
        }

        let weak = Arc::downgrade(self);
        self.host.schedule(Box::new(move || match weak.upgrade() {
            Some(core) => core.run_update(),
            None => Ok(()),
        }));
    }

    fn run_update(self: &Arc<Self>) -> KilnResult<()> {
        self.update_pending.store(false, Ordering::SeqCst);
        if self.guard.is_disposed() {
            trace!(component = %self.name, "Skipping update of disposed instance");
            return Ok(());
        }
        self.render_and_commit()
    }

    fn render_and_commit(self: &Arc<Self>) -> KilnResult<()> {
        self.guard.ensure_not_disposed("render")?;
        let Some(render) = self.render.get() else {
            return Ok(());
        };
        self.rendered.store(true, Ordering::SeqCst);

        let view = {
            let _scope = self.guard.enter(ExecPhase::Render);
            render(&self.ctx)?
        };

        let sequence = self.commits.fetch_add(1, Ordering::SeqCst);
        debug!(component = %self.name, sequence, "Committing view");
        self.host
            .commit(view, CommitSignal::new(Arc::downgrade(self), sequence));
        Ok(())
    }

    /// A commit took visible effect.
    pub(crate) fn commit_done(&self, sequence: u64) -> KilnResult<()> {
        if self.guard.is_disposed() {
            warn!(component = %self.name, sequence, "Commit completed after disposal, ignoring");
            return Ok(());
        }
        let next = match self.guard.proto_phase() {
            ProtoPhase::Created => ProtoPhase::Mounted,
            ProtoPhase::Mounted | ProtoPhase::Updated => ProtoPhase::Updated,
            phase => {
                warn!(component = %self.name, sequence, phase = %phase, "Commit completed outside of rendering phases");
                return Ok(());
            },
        };
        self.enter_phase(next)
    }

    /// Transition, then let modules and author callbacks see the phase.
    fn enter_phase(&self, phase: ProtoPhase) -> KilnResult<()> {
        self.guard.transition(phase)?;
        self.registry.fan_out_phase(phase)?;
        self.ports.lifecycle.run(phase)
    }

    /// Inside the `unmounted` phase, before disposal.
    fn is_unmounting(&self) -> bool {
        !self.guard.is_disposed() && self.guard.proto_phase() == ProtoPhase::Unmounted
    }

    fn unmount(&self) -> KilnResult<()> {
        self.guard.ensure_not_disposed("unmount")?;
        // Only the outermost call tears down; a nested call from an
        // `unmounted` callback must not dispose under it.
        if self.is_unmounting() {
            return Err(KilnError::ExecPhaseViolation {
                op: "unmount".to_owned(),
                actual: ProtoPhase::Unmounted.to_string(),
                expected: [ProtoPhase::Created, ProtoPhase::Mounted, ProtoPhase::Updated]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        debug!(component = %self.name, "Unmounting");
        self.host.on_unmount_begin();
        let result = self.enter_phase(ProtoPhase::Unmounted);
        self.teardown();
        result
    }

    /// Flip the latch and release everything the instance holds.
    fn teardown(&self) {
        if !self.guard.mark_disposed() {
            return;
        }
        self.registry.dispose_all();
        self.vault.reset_all();
        debug!(component = %self.name, "Component disposed");
    }

    fn watch_state(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let guard = Arc::clone(&self.guard);
        // Subscription lives until the store is disposed.
        let _subscription = self.ports.state.watch(move |change| {
            if !matches!(guard.proto_phase(), ProtoPhase::Mounted | ProtoPhase::Updated) {
                return;
            }
            if let Some(core) = weak.upgrade() {
                trace!(state = %change.name, "State change requests update");
                core.request_update();
            }
        });
    }
}

/// A mounted component.
///
/// Dropping a live instance disposes it.
pub struct ComponentInstance {
    core: Arc<Core>,
}

impl ComponentInstance {
    /// Mount `prototype` on `host`.
    ///
    /// Installs the base capabilities, assembles the built-in and extra
    /// modules, lets the host wire capabilities, runs setup, enters
    /// `created` and commits the first render. The instance becomes
    /// `mounted` once the host reports that commit done.
    ///
    /// # Errors
    ///
    /// Any assembly, setup, callback or render error. The partially built
    /// instance is disposed before the error is returned.
    pub fn mount<S: Send + Sync + 'static>(
        prototype: &Prototype<S>,
        host: Arc<dyn Host>,
        options: RuntimeOptions,
    ) -> KilnResult<Self> {
        let name = prototype.name().to_owned();
        if host.prototype_name() != name {
            warn!(
                prototype = %name,
                host_prototype = host.prototype_name(),
                "Host prototype name does not match"
            );
        }

        let guard = Arc::new(ExecPhaseGuard::new());
        let vault = CapabilityVault::new();
        vault.attach_base(vec![
            SYS_CAP.entry_shared(Arc::clone(&guard)),
            HOST_CAP.entry(Arc::clone(&host)),
        ]);

        let mut definitions = modules::builtin(&options.table);
        definitions.extend(prototype.modules().iter().cloned());
        let registry = match ModuleOrchestrator::new(definitions)
            .and_then(|orchestrator| orchestrator.assemble(&vault.view()))
        {
            Ok(registry) => Arc::new(registry),
            Err(err) => {
                guard.mark_disposed();
                vault.reset_all();
                return Err(err);
            },
        };
        debug!(component = %name, modules = ?registry.names(), "Modules assembled");

        let resolved = Facades::resolve(&registry).and_then(|facades| {
            Ports::resolve(&registry).map(|ports| (facades, ports))
        });
        let (facades, ports) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                guard.mark_disposed();
                registry.dispose_all();
                vault.reset_all();
                return Err(err);
            },
        };

        let core = Arc::new_cyclic(|weak| Core {
            ctx: ComponentCtx::new(
                &name,
                Arc::clone(&guard),
                vault.view(),
                Arc::clone(&registry),
                facades,
                weak.clone(),
            ),
            name,
            guard,
            vault,
            host,
            options,
            registry,
            ports,
            render: OnceLock::new(),
            rendered: AtomicBool::new(false),
            update_pending: AtomicBool::new(false),
            commits: AtomicU64::new(0),
        });

        let instance = Self { core };
        if let Err(err) = instance.bootstrap(prototype) {
            debug!(component = %instance.core.name, error = %err, "Bootstrap failed");
            instance.core.teardown();
            return Err(err);
        }
        Ok(instance)
    }

    fn bootstrap<S: Send + Sync + 'static>(&self, prototype: &Prototype<S>) -> KilnResult<()> {
        let core = &self.core;
        core.watch_state();
        core.host
            .on_runtime_ready(&WiringApi::new(core.vault.clone(), Arc::clone(&core.guard)));

        let state = {
            let _scope = core.guard.enter(ExecPhase::Setup);
            prototype.run_setup(&core.ctx)?
        };
        if core.render.set(prototype.bind(state)).is_err() {
            warn!(component = %core.name, "Render function already bound");
        }

        core.enter_phase(ProtoPhase::Created)?;
        core.render_and_commit()
    }

    /// Prototype name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The author-facing context, as handed to setup and render.
    #[must_use]
    pub fn ctx(&self) -> &ComponentCtx {
        &self.core.ctx
    }

    /// The instance's phase guard.
    #[must_use]
    pub fn guard(&self) -> &ExecPhaseGuard {
        &self.core.guard
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn proto_phase(&self) -> ProtoPhase {
        self.core.guard.proto_phase()
    }

    /// Whether the instance was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.guard.is_disposed()
    }

    /// Read-only view of the capability vault.
    #[must_use]
    pub fn vault(&self) -> VaultView {
        self.core.vault.view()
    }

    /// Number of renders committed so far.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.core.commits.load(Ordering::SeqCst)
    }

    /// The event router, once the instance reached `created`. `None` after
    /// disposal.
    #[must_use]
    pub fn router(&self) -> Option<EventRouter> {
        self.core.ports.event.router()
    }

    /// Schedule a re-render through the host.
    pub fn request_update(&self) {
        self.core.request_update();
    }

    /// Read a value the component exposed.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn expose_get(&self, name: &str) -> KilnResult<Option<Value>> {
        self.core.ports.expose.get(name)
    }

    /// Call a method the component exposed.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal, or whatever the method returned.
    pub fn expose_call(&self, name: &str, args: Value) -> KilnResult<Option<Value>> {
        self.core.ports.expose.call(name, args)
    }

    /// Context value the component provided under `key`.
    #[must_use]
    pub fn provided_context(&self, key: &str) -> Option<Value> {
        self.core.ports.context.provided(key)
    }

    /// Current value of every owned state cell.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn state_snapshot(&self) -> KilnResult<BTreeMap<String, StateValue>> {
        self.core.ports.state.snapshot()
    }

    /// Run the `unmounted` phase, then dispose.
    ///
    /// Disposal completes even when an `unmounted` callback fails; that
    /// callback's error is returned.
    ///
    /// # Errors
    ///
    /// `Disposed` when already disposed, `ExecPhaseViolation` when called
    /// from inside an `unmounted` callback, or the first hook or callback
    /// error.
    pub fn unmount(&self) -> KilnResult<()> {
        self.core.unmount()
    }

    /// Unmount if still live. No-op afterwards, and while an unmount is
    /// already running its `unmounted` callbacks.
    ///
    /// # Errors
    ///
    /// See [`unmount`](Self::unmount).
    pub fn dispose(&self) -> KilnResult<()> {
        if self.is_disposed() {
            return Ok(());
        }
        if self.core.is_unmounting() {
            trace!(component = %self.core.name, "Dispose requested during unmount, deferring to it");
            return Ok(());
        }
        self.core.unmount()
    }
}

impl Drop for ComponentInstance {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(component = %self.core.name, error = %err, "Dispose on drop failed");
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.core.name)
            .field("phase", &self.proto_phase())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
