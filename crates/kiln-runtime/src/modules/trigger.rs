//! `as-trigger`: forwards committed presses on the root element to the
//! host's trigger sink.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use kiln_capabilities::VaultView;
use kiln_core::{Domain, ExecPhaseGuard, KilnResult};
use kiln_events::{RoutedEvent, TargetKind};
use kiln_modules::{ModuleDefinition, ModuleInstance};
use kiln_state::{OwnedStateHandle, StateSpec};
use tracing::{debug, trace};

use crate::caps::{HOST_CAP, SYS_CAP, TRIGGER_SINK_CAP, TriggerSignal};

use super::event::{EventListenerToken, Events};
use super::state::StateModule;
use super::{AS_TRIGGER, EVENT, STATE};

/// State cell holding the disabled flag when the `state` module is present.
pub const DISABLED_STATE: &str = "trigger.disabled";

/// Semantic event that activates the trigger.
const PRESS_COMMIT: &str = "press.commit";

#[derive(Default)]
struct TriggerState {
    token: Option<EventListenerToken>,
    disabled: Option<OwnedStateHandle<bool>>,
}

struct TriggerShared {
    guard: Arc<ExecPhaseGuard>,
    vault: VaultView,
    events: Arc<Events>,
    state_module: Option<Arc<StateModule>>,
    disabled_flag: AtomicBool,
    state: Mutex<TriggerState>,
}

impl TriggerShared {
    fn lock(&self) -> MutexGuard<'_, TriggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disabled(&self) -> KilnResult<bool> {
        let handle = self.lock().disabled.clone();
        match handle {
            Some(handle) => handle.get(),
            None => Ok(self.disabled_flag.load(Ordering::SeqCst)),
        }
    }

    fn fire(&self, event: &RoutedEvent) -> KilnResult<()> {
        if self.is_disabled()? {
            trace!("Trigger disabled, press ignored");
            return Ok(());
        }
        let sink = self.vault.get(&TRIGGER_SINK_CAP)?;
        let host = self.vault.get(&HOST_CAP)?;
        sink.trigger(TriggerSignal {
            prototype: host.prototype_name().to_owned(),
            event: Arc::clone(event.native()),
        })
    }
}

/// Facade of the `as-trigger` module.
pub struct AsTrigger {
    shared: Arc<TriggerShared>,
}

impl AsTrigger {
    /// Start forwarding `press.commit` on the root target. Setup only;
    /// calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// `ExecPhaseViolation` outside setup, `Disposed` after disposal.
    pub fn enable(&self) -> KilnResult<()> {
        self.shared.guard.ensure_setup("as_trigger.enable")?;
        if self.shared.lock().token.is_some() {
            return Ok(());
        }

        let disabled = match &self.shared.state_module {
            Some(state) => Some(state.owned::<bool>(
                DISABLED_STATE,
                StateSpec::Bool,
                self.shared.disabled_flag.load(Ordering::SeqCst),
            )?),
            None => None,
        };

        let weak: Weak<TriggerShared> = Arc::downgrade(&self.shared);
        let token = self
            .shared
            .events
            .on(TargetKind::Root, PRESS_COMMIT, move |event| match weak.upgrade() {
                Some(shared) => shared.fire(event),
                None => Ok(()),
            })?;

        let mut state = self.shared.lock();
        state.token = Some(token);
        state.disabled = disabled;
        debug!(stateful = state.disabled.is_some(), "Trigger enabled");
        Ok(())
    }

    /// Whether [`enable`](Self::enable) was called.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.lock().token.is_some()
    }

    /// Whether presses are currently ignored.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal when the flag lives in state.
    pub fn is_disabled(&self) -> KilnResult<bool> {
        self.shared.is_disabled()
    }

    /// Ignore presses while `disabled`. During setup this sets the initial
    /// value; at runtime it writes the state cell, which schedules a render.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal, or the state cell's phase errors.
    pub fn set_disabled(&self, disabled: bool) -> KilnResult<()> {
        self.shared.guard.ensure_not_disposed("as_trigger.set_disabled")?;
        self.shared.disabled_flag.store(disabled, Ordering::SeqCst);
        let handle = self.shared.lock().disabled.clone();
        match handle {
            Some(handle) if self.shared.guard.domain() == Domain::Setup => {
                handle.set_default(disabled)
            },
            Some(handle) => handle.set_with_reason(disabled, "as_trigger.set_disabled"),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for AsTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsTrigger")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(AS_TRIGGER, |ctx| {
        let shared = Arc::new(TriggerShared {
            guard: ctx.vault().get(&SYS_CAP)?,
            vault: ctx.vault().clone(),
            events: ctx.deps().require_facade::<Events>(EVENT)?,
            state_module: ctx.deps().try_facade::<StateModule>(STATE)?,
            disabled_flag: AtomicBool::new(false),
            state: Mutex::new(TriggerState::default()),
        });
        Ok(ModuleInstance::new(Arc::new(AsTrigger { shared })))
    })
    .with_dep(EVENT)
    .with_optional_dep(STATE)
}
