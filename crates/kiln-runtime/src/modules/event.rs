//! Author-facing event registration on top of the [`EventRouter`].
//!
//! Handlers declared during setup are queued and bound when the instance
//! reaches `created`, once host wiring has supplied the platform nodes.
//! Handlers registered later bind immediately. Every handler runs inside a
//! callback scope, so it may write state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_capabilities::VaultView;
use kiln_core::{ExecPhaseGuard, KilnResult, ProtoPhase};
use kiln_events::{EventListener, EventRouter, ListenerId, MappingTable, RoutedEvent, TargetKind};
use kiln_modules::{ModuleDefinition, ModuleHooks, ModuleInstance};
use tracing::{debug, trace};

use crate::caps::{EVENT_GATE_CAP, GLOBAL_NODE_CAP, ROOT_NODE_CAP, SYS_CAP};

use super::EVENT;

/// Identifies one registration made through [`Events::on`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventListenerToken {
    target: TargetKind,
    registration: String,
    seq: u64,
}

impl EventListenerToken {
    /// Target the handler was registered on.
    #[must_use]
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Registration string (`press.commit`, `native:click`, ...).
    #[must_use]
    pub fn registration(&self) -> &str {
        &self.registration
    }
}

struct Pending {
    token: EventListenerToken,
    listener: EventListener,
}

#[derive(Default)]
struct EventState {
    router: Option<EventRouter>,
    pending: Vec<Pending>,
    bound: HashMap<u64, ListenerId>,
    next_seq: u64,
}

struct EventShared {
    guard: Arc<ExecPhaseGuard>,
    vault: VaultView,
    table: MappingTable,
    state: Mutex<EventState>,
}

impl EventShared {
    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_router(&self) -> EventRouter {
        let root = self.vault.try_get(&ROOT_NODE_CAP).map(|node| Arc::clone(&*node));
        let global = self.vault.try_get(&GLOBAL_NODE_CAP).map(|node| Arc::clone(&*node));
        debug!(
            root = root.is_some(),
            global = global.is_some(),
            "Building event router"
        );

        let guard = Arc::clone(&self.guard);
        let vault = self.vault.clone();
        EventRouter::new(root, global, self.table.clone(), move || {
            !guard.is_disposed()
                && vault
                    .try_get(&EVENT_GATE_CAP)
                    .is_none_or(|gate| gate.is_enabled())
        })
    }

    /// Create the router and bind everything queued during setup.
    fn bind_pending(&self) -> KilnResult<()> {
        let router = self.build_router();
        let pending = {
            let mut state = self.lock();
            state.router = Some(router.clone());
            std::mem::take(&mut state.pending)
        };

        for Pending { token, listener } in pending {
            let id = router.add_listener(token.target, &token.registration, listener)?;
            self.lock().bound.insert(token.seq, id);
        }
        Ok(())
    }

    fn dispose(&self) {
        let router = {
            let mut state = self.lock();
            state.pending.clear();
            state.bound.clear();
            state.router.take()
        };
        if let Some(router) = router {
            router.dispose();
        }
    }
}

/// Facade of the `event` module.
pub struct Events {
    shared: Arc<EventShared>,
}

impl Events {
    /// Register `handler` for `registration` on `target`.
    ///
    /// During setup the registration is queued until `created`; afterwards
    /// it binds immediately.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal, `EventTargetUnavailable` when binding on a
    /// target the host never supplied.
    pub fn on<F>(
        &self,
        target: TargetKind,
        registration: &str,
        handler: F,
    ) -> KilnResult<EventListenerToken>
    where
        F: Fn(&RoutedEvent) -> KilnResult<()> + Send + Sync + 'static,
    {
        self.shared.guard.ensure_not_disposed("event.on")?;

        let guard = Arc::clone(&self.shared.guard);
        let listener: EventListener = Arc::new(move |event: &RoutedEvent| {
            let _scope = guard.enter_callback();
            handler(event)
        });

        let (token, router) = {
            let mut state = self.shared.lock();
            let token = EventListenerToken {
                target,
                registration: registration.to_owned(),
                seq: state.next_seq,
            };
            state.next_seq = state.next_seq.wrapping_add(1);
            match state.router.clone() {
                Some(router) => (token, router),
                None => {
                    trace!(target_kind = %target, registration, "Queued event handler");
                    state.pending.push(Pending {
                        token: token.clone(),
                        listener,
                    });
                    return Ok(token);
                },
            }
        };

        let id = router.add_listener(target, registration, listener)?;
        self.shared.lock().bound.insert(token.seq, id);
        Ok(token)
    }

    /// Remove the registration behind `token`. Returns whether anything was
    /// removed.
    pub fn off(&self, token: &EventListenerToken) -> bool {
        let (router, id) = {
            let mut state = self.shared.lock();
            if let Some(pos) = state.pending.iter().position(|p| p.token == *token) {
                state.pending.remove(pos);
                return true;
            }
            let Some(id) = state.bound.remove(&token.seq) else {
                return false;
            };
            let Some(router) = state.router.clone() else {
                return false;
            };
            (router, id)
        };
        router.remove_by_id(token.target, &token.registration, id)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Events")
            .field("pending", &state.pending.len())
            .field("bound", &state.bound.len())
            .finish_non_exhaustive()
    }
}

/// Port of the `event` module.
pub struct EventPort {
    shared: Arc<EventShared>,
}

impl EventPort {
    /// The instance's router, once the instance reached `created`.
    #[must_use]
    pub fn router(&self) -> Option<EventRouter> {
        self.shared.lock().router.clone()
    }
}

impl fmt::Debug for EventPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPort").finish_non_exhaustive()
    }
}

pub(crate) fn definition(table: MappingTable) -> ModuleDefinition {
    ModuleDefinition::new(EVENT, move |ctx| {
        let shared = Arc::new(EventShared {
            guard: ctx.vault().get(&SYS_CAP)?,
            vault: ctx.vault().clone(),
            table: table.clone(),
            state: Mutex::new(EventState::default()),
        });

        let on_phase = Arc::clone(&shared);
        let on_dispose = Arc::clone(&shared);
        let hooks = ModuleHooks::new()
            .on_proto_phase(move |phase| {
                if phase == ProtoPhase::Created {
                    on_phase.bind_pending()?;
                }
                Ok(())
            })
            .on_dispose(move || on_dispose.dispose());

        Ok(ModuleInstance::new(Arc::new(Events {
            shared: Arc::clone(&shared),
        }))
        .with_port(Arc::new(EventPort { shared }))
        .with_hooks(hooks))
    })
}
