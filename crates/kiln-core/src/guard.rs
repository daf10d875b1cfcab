//! Execution-phase guard.
//!
//! One guard exists per component instance. It tracks the coarse lifecycle
//! phase, the fine execution phase and the one-way disposal latch, and every
//! module consults it before allowing author-facing mutation.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{KilnError, KilnResult};
use crate::phase::{Domain, ExecPhase, ProtoPhase};

/// Opaque handle identifying one user-callback invocation.
///
/// Only obtainable through [`ExecPhaseGuard::callback_ctx`] while the callback
/// is running, so a handle captured in a closure cannot be re-fetched later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackCtx {
    id: u64,
    phase: ProtoPhase,
}

impl CallbackCtx {
    /// Unique (per guard) invocation id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The lifecycle phase the callback was invoked in.
    #[must_use]
    pub fn phase(&self) -> ProtoPhase {
        self.phase
    }
}

#[derive(Debug)]
struct GuardState {
    proto: ProtoPhase,
    exec: ExecPhase,
    disposed: bool,
    callback: Option<CallbackCtx>,
    next_callback_id: u64,
}

/// Phase/domain state machine and disposal gate for one component instance.
#[derive(Debug)]
pub struct ExecPhaseGuard {
    state: Mutex<GuardState>,
}

impl ExecPhaseGuard {
    /// Create a guard in `ProtoPhase::Setup` with an unknown exec phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GuardState {
                proto: ProtoPhase::Setup,
                exec: ExecPhase::Unknown,
                disposed: false,
                callback: None,
                next_callback_id: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|e| {
            tracing::warn!("ExecPhaseGuard lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn proto_phase(&self) -> ProtoPhase {
        self.lock().proto
    }

    /// Current execution phase.
    #[must_use]
    pub fn exec_phase(&self) -> ExecPhase {
        self.lock().exec
    }

    /// Current domain, derived from the lifecycle phase.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.lock().proto.domain()
    }

    /// Whether the instance has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Move the lifecycle to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::Disposed`] after disposal, or
    /// [`KilnError::ExecPhaseViolation`] if `next` does not legally follow the
    /// current phase.
    pub fn transition(&self, next: ProtoPhase) -> KilnResult<()> {
        let mut state = self.lock();
        if state.disposed {
            return Err(KilnError::disposed("transition"));
        }
        let current = state.proto;
        if !current.can_transition_to(next) {
            return Err(KilnError::ExecPhaseViolation {
                op: format!("transition to {next}"),
                actual: current.to_string(),
                expected: current.successors().iter().map(ToString::to_string).collect(),
            });
        }
        state.proto = next;
        drop(state);

        debug!(from = %current, to = %next, "Proto phase transition");
        Ok(())
    }

    /// Enter an execution phase until the returned scope is dropped.
    ///
    /// `ExecPhase::Callback` goes through [`enter_callback`](Self::enter_callback)
    /// so a callback scope always carries a [`CallbackCtx`].
    #[must_use = "the exec phase reverts when the scope is dropped"]
    pub fn enter(&self, exec: ExecPhase) -> ExecScope<'_> {
        if exec == ExecPhase::Callback {
            return self.enter_callback();
        }
        let mut state = self.lock();
        let previous_exec = std::mem::replace(&mut state.exec, exec);
        let previous_callback = state.callback.take();
        trace!(from = %previous_exec, to = %exec, "Entered exec phase");
        ExecScope {
            guard: self,
            previous_exec,
            previous_callback,
        }
    }

    /// Enter `ExecPhase::Callback` with a fresh [`CallbackCtx`].
    #[must_use = "the exec phase reverts when the scope is dropped"]
    pub fn enter_callback(&self) -> ExecScope<'_> {
        let mut state = self.lock();
        let ctx = CallbackCtx {
            id: state.next_callback_id,
            phase: state.proto,
        };
        state.next_callback_id = state.next_callback_id.wrapping_add(1);
        let previous_exec = std::mem::replace(&mut state.exec, ExecPhase::Callback);
        let previous_callback = state.callback.replace(ctx);
        trace!(callback_id = ctx.id, phase = %ctx.phase, "Entered callback");
        ExecScope {
            guard: self,
            previous_exec,
            previous_callback,
        }
    }

    /// The current callback handle, only while `exec_phase() == Callback`.
    #[must_use]
    pub fn callback_ctx(&self) -> Option<CallbackCtx> {
        let state = self.lock();
        if state.exec == ExecPhase::Callback {
            state.callback
        } else {
            None
        }
    }

    /// Flip the disposal latch. Returns `true` if this call disposed the guard.
    pub fn mark_disposed(&self) -> bool {
        let mut state = self.lock();
        if state.disposed {
            return false;
        }
        state.disposed = true;
        state.callback = None;
        drop(state);

        debug!("Execution guard disposed");
        true
    }

    /// Fail with [`KilnError::Disposed`] once the instance is disposed.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::Disposed`] if the latch is set.
    pub fn ensure_not_disposed(&self, op: &str) -> KilnResult<()> {
        if self.is_disposed() {
            return Err(KilnError::disposed(op));
        }
        Ok(())
    }

    /// Fail unless the current exec phase is one of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::ExecPhaseViolation`] naming the actual phase.
    pub fn ensure_exec_phase(&self, op: &str, expected: &[ExecPhase]) -> KilnResult<()> {
        let actual = self.exec_phase();
        if expected.contains(&actual) {
            return Ok(());
        }
        Err(KilnError::ExecPhaseViolation {
            op: op.to_owned(),
            actual: actual.to_string(),
            expected: expected.iter().map(ToString::to_string).collect(),
        })
    }

    /// Fail unless the current domain is `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::ExecPhaseViolation`] naming the actual domain.
    pub fn ensure_domain(&self, op: &str, expected: Domain) -> KilnResult<()> {
        let actual = self.domain();
        if actual == expected {
            return Ok(());
        }
        Err(KilnError::ExecPhaseViolation {
            op: op.to_owned(),
            actual: actual.to_string(),
            expected: vec![expected.to_string()],
        })
    }

    /// Not disposed and in the setup domain.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::Disposed`] or [`KilnError::ExecPhaseViolation`].
    pub fn ensure_setup(&self, op: &str) -> KilnResult<()> {
        self.ensure_not_disposed(op)?;
        self.ensure_domain(op, Domain::Setup)
    }

    /// Not disposed and in the runtime domain.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::Disposed`] or [`KilnError::ExecPhaseViolation`].
    pub fn ensure_runtime(&self, op: &str) -> KilnResult<()> {
        self.ensure_not_disposed(op)?;
        self.ensure_domain(op, Domain::Runtime)
    }

    /// Not disposed and inside a user callback.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::Disposed`] or [`KilnError::ExecPhaseViolation`].
    pub fn ensure_callback(&self, op: &str) -> KilnResult<()> {
        self.ensure_not_disposed(op)?;
        self.ensure_exec_phase(op, &[ExecPhase::Callback])
    }
}

impl Default for ExecPhaseGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII scope returned by [`ExecPhaseGuard::enter`]; restores the previous
/// exec phase (and callback handle) on drop.
#[derive(Debug)]
pub struct ExecScope<'a> {
    guard: &'a ExecPhaseGuard,
    previous_exec: ExecPhase,
    previous_callback: Option<CallbackCtx>,
}

impl Drop for ExecScope<'_> {
    fn drop(&mut self) {
        let mut state = self.guard.lock();
        state.exec = self.previous_exec;
        state.callback = if state.disposed {
            None
        } else {
            self.previous_callback
        };
    }
}
