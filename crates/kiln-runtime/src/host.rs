//! The host collaborator contract.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use kiln_capabilities::{CapEntry, CapabilityVault};
use kiln_core::{ExecPhaseGuard, KilnError, KilnResult};
use tracing::{debug, warn};

use crate::instance::Core;

/// Output of a render function, handed to [`Host::commit`].
pub type View = serde_json::Value;

/// Deferred work handed to [`Host::schedule`]. Tasks must run in the order
/// scheduled, each to completion before the next begins.
pub type ScheduledTask = Box<dyn FnOnce() -> KilnResult<()> + Send>;

/// What the runtime needs from its embedding: props, a commit sink and a
/// scheduler.
pub trait Host: Send + Sync {
    /// Name of the prototype this host mounts.
    fn prototype_name(&self) -> &str;

    /// Current raw props.
    fn raw_props(&self) -> serde_json::Value;

    /// Apply a rendered view. The host must call [`CommitSignal::done`] once
    /// the commit has taken visible effect.
    fn commit(&self, view: View, signal: CommitSignal);

    /// Run `task` on a later turn.
    fn schedule(&self, task: ScheduledTask);

    /// Called once modules are assembled, before setup runs.
    fn on_runtime_ready(&self, wiring: &WiringApi) {
        let _ = wiring;
    }

    /// Called before the `unmounted` phase begins.
    fn on_unmount_begin(&self) {}
}

/// Completion handle for one commit.
pub struct CommitSignal {
    core: Weak<Core>,
    sequence: u64,
    done: AtomicBool,
}

impl CommitSignal {
    pub(crate) fn new(core: Weak<Core>, sequence: u64) -> Self {
        Self {
            core,
            sequence,
            done: AtomicBool::new(false),
        }
    }

    /// Zero-based commit number within the instance.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether [`done`](Self::done) was already called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Report that the commit took visible effect. The first report moves
    /// the instance to `mounted`, later ones to `updated`, and runs the
    /// matching callbacks. Repeated calls on one signal are no-ops, and so
    /// are calls after disposal.
    ///
    /// # Errors
    ///
    /// Whatever a module hook or lifecycle callback returned.
    pub fn done(&self) -> KilnResult<()> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(core) = self.core.upgrade() else {
            warn!(sequence = self.sequence, "Commit signal outlived its instance");
            return Ok(());
        };
        core.commit_done(self.sequence)
    }
}

impl fmt::Debug for CommitSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitSignal")
            .field("sequence", &self.sequence)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Host access to the attached capability layer.
#[derive(Clone)]
pub struct WiringApi {
    vault: CapabilityVault,
    guard: Arc<ExecPhaseGuard>,
}

impl WiringApi {
    pub(crate) fn new(vault: CapabilityVault, guard: Arc<ExecPhaseGuard>) -> Self {
        Self { vault, guard }
    }

    /// Push capability entries for `module` into the attached layer.
    ///
    /// # Errors
    ///
    /// [`KilnError::Disposed`] after the instance was disposed.
    pub fn attach(&self, module: &str, entries: Vec<CapEntry>) -> KilnResult<()> {
        if self.guard.is_disposed() {
            return Err(KilnError::disposed("wiring.attach"));
        }
        debug!(
            module,
            capabilities = ?entries.iter().map(CapEntry::id).collect::<Vec<_>>(),
            "Wiring capabilities"
        );
        self.vault.attach(entries);
        Ok(())
    }

    /// Clear the attached layer. Base capabilities are kept.
    pub fn reset(&self) {
        debug!("Resetting wired capabilities");
        self.vault.reset_attached();
    }
}

impl fmt::Debug for WiringApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringApi").finish_non_exhaustive()
    }
}
