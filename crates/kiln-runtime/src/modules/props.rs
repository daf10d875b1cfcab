//! Read access to the host's raw props.

use std::fmt;
use std::sync::Arc;

use kiln_core::{ExecPhaseGuard, KilnResult};
use kiln_modules::{ModuleDefinition, ModuleInstance};

use crate::caps::{HOST_CAP, SYS_CAP};
use crate::host::Host;

use super::PROPS;

/// Facade of the `props` module.
pub struct Props {
    guard: Arc<ExecPhaseGuard>,
    host: Arc<Arc<dyn Host>>,
}

impl Props {
    /// The host's current raw props.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn raw(&self) -> KilnResult<serde_json::Value> {
        self.guard.ensure_not_disposed("props.raw")?;
        Ok(self.host.raw_props())
    }

    /// One prop by key. `None` when absent or when the props are not an
    /// object.
    ///
    /// # Errors
    ///
    /// `Disposed` after disposal.
    pub fn get(&self, key: &str) -> KilnResult<Option<serde_json::Value>> {
        Ok(self.raw()?.get(key).cloned())
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("prototype", &self.host.prototype_name())
            .finish_non_exhaustive()
    }
}

pub(crate) fn definition() -> ModuleDefinition {
    ModuleDefinition::new(PROPS, |ctx| {
        let guard = ctx.vault().get(&SYS_CAP)?;
        let host = ctx.vault().get(&HOST_CAP)?;
        Ok(ModuleInstance::new(Arc::new(Props { guard, host })))
    })
}
