//! Per-instance capability vault.

use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use kiln_core::{KilnError, KilnResult};
use tracing::trace;

use crate::token::{CapEntry, CapabilityToken};

type CapValue = Arc<dyn Any + Send + Sync>;

/// Callback invoked with the new epoch after every effective change batch.
pub type ChangeListener = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct Layers {
    base: BTreeMap<String, CapValue>,
    attached: BTreeMap<String, CapValue>,
    epoch: u64,
}

#[derive(Default)]
struct Shared {
    layers: RwLock<Layers>,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
    next_listener_id: AtomicU64,
}

impl Shared {
    fn read_layers(&self) -> std::sync::RwLockReadGuard<'_, Layers> {
        self.layers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_layers(&self) -> std::sync::RwLockWriteGuard<'_, Layers> {
        self.layers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, id: &str) -> Option<CapValue> {
        let layers = self.read_layers();
        layers
            .attached
            .get(id)
            .or_else(|| layers.base.get(id))
            .cloned()
    }

    fn has<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> bool {
        self.lookup(token.id()).is_some_and(|value| value.is::<T>())
    }

    fn get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> KilnResult<Arc<T>> {
        let value = self.lookup(token.id()).ok_or_else(|| KilnError::CapUnavailable {
            token_id: token.id().to_owned(),
            context: "not present in attached or base layer".to_owned(),
        })?;
        value
            .downcast::<T>()
            .map_err(|_| KilnError::CapUnavailable {
                token_id: token.id().to_owned(),
                context: format!("stored value is not a {}", type_name::<T>()),
            })
    }

    fn try_get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> Option<Arc<T>> {
        self.lookup(token.id())?.downcast::<T>().ok()
    }

    fn epoch(&self) -> u64 {
        self.read_layers().epoch
    }

    fn subscribe(self: &Arc<Self>, listener: ChangeListener) -> ChangeSubscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        ChangeSubscription {
            id,
            shared: Arc::downgrade(self),
        }
    }

    /// Apply `mutate` under the write lock; if it reports a change, bump the
    /// epoch and notify listeners after the lock is released.
    fn mutate(&self, op: &'static str, mutate: impl FnOnce(&mut Layers) -> bool) {
        let epoch = {
            let mut layers = self.write_layers();
            if !mutate(&mut layers) {
                trace!(op, "Capability vault unchanged");
                return;
            }
            layers.epoch = layers.epoch.wrapping_add(1);
            layers.epoch
        };
        trace!(op, epoch, "Capability vault epoch bumped");

        // Snapshot so listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(epoch);
        }
    }
}

fn same_value(a: &CapValue, b: &CapValue) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn merge_into(layer: &mut BTreeMap<String, CapValue>, entries: Vec<CapEntry>) -> bool {
    let mut changed = false;
    for entry in entries {
        let unchanged = layer
            .get(&*entry.id)
            .is_some_and(|existing| same_value(existing, &entry.value));
        if !unchanged {
            layer.insert(entry.id.into_owned(), entry.value);
            changed = true;
        }
    }
    changed
}

/// Two-layer capability store owned by one component instance.
///
/// Cloning yields another handle to the same vault.
#[derive(Clone, Default)]
pub struct CapabilityVault {
    shared: Arc<Shared>,
}

impl CapabilityVault {
    /// Create an empty vault at epoch 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only view for module code.
    #[must_use]
    pub fn view(&self) -> VaultView {
        VaultView {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether [`get`](Self::get) would succeed: the token resolves in either
    /// layer to a value of type `T`.
    #[must_use]
    pub fn has<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> bool {
        self.shared.has(token)
    }

    /// Resolve a capability, checking `attached` before `base`.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::CapUnavailable`] if the capability is missing from
    /// both layers or holds a value of another type.
    pub fn get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> KilnResult<Arc<T>> {
        self.shared.get(token)
    }

    /// Resolve a capability if present.
    #[must_use]
    pub fn try_get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> Option<Arc<T>> {
        self.shared.try_get(token)
    }

    /// Current change epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    /// Register a change listener.
    pub fn on_change(&self, listener: impl Fn(u64) + Send + Sync + 'static) -> ChangeSubscription {
        self.shared.subscribe(Arc::new(listener))
    }

    /// Merge entries into the runtime-owned `base` layer.
    pub fn attach_base(&self, entries: Vec<CapEntry>) {
        self.shared
            .mutate("attach_base", |layers| merge_into(&mut layers.base, entries));
    }

    /// Merge entries into the host-owned `attached` layer.
    pub fn attach(&self, entries: Vec<CapEntry>) {
        self.shared
            .mutate("attach", |layers| merge_into(&mut layers.attached, entries));
    }

    /// Clear the `attached` layer only.
    pub fn reset_attached(&self) {
        self.shared.mutate("reset_attached", |layers| {
            let changed = !layers.attached.is_empty();
            layers.attached.clear();
            changed
        });
    }

    /// Clear both layers.
    pub fn reset_all(&self) {
        self.shared.mutate("reset_all", |layers| {
            let changed = !layers.attached.is_empty() || !layers.base.is_empty();
            layers.attached.clear();
            layers.base.clear();
            changed
        });
    }

    /// Ids present in each layer, for diagnostics.
    #[must_use]
    pub fn ids(&self) -> (Vec<String>, Vec<String>) {
        let layers = self.shared.read_layers();
        (
            layers.base.keys().cloned().collect(),
            layers.attached.keys().cloned().collect(),
        )
    }
}

impl fmt::Debug for CapabilityVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, attached) = self.ids();
        f.debug_struct("CapabilityVault")
            .field("epoch", &self.epoch())
            .field("base", &base)
            .field("attached", &attached)
            .finish()
    }
}

/// Read-only handle to a [`CapabilityVault`].
#[derive(Clone)]
pub struct VaultView {
    shared: Arc<Shared>,
}

impl VaultView {
    /// Whether [`get`](Self::get) would succeed: the token resolves in either
    /// layer to a value of type `T`.
    #[must_use]
    pub fn has<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> bool {
        self.shared.has(token)
    }

    /// Resolve a capability, checking `attached` before `base`.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::CapUnavailable`] if the capability is missing.
    pub fn get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> KilnResult<Arc<T>> {
        self.shared.get(token)
    }

    /// Resolve a capability if present.
    #[must_use]
    pub fn try_get<T: Any + Send + Sync>(&self, token: &CapabilityToken<T>) -> Option<Arc<T>> {
        self.shared.try_get(token)
    }

    /// Current change epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    /// Register a change listener.
    pub fn on_change(&self, listener: impl Fn(u64) + Send + Sync + 'static) -> ChangeSubscription {
        self.shared.subscribe(Arc::new(listener))
    }
}

impl fmt::Debug for VaultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultView")
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

/// Handle returned by `on_change`; dropping it does not unsubscribe.
#[derive(Debug)]
pub struct ChangeSubscription {
    id: u64,
    shared: Weak<Shared>,
}

impl ChangeSubscription {
    /// Remove the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYS: CapabilityToken<String> = CapabilityToken::new("@kiln/test/sys");
    const NODE: CapabilityToken<u32> = CapabilityToken::new("@kiln/test/node");

    fn recorder(vault: &CapabilityVault) -> Arc<Mutex<Vec<u64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        vault.on_change(move |epoch| sink.lock().unwrap().push(epoch));
        seen
    }

    #[test]
    fn test_missing_capability_is_fatal() {
        let vault = CapabilityVault::new();
        let err = vault.get(&SYS).unwrap_err();
        assert_eq!(err.code(), "CAP_UNAVAILABLE");
        assert!(err.to_string().contains("@kiln/test/sys"));
        assert!(vault.try_get(&SYS).is_none());
        assert!(!vault.has(&SYS));
    }

    #[test]
    fn test_attached_shadows_base() {
        let vault = CapabilityVault::new();
        vault.attach_base(vec![NODE.entry(1)]);
        vault.attach(vec![NODE.entry(2)]);
        assert_eq!(*vault.get(&NODE).unwrap(), 2);

        vault.reset_attached();
        assert_eq!(*vault.get(&NODE).unwrap(), 1);
    }

    #[test]
    fn test_reset_attached_keeps_base() {
        let vault = CapabilityVault::new();
        vault.attach_base(vec![SYS.entry("guard".into())]);
        vault.attach(vec![NODE.entry(7)]);

        vault.reset_attached();
        assert!(vault.get(&SYS).is_ok());
        assert!(!vault.has(&NODE));

        vault.reset_all();
        assert!(vault.get(&SYS).is_err());
    }

    #[test]
    fn test_epoch_bumps_once_per_effective_batch() {
        let vault = CapabilityVault::new();
        let seen = recorder(&vault);

        vault.attach(vec![NODE.entry(1), SYS.entry("a".into())]);
        assert_eq!(vault.epoch(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_same_arc_is_a_noop() {
        let vault = CapabilityVault::new();
        let seen = recorder(&vault);
        let shared = Arc::new(5_u32);

        vault.attach(vec![NODE.entry_shared(Arc::clone(&shared))]);
        vault.attach(vec![NODE.entry_shared(Arc::clone(&shared))]);
        assert_eq!(vault.epoch(), 1);

        // Equal value, different allocation: reference diff sees a change.
        vault.attach(vec![NODE.entry(5)]);
        assert_eq!(vault.epoch(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_resets_on_empty_layers_are_noops() {
        let vault = CapabilityVault::new();
        let seen = recorder(&vault);
        vault.reset_attached();
        vault.reset_all();
        vault.attach(Vec::new());
        assert_eq!(vault.epoch(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let vault = CapabilityVault::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let sink = Arc::clone(&order);
            vault.on_change(move |_| sink.lock().unwrap().push(tag));
        }
        vault.attach(vec![NODE.entry(1)]);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let vault = CapabilityVault::new();
        let count = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&count);
        let sub = vault.on_change(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        vault.attach(vec![NODE.entry(1)]);
        sub.unsubscribe();
        sub.unsubscribe();
        vault.attach(vec![NODE.entry(2)]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_read_vault_reentrantly() {
        let vault = CapabilityVault::new();
        let view = vault.view();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        vault.on_change(move |_| {
            *sink.lock().unwrap() = view.try_get(&NODE).map(|v| *v);
        });
        vault.attach(vec![NODE.entry(9)]);
        assert_eq!(*seen.lock().unwrap(), Some(9));
    }

    #[test]
    fn test_type_mismatch_reports_cap_unavailable() {
        let vault = CapabilityVault::new();
        vault.attach(vec![NODE.entry(3)]);
        let wrong: CapabilityToken<String> = CapabilityToken::new("@kiln/test/node");
        let err = vault.get(&wrong).unwrap_err();
        assert_eq!(err.code(), "CAP_UNAVAILABLE");
        assert!(vault.view().try_get(&wrong).is_none());
    }

    #[test]
    fn test_has_agrees_with_get_on_type_mismatch() {
        let vault = CapabilityVault::new();
        vault.attach(vec![NODE.entry(3)]);
        let wrong: CapabilityToken<String> = CapabilityToken::new("@kiln/test/node");
        assert!(vault.has(&NODE));
        assert!(!vault.has(&wrong));
        assert!(!vault.view().has(&wrong));
        assert!(vault.get(&wrong).is_err());

        // An attached value of the wrong type still shadows a matching base.
        vault.attach_base(vec![wrong.entry("base".to_owned())]);
        assert!(!vault.has(&wrong));
        assert!(vault.try_get(&wrong).is_none());
    }
}
