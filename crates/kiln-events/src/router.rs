//! Event router: one real listener per native type, three delivery channels.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use kiln_core::{KilnError, KilnResult};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::event::{Channel, CustomEvent, HOST_PREFIX, NATIVE_PREFIX, NativeEvent, RoutedEvent};
use crate::mapping::MappingTable;
use crate::node::{NativeHandler, PlatformNode, TargetKind};

/// Callback registered on a synthetic target.
pub type EventListener = Arc<dyn Fn(&RoutedEvent) -> KilnResult<()> + Send + Sync>;

/// Live enable/disable predicate, evaluated on every dispatch.
pub type GatePredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct Registration {
    id: ListenerId,
    listener: EventListener,
}

struct Binding {
    refcount: usize,
    handler: NativeHandler,
}

#[derive(Default)]
struct TargetState {
    node: Option<Arc<dyn PlatformNode>>,
    /// Registration type string -> listeners in registration order.
    listeners: HashMap<String, Vec<Registration>>,
    /// Native type -> bound real listener.
    bindings: HashMap<String, Binding>,
}

impl TargetState {
    fn snapshot(&self, registration: &str) -> Delivery {
        let listeners = self
            .listeners
            .get(registration)
            .map(|regs| regs.iter().map(|r| (r.id, Arc::clone(&r.listener))).collect())
            .unwrap_or_default();
        Delivery {
            registration: registration.to_owned(),
            listeners,
        }
    }

    fn is_registered(&self, registration: &str, id: ListenerId) -> bool {
        self.listeners
            .get(registration)
            .is_some_and(|regs| regs.iter().any(|r| r.id == id))
    }
}

/// Listeners of one registration type, captured when a dispatch starts.
struct Delivery {
    registration: String,
    listeners: Vec<(ListenerId, EventListener)>,
}

struct RouterState {
    root: TargetState,
    global: TargetState,
    disposed: bool,
}

impl RouterState {
    fn target(&self, kind: TargetKind) -> &TargetState {
        match kind {
            TargetKind::Root => &self.root,
            TargetKind::Global => &self.global,
        }
    }

    fn target_mut(&mut self, kind: TargetKind) -> &mut TargetState {
        match kind {
            TargetKind::Root => &mut self.root,
            TargetKind::Global => &mut self.global,
        }
    }
}

/// A node call deferred until the router lock is released.
enum NodeOp {
    Bind(Arc<dyn PlatformNode>, String, NativeHandler),
    Unbind(Arc<dyn PlatformNode>, String, NativeHandler),
}

impl NodeOp {
    fn apply(self, kind: TargetKind) {
        match self {
            Self::Bind(node, native, handler) => {
                trace!(target_kind = %kind, native = %native, "Binding native listener");
                node.add_native_listener(&native, handler);
            },
            Self::Unbind(node, native, handler) => {
                trace!(target_kind = %kind, native = %native, "Unbinding native listener");
                node.remove_native_listener(&native, &handler);
            },
        }
    }
}

fn same_listener(a: &EventListener, b: &EventListener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct RouterInner {
    state: Mutex<RouterState>,
    gate: GatePredicate,
    table: MappingTable,
}

impl RouterInner {
    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Native types a registration on `kind` needs bound.
    fn natives_for(&self, kind: TargetKind, registration: &str) -> Vec<String> {
        match Channel::parse(registration) {
            (Channel::Native | Channel::Host, native) => vec![native.to_owned()],
            (Channel::Semantic, semantic) => self.table.natives_for(semantic, kind),
        }
    }

    fn dispatch(&self, kind: TargetKind, event: &Arc<NativeEvent>) -> KilnResult<()> {
        if self.is_disposed() {
            trace!(event_type = %event.event_type(), "Router disposed, dropping event");
            return Ok(());
        }
        if !(self.gate)() {
            trace!(event_type = %event.event_type(), "Router gate closed, dropping event");
            return Ok(());
        }

        let (natives, semantics, hosts) = {
            let state = self.lock();
            let target = state.target(kind);
            let natives = target.snapshot(&format!("{NATIVE_PREFIX}{}", event.event_type()));
            let semantics: Vec<(CustomEvent, Delivery)> = self
                .table
                .rules_for(kind, event)
                .map(|rule| {
                    (
                        CustomEvent::new(rule.semantic(), Arc::clone(event)),
                        target.snapshot(rule.semantic()),
                    )
                })
                .collect();
            let hosts = target.snapshot(&format!("{HOST_PREFIX}{}", event.event_type()));
            (natives, semantics, hosts)
        };
        trace!(
            target_kind = %kind,
            event_type = %event.event_type(),
            native = natives.listeners.len(),
            semantic = semantics.len(),
            host = hosts.listeners.len(),
            "Dispatching native event"
        );

        let native = RoutedEvent::Native(Arc::clone(event));
        self.deliver(kind, &natives, &native)?;
        for (custom, delivery) in semantics {
            self.deliver(kind, &delivery, &RoutedEvent::Semantic(custom))?;
        }
        let host = RoutedEvent::Host(Arc::clone(event));
        self.deliver(kind, &hosts, &host)
    }

    /// Deliver to the captured listeners that are still registered. A
    /// listener removed (or a router disposed) by an earlier listener of the
    /// same dispatch is skipped.
    fn deliver(
        &self,
        kind: TargetKind,
        delivery: &Delivery,
        event: &RoutedEvent,
    ) -> KilnResult<()> {
        for (id, listener) in &delivery.listeners {
            let live = {
                let state = self.lock();
                !state.disposed && state.target(kind).is_registered(&delivery.registration, *id)
            };
            if !live {
                trace!(
                    listener_id = %id,
                    registration = %delivery.registration,
                    "Listener removed mid-dispatch, skipping"
                );
                continue;
            }
            listener(event)?;
        }
        Ok(())
    }
}

/// Routes real platform events from a root node and a global node into
/// semantic, native-passthrough and host-passthrough channels.
///
/// Cloning yields another handle to the same router.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<RouterInner>,
}

impl EventRouter {
    /// Create a router. Either node may be absent; registrations on an absent
    /// node fail with [`KilnError::EventTargetUnavailable`].
    pub fn new(
        root: Option<Arc<dyn PlatformNode>>,
        global: Option<Arc<dyn PlatformNode>>,
        table: MappingTable,
        is_enabled: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                state: Mutex::new(RouterState {
                    root: TargetState {
                        node: root,
                        ..TargetState::default()
                    },
                    global: TargetState {
                        node: global,
                        ..TargetState::default()
                    },
                    disposed: false,
                }),
                gate: Arc::new(is_enabled),
                table,
            }),
        }
    }

    /// Synthetic façade over the root node.
    #[must_use]
    pub fn root_target(&self) -> RouterTarget {
        RouterTarget {
            router: self.clone(),
            kind: TargetKind::Root,
        }
    }

    /// Synthetic façade over the global node.
    #[must_use]
    pub fn global_target(&self) -> RouterTarget {
        RouterTarget {
            router: self.clone(),
            kind: TargetKind::Global,
        }
    }

    /// The mapping table.
    #[must_use]
    pub fn table(&self) -> &MappingTable {
        &self.inner.table
    }

    /// Whether a node was supplied for `kind`.
    #[must_use]
    pub fn has_target(&self, kind: TargetKind) -> bool {
        self.inner.lock().target(kind).node.is_some()
    }

    /// Register `listener` for `registration` (`native:<type>`, `host.<type>`
    /// or a semantic type) on the `kind` target.
    ///
    /// Registering the same listener twice yields two deliveries per firing.
    ///
    /// # Errors
    ///
    /// [`KilnError::Disposed`] after [`dispose`](Self::dispose), or
    /// [`KilnError::EventTargetUnavailable`] if no node was supplied for
    /// `kind`.
    pub fn add_listener(
        &self,
        kind: TargetKind,
        registration: &str,
        listener: EventListener,
    ) -> KilnResult<ListenerId> {
        let natives = self.inner.natives_for(kind, registration);
        let id = ListenerId::new();
        let mut ops = Vec::new();
        {
            let mut state = self.inner.lock();
            if state.disposed {
                return Err(KilnError::disposed("event.add_listener"));
            }
            let target = state.target_mut(kind);
            let Some(node) = target.node.clone() else {
                return Err(KilnError::EventTargetUnavailable {
                    kind: kind.to_string(),
                });
            };

            target
                .listeners
                .entry(registration.to_owned())
                .or_default()
                .push(Registration { id, listener });

            for native in natives {
                if let Some(binding) = target.bindings.get_mut(&native) {
                    binding.refcount = binding.refcount.saturating_add(1);
                    continue;
                }
                let handler = self.native_handler(kind);
                target.bindings.insert(
                    native.clone(),
                    Binding {
                        refcount: 1,
                        handler: Arc::clone(&handler),
                    },
                );
                ops.push(NodeOp::Bind(Arc::clone(&node), native, handler));
            }
        }

        trace!(target_kind = %kind, registration, listener_id = %id, "Listener added");
        for op in ops {
            op.apply(kind);
        }
        Ok(id)
    }

    fn native_handler(&self, kind: TargetKind) -> NativeHandler {
        let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
        Arc::new(move |event: &Arc<NativeEvent>| match weak.upgrade() {
            Some(inner) => inner.dispatch(kind, event),
            None => Ok(()),
        })
    }

    /// Remove the earliest registration of exactly `listener` (pointer
    /// identity) for `registration` on `kind`. Returns whether one was
    /// removed; unknown listeners and a disposed router are no-ops.
    ///
    /// Removal is visible to a dispatch already in progress: a listener
    /// removed by an earlier listener of the same event is not invoked.
    pub fn remove_listener(
        &self,
        kind: TargetKind,
        registration: &str,
        listener: &EventListener,
    ) -> bool {
        self.remove_where(kind, registration, |r| same_listener(&r.listener, listener))
    }

    /// Remove the registration identified by `id`.
    pub fn remove_by_id(&self, kind: TargetKind, registration: &str, id: ListenerId) -> bool {
        self.remove_where(kind, registration, |r| r.id == id)
    }

    fn remove_where(
        &self,
        kind: TargetKind,
        registration: &str,
        matches: impl Fn(&Registration) -> bool,
    ) -> bool {
        let natives = self.inner.natives_for(kind, registration);
        let mut ops = Vec::new();
        {
            let mut state = self.inner.lock();
            if state.disposed {
                return false;
            }
            let target = state.target_mut(kind);
            let Some(regs) = target.listeners.get_mut(registration) else {
                return false;
            };
            let Some(index) = regs.iter().position(&matches) else {
                return false;
            };
            regs.remove(index);
            if regs.is_empty() {
                target.listeners.remove(registration);
            }

            for native in natives {
                let Some(binding) = target.bindings.get_mut(&native) else {
                    continue;
                };
                binding.refcount = binding.refcount.saturating_sub(1);
                if binding.refcount > 0 {
                    continue;
                }
                if let (Some(binding), Some(node)) =
                    (target.bindings.remove(&native), target.node.clone())
                {
                    ops.push(NodeOp::Unbind(node, native, binding.handler));
                }
            }
        }

        trace!(target_kind = %kind, registration, "Listener removed");
        for op in ops {
            op.apply(kind);
        }
        true
    }

    /// Detach every bound native listener, clear both targets and make the
    /// router permanently inert. Later calls are no-ops.
    pub fn dispose(&self) {
        let mut ops = Vec::new();
        {
            let mut state = self.inner.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            for kind in [TargetKind::Root, TargetKind::Global] {
                let target = state.target_mut(kind);
                target.listeners.clear();
                let node = target.node.clone();
                for (native, binding) in target.bindings.drain() {
                    if let Some(node) = &node {
                        ops.push((kind, NodeOp::Unbind(Arc::clone(node), native, binding.handler)));
                    }
                }
            }
        }

        let unbound = ops.len();
        for (kind, op) in ops {
            op.apply(kind);
        }
        debug!(unbound, "Event router disposed");
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Native types currently bound on the `kind` node, sorted.
    #[must_use]
    pub fn bound_native_types(&self, kind: TargetKind) -> Vec<String> {
        let mut natives: Vec<String> = self
            .inner
            .lock()
            .target(kind)
            .bindings
            .keys()
            .cloned()
            .collect();
        natives.sort();
        natives
    }

    /// Number of registrations for `registration` on `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: TargetKind, registration: &str) -> usize {
        self.inner
            .lock()
            .target(kind)
            .listeners
            .get(registration)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EventRouter")
            .field("root", &state.root.node.is_some())
            .field("global", &state.global.node.is_some())
            .field("disposed", &state.disposed)
            .finish_non_exhaustive()
    }
}

/// `EventTarget`-shaped façade bound to one of the router's nodes.
#[derive(Clone, Debug)]
pub struct RouterTarget {
    router: EventRouter,
    kind: TargetKind,
}

impl RouterTarget {
    /// Which node this façade is bound to.
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Register a listener. See [`EventRouter::add_listener`].
    ///
    /// # Errors
    ///
    /// `Disposed` or `EventTargetUnavailable`.
    pub fn add_event_listener(
        &self,
        registration: &str,
        listener: EventListener,
    ) -> KilnResult<ListenerId> {
        self.router.add_listener(self.kind, registration, listener)
    }

    /// Remove a listener. See [`EventRouter::remove_listener`].
    pub fn remove_event_listener(&self, registration: &str, listener: &EventListener) -> bool {
        self.router.remove_listener(self.kind, registration, listener)
    }

    /// Number of registrations for `registration`.
    #[must_use]
    pub fn listener_count(&self, registration: &str) -> usize {
        self.router.listener_count(self.kind, registration)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Minimal [`PlatformNode`] for router unit tests. `kiln_test::MockNode`
    /// cannot be used here: `kiln-test` depends on this crate, and its node
    /// would implement a different copy of the trait.
    #[derive(Default)]
    struct TestNode {
        handlers: Mutex<Vec<(String, NativeHandler)>>,
    }

    impl TestNode {
        fn fire(&self, event: NativeEvent) -> KilnResult<()> {
            let event = Arc::new(event);
            let handlers: Vec<NativeHandler> = self
                .handlers
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| t == event.event_type())
                .map(|(_, h)| Arc::clone(h))
                .collect();
            for handler in handlers {
                handler(&event)?;
            }
            Ok(())
        }

        fn bound(&self) -> Vec<String> {
            self.handlers
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }
    }

    impl PlatformNode for TestNode {
        fn add_native_listener(&self, event_type: &str, handler: NativeHandler) {
            self.handlers
                .lock()
                .unwrap()
                .push((event_type.to_owned(), handler));
        }

        fn remove_native_listener(&self, event_type: &str, handler: &NativeHandler) {
            let mut handlers = self.handlers.lock().unwrap();
            if let Some(i) = handlers.iter().position(|(t, h)| {
                t == event_type && std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(handler))
            }) {
                handlers.remove(i);
            }
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log) -> EventListener {
        let log = Arc::clone(log);
        Arc::new(move |event: &RoutedEvent| {
            log.lock().unwrap().push(event.to_string());
            Ok(())
        })
    }

    fn router_with_root() -> (Arc<TestNode>, EventRouter) {
        let node = Arc::new(TestNode::default());
        let root: Arc<dyn PlatformNode> = node.clone();
        let router = EventRouter::new(Some(root), None, MappingTable::builtin(), || true);
        (node, router)
    }

    #[test]
    fn test_binding_is_lazy_and_refcounted() {
        let (node, router) = router_with_root();
        assert!(node.bound().is_empty());

        let log = Log::default();
        let a = recorder(&log);
        let b = recorder(&log);
        router.add_listener(TargetKind::Root, "native:click", Arc::clone(&a)).unwrap();
        router.add_listener(TargetKind::Root, "press.commit", Arc::clone(&b)).unwrap();
        assert_eq!(node.bound(), vec!["click", "keydown"]);

        router.remove_listener(TargetKind::Root, "native:click", &a);
        assert_eq!(router.bound_native_types(TargetKind::Root), vec!["click", "keydown"]);

        router.remove_listener(TargetKind::Root, "press.commit", &b);
        assert!(node.bound().is_empty());
        assert!(router.bound_native_types(TargetKind::Root).is_empty());
    }

    #[test]
    fn test_click_fans_out_to_all_channels() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let listener = recorder(&log);
        for registration in ["host.click", "press.commit", "native:click"] {
            router
                .add_listener(TargetKind::Root, registration, Arc::clone(&listener))
                .unwrap();
        }
        node.fire(NativeEvent::mouse("click")).unwrap();
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["host.click", "native:click", "press.commit"]);
    }

    #[test]
    fn test_semantic_detail_is_the_native_event() {
        let (node, router) = router_with_root();
        let natives: Arc<Mutex<Vec<Arc<NativeEvent>>>> = Arc::default();
        let sink = Arc::clone(&natives);
        let listener: EventListener = Arc::new(move |event: &RoutedEvent| {
            sink.lock().unwrap().push(Arc::clone(event.native()));
            Ok(())
        });
        router
            .add_listener(TargetKind::Root, "native:click", Arc::clone(&listener))
            .unwrap();
        router
            .add_listener(TargetKind::Root, "press.commit", listener)
            .unwrap();
        node.fire(NativeEvent::mouse("click")).unwrap();

        let natives = natives.lock().unwrap();
        assert_eq!(natives.len(), 2);
        assert!(Arc::ptr_eq(&natives[0], &natives[1]));
    }

    #[test]
    fn test_duplicate_registration_delivers_twice_and_removes_once() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let cb = recorder(&log);
        let other = recorder(&log);
        let root = router.root_target();
        root.add_event_listener("native:click", Arc::clone(&cb)).unwrap();
        root.add_event_listener("native:click", Arc::clone(&cb)).unwrap();
        root.add_event_listener("native:click", Arc::clone(&other)).unwrap();

        node.fire(NativeEvent::mouse("click")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);

        assert!(root.remove_event_listener("native:click", &cb));
        assert_eq!(root.listener_count("native:click"), 2);
        assert!(root.remove_event_listener("native:click", &other));
        assert!(!root.remove_event_listener("native:click", &other));

        log.lock().unwrap().clear();
        node.fire(NativeEvent::mouse("click")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_gate_evaluated_per_dispatch() {
        let node = Arc::new(TestNode::default());
        let enabled = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&enabled);
        let root: Arc<dyn PlatformNode> = node.clone();
        let router = EventRouter::new(Some(root), None, MappingTable::builtin(), move || {
            gate.load(Ordering::SeqCst)
        });
        let log = Log::default();
        for registration in ["native:click", "press.commit", "host.click"] {
            router
                .add_listener(TargetKind::Root, registration, recorder(&log))
                .unwrap();
        }

        enabled.store(false, Ordering::SeqCst);
        node.fire(NativeEvent::mouse("click")).unwrap();
        assert!(log.lock().unwrap().is_empty());

        enabled.store(true, Ordering::SeqCst);
        node.fire(NativeEvent::mouse("click")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_global_only_fails_on_global_registration() {
        let (_node, router) = router_with_root();
        let log = Log::default();
        assert!(router.add_listener(TargetKind::Root, "press.commit", recorder(&log)).is_ok());
        let err = router
            .add_listener(TargetKind::Global, "key.down", recorder(&log))
            .unwrap_err();
        assert_eq!(
            err,
            KilnError::EventTargetUnavailable {
                kind: "global".into()
            }
        );
        assert!(!router.has_target(TargetKind::Global));
    }

    #[test]
    fn test_press_keys_commit_on_root_and_keydown_on_global() {
        let root_node = Arc::new(TestNode::default());
        let global_node = Arc::new(TestNode::default());
        let root: Arc<dyn PlatformNode> = root_node.clone();
        let global: Arc<dyn PlatformNode> = global_node.clone();
        let router = EventRouter::new(Some(root), Some(global), MappingTable::builtin(), || true);

        let log = Log::default();
        router.add_listener(TargetKind::Root, "press.commit", recorder(&log)).unwrap();
        router.add_listener(TargetKind::Global, "key.down", recorder(&log)).unwrap();
        assert_eq!(global_node.bound(), vec!["keydown"]);

        root_node.fire(NativeEvent::keyboard("keydown", "Enter", "Enter")).unwrap();
        root_node.fire(NativeEvent::keyboard("keydown", "a", "KeyA")).unwrap();
        global_node.fire(NativeEvent::keyboard("keydown", "a", "KeyA")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["press.commit", "key.down"]);
    }

    #[test]
    fn test_listener_error_aborts_dispatch() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let failing: EventListener = Arc::new(|_: &RoutedEvent| Err(KilnError::disposed("boom")));
        router.add_listener(TargetKind::Root, "native:click", failing).unwrap();
        router.add_listener(TargetKind::Root, "native:click", recorder(&log)).unwrap();

        let err = node.fire(NativeEvent::mouse("click")).unwrap_err();
        assert_eq!(err, KilnError::disposed("boom"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispose_is_total_and_permanent() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let listener = recorder(&log);
        router.add_listener(TargetKind::Root, "native:click", Arc::clone(&listener)).unwrap();
        router.add_listener(TargetKind::Root, "press.commit", Arc::clone(&listener)).unwrap();

        // Keep a handler around to simulate a host that still holds it.
        let stale = node.handlers.lock().unwrap()[0].1.clone();

        router.dispose();
        router.dispose();
        assert!(node.bound().is_empty());
        assert_eq!(router.listener_count(TargetKind::Root, "native:click"), 0);

        stale(&Arc::new(NativeEvent::mouse("click"))).unwrap();
        assert!(log.lock().unwrap().is_empty());

        let err = router
            .add_listener(TargetKind::Root, "native:click", listener)
            .unwrap_err();
        assert!(err.is_disposed());
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let victim = recorder(&log);
        let handle = router.clone();
        let target = Arc::clone(&victim);
        let remover: EventListener = Arc::new(move |_: &RoutedEvent| {
            assert!(handle.remove_listener(TargetKind::Root, "press.commit", &target));
            Ok(())
        });
        router.add_listener(TargetKind::Root, "native:click", remover).unwrap();
        router
            .add_listener(TargetKind::Root, "press.commit", Arc::clone(&victim))
            .unwrap();
        router.add_listener(TargetKind::Root, "host.click", recorder(&log)).unwrap();

        node.fire(NativeEvent::mouse("click")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["host.click"]);
        assert_eq!(router.listener_count(TargetKind::Root, "press.commit"), 0);
    }

    #[test]
    fn test_duplicate_removed_mid_dispatch_still_delivers_remaining_copy() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let cb = recorder(&log);
        let handle = router.clone();
        let target = Arc::clone(&cb);
        let remover: EventListener = Arc::new(move |_: &RoutedEvent| {
            handle.remove_listener(TargetKind::Root, "native:click", &target);
            Ok(())
        });
        router.add_listener(TargetKind::Root, "native:click", remover).unwrap();
        router.add_listener(TargetKind::Root, "native:click", Arc::clone(&cb)).unwrap();
        router.add_listener(TargetKind::Root, "native:click", Arc::clone(&cb)).unwrap();

        node.fire(NativeEvent::mouse("click")).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispose_during_dispatch_stops_delivery() {
        let (node, router) = router_with_root();
        let log = Log::default();
        let handle = router.clone();
        let disposer: EventListener = Arc::new(move |_: &RoutedEvent| {
            handle.dispose();
            Ok(())
        });
        router.add_listener(TargetKind::Root, "native:click", disposer).unwrap();
        router.add_listener(TargetKind::Root, "native:click", recorder(&log)).unwrap();
        router.add_listener(TargetKind::Root, "host.click", recorder(&log)).unwrap();

        node.fire(NativeEvent::mouse("click")).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert!(router.is_disposed());
    }
}
