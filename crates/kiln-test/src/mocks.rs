//! Mock host, platform node and host-side capability providers.
//!
//! These serve crates downstream of the runtime. `kiln-events` and
//! `kiln-runtime` keep small private doubles for their own unit tests, since
//! depending on this crate from there would duplicate their types.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_capabilities::CapEntry;
use kiln_core::{KilnError, KilnResult};
use kiln_events::{NativeEvent, NativeHandler, PlatformNode};
use kiln_runtime::{
    CONTEXT_SOURCE_CAP, CommitSignal, ContextSource, EVENT_GATE_CAP, EventGate, GLOBAL_NODE_CAP,
    Host, ROOT_NODE_CAP, ScheduledTask, TRIGGER_SINK_CAP, TriggerSignal, TriggerSink, View,
    WiringApi,
};
use serde_json::Value;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`PlatformNode`] that records native listeners and dispatches fired
/// events to them in registration order.
#[derive(Default)]
pub struct MockNode {
    handlers: Mutex<Vec<(String, NativeHandler)>>,
}

impl MockNode {
    /// Create a node with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch `event` to every listener bound for its type.
    ///
    /// Returns the shared event so callers can inspect
    /// [`NativeEvent::default_prevented`].
    ///
    /// # Errors
    ///
    /// The first error a listener returns; later listeners do not run.
    pub fn fire(&self, event: NativeEvent) -> KilnResult<Arc<NativeEvent>> {
        let event = Arc::new(event);
        let handlers: Vec<NativeHandler> = lock(&self.handlers)
            .iter()
            .filter(|(t, _)| t == event.event_type())
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(&event)?;
        }
        Ok(event)
    }

    /// Native types currently bound, one entry per listener.
    #[must_use]
    pub fn bound_types(&self) -> Vec<String> {
        lock(&self.handlers).iter().map(|(t, _)| t.clone()).collect()
    }

    /// Listeners bound for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        lock(&self.handlers)
            .iter()
            .filter(|(t, _)| t == event_type)
            .count()
    }

    /// Whether no listener is bound.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        lock(&self.handlers).is_empty()
    }
}

impl PlatformNode for MockNode {
    fn add_native_listener(&self, event_type: &str, handler: NativeHandler) {
        lock(&self.handlers).push((event_type.to_owned(), handler));
    }

    fn remove_native_listener(&self, event_type: &str, handler: &NativeHandler) {
        let mut handlers = lock(&self.handlers);
        if let Some(i) = handlers.iter().position(|(t, h)| {
            t == event_type && std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(handler))
        }) {
            handlers.remove(i);
        }
    }
}

impl fmt::Debug for MockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockNode")
            .field("bound", &self.bound_types())
            .finish()
    }
}

/// A [`TriggerSink`] that records every activation.
#[derive(Debug, Default)]
pub struct MockTriggerSink {
    signals: Mutex<Vec<TriggerSignal>>,
}

impl MockTriggerSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prototype names of the recorded activations, in order.
    #[must_use]
    pub fn triggered(&self) -> Vec<String> {
        lock(&self.signals)
            .iter()
            .map(|s| s.prototype.clone())
            .collect()
    }

    /// Drain the recorded activations.
    pub fn take(&self) -> Vec<TriggerSignal> {
        std::mem::take(&mut *lock(&self.signals))
    }
}

impl TriggerSink for MockTriggerSink {
    fn trigger(&self, signal: TriggerSignal) -> KilnResult<()> {
        lock(&self.signals).push(signal);
        Ok(())
    }
}

/// A [`ContextSource`] backed by a map.
#[derive(Debug, Default)]
pub struct MockContextSource {
    values: Mutex<HashMap<String, Value>>,
}

impl MockContextSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide `value` under `key`.
    #[must_use]
    pub fn with(self, key: &str, value: Value) -> Self {
        lock(&self.values).insert(key.to_owned(), value);
        self
    }
}

impl ContextSource for MockContextSource {
    fn lookup(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }
}

/// A [`Host`] that records commits and queues scheduled tasks until the test
/// drains them.
///
/// By default every commit is reported done immediately. With
/// [`manual_done`](Self::manual_done) the signals are held until
/// [`complete_commits`](Self::complete_commits).
pub struct MockHost {
    name: String,
    props: Mutex<Value>,
    auto_done: bool,
    wiring: Vec<CapEntry>,
    views: Mutex<Vec<View>>,
    signals: Mutex<Vec<CommitSignal>>,
    tasks: Mutex<VecDeque<ScheduledTask>>,
    errors: Mutex<Vec<KilnError>>,
    ready_calls: AtomicUsize,
    unmount_begins: AtomicUsize,
}

impl MockHost {
    /// Host for the prototype named `name`, with `null` props.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            props: Mutex::new(Value::Null),
            auto_done: true,
            wiring: Vec::new(),
            views: Mutex::default(),
            signals: Mutex::default(),
            tasks: Mutex::default(),
            errors: Mutex::default(),
            ready_calls: AtomicUsize::new(0),
            unmount_begins: AtomicUsize::new(0),
        }
    }

    /// Initial props.
    #[must_use]
    pub fn with_props(self, props: Value) -> Self {
        *lock(&self.props) = props;
        self
    }

    /// Hold commit signals instead of completing them.
    #[must_use]
    pub fn manual_done(mut self) -> Self {
        self.auto_done = false;
        self
    }

    /// Attach `entry` when the runtime becomes ready.
    #[must_use]
    pub fn wire(mut self, entry: CapEntry) -> Self {
        self.wiring.push(entry);
        self
    }

    /// Wire `node` as the root target.
    #[must_use]
    pub fn with_root_node(self, node: &Arc<MockNode>) -> Self {
        let node: Arc<dyn PlatformNode> = node.clone();
        self.wire(ROOT_NODE_CAP.entry(node))
    }

    /// Wire `node` as the global target.
    #[must_use]
    pub fn with_global_node(self, node: &Arc<MockNode>) -> Self {
        let node: Arc<dyn PlatformNode> = node.clone();
        self.wire(GLOBAL_NODE_CAP.entry(node))
    }

    /// Wire an event gate backed by `predicate`.
    #[must_use]
    pub fn with_gate(self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.wire(EVENT_GATE_CAP.entry(EventGate::new(predicate)))
    }

    /// Wire `sink` as the trigger sink.
    #[must_use]
    pub fn with_trigger_sink(self, sink: &Arc<MockTriggerSink>) -> Self {
        let sink: Arc<dyn TriggerSink> = sink.clone();
        self.wire(TRIGGER_SINK_CAP.entry(sink))
    }

    /// Wire `source` as the context source.
    #[must_use]
    pub fn with_context_source(self, source: &Arc<MockContextSource>) -> Self {
        let source: Arc<dyn ContextSource> = source.clone();
        self.wire(CONTEXT_SOURCE_CAP.entry(source))
    }

    /// Replace the props seen by the next render.
    pub fn set_props(&self, props: Value) {
        *lock(&self.props) = props;
    }

    /// Number of commits received.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        lock(&self.views).len()
    }

    /// All committed views, in order.
    #[must_use]
    pub fn views(&self) -> Vec<View> {
        lock(&self.views).clone()
    }

    /// The most recent committed view.
    #[must_use]
    pub fn last_view(&self) -> Option<View> {
        lock(&self.views).last().cloned()
    }

    /// Tasks scheduled and not yet run.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Run queued tasks, including ones scheduled while draining, in FIFO
    /// order. Returns how many ran.
    ///
    /// # Errors
    ///
    /// The first task error. Remaining tasks stay queued.
    pub fn run_tasks(&self) -> KilnResult<usize> {
        let mut ran: usize = 0;
        while self.run_next_task()? {
            ran = ran.saturating_add(1);
        }
        Ok(ran)
    }

    /// Run one queued task. Returns `false` if the queue was empty.
    ///
    /// # Errors
    ///
    /// Whatever the task returned.
    pub fn run_next_task(&self) -> KilnResult<bool> {
        // The lock is released before the task runs; tasks may schedule more.
        let task = lock(&self.tasks).pop_front();
        match task {
            Some(task) => task().map(|()| true),
            None => Ok(false),
        }
    }

    /// Held commit signals, oldest first.
    pub fn take_signals(&self) -> Vec<CommitSignal> {
        std::mem::take(&mut *lock(&self.signals))
    }

    /// Report every held commit done, oldest first.
    ///
    /// # Errors
    ///
    /// The first error a signal returned. Later signals are still held.
    pub fn complete_commits(&self) -> KilnResult<usize> {
        let mut held: VecDeque<CommitSignal> = self.take_signals().into();
        let mut completed: usize = 0;
        while let Some(signal) = held.pop_front() {
            if let Err(err) = signal.done() {
                lock(&self.signals).extend(held);
                return Err(err);
            }
            completed = completed.saturating_add(1);
        }
        Ok(completed)
    }

    /// Errors raised by auto-completed commits or wiring, drained.
    pub fn take_errors(&self) -> Vec<KilnError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    /// How often [`Host::on_runtime_ready`] ran.
    #[must_use]
    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }

    /// Whether [`Host::on_unmount_begin`] ran.
    #[must_use]
    pub fn unmount_begun(&self) -> bool {
        self.unmount_begins() > 0
    }

    /// How many times [`Host::on_unmount_begin`] ran.
    #[must_use]
    pub fn unmount_begins(&self) -> usize {
        self.unmount_begins.load(Ordering::SeqCst)
    }
}

impl Host for MockHost {
    fn prototype_name(&self) -> &str {
        &self.name
    }

    fn raw_props(&self) -> Value {
        lock(&self.props).clone()
    }

    fn commit(&self, view: View, signal: CommitSignal) {
        lock(&self.views).push(view);
        if !self.auto_done {
            lock(&self.signals).push(signal);
            return;
        }
        if let Err(err) = signal.done() {
            tracing::debug!(error = %err, "Commit completion failed");
            lock(&self.errors).push(err);
        }
    }

    fn schedule(&self, task: ScheduledTask) {
        lock(&self.tasks).push_back(task);
    }

    fn on_runtime_ready(&self, wiring: &WiringApi) {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        if self.wiring.is_empty() {
            return;
        }
        if let Err(err) = wiring.attach("mock-host", self.wiring.clone()) {
            lock(&self.errors).push(err);
        }
    }

    fn on_unmount_begin(&self) {
        self.unmount_begins.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for MockHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHost")
            .field("name", &self.name)
            .field("commits", &self.commit_count())
            .field("pending_tasks", &self.pending_tasks())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{click, keydown};

    fn handler(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> NativeHandler {
        let log = Arc::clone(log);
        Arc::new(move |event: &Arc<NativeEvent>| {
            log.lock().unwrap().push(format!("{label}:{}", event.event_type()));
            Ok(())
        })
    }

    #[test]
    fn test_node_dispatches_by_type_in_order() {
        let node = MockNode::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        node.add_native_listener("click", handler(&log, "a"));
        node.add_native_listener("keydown", handler(&log, "k"));
        node.add_native_listener("click", handler(&log, "b"));

        node.fire(click()).unwrap();
        node.fire(keydown("Enter")).unwrap();

        assert_eq!(*log.lock().unwrap(), ["a:click", "b:click", "k:keydown"]);
        assert_eq!(node.listener_count("click"), 2);
    }

    #[test]
    fn test_node_removes_by_identity() {
        let node = MockNode::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = handler(&log, "a");
        node.add_native_listener("click", Arc::clone(&first));
        node.add_native_listener("click", handler(&log, "b"));

        node.remove_native_listener("click", &first);
        node.fire(click()).unwrap();

        assert_eq!(*log.lock().unwrap(), ["b:click"]);
    }

    #[test]
    fn test_node_stops_on_error() {
        let node = MockNode::new();
        node.add_native_listener(
            "click",
            Arc::new(|_: &Arc<NativeEvent>| -> KilnResult<()> {
                Err(KilnError::disposed("listener"))
            }),
        );
        assert!(node.fire(click()).is_err());
    }

    #[test]
    fn test_host_tasks_run_fifo() {
        let host = MockHost::new("sample");
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["one", "two"] {
            let log = Arc::clone(&log);
            host.schedule(Box::new(move || {
                log.lock().unwrap().push(label);
                Ok(())
            }));
        }

        assert_eq!(host.pending_tasks(), 2);
        assert_eq!(host.run_tasks().unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), ["one", "two"]);
        assert!(!host.run_next_task().unwrap());
    }

    #[test]
    fn test_context_source_lookup() {
        let source = MockContextSource::new().with("theme", serde_json::json!("dark"));
        assert_eq!(source.lookup("theme"), Some(serde_json::json!("dark")));
        assert_eq!(source.lookup("missing"), None);
    }
}
