//! In-crate test doubles for the host and platform nodes.
//!
//! These are deliberately separate from `kiln-test`'s mocks. `kiln-test`
//! depends on this crate, so using it as a dev-dependency here would link a
//! second copy of `kiln-runtime` whose `Host` trait the unit tests could not
//! implement. Downstream crates and the integration tests use
//! `kiln_test::MockHost` and `kiln_test::MockNode` instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use kiln_capabilities::CapEntry;
use kiln_core::KilnResult;
use kiln_events::{NativeEvent, NativeHandler, PlatformNode};
use serde_json::Value;

use crate::host::{CommitSignal, Host, ScheduledTask, View, WiringApi};

#[derive(Default)]
pub(crate) struct TestNode {
    handlers: Mutex<Vec<(String, NativeHandler)>>,
}

impl TestNode {
    pub(crate) fn fire(&self, event: NativeEvent) -> KilnResult<()> {
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

    pub(crate) fn bound(&self) -> Vec<String> {
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

/// Host that records commits and queues scheduled tasks until
/// [`run_tasks`](Self::run_tasks).
pub(crate) struct TestHost {
    name: String,
    props: Value,
    auto_done: bool,
    wiring: Vec<CapEntry>,
    pub(crate) views: Mutex<Vec<View>>,
    signals: Mutex<Vec<CommitSignal>>,
    tasks: Mutex<VecDeque<ScheduledTask>>,
    pub(crate) unmount_begun: AtomicBool,
}

impl TestHost {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            props: Value::Null,
            auto_done: true,
            wiring: Vec::new(),
            views: Mutex::default(),
            signals: Mutex::default(),
            tasks: Mutex::default(),
            unmount_begun: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    pub(crate) fn manual_done(mut self) -> Self {
        self.auto_done = false;
        self
    }

    pub(crate) fn wire(mut self, entry: CapEntry) -> Self {
        self.wiring.push(entry);
        self
    }

    pub(crate) fn commits(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub(crate) fn take_signals(&self) -> Vec<CommitSignal> {
        std::mem::take(&mut *self.signals.lock().unwrap())
    }

    pub(crate) fn run_tasks(&self) -> KilnResult<usize> {
        let mut ran = 0;
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            let Some(task) = task else {
                return Ok(ran);
            };
            task()?;
            ran = ran.saturating_add(1);
        }
    }
}

impl Host for TestHost {
    fn prototype_name(&self) -> &str {
        &self.name
    }

    fn raw_props(&self) -> Value {
        self.props.clone()
    }

    fn commit(&self, view: View, signal: CommitSignal) {
        self.views.lock().unwrap().push(view);
        if self.auto_done {
            signal.done().unwrap();
        } else {
            self.signals.lock().unwrap().push(signal);
        }
    }

    fn schedule(&self, task: ScheduledTask) {
        self.tasks.lock().unwrap().push_back(task);
    }

    fn on_runtime_ready(&self, wiring: &WiringApi) {
        if !self.wiring.is_empty() {
            wiring.attach("test", self.wiring.clone()).unwrap();
        }
    }

    fn on_unmount_begin(&self) {
        self.unmount_begun.store(true, Ordering::SeqCst);
    }
}
