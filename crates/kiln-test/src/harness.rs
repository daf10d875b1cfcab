//! Test harness helpers.

use std::sync::{Arc, Mutex, PoisonError};

use kiln_core::KilnResult;
use kiln_runtime::{ComponentInstance, Host, Prototype, RuntimeOptions};
use tracing_subscriber::EnvFilter;

use crate::mocks::MockHost;

/// Route `tracing` output through libtest's capture, filtered by
/// `KILN_TEST_LOG` (default `warn`). Safe to call from every test.
pub fn init_test_logging() {
    let filter = std::env::var("KILN_TEST_LOG").unwrap_or_else(|_| "warn".to_owned());
    init_test_logging_with(&filter);
}

/// [`init_test_logging`] with an explicit filter.
pub fn init_test_logging_with(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Mount `prototype` on `host` with default options.
///
/// # Errors
///
/// Whatever [`ComponentInstance::mount`] returned.
pub fn mount<S: Send + Sync + 'static>(
    prototype: &Prototype<S>,
    host: &Arc<MockHost>,
) -> KilnResult<ComponentInstance> {
    mount_with(prototype, host, RuntimeOptions::default())
}

/// Mount `prototype` on `host` with `options`.
///
/// # Errors
///
/// Whatever [`ComponentInstance::mount`] returned.
pub fn mount_with<S: Send + Sync + 'static>(
    prototype: &Prototype<S>,
    host: &Arc<MockHost>,
    options: RuntimeOptions,
) -> KilnResult<ComponentInstance> {
    let host: Arc<dyn Host> = host.clone();
    ComponentInstance::mount(prototype, host, options)
}

/// Shared, ordered log of labels, for asserting call order across
/// callbacks.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
