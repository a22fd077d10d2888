//! Pending storage I/O scope around broker mutations

use tracing::warn;

use crate::broker::{BrokerError, BrokerHandle};

/// Storage operation context held for the duration of one broker mutation.
///
/// Entering clears the calling context. [`IoScope::release`] waits for the
/// storage operations issued inside the scope and clears the context again.
/// A scope dropped without release (early return, cancelled future, panic)
/// performs the same wait and clear and logs a failed wait.
pub(crate) struct IoScope<'a> {
    broker: &'a dyn BrokerHandle,
    released: bool,
}

impl<'a> IoScope<'a> {
    pub(crate) fn enter(broker: &'a dyn BrokerHandle) -> Self {
        broker.clear_pending_io();
        Self {
            broker,
            released: false,
        }
    }

    /// Wait on pending I/O, then clear the context.
    ///
    /// The context is cleared even if the wait fails.
    pub(crate) fn release(mut self) -> Result<(), BrokerError> {
        self.released = true;
        self.drain()
    }

    fn drain(&self) -> Result<(), BrokerError> {
        let waited = self.broker.wait_on_pending_io();
        self.broker.clear_pending_io();
        waited
    }
}

impl Drop for IoScope<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.drain() {
            warn!("Bridge I/O scope: Failed to wait on pending I/O: {}", e);
        }
    }
}
