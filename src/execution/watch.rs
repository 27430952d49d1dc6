//! Streams one execution's events to a client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::event::{ExecutionEvent, ExecutionKey};
use super::execution::Execution;
use crate::bus::{BusError, EventBus, SubscriptionHandle};
use crate::outbound::Outbound;

/// A client's subscription to one execution.
///
/// Every event of the execution is forwarded to the client; the status event
/// also closes the connection once it has been sent. Dropping the watch
/// removes its subscriptions.
pub struct ExecutionWatch {
    key: ExecutionKey,
    bus: Arc<EventBus<ExecutionEvent>>,
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl ExecutionWatch {
    /// Start forwarding events of `execution` to `outbound`.
    ///
    /// A finished execution has nothing left to stream: the client gets the
    /// final status and the connection is closed right away.
    pub fn start(
        execution: &Execution,
        bus: Arc<EventBus<ExecutionEvent>>,
        outbound: Outbound,
    ) -> Self {
        let key = execution.key().clone();
        let watch = Self {
            key: key.clone(),
            bus,
            handles: Mutex::new(Vec::new()),
        };

        let closed = Arc::new(AtomicBool::new(false));
        let forward = {
            let outbound = outbound.clone();
            let closed = Arc::clone(&closed);
            watch.bus.add_subscription(
                move |event: &ExecutionEvent| {
                    // Nothing may follow the close.
                    if !closed.load(Ordering::SeqCst) {
                        outbound.send_json(event);
                    }
                },
                key.filter(),
            )
        };
        // Registered second, so the status message is queued before the close.
        let closer = {
            let outbound = outbound.clone();
            let closed = Arc::clone(&closed);
            watch.bus.add_subscription(
                move |_: &ExecutionEvent| {
                    closed.store(true, Ordering::SeqCst);
                    outbound.close();
                },
                key.status_filter(),
            )
        };
        watch.lock().extend([forward, closer]);

        // A finished execution will not publish again: report its final
        // status directly unless the bus already did.
        let status = execution.status();
        if status.is_terminal() && !closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(execution = %key, %status, "Watching finished execution");
            if let Err(e) = watch.stop() {
                tracing::debug!(execution = %key, error = %e, "Failed to unsubscribe watch");
            }
            outbound.send_json(&ExecutionEvent::status(&key, status));
            outbound.close();
        }

        watch
    }

    #[must_use]
    pub fn key(&self) -> &ExecutionKey {
        &self.key
    }

    /// Stop forwarding events.
    ///
    /// # Errors
    ///
    /// Returns the first [`BusError`] hit while removing the subscriptions;
    /// the remaining ones are still removed.
    pub fn stop(&self) -> Result<(), BusError> {
        let handles: Vec<_> = self.lock().drain(..).collect();
        let mut first_error = None;
        for handle in handles {
            if let Err(e) = self.bus.remove_subscription(handle) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SubscriptionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ExecutionWatch {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::debug!(execution = %self.key, error = %e, "Watch already unsubscribed");
        }
    }
}

impl std::fmt::Debug for ExecutionWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionWatch")
            .field("key", &self.key)
            .field("subscriptions", &self.lock().len())
            .finish_non_exhaustive()
    }
}
