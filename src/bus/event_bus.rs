//! Synchronous in-process event bus.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::BusError;
use super::filter::{Attributed, Filter};

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    #[cfg(test)]
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscription<E> {
    handle: SubscriptionHandle,
    filter: Filter,
    callback: Callback<E>,
}

/// Attribute-filtered publish/subscribe dispatcher.
///
/// Dispatch takes a snapshot of the matching subscriptions and invokes them
/// after releasing the lock, so callbacks may freely add or remove
/// subscriptions. Subscriptions added during a dispatch only see later events;
/// subscriptions removed during a dispatch still receive the current one.
/// Callbacks run in registration order.
pub struct EventBus<E> {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription<E>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(Vec::new()),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl<E> EventBus<E> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events matching `filter`.
    pub fn add_subscription<F>(&self, callback: F, filter: Filter) -> SubscriptionHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            handle,
            filter,
            callback: Arc::new(callback),
        });
        tracing::trace!(subscription = %handle, "Subscription added");
        handle
    }

    /// Remove a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::SubscriptionNotFound`] if the handle is unknown to
    /// this bus or was already removed.
    pub fn remove_subscription(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        let mut subscriptions = self.lock();
        let index = subscriptions
            .iter()
            .position(|s| s.handle == handle)
            .ok_or(BusError::SubscriptionNotFound(handle))?;
        subscriptions.remove(index);
        tracing::trace!(subscription = %handle, "Subscription removed");
        Ok(())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription<E>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Attributed> EventBus<E> {
    /// Deliver `event` to every matching subscription.
    ///
    /// A panicking callback is logged and does not stop delivery to the
    /// remaining subscribers. Returns the number of subscriptions notified.
    pub fn dispatch(&self, event: &E) -> usize {
        let matching: Vec<(SubscriptionHandle, Callback<E>)> = self
            .lock()
            .iter()
            .filter(|s| s.filter.matches(event))
            .map(|s| (s.handle, Arc::clone(&s.callback)))
            .collect();

        for (handle, callback) in &matching {
            call_isolated(handle, || callback(event));
        }

        matching.len()
    }
}

/// Run a listener callback, containing any panic it raises.
pub(crate) fn call_isolated(label: impl fmt::Display, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(listener = %label, "Listener panicked, continuing with the rest");
    }
}
