//! Event bus error types.

use super::SubscriptionHandle;

/// Errors raised by the event bus.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The handle was never registered, or has already been removed.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_not_found_display() {
        let err = BusError::SubscriptionNotFound(SubscriptionHandle::from_raw(7));
        assert_eq!(err.to_string(), "Subscription not found: #7");
    }
}
