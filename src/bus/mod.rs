//! Attribute-filtered publish/subscribe.
//!
//! Subscribers register a callback together with a [`Filter`]; every event
//! dispatched on the [`EventBus`] is delivered to each subscription whose
//! filter attributes are all present and equal on the event.

mod error;
mod event_bus;
mod filter;

pub use error::BusError;
pub use event_bus::{EventBus, SubscriptionHandle};
pub(crate) use event_bus::call_isolated;
pub use filter::{AttrValue, Attributed, Filter};
