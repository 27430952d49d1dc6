//! Per-client log watching.
//!
//! A [`Watcher`] belongs to one connected client. It subscribes to shared
//! [`LogContent`](crate::resource::LogContent) resources on the client's
//! behalf and pushes their changes as [`LogMessage`]s.

mod error;
mod log_watcher;
mod message;

pub use error::WatchError;
pub use log_watcher::Watcher;
pub use message::{FileTaggedMessages, LogMessage, MessageFactory, MessageFormat, PlainMessages};
