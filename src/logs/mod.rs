//! Allow-listed log tailing sessions.

mod error;
mod service;

pub use error::LogError;
pub use service::{AllowedLog, LogService, LogSession};
