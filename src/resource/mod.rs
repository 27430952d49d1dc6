//! Log files followed for appended lines.
//!
//! A [`LogContent`] is the live resource behind a log watch. Content arrives
//! through one of the [`TailBackend`]s and is split into lines with the same
//! buffering used for process output.

mod backend;
mod content;
mod error;
mod tail;
mod text;

pub use backend::{TailBackend, TailOptions};
pub use content::{ListenerId, LogContent};
pub use error::ResourceError;
pub use text::TextBlock;
