//! tailrun - run commands and tail log files, streaming their lines live to
//! remote clients.

pub mod bus;
pub mod clock;
pub mod collection;
pub mod config;
pub mod execution;
pub mod lines;
pub mod logs;
pub mod outbound;
pub mod pool;
pub mod resource;
pub mod server;
pub mod watcher;
