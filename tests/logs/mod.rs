//! Log watching tests.

mod content_test;
mod pool_test;
mod watcher_test;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tailrun::outbound::Outgoing;
use tailrun::resource::TailOptions;
use tokio::sync::mpsc;

/// Fast polling so tests do not depend on file-system notifications.
pub fn fast_options() -> TailOptions {
    TailOptions {
        poll_interval: Duration::from_millis(20),
        ..TailOptions::default()
    }
}

pub fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log");
    file.write_all(text.as_bytes()).expect("Failed to append");
}

/// Next JSON message, failing after five seconds.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<Outgoing>) -> serde_json::Value {
    let item = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("No message received");
    match item {
        Some(Outgoing::Message(text)) => serde_json::from_str(&text).expect("Invalid JSON"),
        other => panic!("Expected a message, got {other:?}"),
    }
}

/// Verify all public log types are exported from the library.
#[test]
fn test_all_log_types_exported() {
    use tailrun::logs::{AllowedLog, LogError, LogService, LogSession};
    use tailrun::pool::{DisposalError, PoolError, ResourcePool};
    use tailrun::resource::{LogContent, ResourceError, TailBackend, TextBlock};
    use tailrun::watcher::{LogMessage, MessageFormat, WatchError, Watcher};

    let _ = AllowedLog::new("/var/log/app.log");
    let _ = TextBlock::new("a\nb\n", "\n");
    let _ = TailBackend::Process;
    let _ = MessageFormat::FileTagged.factory();
    let _ = LogMessage::Error {
        message: "x".into(),
    };

    let _: fn() -> LogError = || LogError::NotAllowed("/etc/shadow".into());
    let _: fn() -> PoolError = || PoolError::ResourceNotOwned("/a".into());
    let _: fn(DisposalError) -> PoolError = |e| e.source;
    let _: fn() -> ResourceError = || ResourceError::Closed("/a".into());
    let _: fn() -> WatchError = || WatchError::NotWatching("/a".into());
    let _: Option<&LogService> = None;
    let _: Option<&LogSession> = None;
    let _: Option<&Watcher> = None;
    let _: Option<&ResourcePool<LogContent>> = None;
}
