//! Tests for log sessions tailing real files.

use std::path::PathBuf;
use std::sync::Arc;

use tailrun::collection::InMemoryCollection;
use tailrun::logs::{AllowedLog, LogError, LogService};
use tailrun::outbound::Outbound;
use tailrun::watcher::{FileTaggedMessages, PlainMessages, WatchError};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use super::{append, fast_options, next_message};

fn service(allowed: &[PathBuf]) -> LogService {
    let allowed = InMemoryCollection::with_items(allowed.iter().cloned().map(AllowedLog::new));
    LogService::new(Arc::new(allowed), fast_options(), Arc::new(PlainMessages))
}

#[tokio::test]
async fn appended_lines_reach_the_client() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "existing\n");
    let service = service(&[path.clone()]);

    let (outbound, mut rx) = Outbound::channel();
    let session = service.open_session(outbound);
    assert_ok!(session.watch(&path, false).await);

    append(&path, "fresh\n");
    assert_eq!(
        next_message(&mut rx).await,
        serde_json::json!({"type": "change", "changes": ["fresh"]})
    );
}

#[tokio::test]
async fn from_beginning_sends_current_content_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "one\ntwo\n");
    let service = service(&[path.clone()]);

    let (outbound, mut rx) = Outbound::channel();
    let session = service.open_session(outbound);
    assert_ok!(session.watch(&path, true).await);

    assert_eq!(
        next_message(&mut rx).await,
        serde_json::json!({"type": "change", "changes": ["one", "two"]})
    );
}

#[tokio::test]
async fn file_tagged_messages_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "hello\n");
    let allowed = InMemoryCollection::with_items([AllowedLog::new(path.clone())]);
    let service = LogService::new(
        Arc::new(allowed),
        fast_options(),
        Arc::new(FileTaggedMessages),
    );

    let (outbound, mut rx) = Outbound::channel();
    let session = service.open_session(outbound);
    assert_ok!(session.watch(&path, true).await);

    let message = next_message(&mut rx).await;
    assert_eq!(message["file"], path.display().to_string());
    assert_eq!(message["changes"], serde_json::json!(["hello"]));
}

#[tokio::test]
async fn disallowed_path_is_rejected() {
    let service = service(&[]);
    let (outbound, _rx) = Outbound::channel();
    let session = service.open_session(outbound);

    let err = assert_err!(session.watch(std::path::Path::new("/etc/passwd"), false).await);
    assert!(matches!(err, LogError::NotAllowed(_)));
    assert!(service.pool().is_empty());
}

#[tokio::test]
async fn watching_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let service = service(&[path.clone()]);
    let (outbound, _rx) = Outbound::channel();
    let session = service.open_session(outbound);

    assert_ok!(session.watch(&path, false).await);
    let err = assert_err!(session.watch(&path, false).await);
    assert!(matches!(err, LogError::Watch(WatchError::AlreadyWatching(_))));
    assert!(service.pool().contains(&path));
}

#[tokio::test]
async fn sessions_share_one_resource_until_the_last_leaves() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let service = service(&[path.clone()]);

    let (first_out, mut first_rx) = Outbound::channel();
    let (second_out, mut second_rx) = Outbound::channel();
    let first = service.open_session(first_out);
    let second = service.open_session(second_out);
    assert_ok!(first.watch(&path, false).await);
    assert_ok!(second.watch(&path, false).await);
    assert_eq!(service.pool().len(), 1);

    append(&path, "shared\n");
    let expected = serde_json::json!({"type": "change", "changes": ["shared"]});
    assert_eq!(next_message(&mut first_rx).await, expected);
    assert_eq!(next_message(&mut second_rx).await, expected);

    drop(first);
    assert!(service.pool().contains(&path));

    assert_ok!(second.unwatch(&path));
    assert!(service.pool().is_empty());
    assert!(second.watcher().watched_paths().is_empty());
}

#[tokio::test]
async fn unwatch_of_unwatched_path_reports_error() {
    let service = service(&[]);
    let (outbound, mut rx) = Outbound::channel();
    let session = service.open_session(outbound);

    let err = assert_err!(session.unwatch(std::path::Path::new("/var/log/none.log")));
    assert!(matches!(err, LogError::Watch(WatchError::NotWatching(_))));
    assert_eq!(next_message(&mut rx).await["type"], "error");
}

#[tokio::test]
async fn size_reads_allowed_files_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "12345");
    let service = service(&[path.clone()]);

    assert_eq!(assert_ok!(service.size(&path).await), 5);
    assert!(matches!(
        service.size(&dir.path().join("other.log")).await,
        Err(LogError::NotAllowed(_))
    ));
    assert!(service.pool().is_empty());
}
