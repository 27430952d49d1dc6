//! Both tail backends against real files.

use std::sync::Arc;
use std::time::Duration;

use tailrun::resource::{LogContent, TailBackend, TailOptions};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use super::{append, fast_options};

/// Follow `path`, forwarding every change event.
fn follow(
    path: &std::path::Path,
    options: &TailOptions,
) -> (Arc<LogContent>, mpsc::UnboundedReceiver<Vec<String>>) {
    let content = assert_ok!(LogContent::open(path, options));
    let (tx, rx) = mpsc::unbounded_channel();
    assert_ok!(content.add_change_listener(move |lines| {
        let _ = tx.send(lines.to_vec());
    }));
    (content, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Vec<String>>) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("No change event")
        .expect("Listener dropped")
}

/// Append a marker line until the follower reports it. Nothing else may arrive first.
async fn wait_until_following(
    path: &std::path::Path,
    rx: &mut mpsc::UnboundedReceiver<Vec<String>>,
) {
    for _ in 0..50 {
        append(path, "ready\n");
        if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            assert_eq!(event, ["ready"]);
            return;
        }
    }
    panic!("Follower never picked up appended lines");
}

/// Events after the last readiness marker, up to and including `last`.
async fn events_until(
    rx: &mut mpsc::UnboundedReceiver<Vec<String>>,
    last: &str,
) -> Vec<Vec<String>> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        if event == ["ready"] {
            events.clear();
            continue;
        }
        let done = event.iter().any(|line| line == last);
        events.push(event);
        if done {
            return events;
        }
    }
}

fn per_line(lines: &[&str]) -> Vec<Vec<String>> {
    lines.iter().map(|line| vec![(*line).to_string()]).collect()
}

#[tokio::test]
async fn native_backend_raises_one_event_per_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "");
    let (content, mut rx) = follow(&path, &fast_options());

    wait_until_following(&path, &mut rx).await;
    append(&path, "a\nb\nc\n");

    assert_eq!(events_until(&mut rx, "c").await, per_line(&["a", "b", "c"]));
    content.close();
}

#[cfg(unix)]
#[tokio::test]
async fn process_backend_streams_appended_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    append(&path, "before\n");
    let options = TailOptions {
        backend: TailBackend::Process,
        ..TailOptions::default()
    };
    let (content, mut rx) = follow(&path, &options);

    wait_until_following(&path, &mut rx).await;
    append(&path, "a\nb\nc\n");

    assert_eq!(events_until(&mut rx, "c").await, per_line(&["a", "b", "c"]));
    content.close();
}
