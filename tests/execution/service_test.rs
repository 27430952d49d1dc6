//! Tests for the execution service.

#![cfg(unix)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tailrun::clock::Clock;
use tailrun::collection::InMemoryCollection;
use tailrun::execution::{
    CommandDefinition, Execution, ExecutionKey, ExecutionService, ExecutionStatus, ServiceError,
};
use tailrun::outbound::{Outbound, Outgoing};
use tokio::time::timeout;
use tokio_test::assert_ok;

/// Hands out 100, 200, 300, ...
#[derive(Debug, Default)]
struct StepClock(AtomicI64);

impl Clock for StepClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(100, Ordering::SeqCst) + 100
    }
}

fn service() -> ExecutionService {
    let commands = InMemoryCollection::with_items([
        CommandDefinition::new("hello", "sh").args(["-c", "echo hello"]),
        CommandDefinition::new("late", "sh").args(["-c", "sleep 0.3; echo late"]),
        CommandDefinition::new("forever", "sh").args(["-c", "exec sleep 30"]),
    ]);
    ExecutionService::new(Arc::new(commands)).with_clock(Arc::new(StepClock::default()))
}

async fn finalized(execution: &Execution) {
    timeout(Duration::from_secs(10), async {
        while !execution.is_finalized() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Execution was never finalized");
}

async fn collect(mut rx: tokio::sync::mpsc::UnboundedReceiver<Outgoing>) -> Vec<serde_json::Value> {
    let mut messages = Vec::new();
    loop {
        let item = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("Watch never closed");
        match item {
            Some(Outgoing::Message(text)) => messages.push(serde_json::from_str(&text).unwrap()),
            Some(Outgoing::Close) | None => return messages,
        }
    }
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let result = service().start("missing").await;
    assert!(matches!(result, Err(ServiceError::UnknownCommand(id)) if id == "missing"));
}

#[tokio::test]
async fn finished_execution_moves_to_history() {
    let service = service();
    let execution = assert_ok!(service.start("hello").await);
    assert_eq!(execution.key(), &ExecutionKey::new("hello", 100));

    finalized(&execution).await;

    let found = assert_ok!(service.get(execution.key()).await);
    assert!(Arc::ptr_eq(&found, &execution));
    assert_eq!(found.status(), ExecutionStatus::Succeeded);
    assert_eq!(
        found.output_lines(),
        vec!["hello", "Process exited with code 0"]
    );
    assert_eq!(assert_ok!(service.list().await).len(), 1);
}

#[tokio::test]
async fn list_is_newest_first() {
    let service = service();
    let first = assert_ok!(service.start("hello").await);
    let second = assert_ok!(service.start("forever").await);

    let keys: Vec<ExecutionKey> = assert_ok!(service.list().await)
        .iter()
        .map(|e| e.key().clone())
        .collect();
    assert_eq!(keys, vec![second.key().clone(), first.key().clone()]);

    assert_ok!(service.discard(second.key()).await);
}

#[tokio::test]
async fn discard_halts_running_execution() {
    let service = service();
    let execution = assert_ok!(service.start("forever").await);

    assert_ok!(service.discard(execution.key()).await);

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert!(execution.is_finalized());
    assert!(matches!(
        service.get(execution.key()).await,
        Err(ServiceError::NotFound(_))
    ));

    // The completion task must not resurrect it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(assert_ok!(service.list().await).is_empty());
}

#[tokio::test]
async fn discard_unknown_is_not_found() {
    let result = service().discard(&ExecutionKey::new("hello", 1)).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn terminate_finished_execution_is_conflict() {
    let service = service();
    let execution = assert_ok!(service.start("hello").await);
    finalized(&execution).await;

    let result = service.terminate(execution.key()).await;
    assert!(matches!(result, Err(ServiceError::Execution(_))));
}

#[tokio::test]
async fn watch_streams_output_then_status_then_closes() {
    let service = service();
    let execution = assert_ok!(service.start("late").await);

    let (outbound, rx) = Outbound::channel();
    let _watch = assert_ok!(service.watch(execution.key(), outbound).await);
    let messages = collect(rx).await;

    let changes: Vec<String> = messages
        .iter()
        .filter(|m| m["type"] == "output")
        .flat_map(|m| m["changes"].as_array().cloned().unwrap_or_default())
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(changes, vec!["late", "Process exited with code 0"]);

    let last = messages.last().unwrap();
    assert_eq!(last["type"], "status");
    assert_eq!(last["newStatus"], "succeeded");
    assert_eq!(last["commandId"], "late");
}

#[tokio::test]
async fn watch_of_finished_execution_sends_status_and_closes() {
    let service = service();
    let execution = assert_ok!(service.start("hello").await);
    finalized(&execution).await;

    let (outbound, rx) = Outbound::channel();
    let _watch = assert_ok!(service.watch(execution.key(), outbound).await);
    let messages = collect(rx).await;

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "status");
    assert_eq!(messages[0]["newStatus"], "succeeded");
}

#[tokio::test]
async fn watchers_of_one_execution_do_not_see_others() {
    let service = service();
    let late = assert_ok!(service.start("late").await);
    let hello = assert_ok!(service.start("hello").await);

    let (outbound, rx) = Outbound::channel();
    let _watch = assert_ok!(service.watch(late.key(), outbound).await);
    let messages = collect(rx).await;

    assert!(messages.iter().all(|m| m["commandId"] == "late"));
    finalized(&hello).await;
}
