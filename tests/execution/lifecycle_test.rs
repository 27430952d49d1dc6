//! Tests for an execution following a real process.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tailrun::execution::{
    Execution, ExecutionError, ExecutionStatus, ProcessHandle, ProcessSpawner, TokioSpawner,
};
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

fn sh(script: &str) -> ProcessHandle {
    TokioSpawner
        .spawn("sh", &["-c".to_string(), script.to_string()], None)
        .expect("Failed to spawn sh")
}

async fn finish(execution: &Execution) -> ExecutionStatus {
    timeout(Duration::from_secs(10), execution.wait_terminal())
        .await
        .expect("Execution did not finish")
}

#[tokio::test]
async fn output_lines_end_with_exit_diagnostic() {
    let execution = Execution::start("printf", 1, sh("printf 'a\\nb\\n'"), "\n");

    assert_eq!(finish(&execution).await, ExecutionStatus::Succeeded);
    assert_eq!(
        execution.output_lines(),
        vec!["a", "b", "Process exited with code 0"]
    );
}

#[tokio::test]
async fn stderr_is_collected_and_nonzero_exit_fails() {
    let execution = Execution::start("oops", 1, sh("echo oops >&2; exit 3"), "\n");

    assert_eq!(finish(&execution).await, ExecutionStatus::Failed);
    assert_eq!(
        execution.output_lines(),
        vec!["oops", "Process exited with code 3"]
    );
}

#[tokio::test]
async fn unterminated_last_line_is_flushed() {
    let execution = Execution::start("partial", 1, sh("printf partial"), "\n");

    finish(&execution).await;
    assert_eq!(
        execution.output_lines(),
        vec!["partial", "Process exited with code 0"]
    );
}

#[tokio::test]
async fn custom_delimiter_splits_output() {
    let execution = Execution::start("csv", 1, sh("printf 'x;y;'"), ";");

    finish(&execution).await;
    assert_eq!(
        execution.output_lines(),
        vec!["x", "y", "Process exited with code 0"]
    );
    assert_eq!(execution.output_text(), "x;y;Process exited with code 0");
}

#[tokio::test]
async fn listeners_see_output_before_status() {
    let execution = Execution::running("events", 1, "\n");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let output = Arc::clone(&seen);
    assert_ok!(execution.add_output_listener(move |lines| {
        output.lock().unwrap().extend(lines.iter().cloned());
    }));
    let status = Arc::clone(&seen);
    assert_ok!(execution.add_status_listener(move |s| {
        status.lock().unwrap().push(format!("status:{s}"));
    }));

    assert_ok!(execution.attach(sh("echo one; echo two")));
    finish(&execution).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "one".to_string(),
            "two".to_string(),
            "Process exited with code 0".to_string(),
            "status:succeeded".to_string(),
        ]
    );
}

#[tokio::test]
async fn terminate_interrupts_running_process() {
    let execution = Execution::start("sleep", 1, sh("exec sleep 30"), "\n");

    assert_ok!(execution.terminate());
    assert_eq!(finish(&execution).await, ExecutionStatus::Failed);
    assert_eq!(
        execution.output_lines().last().map(String::as_str),
        Some("Process was terminated by signal SIGINT")
    );

    let err = execution.terminate().unwrap_err();
    assert!(matches!(err, ExecutionError::TerminationInWrongState { .. }));
}

#[tokio::test]
async fn halt_kills_running_process() {
    let execution = Execution::start("sleep", 1, sh("exec sleep 30"), "\n");

    assert_ok!(execution.halt());
    assert_eq!(finish(&execution).await, ExecutionStatus::Failed);
    assert_eq!(
        execution.output_lines().last().map(String::as_str),
        Some("Process was terminated by signal SIGKILL")
    );
}

#[tokio::test]
async fn halt_abruptly_fails_and_finalizes_at_once() {
    let execution = Execution::start("sleep", 1, sh("exec sleep 30"), "\n");

    assert_ok!(execution.halt_abruptly());
    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert!(execution.is_finalized());
    assert_eq!(
        execution.output_lines().last().map(String::as_str),
        Some("Process was halted abruptly")
    );

    // The late exit report changes nothing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(execution.output_lines(), vec!["Process was halted abruptly"]);
}

#[tokio::test]
async fn finalize_only_after_terminal() {
    let execution = Execution::start("sleep", 1, sh("sleep 0.2"), "\n");

    assert!(matches!(
        execution.finalize(),
        Err(ExecutionError::FinalizationInWrongState { .. })
    ));

    finish(&execution).await;
    assert_ok!(execution.finalize());
    assert!(matches!(
        execution.finalize(),
        Err(ExecutionError::AlreadyFinalized(_))
    ));
    assert_err!(execution.add_output_listener(|_| {}));
}

#[tokio::test]
async fn reconstructed_execution_is_finished() {
    let execution = assert_ok!(Execution::reconstruct(
        "old",
        5,
        vec!["done".to_string()],
        ExecutionStatus::Succeeded,
        "\n",
    ));

    assert!(execution.is_finalized());
    assert_eq!(finish(&execution).await, ExecutionStatus::Succeeded);
    assert_err!(Execution::reconstruct(
        "old",
        5,
        Vec::new(),
        ExecutionStatus::Running,
        "\n",
    ));
}

#[tokio::test]
async fn trailing_fragment_is_held_until_close() {
    let execution = Execution::running("fragment", 1, "\n");
    let batches = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&batches);
    assert_ok!(execution.add_output_listener(move |lines| {
        sink.lock().unwrap().push(lines.to_vec());
    }));
    assert_ok!(execution.attach(sh("printf 'a\\nb'")));

    assert_eq!(finish(&execution).await, ExecutionStatus::Succeeded);
    assert_eq!(
        *batches.lock().unwrap(),
        vec![
            vec!["a".to_string()],
            vec!["b".to_string()],
            vec!["Process exited with code 0".to_string()],
        ]
    );
}
