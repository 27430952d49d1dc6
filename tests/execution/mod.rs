//! Execution module tests.

mod lifecycle_test;
mod service_test;

/// Verify all public execution types are exported from the library.
#[test]
fn test_all_execution_types_exported() {
    use tailrun::execution::{
        CommandDefinition, Execution, ExecutionError, ExecutionEvent, ExecutionKey,
        ExecutionService, ExecutionSnapshot, ExecutionStatus, ProcessExit, ProcessSignal,
        ServiceError, SpawnError, TokioSpawner,
    };

    let key = ExecutionKey::new("build", 1);
    let _ = CommandDefinition::new("build", "make");
    let _ = ExecutionEvent::status(&key, ExecutionStatus::Succeeded);
    let _: ExecutionSnapshot = Execution::running("build", 1, "\n").snapshot();
    let _ = ProcessExit::with_code(0);
    let _ = ProcessSignal::Interrupt;
    let _ = TokioSpawner;

    let _: fn() -> ServiceError = || ServiceError::UnknownCommand("x".into());
    let _: fn(ExecutionKey) -> ExecutionError = ExecutionError::AlreadyFinalized;
    let _: fn(String) -> SpawnError = SpawnError::NotFound;
    let _: fn() -> ExecutionService = || {
        ExecutionService::new(std::sync::Arc::new(
            tailrun::collection::InMemoryCollection::new(),
        ))
    };
}
