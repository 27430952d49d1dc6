//! Starts executions and tracks them from launch to history.

use std::sync::Arc;

use super::command::CommandDefinition;
use super::error::{ExecutionError, ServiceError};
use super::event::{ExecutionEvent, ExecutionKey};
use super::execution::Execution;
use super::process::{ProcessSpawner, TokioSpawner};
use super::watch::ExecutionWatch;
use crate::bus::EventBus;
use crate::clock::{Clock, SystemClock};
use crate::collection::{Collection, CollectionError, InMemoryCollection};
use crate::lines::DEFAULT_EOL;
use crate::outbound::Outbound;

/// Runs configured commands and keeps active and completed executions.
///
/// Every execution started here publishes its output and status changes on
/// the service's [`EventBus`]. When an execution finishes it is finalized
/// and moved from the active collection to the completed one.
#[derive(Clone)]
pub struct ExecutionService {
    commands: Arc<dyn Collection<CommandDefinition>>,
    active: Arc<dyn Collection<Arc<Execution>>>,
    completed: Arc<dyn Collection<Arc<Execution>>>,
    bus: Arc<EventBus<ExecutionEvent>>,
    spawner: Arc<dyn ProcessSpawner>,
    clock: Arc<dyn Clock>,
    default_eol: String,
    // Serializes moves between `active` and `completed` with discards.
    moves: Arc<tokio::sync::Mutex<()>>,
}

impl ExecutionService {
    /// Create a service over `commands`, spawning real processes.
    #[must_use]
    pub fn new(commands: Arc<dyn Collection<CommandDefinition>>) -> Self {
        Self {
            commands,
            active: Arc::new(InMemoryCollection::new()),
            completed: Arc::new(InMemoryCollection::new()),
            bus: Arc::new(EventBus::new()),
            spawner: Arc::new(TokioSpawner),
            clock: Arc::new(SystemClock::new()),
            default_eol: DEFAULT_EOL.to_string(),
            moves: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[must_use]
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store finished executions in `completed` instead of memory.
    #[must_use]
    pub fn with_history(mut self, completed: Arc<dyn Collection<Arc<Execution>>>) -> Self {
        self.completed = completed;
        self
    }

    /// Delimiter for commands that do not set their own.
    #[must_use]
    pub fn with_default_eol(mut self, eol: impl Into<String>) -> Self {
        self.default_eol = eol.into();
        self
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus<ExecutionEvent>> {
        &self.bus
    }

    /// All configured commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the command collection cannot be read.
    pub async fn commands(&self) -> Result<Vec<CommandDefinition>, ServiceError> {
        Ok(self.commands.find_all().await?)
    }

    /// Launch the command with id `command_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownCommand`] if no such command is
    /// configured, or [`ServiceError::Spawn`] if the process cannot start.
    pub async fn start(&self, command_id: &str) -> Result<Arc<Execution>, ServiceError> {
        let command = self
            .commands
            .find_by_id(&command_id.to_string())
            .await
            .map_err(|e| match e {
                CollectionError::NotFound(_) => ServiceError::UnknownCommand(command_id.to_string()),
                other => other.into(),
            })?;

        let start_time = self.clock.now_millis();
        let eol = command
            .eol
            .clone()
            .unwrap_or_else(|| self.default_eol.clone());

        tracing::info!(command = %command.id, line = %command.display_line(), "Starting command");
        let process =
            self.spawner
                .spawn(&command.command, &command.args, command.working_dir.as_deref())?;

        let execution = Execution::running(command.id.as_str(), start_time, eol);
        self.publish(&execution)?;
        execution.attach(process)?;
        self.active.add(Arc::clone(&execution)).await?;
        self.spawn_completion(Arc::clone(&execution));

        Ok(execution)
    }

    /// Every known execution, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection cannot be read.
    pub async fn list(&self) -> Result<Vec<Arc<Execution>>, ServiceError> {
        let mut all = self.active.find_all().await?;
        // A completing execution is briefly in both collections.
        for execution in self.completed.find_all().await? {
            if !all.iter().any(|e| e.key() == execution.key()) {
                all.push(execution);
            }
        }
        all.sort_by(|a, b| a.cmp_recency(b));
        Ok(all)
    }

    /// Look up an execution, active or completed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if neither collection holds `key`.
    pub async fn get(&self, key: &ExecutionKey) -> Result<Arc<Execution>, ServiceError> {
        match self.active.find_by_id(key).await {
            Ok(execution) => return Ok(execution),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.completed.find_by_id(key).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::NotFound(key.clone())
            } else {
                e.into()
            }
        })
    }

    /// Interrupt a running execution.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown keys and
    /// [`ServiceError::Execution`] if the execution already finished.
    pub async fn terminate(&self, key: &ExecutionKey) -> Result<(), ServiceError> {
        Ok(self.get(key).await?.terminate()?)
    }

    /// Kill a running execution.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown keys and
    /// [`ServiceError::Execution`] if the execution already finished.
    pub async fn halt(&self, key: &ExecutionKey) -> Result<(), ServiceError> {
        Ok(self.get(key).await?.halt()?)
    }

    /// Forget an execution, killing it first if it is still running.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if neither collection holds `key`.
    pub async fn discard(&self, key: &ExecutionKey) -> Result<(), ServiceError> {
        let _moves = self.moves.lock().await;

        match self.active.find_by_id(key).await {
            Ok(execution) => {
                if let Err(e) = execution.halt_abruptly() {
                    // It finished on its own after the lookup.
                    tracing::debug!(execution = %key, error = %e, "Discarding without halt");
                }
                self.active.remove(&execution).await?;
            }
            Err(e) if e.is_not_found() => {
                let execution = self.completed.find_by_id(key).await.map_err(|e| {
                    if e.is_not_found() {
                        ServiceError::NotFound(key.clone())
                    } else {
                        e.into()
                    }
                })?;
                self.completed.remove(&execution).await?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(execution = %key, "Execution discarded");
        Ok(())
    }

    /// Stream the events of one execution to `outbound`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if neither collection holds `key`.
    pub async fn watch(
        &self,
        key: &ExecutionKey,
        outbound: Outbound,
    ) -> Result<ExecutionWatch, ServiceError> {
        let execution = self.get(key).await?;
        Ok(ExecutionWatch::start(
            &execution,
            Arc::clone(&self.bus),
            outbound,
        ))
    }

    fn publish(&self, execution: &Arc<Execution>) -> Result<(), ExecutionError> {
        let key = execution.key().clone();

        let bus = Arc::clone(&self.bus);
        let output_key = key.clone();
        execution.add_output_listener(move |lines| {
            bus.dispatch(&ExecutionEvent::output(&output_key, lines.to_vec()));
        })?;

        let bus = Arc::clone(&self.bus);
        execution.add_status_listener(move |status| {
            bus.dispatch(&ExecutionEvent::status(&key, status));
        })?;

        Ok(())
    }

    fn spawn_completion(&self, execution: Arc<Execution>) {
        let service = self.clone();
        tokio::spawn(async move {
            let key = execution.key().clone();
            let status = execution.wait_terminal().await;

            match execution.finalize() {
                Ok(()) | Err(ExecutionError::AlreadyFinalized(_)) => {}
                Err(e) => tracing::warn!(execution = %key, error = %e, "Failed to finalize"),
            }

            let _moves = service.moves.lock().await;
            match service.active.contains(&key).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(execution = %key, "Execution was discarded before completion");
                    return;
                }
                Err(e) => {
                    tracing::warn!(execution = %key, error = %e, "Failed to look up execution");
                    return;
                }
            }

            // Recorded before it leaves `active`, so lookups always find it.
            if let Err(e) = service.completed.add(Arc::clone(&execution)).await {
                tracing::warn!(execution = %key, error = %e, "Failed to record execution");
                return;
            }
            if let Err(e) = service.active.remove(&execution).await {
                tracing::warn!(execution = %key, error = %e, "Failed to retire execution");
            }
            tracing::info!(execution = %key, %status, "Execution completed");
        });
    }
}

impl std::fmt::Debug for ExecutionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionService")
            .field("bus", &self.bus)
            .field("default_eol", &self.default_eol)
            .finish_non_exhaustive()
    }
}
