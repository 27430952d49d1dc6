//! Log watching behind an allow-list.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::LogError;
use crate::clock::{IdGenerator, UuidGenerator};
use crate::collection::{Collection, Keyed};
use crate::outbound::Outbound;
use crate::pool::ResourcePool;
use crate::resource::{LogContent, ResourceError, TailOptions};
use crate::watcher::{MessageFactory, WatchError, Watcher};

/// A log file clients may tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowedLog {
    pub path: PathBuf,
}

impl AllowedLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Keyed for AllowedLog {
    type Key = String;

    fn key(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opens log watching sessions for connected clients.
///
/// Resources are shared through one [`ResourcePool`]: all sessions tailing
/// the same file use a single follower, which is closed when the last
/// session stops watching it.
#[derive(Clone)]
pub struct LogService {
    allowed: Arc<dyn Collection<AllowedLog>>,
    pool: Arc<ResourcePool<LogContent>>,
    messages: Arc<dyn MessageFactory>,
    ids: Arc<dyn IdGenerator>,
}

impl LogService {
    /// Create a service following files with `options`.
    #[must_use]
    pub fn new(
        allowed: Arc<dyn Collection<AllowedLog>>,
        options: TailOptions,
        messages: Arc<dyn MessageFactory>,
    ) -> Self {
        let pool = ResourcePool::new(move |path: &Path| LogContent::open(path, &options));
        Self::with_pool(allowed, Arc::new(pool), messages)
    }

    /// Create a service over an existing pool.
    #[must_use]
    pub fn with_pool(
        allowed: Arc<dyn Collection<AllowedLog>>,
        pool: Arc<ResourcePool<LogContent>>,
        messages: Arc<dyn MessageFactory>,
    ) -> Self {
        Self {
            allowed,
            pool,
            messages,
            ids: Arc::new(UuidGenerator),
        }
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ResourcePool<LogContent>> {
        &self.pool
    }

    /// Every allow-listed log.
    ///
    /// # Errors
    ///
    /// Returns an error if the allow-list cannot be read.
    pub async fn allowed_logs(&self) -> Result<Vec<AllowedLog>, LogError> {
        Ok(self.allowed.find_all().await?)
    }

    /// Fail unless `path` is allow-listed.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NotAllowed`] for paths not on the list.
    pub async fn ensure_allowed(&self, path: &Path) -> Result<(), LogError> {
        if self.allowed.contains(&path.display().to_string()).await? {
            Ok(())
        } else {
            Err(LogError::NotAllowed(path.to_path_buf()))
        }
    }

    /// Current size of an allow-listed file in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NotAllowed`] or a [`ResourceError::Size`].
    pub async fn size(&self, path: &Path) -> Result<u64, LogError> {
        self.ensure_allowed(path).await?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| ResourceError::Size {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(metadata.len())
    }

    /// Start a session pushing to `outbound`.
    #[must_use]
    pub fn open_session(&self, outbound: Outbound) -> LogSession {
        let watcher = Watcher::new(self.ids.next_id(), outbound, Arc::clone(&self.messages));
        tracing::debug!(watcher = %watcher.id(), "Log session opened");
        LogSession {
            service: self.clone(),
            watcher,
        }
    }
}

impl std::fmt::Debug for LogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogService")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// One client's log watches. Dropping the session releases them.
#[derive(Debug)]
pub struct LogSession {
    service: LogService,
    watcher: Watcher,
}

impl LogSession {
    #[must_use]
    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Watch an allow-listed file, optionally sending its current content
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::NotAllowed`], a [`WatchError`] from the watcher,
    /// or a [`PoolError`](crate::pool::PoolError) if the file cannot be
    /// followed.
    pub async fn watch(&self, path: &Path, from_beginning: bool) -> Result<(), LogError> {
        self.service.ensure_allowed(path).await?;

        let (resource, watched) = self.service.pool.with_resource(path, |resource| {
            (Arc::clone(resource), self.watcher.watch(resource))
        })?;

        match watched {
            Ok(()) => {}
            Err(e @ WatchError::AlreadyWatching(_)) => return Err(e.into()),
            Err(e) => {
                // The resource refused the listener; evict it if nobody uses it.
                self.release(&resource);
                return Err(e.into());
            }
        }

        if from_beginning {
            self.watcher.read_from_beginning(&resource).await?;
        }
        Ok(())
    }

    /// Stop watching `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotWatching`] if the path is not watched.
    pub fn unwatch(&self, path: &Path) -> Result<(), LogError> {
        let resource = self.watcher.stop_watching(path)?;
        self.release(&resource);
        Ok(())
    }

    /// Stop every watch and dispose resources nobody else uses.
    pub fn close(&self) {
        let released = self.watcher.stop_watching_all();
        for result in self.service.pool.dispose_all_if_unused(&released) {
            if let Err(e) = result {
                tracing::warn!(watcher = %self.watcher.id(), error = %e, "Failed to dispose resource");
            }
        }
    }

    fn release(&self, resource: &Arc<LogContent>) {
        if let Err(e) = self.service.pool.dispose_if_unused(resource) {
            tracing::warn!(watcher = %self.watcher.id(), error = %e, "Failed to dispose resource");
        }
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        self.close();
        tracing::debug!(watcher = %self.watcher.id(), "Log session closed");
    }
}
