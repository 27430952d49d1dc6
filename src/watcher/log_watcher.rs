//! The log watcher of one connected client.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::WatchError;
use super::message::MessageFactory;
use crate::outbound::Outbound;
use crate::resource::{ListenerId, LogContent};

/// Subscribes one client to log resources.
///
/// Each resource is watched at most once; its changes are turned into
/// messages by the watcher's [`MessageFactory`] and queued on the client's
/// [`Outbound`].
pub struct Watcher {
    id: String,
    outbound: Outbound,
    messages: Arc<dyn MessageFactory>,
    watched: Mutex<HashMap<PathBuf, (Arc<LogContent>, ListenerId)>>,
}

impl Watcher {
    #[must_use]
    pub fn new(id: impl Into<String>, outbound: Outbound, messages: Arc<dyn MessageFactory>) -> Self {
        Self {
            id: id.into(),
            outbound,
            messages,
            watched: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Push future changes of `resource` to the client.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AlreadyWatching`] if this watcher already
    /// watches the resource, or [`WatchError::Resource`] if it was closed.
    pub fn watch(&self, resource: &Arc<LogContent>) -> Result<(), WatchError> {
        let path = resource.path().to_path_buf();
        let mut watched = self.lock();
        if watched.contains_key(&path) {
            return Err(WatchError::AlreadyWatching(path));
        }

        let outbound = self.outbound.clone();
        let messages = Arc::clone(&self.messages);
        let file = path.clone();
        let listener = resource.add_change_listener(move |lines| {
            outbound.send_json(&messages.change(&file, lines.to_vec()));
        })?;

        watched.insert(path.clone(), (Arc::clone(resource), listener));
        tracing::debug!(watcher = %self.id, path = %path.display(), "Watching");
        Ok(())
    }

    /// Push the whole current content of `resource` to the client.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Resource`] if the file cannot be read; the
    /// client is sent an error message as well.
    pub async fn read_from_beginning(&self, resource: &LogContent) -> Result<(), WatchError> {
        match resource.read_full_text().await {
            Ok(text) => {
                self.outbound
                    .send_json(&self.messages.change(resource.path(), text.lines()));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(watcher = %self.id, error = %e, "Failed to read file");
                self.notify_error(&e);
                Err(e.into())
            }
        }
    }

    /// Watch `resource`, then push its current content.
    ///
    /// The content is only read if the watch succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error of [`watch`](Self::watch) or of
    /// [`read_from_beginning`](Self::read_from_beginning).
    pub async fn watch_from_beginning(&self, resource: &Arc<LogContent>) -> Result<(), WatchError> {
        self.watch(resource)?;
        self.read_from_beginning(resource).await
    }

    /// Stop pushing changes of the resource at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::NotWatching`] if the resource is not watched;
    /// the client is sent an error message as well.
    pub fn stop_watching(&self, path: &Path) -> Result<Arc<LogContent>, WatchError> {
        let entry = self.lock().remove(path);
        let Some((resource, listener)) = entry else {
            let err = WatchError::NotWatching(path.to_path_buf());
            self.notify_error(&err);
            return Err(err);
        };

        resource.remove_change_listener(listener);
        tracing::debug!(watcher = %self.id, path = %path.display(), "Stopped watching");
        Ok(resource)
    }

    /// Stop every watch and return the released resources.
    pub fn stop_watching_all(&self) -> Vec<Arc<LogContent>> {
        let entries: Vec<_> = self.lock().drain().collect();
        if !entries.is_empty() {
            tracing::debug!(watcher = %self.id, count = entries.len(), "Stopped all watches");
        }
        entries
            .into_iter()
            .map(|(_, (resource, listener))| {
                resource.remove_change_listener(listener);
                resource
            })
            .collect()
    }

    /// Send an error message to the client.
    pub fn notify_error(&self, error: &dyn fmt::Display) {
        self.outbound
            .send_json(&self.messages.error(error.to_string()));
    }

    #[must_use]
    pub fn is_watching(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Paths currently watched, in no particular order.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, (Arc<LogContent>, ListenerId)>> {
        self.watched.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("watched", &self.lock().len())
            .finish_non_exhaustive()
    }
}
