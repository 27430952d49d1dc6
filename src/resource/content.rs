//! A tailed log file shared by every client watching it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use super::backend::{Follower, TailOptions};
use super::error::ResourceError;
use super::text::TextBlock;
use crate::bus::call_isolated;
use crate::lines::{LineBuffer, Utf8Decoder};

/// Identifies a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ChangeListener = Arc<dyn Fn(&[String]) + Send + Sync>;

struct State {
    listeners: Vec<(ListenerId, ChangeListener)>,
    buffer: LineBuffer,
    decoder: Utf8Decoder,
    follower: Option<Follower>,
    next_listener: u64,
    closed: bool,
}

/// A log file followed for appended lines.
///
/// Appended content is split into lines and each completed line is passed
/// to every change listener as its own event. One instance is shared by all watchers of the
/// same path; the pool closes it once nobody listens any more.
pub struct LogContent {
    path: PathBuf,
    eol: String,
    state: Mutex<State>,
}

impl LogContent {
    /// Start following `path` with the configured backend.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Follow`] if the follower cannot be started.
    pub fn open(path: impl Into<PathBuf>, options: &TailOptions) -> Result<Arc<Self>, ResourceError> {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let follower = Follower::spawn(&path, options, tx)?;

        tracing::info!(path = %path.display(), backend = ?options.backend, "Following file");
        Ok(Self::build(path, &options.eol, rx, Some(follower)))
    }

    /// Build a resource fed from `source` instead of a follower.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn with_source(
        path: impl Into<PathBuf>,
        eol: &str,
        source: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Arc<Self> {
        Self::build(path.into(), eol, source, None)
    }

    fn build(
        path: PathBuf,
        eol: &str,
        source: mpsc::UnboundedReceiver<Vec<u8>>,
        follower: Option<Follower>,
    ) -> Arc<Self> {
        let buffer = LineBuffer::new(eol);
        let content = Arc::new(Self {
            path,
            eol: buffer.eol().to_string(),
            state: Mutex::new(State {
                listeners: Vec::new(),
                buffer,
                decoder: Utf8Decoder::new(),
                follower,
                next_listener: 0,
                closed: false,
            }),
        });

        tokio::spawn(pump(Arc::downgrade(&content), source));
        content
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn eol(&self) -> &str {
        &self.eol
    }

    /// Register a listener called once for every newly appended line.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Closed`] once the resource has been closed.
    pub fn add_change_listener<F>(&self, listener: F) -> Result<ListenerId, ResourceError>
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        if state.closed {
            return Err(ResourceError::Closed(self.path.clone()));
        }
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Register `listener`, then hand it the whole current content in one call.
    ///
    /// Lines appended while the file is read are still delivered; they may
    /// show up in the initial content as well.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Closed`] or [`ResourceError::Read`]; a
    /// listener whose read failed is removed again.
    pub async fn add_change_listener_from_beginning<F>(
        &self,
        listener: F,
    ) -> Result<ListenerId, ResourceError>
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let id = {
            let listener = Arc::clone(&listener);
            self.add_change_listener(move |lines| listener(lines))?
        };
        match self.read_full_text().await {
            Ok(text) => {
                listener(&text.lines());
                Ok(id)
            }
            Err(e) => {
                self.remove_change_listener(id);
                Err(e)
            }
        }
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_change_listener(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    #[must_use]
    pub fn has_change_listeners(&self) -> bool {
        !self.lock().listeners.is_empty()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current file size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Size`] if the metadata cannot be read.
    pub async fn size(&self) -> Result<u64, ResourceError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|metadata| metadata.len())
            .map_err(|source| ResourceError::Size {
                path: self.path.clone(),
                source,
            })
    }

    /// The whole file content.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Read`] if the file cannot be read.
    pub async fn read_full_text(&self) -> Result<TextBlock, ResourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ResourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(TextBlock::new(
            String::from_utf8_lossy(&bytes).into_owned(),
            self.eol.clone(),
        ))
    }

    /// Stop following the file and drop every listener.
    ///
    /// Closing twice is harmless.
    pub fn close(&self) {
        let follower = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.listeners.clear();
            state.buffer.clear();
            state.decoder.clear();
            state.follower.take()
        };
        drop(follower);
        tracing::info!(path = %self.path.display(), "Stopped following file");
    }

    fn on_chunk(&self, chunk: &[u8]) {
        let (lines, listeners) = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            let text = state.decoder.decode(chunk);
            let lines = state.buffer.read_lines(&text);
            if lines.is_empty() {
                return;
            }
            (lines, state.listeners.clone())
        };

        tracing::trace!(path = %self.path.display(), lines = lines.len(), "Lines appended");
        for line in &lines {
            for (id, listener) in &listeners {
                if self.is_closed() {
                    return;
                }
                call_isolated(
                    format_args!("{} listener {}", self.path.display(), id.0),
                    || listener(std::slice::from_ref(line)),
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LogContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogContent")
            .field("path", &self.path)
            .field("listeners", &self.listener_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn pump(content: Weak<LogContent>, mut source: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(chunk) = source.recv().await {
        let Some(content) = content.upgrade() else {
            break;
        };
        content.on_chunk(&chunk);
    }
}
