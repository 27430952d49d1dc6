//! Collection error types.

/// Errors raised by a [`Collection`](super::Collection).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// No item is stored under the key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An item with the same key is already stored.
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CollectionError {
    /// Whether this is a [`CollectionError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
