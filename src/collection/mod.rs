//! Keyed registries used for commands, executions and allowed log paths.

mod error;
mod memory;

pub use error::CollectionError;
pub use memory::InMemoryCollection;

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;

/// Items that carry their own identity.
pub trait Keyed {
    type Key: Clone + Eq + Hash + fmt::Display + Send + Sync;

    fn key(&self) -> Self::Key;
}

/// A store of keyed items.
///
/// Implementations may be backed by memory or by a database; the trait is
/// async so that either fits.
#[async_trait]
pub trait Collection<T>: Send + Sync
where
    T: Keyed + Send + Sync,
{
    /// All items, in insertion order where the backend preserves it.
    async fn find_all(&self) -> Result<Vec<T>, CollectionError>;

    /// The item stored under `id`.
    async fn find_by_id(&self, id: &T::Key) -> Result<T, CollectionError>;

    /// Whether an item is stored under `id`.
    async fn contains(&self, id: &T::Key) -> Result<bool, CollectionError>;

    /// Store a new item. Fails if its key is already present.
    async fn add(&self, item: T) -> Result<(), CollectionError>;

    /// Remove the item with the same key as `item`.
    async fn remove(&self, item: &T) -> Result<(), CollectionError>;
}
