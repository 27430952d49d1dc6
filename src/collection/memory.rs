//! In-memory collection.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{Collection, CollectionError, Keyed};

/// A [`Collection`] held in memory, preserving insertion order.
#[derive(Debug)]
pub struct InMemoryCollection<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for InMemoryCollection<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Keyed> InMemoryCollection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection pre-populated with `items`, keeping the first of
    /// any duplicate keys.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut stored: Vec<T> = Vec::new();
        for item in items {
            let key = item.key();
            if stored.iter().any(|existing| existing.key() == key) {
                tracing::warn!(key = %key, "Ignoring duplicate collection entry");
                continue;
            }
            stored.push(item);
        }
        Self {
            items: RwLock::new(stored),
        }
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T> Collection<T> for InMemoryCollection<T>
where
    T: Keyed + Clone + Send + Sync,
{
    async fn find_all(&self) -> Result<Vec<T>, CollectionError> {
        Ok(self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn find_by_id(&self, id: &T::Key) -> Result<T, CollectionError> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|item| item.key() == *id)
            .cloned()
            .ok_or_else(|| CollectionError::NotFound(id.to_string()))
    }

    async fn contains(&self, id: &T::Key) -> Result<bool, CollectionError> {
        Ok(self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|item| item.key() == *id))
    }

    async fn add(&self, item: T) -> Result<(), CollectionError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let key = item.key();
        if items.iter().any(|existing| existing.key() == key) {
            return Err(CollectionError::Duplicate(key.to_string()));
        }
        items.push(item);
        Ok(())
    }

    async fn remove(&self, item: &T) -> Result<(), CollectionError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let key = item.key();
        let index = items
            .iter()
            .position(|existing| existing.key() == key)
            .ok_or_else(|| CollectionError::NotFound(key.to_string()))?;
        items.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        id: &'static str,
        value: u32,
    }

    impl Keyed for Entry {
        type Key = String;

        fn key(&self) -> String {
            self.id.to_string()
        }
    }

    #[tokio::test]
    async fn test_add_find_remove() {
        let collection = InMemoryCollection::new();
        collection.add(Entry { id: "a", value: 1 }).await.unwrap();
        collection.add(Entry { id: "b", value: 2 }).await.unwrap();

        assert_eq!(collection.find_by_id(&"b".to_string()).await.unwrap().value, 2);
        assert!(collection.contains(&"a".to_string()).await.unwrap());
        assert_eq!(collection.find_all().await.unwrap().len(), 2);

        collection.remove(&Entry { id: "a", value: 0 }).await.unwrap();
        assert!(!collection.contains(&"a".to_string()).await.unwrap());
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_items_report_not_found() {
        let collection: InMemoryCollection<Entry> = InMemoryCollection::new();
        let err = collection.find_by_id(&"zz".to_string()).await.unwrap_err();
        assert_eq!(err, CollectionError::NotFound("zz".into()));

        let err = collection.remove(&Entry { id: "zz", value: 0 }).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_add_is_rejected() {
        let collection = InMemoryCollection::new();
        collection.add(Entry { id: "a", value: 1 }).await.unwrap();
        let err = collection.add(Entry { id: "a", value: 2 }).await.unwrap_err();
        assert_eq!(err, CollectionError::Duplicate("a".into()));
    }

    #[tokio::test]
    async fn test_with_items_preserves_order_and_drops_duplicates() {
        let collection = InMemoryCollection::with_items([
            Entry { id: "x", value: 1 },
            Entry { id: "y", value: 2 },
            Entry { id: "x", value: 3 },
        ]);
        let all = collection.find_all().await.unwrap();
        assert_eq!(all, vec![Entry { id: "x", value: 1 }, Entry { id: "y", value: 2 }]);
    }
}
