//! In-process document store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Change, ChangeFeed, ChangeStream, Document, DocumentStore, Query};
use crate::error::{ParishError, ParishResult};

type Collection = BTreeMap<String, Document>;

/// A [`DocumentStore`] that keeps everything in memory.
///
/// Every write publishes its change while still holding the write lock, so
/// subscribers observe writes in commit order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, doc: Document) -> ParishResult<String> {
        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc.clone());
        self.feed.publish(collection, Change::Upserted { id: id.clone(), doc });

        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> ParishResult<Option<Document>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> ParishResult<Vec<(String, Document)>> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);

        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(query.apply(docs.iter().map(|(id, doc)| (id.clone(), doc.clone()))))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> ParishResult<()> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);

        let slot = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| ParishError::not_found(collection, id))?;
        *slot = doc.clone();

        self.feed.publish(collection, Change::Upserted { id: id.to_string(), doc });
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> ParishResult<()> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);

        collections
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .ok_or_else(|| ParishError::not_found(collection, id))?;

        self.feed.publish(collection, Change::Removed { id: id.to_string() });
        Ok(())
    }

    async fn subscribe(&self, collection: &str) -> ParishResult<ChangeStream> {
        // Hold the write lock so no change lands between the replay and registration
        let collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);

        let existing = collections
            .get(collection)
            .map(|c| c.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default();

        Ok(self.feed.subscribe(collection, existing))
    }
}
