//! Typed access to the event collection.

use std::sync::Arc;

use serde_json::Value;

use crate::error::ParishResult;
use crate::event::{Event, RecurrenceType, fields};
use crate::store::{Direction, Document, DocumentStore, FilterOp, Query};

/// Maps `Event`s onto documents in one store collection.
#[derive(Clone)]
pub(crate) struct EventRepo {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl EventRepo {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        EventRepo {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Persist a new event, returning it with its assigned id.
    pub async fn create(&self, mut event: Event) -> ParishResult<Event> {
        let id = self.store.create(&self.collection, event.to_document()?).await?;
        event.id = id;
        Ok(event)
    }

    pub async fn get(&self, id: &str) -> ParishResult<Option<Event>> {
        self.store
            .get(&self.collection, id)
            .await?
            .map(|doc| Event::from_document(id, doc))
            .transpose()
    }

    pub async fn set(&self, event: &Event) -> ParishResult<()> {
        self.store
            .set(&self.collection, &event.id, event.to_document()?)
            .await
    }

    pub async fn delete(&self, id: &str) -> ParishResult<()> {
        self.store.delete(&self.collection, id).await
    }

    /// Every event, ordered by start time.
    pub async fn all(&self) -> ParishResult<Vec<Event>> {
        self.find(Query::all().order_by(fields::START_TIME, Direction::Ascending))
            .await
    }

    /// Every recurring template.
    pub async fn templates(&self) -> ParishResult<Vec<Event>> {
        let query = Query::all()
            .filter(
                fields::RECURRENCE_TYPE,
                FilterOp::NotEq,
                RecurrenceType::None.as_str(),
            )
            .order_by(fields::START_TIME, Direction::Ascending);

        let events = self.find(query).await?;
        Ok(events.into_iter().filter(Event::is_template).collect())
    }

    /// Every generated instance, whatever its parent.
    pub async fn instances(&self) -> ParishResult<Vec<Event>> {
        let query = Query::all()
            .filter(fields::PARENT_EVENT_ID, FilterOp::NotEq, Value::Null)
            .order_by(fields::START_TIME, Direction::Ascending);
        self.find(query).await
    }

    pub async fn instances_of(&self, parent_id: &str) -> ParishResult<Vec<Event>> {
        let query = Query::all()
            .where_eq(fields::PARENT_EVENT_ID, parent_id)
            .order_by(fields::START_TIME, Direction::Ascending);
        self.find(query).await
    }

    async fn find(&self, query: Query) -> ParishResult<Vec<Event>> {
        let docs = self.store.query(&self.collection, &query).await?;
        Ok(decode_all(docs))
    }
}

/// Decode query results, skipping documents that are not valid events.
fn decode_all(docs: Vec<(String, Document)>) -> Vec<Event> {
    docs.into_iter()
        .filter_map(|(id, doc)| match Event::from_document(&id, doc) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(event_id = %id, error = %e, "Skipping undecodable event document");
                None
            }
        })
        .collect()
}
