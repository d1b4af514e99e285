//! Document store interface.
//!
//! The engine talks to a hosted document database through [`DocumentStore`]:
//! collections of JSON documents addressed by opaque ids, with filtered and
//! ordered queries and a change stream. Two backends ship with the crate:
//! [`MemoryStore`] and [`FileStore`].

mod feed;
mod file;
mod memory;
mod query;

pub use feed::ChangeFeed;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, Query};

use async_trait::async_trait;
use futures::FutureExt;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::ParishResult;

/// A stored document body. The id is the document's key, not one of its fields.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A single change notification from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The document was created or overwritten.
    Upserted { id: String, doc: Document },
    Removed { id: String },
}

impl Change {
    pub fn id(&self) -> &str {
        match self {
            Change::Upserted { id, .. } | Change::Removed { id } => id,
        }
    }
}

/// Stream of changes for one collection.
///
/// Starts by replaying every existing document as [`Change::Upserted`], then
/// follows live writes. Delivery is at-least-once.
pub type ChangeStream = BoxStream<'static, Change>;

/// Take every change already buffered on `changes` without waiting.
///
/// Straight after [`DocumentStore::subscribe`] this is the replay (plus any
/// write that landed in the meantime), in order. What remains on the stream
/// is strictly newer.
pub fn drain_ready(changes: &mut ChangeStream) -> Vec<Change> {
    let mut ready = Vec::new();
    while let Some(Some(change)) = changes.next().now_or_never() {
        ready.push(change);
    }
    ready
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return the id the store assigned to it.
    async fn create(&self, collection: &str, doc: Document) -> ParishResult<String>;

    async fn get(&self, collection: &str, id: &str) -> ParishResult<Option<Document>>;

    async fn query(&self, collection: &str, query: &Query)
    -> ParishResult<Vec<(String, Document)>>;

    /// Overwrite an existing document wholesale. Fails with `NotFound` if absent.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> ParishResult<()>;

    /// Fails with `NotFound` if absent.
    async fn delete(&self, collection: &str, id: &str) -> ParishResult<()>;

    async fn subscribe(&self, collection: &str) -> ParishResult<ChangeStream>;
}
