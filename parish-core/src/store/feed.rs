//! Fan-out of change notifications to subscribers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedSender};

use super::{Change, ChangeStream, Document};

/// Per-collection list of live subscribers.
///
/// Callers must hold whatever lock orders their writes while calling
/// [`ChangeFeed::publish`] and [`ChangeFeed::subscribe`], so a subscriber's
/// replay and the live changes after it never interleave out of order.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Mutex<HashMap<String, Vec<UnboundedSender<Change>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        ChangeFeed::default()
    }

    /// Register a subscriber, seeding its stream with `existing` documents.
    pub fn subscribe(&self, collection: &str, existing: Vec<(String, Document)>) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded();

        for (id, doc) in existing {
            // receiver is alive, it's right here
            let _ = tx.unbounded_send(Change::Upserted { id, doc });
        }

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default()
            .push(tx);

        rx.boxed()
    }

    /// Deliver `change` to every subscriber of `collection`, dropping the
    /// ones whose streams have gone away.
    pub fn publish(&self, collection: &str, change: Change) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(senders) = subscribers.get_mut(collection) {
            senders.retain(|tx| tx.unbounded_send(change.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
