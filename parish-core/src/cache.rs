//! Read-through cache of events, kept current from a store subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::event::Event;
use crate::store::{self, Change, ChangeStream};

#[derive(Default)]
struct CacheInner {
    events: RwLock<HashMap<String, Event>>,
    populated: AtomicBool,
    /// Bumped whenever a new subscription takes over. A listener whose
    /// generation is stale stops without writing.
    generation: AtomicU64,
}

/// Last-known copy of every event in a collection, keyed by id.
///
/// Only changes from the current subscription are ever written, so the
/// contents always follow the store's commit order. They may lag the store
/// and are served as-is while the store is unreachable.
#[derive(Default)]
pub struct EventCache {
    inner: Arc<CacheInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl EventCache {
    pub fn new() -> Self {
        EventCache::default()
    }

    /// Follow `changes`, replacing any subscription followed before.
    ///
    /// Whatever the stream has already buffered (its replay) becomes the new
    /// contents in one swap; later changes are applied in order on a
    /// background task.
    pub fn listen(&self, changes: ChangeStream) {
        self.follow(changes, false);
    }

    /// Like [`listen`](Self::listen), but the stream comes from a fresh
    /// successful subscription, so its replay counts as a full snapshot even
    /// when the collection is empty.
    pub fn resync(&self, changes: ChangeStream) {
        self.follow(changes, true);
    }

    fn follow(&self, mut changes: ChangeStream, snapshot: bool) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);

        let ready = store::drain_ready(&mut changes);
        let received = !ready.is_empty();
        let mut fresh = HashMap::new();
        for change in ready {
            apply_to(&mut fresh, change);
        }

        let generation = {
            let mut events = self.inner.events.write().unwrap_or_else(PoisonError::into_inner);
            *events = fresh;
            self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
        };
        if snapshot || received {
            self.inner.populated.store(true, Ordering::Release);
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(change) = changes.next().await {
                if !apply_current(&inner, generation, change) {
                    tracing::debug!(generation, "Event subscription superseded");
                    return;
                }
            }
            tracing::debug!("Event change stream closed");
        });

        if let Some(previous) = listener.replace(task) {
            previous.abort();
        }
    }

    pub fn get(&self, id: &str) -> Option<Event> {
        self.read().get(id).cloned()
    }

    /// Every cached event ordered by start time, then id.
    pub fn snapshot_sorted(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self.read().values().cloned().collect();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        events
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the cache has ever received data from the store.
    pub fn is_populated(&self) -> bool {
        self.inner.populated.load(Ordering::Acquire)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Event>> {
        self.inner.events.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EventCache {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(listener) = listener.take() {
            listener.abort();
        }
    }
}

/// Apply `change` unless a newer subscription has taken over. Returns false
/// once superseded.
fn apply_current(inner: &CacheInner, generation: u64, change: Change) -> bool {
    let mut events = inner.events.write().unwrap_or_else(PoisonError::into_inner);
    if inner.generation.load(Ordering::Acquire) != generation {
        return false;
    }

    apply_to(&mut events, change);
    inner.populated.store(true, Ordering::Release);
    true
}

fn apply_to(events: &mut HashMap<String, Event>, change: Change) {
    match change {
        Change::Upserted { id, doc } => match Event::from_document(&id, doc) {
            Ok(event) => {
                events.insert(id, event);
            }
            Err(e) => {
                tracing::warn!(event_id = %id, error = %e, "Ignoring undecodable event document");
            }
        },
        Change::Removed { id } => {
            events.remove(&id);
        }
    }
}
