//! Event CRUD and recurring-series maintenance.
//!
//! [`EventSyncEngine`] is the entry point callers use. Plain events are stored
//! as-is. Saving a recurring template triggers
//! [`EventSyncEngine::sync_recurring_events`], which keeps a rolling window of
//! concrete instances in the store.

mod repo;
mod sync;


pub use sync::{Materialization, SyncReport, TemplateSync};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::EventCache;
use crate::clock::{Clock, SystemClock};
use crate::constants::{DEFAULT_COLLECTION, DEFAULT_HORIZON_MONTHS};
use crate::error::{ParishError, ParishResult};
use crate::event::Event;
use crate::store::{self, Change, DocumentStore};
use repo::EventRepo;

/// How far ahead instances are kept materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Calendar months, so the window ends on the same day-of-month.
    Months(u32),
    Days(u32),
}

impl Horizon {
    /// Exclusive end of the window starting at `now`.
    pub fn end_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            Horizon::Months(n) => now.checked_add_months(Months::new(*n)),
            Horizon::Days(n) => now.checked_add_signed(Duration::days(i64::from(*n))),
        };
        end.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Horizon::Months(DEFAULT_HORIZON_MONTHS)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Horizon::Months(1) => write!(f, "1 month"),
            Horizon::Months(n) => write!(f, "{} months", n),
            Horizon::Days(1) => write!(f, "1 day"),
            Horizon::Days(n) => write!(f, "{} days", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store collection holding event documents.
    pub collection: String,
    pub horizon: Horizon,
    /// Zone whose wall clock recurrence rules follow.
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            collection: DEFAULT_COLLECTION.to_string(),
            horizon: Horizon::default(),
            timezone: Tz::UTC,
        }
    }
}

/// Result of a successful add or update.
#[derive(Debug, Clone)]
pub struct SavedEvent {
    /// The event as stored.
    pub event: Event,
    /// Present when saving a template triggered a sync pass. A sync failure
    /// shows up here and never fails the save itself.
    pub sync: Option<SyncReport>,
}

/// Result of a successful delete.
#[derive(Debug, Clone)]
pub struct DeletedEvent {
    pub event: Event,
    /// Number of generated instances removed along with it.
    pub cascaded: usize,
}

/// A live change to the event collection.
#[derive(Debug, Clone, PartialEq)]
pub enum EventChange {
    Saved(Event),
    Removed { id: String },
}

impl EventChange {
    /// Decode a store change, skipping documents that are not valid events.
    fn decode(change: Change) -> Option<Self> {
        match change {
            Change::Upserted { id, doc } => match Event::from_document(&id, doc) {
                Ok(event) => Some(EventChange::Saved(event)),
                Err(e) => {
                    warn!(event_id = %id, error = %e, "Ignoring undecodable event document");
                    None
                }
            },
            Change::Removed { id } => Some(EventChange::Removed { id }),
        }
    }
}

pub struct EventSyncEngine {
    repo: EventRepo,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    cache: EventCache,
    /// Held for a whole sync pass; passes from one engine never overlap.
    sync_lock: Mutex<()>,
}

impl EventSyncEngine {
    /// Create an engine on the system clock and start following the store's
    /// change stream.
    pub async fn connect(store: Arc<dyn DocumentStore>, config: EngineConfig) -> ParishResult<Self> {
        Self::connect_with_clock(store, Arc::new(SystemClock), config).await
    }

    pub async fn connect_with_clock(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> ParishResult<Self> {
        let repo = EventRepo::new(store, config.collection.clone());

        let cache = EventCache::new();
        cache.listen(repo.store().subscribe(repo.collection()).await?);

        debug!(collection = %config.collection, horizon = %config.horizon, timezone = %config.timezone, "Event engine connected");

        Ok(EventSyncEngine {
            repo,
            clock,
            config,
            cache,
            sync_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persist a new event (one-off or template).
    ///
    /// A start time already in the past is moved to now, keeping the event's
    /// duration. Templates are expanded right away.
    pub async fn add_event(&self, event: Event) -> ParishResult<SavedEvent> {
        if event.is_persisted() {
            return Err(ParishError::ValidationFailed(format!(
                "Event '{}' already has id '{}'; use update instead",
                event.title, event.id
            )));
        }
        event.validate()?;

        let mut event = event;
        let now = self.now();
        if event.start_time < now {
            let duration = event.duration();
            debug!(title = %event.title, requested = %event.start_time, now = %now, "Clamping past start time to now");
            event.start_time = now;
            event.end_time = now + duration;
        }

        let event = self.repo.create(event).await?;
        info!(event_id = %event.id, title = %event.title, recurrence = event.recurrence_type.as_str(), "Event added");

        let sync = if event.is_template() {
            Some(self.resync_after_mutation().await)
        } else {
            None
        };

        Ok(SavedEvent { event, sync })
    }

    /// Overwrite a stored event wholesale.
    ///
    /// Saving a template syncs afterwards, but instances already materialized
    /// keep their old schedule; only missing slots are filled from the new rule.
    /// Moving an instance to another start time excludes its original slot on
    /// the template so the next sync does not fill it again.
    pub async fn update_event(&self, event: Event) -> ParishResult<SavedEvent> {
        if !event.is_persisted() {
            return Err(ParishError::ValidationFailed(format!(
                "Event '{}' has not been saved yet; use add instead",
                event.title
            )));
        }
        event.validate()?;

        if let Some(parent_id) = &event.parent_event_id {
            let previous = self
                .repo
                .get(&event.id)
                .await?
                .ok_or_else(|| ParishError::not_found(self.repo.collection(), &event.id))?;
            if previous.start_time != event.start_time {
                self.exclude_from_parent(parent_id, previous.start_time).await?;
            }
        }

        self.repo.set(&event).await?;
        info!(event_id = %event.id, title = %event.title, recurrence = event.recurrence_type.as_str(), "Event updated");

        let sync = if event.is_template() {
            Some(self.resync_after_mutation().await)
        } else {
            None
        };

        Ok(SavedEvent { event, sync })
    }

    /// Delete an event. Deleting anything other than a generated instance also
    /// removes every instance pointing at it. Deleting an instance skips that
    /// one occurrence: its slot is excluded on the template and no other
    /// instance is touched.
    pub async fn delete_event(&self, id: &str) -> ParishResult<DeletedEvent> {
        let event = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| ParishError::not_found(self.repo.collection(), id))?;

        if let Some(parent_id) = &event.parent_event_id {
            self.exclude_from_parent(parent_id, event.start_time).await?;
        }

        self.repo.delete(id).await?;

        let mut cascaded = 0;
        if !event.is_instance() {
            for instance in self.repo.instances_of(id).await? {
                self.delete_if_present(&instance.id).await?;
                cascaded += 1;
            }
        }

        info!(event_id = %id, title = %event.title, cascaded, "Event deleted");
        Ok(DeletedEvent { event, cascaded })
    }

    /// Read one event from the store, falling back to the cache while the
    /// store is unreachable.
    pub async fn get_event(&self, id: &str) -> ParishResult<Event> {
        match self.repo.get(id).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(ParishError::not_found(self.repo.collection(), id)),
            Err(e) if e.is_recoverable() => match self.cache.get(id) {
                Some(cached) => {
                    warn!(event_id = %id, error = %e, "Store unavailable, serving cached event");
                    Ok(cached)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Cached occurrences (one-off events and instances) sorted by start time.
    /// Templates are not occurrences and are left out.
    pub fn list_events(&self) -> Vec<Event> {
        self.cache
            .snapshot_sorted()
            .into_iter()
            .filter(|e| !e.is_template())
            .collect()
    }

    /// Cached recurring templates sorted by start time.
    pub fn list_templates(&self) -> Vec<Event> {
        self.cache
            .snapshot_sorted()
            .into_iter()
            .filter(Event::is_template)
            .collect()
    }

    /// Rebuild the cache from a fresh subscription and return the
    /// occurrences. If the store is unreachable but the cache has data, that
    /// data is returned instead.
    pub async fn fetch_events(&self) -> ParishResult<Vec<Event>> {
        match self.repo.store().subscribe(self.repo.collection()).await {
            Ok(changes) => {
                self.cache.resync(changes);
                debug!(count = self.cache.len(), "Refreshed event cache");
                Ok(self.list_events())
            }
            Err(e) if self.cache.is_populated() => {
                warn!(error = %e, "Store unavailable, serving cached events");
                Ok(self.list_events())
            }
            Err(e) => Err(e),
        }
    }

    /// Changes made to the collection from now on, by anyone. Existing
    /// events are not replayed.
    pub async fn watch_changes(&self) -> ParishResult<BoxStream<'static, EventChange>> {
        let mut changes = self.repo.store().subscribe(self.repo.collection()).await?;
        let skipped = store::drain_ready(&mut changes).len();
        debug!(skipped, "Following live event changes");

        Ok(changes
            .filter_map(|change| futures::future::ready(EventChange::decode(change)))
            .boxed())
    }

    /// Record `start_time` as a skipped occurrence of `parent_id`. A parent
    /// that is gone or no longer repeats has nothing to skip.
    async fn exclude_from_parent(&self, parent_id: &str, start_time: DateTime<Utc>) -> ParishResult<()> {
        let Some(mut parent) = self.repo.get(parent_id).await? else {
            return Ok(());
        };
        if !parent.is_template() || !parent.exclude(start_time) {
            return Ok(());
        }

        self.repo.set(&parent).await?;
        debug!(template_id = %parent_id, start = %start_time, "Excluded occurrence from template");
        Ok(())
    }

    async fn resync_after_mutation(&self) -> SyncReport {
        match self.sync_recurring_events().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Recurring event sync failed");
                let now = self.now();
                SyncReport::aborted(now, self.config.horizon.end_from(now), &e)
            }
        }
    }
}
