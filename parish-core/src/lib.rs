//! Core library for the parish event calendar.
//!
//! - `recurrence`: pure date arithmetic for repeating events
//! - `event`: the `Event` record shared by templates, instances and one-offs
//! - `store`: the document store interface and its backends
//! - `engine`: event CRUD plus materialization of recurring templates
//! - `cache`: the read-through event cache fed by store change streams

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod store;

pub use engine::{EngineConfig, EventSyncEngine, Horizon, SyncReport};
pub use error::{ParishError, ParishResult};
pub use event::{Event, RecurrenceType};
