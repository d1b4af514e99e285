//! Event data model.
//!
//! One `Event` type covers recurring templates, the concrete instances
//! generated from them, and one-off events. Which of the three a record is
//! follows from `recurrence_type` and `parent_event_id`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ParishError, ParishResult};
use crate::store::Document;

/// Store field names, for building queries against event documents.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const START_TIME: &str = "startTime";
    pub const END_TIME: &str = "endTime";
    pub const RECURRENCE_TYPE: &str = "recurrenceType";
    pub const PARENT_EVENT_ID: &str = "parentEventId";
    pub const EXCLUDED_DATES: &str = "excludedDates";
}

/// How an event repeats.
///
/// Unknown values coming back from the store are read as `None`, so a record
/// written by a newer client never turns into a template by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecurrenceType {
    #[default]
    None,
    Weekly,
    Biweekly,
    Monthly,
    FirstTuesdayOfMonth,
}

impl RecurrenceType {
    pub const ALL: [RecurrenceType; 5] = [
        RecurrenceType::None,
        RecurrenceType::Weekly,
        RecurrenceType::Biweekly,
        RecurrenceType::Monthly,
        RecurrenceType::FirstTuesdayOfMonth,
    ];

    /// The value stored in the `recurrenceType` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::None => "none",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Biweekly => "biweekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::FirstTuesdayOfMonth => "firstTuesdayOfMonth",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceType::None
    }

    /// Lenient mapping used when reading stored documents.
    fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            RecurrenceType::None => "does not repeat",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Biweekly => "every two weeks",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::FirstTuesdayOfMonth => "first Tuesday of the month",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for RecurrenceType {
    type Err = ParishError;

    /// Accepts both the stored camelCase spelling and the kebab-case
    /// spelling used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "never" => Ok(RecurrenceType::None),
            "weekly" => Ok(RecurrenceType::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Ok(RecurrenceType::Biweekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "firsttuesdayofmonth" | "first-tuesday" | "first-tuesday-of-month" => {
                Ok(RecurrenceType::FirstTuesdayOfMonth)
            }
            other => Err(ParishError::ValidationFailed(format!(
                "Unknown recurrence '{}'. Expected one of: none, weekly, biweekly, monthly, first-tuesday",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for RecurrenceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::from_stored).unwrap_or_default())
    }
}

/// A calendar event: a recurring template, a generated instance, or a one-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Assigned by the store on creation; empty until first persisted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub recurrence_type: RecurrenceType,
    /// Back-reference to the template this instance was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
    /// Occurrence start times of a template that must not be materialized,
    /// because the instance there was deleted or moved by hand.
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "millis_list")]
    pub excluded_dates: Vec<DateTime<Utc>>,
}

impl Event {
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Event {
            id: String::new(),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            start_time,
            end_time,
            recurrence_type: RecurrenceType::None,
            parent_event_id: None,
            excluded_dates: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_recurrence(mut self, recurrence_type: RecurrenceType) -> Self {
        self.recurrence_type = recurrence_type;
        self
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// A template seeds instances and is never shown as an occurrence itself.
    pub fn is_template(&self) -> bool {
        self.recurrence_type.is_recurring() && self.parent_event_id.is_none()
    }

    pub fn is_instance(&self) -> bool {
        self.parent_event_id.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn is_excluded(&self, start_time: DateTime<Utc>) -> bool {
        self.excluded_dates.contains(&start_time)
    }

    /// Mark an occurrence as skipped. Returns false if it already was.
    pub fn exclude(&mut self, start_time: DateTime<Utc>) -> bool {
        if self.is_excluded(start_time) {
            return false;
        }
        self.excluded_dates.push(start_time);
        self.excluded_dates.sort();
        true
    }

    /// Forget skipped occurrences before `cutoff`. Returns how many went.
    pub fn expire_exclusions(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.excluded_dates.len();
        self.excluded_dates.retain(|start| *start >= cutoff);
        before - self.excluded_dates.len()
    }

    /// Checks the invariants enforced at the edit boundary.
    pub fn validate(&self) -> ParishResult<()> {
        if self.end_time <= self.start_time {
            return Err(ParishError::ValidationFailed(format!(
                "Event '{}' must end after it starts ({} <= {})",
                self.title,
                self.end_time.to_rfc3339(),
                self.start_time.to_rfc3339()
            )));
        }

        if self.is_instance() && self.recurrence_type.is_recurring() {
            return Err(ParishError::ValidationFailed(format!(
                "Event '{}' is an instance of another event and cannot repeat on its own",
                self.title
            )));
        }

        Ok(())
    }

    /// Build the concrete instance of this template starting at `start_time`.
    pub fn instance_at(&self, start_time: DateTime<Utc>) -> Event {
        Event {
            id: String::new(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_time,
            end_time: start_time + self.duration(),
            recurrence_type: RecurrenceType::None,
            parent_event_id: Some(self.id.clone()),
            excluded_dates: Vec::new(),
        }
    }

    /// Encode as a store document. The id lives in the document key, not the body.
    pub fn to_document(&self) -> ParishResult<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(mut doc) => {
                doc.remove("id");
                Ok(doc)
            }
            other => Err(ParishError::Serialization(format!(
                "Event encoded to a non-object value: {}",
                other
            ))),
        }
    }

    pub fn from_document(id: &str, doc: Document) -> ParishResult<Event> {
        let mut event: Event = serde_json::from_value(serde_json::Value::Object(doc))?;
        event.id = id.to_string();
        Ok(event)
    }

    /// Stored representation of an instant, as used in range filters.
    pub fn timestamp_value(time: DateTime<Utc>) -> serde_json::Value {
        serde_json::Value::from(time.timestamp_millis())
    }
}

/// (De)serialize a list of instants as epoch milliseconds, matching how
/// single timestamps are stored.
mod millis_list {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dates: &[DateTime<Utc>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(dates.iter().map(DateTime::timestamp_millis))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<DateTime<Utc>>, D::Error> {
        Vec::<i64>::deserialize(deserializer)?
            .into_iter()
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| D::Error::custom(format!("timestamp {} is out of range", ms)))
            })
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
