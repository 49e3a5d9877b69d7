//! Event model shared across the chronik crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance attached to every ingested event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// File the event was ingested from.
    pub source_file: String,
    /// 1-based line number within the source file.
    pub line_number: u64,
    /// Flags attached during parsing.
    pub parsing_flags: Vec<String>,
}

/// A named, time-bounded historical event, optionally nested under a parent.
///
/// Events form a forest: each event has at most one parent, and a parent
/// reference must point at an event that already exists at insert time, so
/// cycles cannot occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Primary key, immutable once ingested.
    pub event_id: Uuid,
    /// Non-empty display name.
    pub event_name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Start of the event's time range (UTC). Always earlier than `end_date`.
    pub start_date: DateTime<Utc>,
    /// End of the event's time range (UTC).
    pub end_date: DateTime<Utc>,
    /// Optional parent event reference.
    pub parent_event_id: Option<Uuid>,
    /// Ingestion provenance.
    pub metadata: EventMetadata,
}

impl Event {
    /// Create an event with no parent, description, or provenance.
    pub fn new(
        event_id: Uuid,
        event_name: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            event_name: event_name.to_string(),
            description: None,
            start_date,
            end_date,
            parent_event_id: None,
            metadata: EventMetadata::default(),
        }
    }

    /// Set the parent reference.
    pub fn with_parent(mut self, parent_event_id: Uuid) -> Self {
        self.parent_event_id = Some(parent_event_id);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set the ingestion provenance.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Duration in whole minutes, derived from the dates.
    ///
    /// Never stored independently of the dates it derives from. Non-negative
    /// because `start_date < end_date` is validated at parse time.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_date - self.start_date).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_duration_minutes() {
        let event = Event::new(Uuid::new_v4(), "battle", ts(10, 0), ts(11, 30));
        assert_eq!(event.duration_minutes(), 90);
    }

    #[test]
    fn test_duration_truncates_sub_minute() {
        let start = ts(10, 0);
        let end = start + chrono::Duration::seconds(90);
        let event = Event::new(Uuid::new_v4(), "skirmish", start, end);
        assert_eq!(event.duration_minutes(), 1);
    }

    #[test]
    fn test_builders() {
        let parent = Uuid::new_v4();
        let event = Event::new(Uuid::new_v4(), "siege", ts(9, 0), ts(17, 0))
            .with_parent(parent)
            .with_description("a long siege");

        assert_eq!(event.parent_event_id, Some(parent));
        assert_eq!(event.description.as_deref(), Some("a long siege"));
    }
}
