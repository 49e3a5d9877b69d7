//! Flat-file line parser for event records.
//!
//! One record per line, six pipe-delimited fields:
//!
//! ```text
//! event_id|event_name|start_date|end_date|parent_id|description
//! ```
//!
//! Blank lines are skipped. Malformed lines produce a typed [`ParseError`];
//! the ingestion pipeline records them per line and keeps going, so parsing
//! never aborts a job.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::event::{Event, EventMetadata};

/// Number of pipe-delimited fields in a record line.
pub const FIELD_COUNT: usize = 6;

/// Typed per-line parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Wrong field count. The only error a line with a field count other
    /// than [`FIELD_COUNT`] can produce.
    #[error("malformed entry: expected {expected} fields, found {found}")]
    MalformedEntry { expected: usize, found: usize },

    /// `event_name` was empty after trimming.
    #[error("event_name must not be empty")]
    EmptyName,

    /// `event_id` is not a canonical RFC 4122 UUID.
    #[error("invalid event UUID: {value:?}")]
    InvalidUuid { value: String },

    /// A date field failed to parse.
    #[error("invalid {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    /// `start_date` was not strictly earlier than `end_date`.
    #[error("start_date {start:?} is not earlier than end_date {end:?}")]
    DateOrder { start: String, end: String },

    /// `parent_id` is neither empty, `NULL`, nor a canonical UUID.
    #[error("invalid parent UUID: {value:?}")]
    InvalidParentUuid { value: String },
}

/// Parse one raw line into an event draft.
///
/// Returns `Ok(None)` for blank/whitespace-only lines: skipped, neither a
/// success nor an error. Parsing is a pure function of the line text, the
/// line number, and the source path; re-parsing the same inputs yields the
/// same draft.
///
/// The parser does not verify that a parent reference exists - the event
/// store enforces that at commit time.
pub fn parse_line(
    line: &str,
    line_number: u64,
    source_file: &str,
) -> Result<Option<Event>, ParseError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::MalformedEntry {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let id_raw = fields[0].trim();
    let event_id = parse_canonical_uuid(id_raw).ok_or_else(|| ParseError::InvalidUuid {
        value: id_raw.to_string(),
    })?;

    let event_name = fields[1].trim();
    if event_name.is_empty() {
        return Err(ParseError::EmptyName);
    }

    let start_raw = fields[2].trim();
    let start_date = parse_timestamp(start_raw).ok_or_else(|| ParseError::InvalidDate {
        field: "start_date",
        value: start_raw.to_string(),
    })?;

    let end_raw = fields[3].trim();
    let end_date = parse_timestamp(end_raw).ok_or_else(|| ParseError::InvalidDate {
        field: "end_date",
        value: end_raw.to_string(),
    })?;

    if start_date >= end_date {
        return Err(ParseError::DateOrder {
            start: start_raw.to_string(),
            end: end_raw.to_string(),
        });
    }

    let parent_raw = fields[4].trim();
    let parent_event_id = if parent_raw.is_empty() || parent_raw.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(
            parse_canonical_uuid(parent_raw).ok_or_else(|| ParseError::InvalidParentUuid {
                value: parent_raw.to_string(),
            })?,
        )
    };

    let description = match fields[5].trim() {
        "" => None,
        text => Some(text.to_string()),
    };

    Ok(Some(Event {
        event_id,
        event_name: event_name.to_string(),
        description,
        start_date,
        end_date,
        parent_event_id,
        metadata: EventMetadata {
            source_file: source_file.to_string(),
            line_number,
            parsing_flags: Vec::new(),
        },
    }))
}

/// Parse a timestamp, interpreted as UTC.
///
/// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`
/// forms common in flat-file exports.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Validate the canonical 8-4-4-4-12 UUID text form.
///
/// Stricter than `Uuid::parse_str`, which also accepts un-hyphenated and
/// urn forms: the version nibble must be 1-5 and the variant nibble
/// 8/9/a/b (RFC 4122).
fn parse_canonical_uuid(value: &str) -> Option<Uuid> {
    let bytes = value.as_bytes();
    if bytes.len() != 36 {
        return None;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if *b != b'-' {
                    return None;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return None;
                }
            }
        }
    }

    let uuid = Uuid::parse_str(value).ok()?;
    if !(1..=5).contains(&uuid.get_version_num()) {
        return None;
    }
    if uuid.get_variant() != uuid::Variant::RFC4122 {
        return None;
    }
    Some(uuid)
}
