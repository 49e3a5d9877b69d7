//! Interval analytics: pairwise overlap detection and largest-gap scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// A pair of distinct events whose time ranges intersect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapPair {
    pub first_id: Uuid,
    pub first_name: String,
    pub second_id: Uuid,
    pub second_name: String,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
    /// Always positive for a reported pair. Fractional because overlaps need
    /// not land on minute boundaries.
    pub overlap_minutes: f64,
}

/// The largest idle interval between two consecutive events in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub duration_minutes: f64,
    pub gap_start: DateTime<Utc>,
    pub gap_end: DateTime<Utc>,
    /// Event whose end bounds the gap on the left.
    pub before_id: Uuid,
    pub before_name: String,
    /// Event whose start bounds the gap on the right.
    pub after_id: Uuid,
    pub after_name: String,
}

/// Find every unordered pair of distinct events whose ranges intersect.
///
/// A pair overlaps iff `max(start1, start2) < min(end1, end2)`; the overlap
/// duration is `min(end1, end2) - max(start1, start2)`. Each pair is
/// reported once (never in both orders, never an event against itself),
/// ordered by overlap duration descending.
pub fn find_overlaps(events: &[Event]) -> Vec<OverlapPair> {
    let mut pairs = Vec::new();

    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            let (a, b) = (&events[i], &events[j]);
            let overlap_start = a.start_date.max(b.start_date);
            let overlap_end = a.end_date.min(b.end_date);
            if overlap_start < overlap_end {
                pairs.push(OverlapPair {
                    first_id: a.event_id,
                    first_name: a.event_name.clone(),
                    second_id: b.event_id,
                    second_name: b.event_name.clone(),
                    overlap_start,
                    overlap_end,
                    overlap_minutes: minutes_between(overlap_start, overlap_end),
                });
            }
        }
    }

    pairs.sort_by(|x, y| {
        y.overlap_minutes
            .partial_cmp(&x.overlap_minutes)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs
}

/// Find the single largest gap between consecutive events inside
/// `[window_start, window_end]`.
///
/// Only events fully contained in the window qualify. Events are sorted by
/// start date and consecutive pairs scanned; a gap exists when the earlier
/// event ends before the later one starts. Returns `None` (rather than an
/// error) when fewer than two qualifying events exist or no gap is found.
pub fn find_largest_gap(
    events: &[Event],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Option<Gap> {
    let mut contained: Vec<&Event> = events
        .iter()
        .filter(|e| e.start_date >= window_start && e.end_date <= window_end)
        .collect();
    if contained.len() < 2 {
        return None;
    }
    contained.sort_by_key(|e| e.start_date);

    let mut largest: Option<Gap> = None;
    for pair in contained.windows(2) {
        let (before, after) = (pair[0], pair[1]);
        if before.end_date < after.start_date {
            let duration = minutes_between(before.end_date, after.start_date);
            if largest
                .as_ref()
                .map_or(true, |g| duration > g.duration_minutes)
            {
                largest = Some(Gap {
                    duration_minutes: duration,
                    gap_start: before.end_date,
                    gap_end: after.start_date,
                    before_id: before.event_id,
                    before_name: before.event_name.clone(),
                    after_id: after.event_id,
                    after_name: after.event_name.clone(),
                });
            }
        }
    }
    largest
}

fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn event(name: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event::new(Uuid::new_v4(), name, start, end)
    }

    #[test]
    fn test_overlap_detection_and_duration() {
        let events = vec![
            event("a", ts(10, 0), ts(11, 0)),
            event("b", ts(10, 30), ts(11, 30)),
        ];
        let pairs = find_overlaps(&events);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].overlap_start, ts(10, 30));
        assert_eq!(pairs[0].overlap_end, ts(11, 0));
        assert_eq!(pairs[0].overlap_minutes, 30.0);
    }

    #[test]
    fn test_overlap_is_symmetric_and_reported_once() {
        let a = event("a", ts(10, 0), ts(11, 0));
        let b = event("b", ts(10, 30), ts(11, 30));

        let forward = find_overlaps(&[a.clone(), b.clone()]);
        let backward = find_overlaps(&[b, a]);
        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(forward[0].overlap_minutes, backward[0].overlap_minutes);
    }

    #[test]
    fn test_event_never_overlaps_itself() {
        let events = vec![event("a", ts(10, 0), ts(11, 0))];
        assert!(find_overlaps(&events).is_empty());
    }

    #[test]
    fn test_touching_ranges_do_not_overlap() {
        let events = vec![
            event("a", ts(10, 0), ts(11, 0)),
            event("b", ts(11, 0), ts(12, 0)),
        ];
        assert!(find_overlaps(&events).is_empty());
    }

    #[test]
    fn test_overlaps_ordered_by_duration_descending() {
        let events = vec![
            event("a", ts(10, 0), ts(12, 0)),
            event("b", ts(11, 45), ts(12, 30)), // 15 min with a
            event("c", ts(10, 30), ts(11, 30)), // 60 min with a
        ];
        let pairs = find_overlaps(&events);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].overlap_minutes, 60.0);
        assert_eq!(pairs[1].overlap_minutes, 15.0);
        assert!(pairs.iter().all(|p| p.overlap_minutes > 0.0));
    }

    #[test]
    fn test_no_gap_when_ranges_touch_or_overlap() {
        // Event 2 starts at 10:30, before event 1 ends at 11:00 - no gap.
        let events = vec![
            event("a", ts(10, 0), ts(11, 0)),
            event("b", ts(10, 30), ts(11, 15)),
        ];
        assert_eq!(find_largest_gap(&events, ts(9, 0), ts(13, 0)), None);
    }

    #[test]
    fn test_gap_of_exactly_thirty_minutes() {
        let a = event("a", ts(10, 0), ts(11, 0));
        let b = event("b", ts(11, 30), ts(12, 15));
        let gap = find_largest_gap(&[a.clone(), b.clone()], ts(9, 0), ts(13, 0)).unwrap();
        assert_eq!(gap.duration_minutes, 30.0);
        assert_eq!(gap.gap_start, ts(11, 0));
        assert_eq!(gap.gap_end, ts(11, 30));
        assert_eq!(gap.before_id, a.event_id);
        assert_eq!(gap.after_id, b.event_id);
    }

    #[test]
    fn test_only_largest_gap_reported() {
        let events = vec![
            event("a", ts(8, 0), ts(9, 0)),
            event("b", ts(9, 10), ts(10, 0)),  // 10 min gap
            event("c", ts(11, 0), ts(11, 30)), // 60 min gap
        ];
        let gap = find_largest_gap(&events, ts(7, 0), ts(12, 0)).unwrap();
        assert_eq!(gap.duration_minutes, 60.0);
        assert_eq!(gap.before_name, "b");
        assert_eq!(gap.after_name, "c");
    }

    #[test]
    fn test_events_outside_window_excluded() {
        let events = vec![
            event("early", ts(6, 0), ts(7, 0)), // starts before the window
            event("a", ts(9, 0), ts(10, 0)),
            event("b", ts(10, 45), ts(11, 0)),
        ];
        let gap = find_largest_gap(&events, ts(8, 0), ts(12, 0)).unwrap();
        assert_eq!(gap.duration_minutes, 45.0);
        assert_eq!(gap.before_name, "a");
    }

    #[test]
    fn test_fewer_than_two_events_is_no_gap() {
        assert_eq!(find_largest_gap(&[], ts(8, 0), ts(12, 0)), None);
        let one = vec![event("a", ts(9, 0), ts(10, 0))];
        assert_eq!(find_largest_gap(&one, ts(8, 0), ts(12, 0)), None);
    }
}
