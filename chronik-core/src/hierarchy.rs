//! Timeline reconstruction: nest events under their parents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// One node of a reconstructed timeline tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineNode {
    pub event: Event,
    pub children: Vec<TimelineNode>,
}

impl TimelineNode {
    /// Total number of events in this subtree, the root included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TimelineNode::size).sum::<usize>()
    }
}

/// Build the timeline subtree rooted at `root_id` from the full event set.
///
/// Returns `None` when the root id is not present. Children are ordered by
/// start date at every level. Recursion depth is bounded because events
/// form a forest (a parent must exist before any of its children is
/// inserted, so no cycle can be constructed).
pub fn build_timeline(root_id: Uuid, events: &[Event]) -> Option<TimelineNode> {
    let root = events.iter().find(|e| e.event_id == root_id)?;

    let mut children_map: HashMap<Uuid, Vec<&Event>> = HashMap::new();
    for event in events {
        if let Some(parent_id) = event.parent_event_id {
            children_map.entry(parent_id).or_default().push(event);
        }
    }
    for children in children_map.values_mut() {
        children.sort_by_key(|e| e.start_date);
    }

    Some(build_node(root, &children_map))
}

fn build_node(event: &Event, children_map: &HashMap<Uuid, Vec<&Event>>) -> TimelineNode {
    let children = children_map
        .get(&event.event_id)
        .map(|kids| kids.iter().map(|c| build_node(c, children_map)).collect())
        .unwrap_or_default();

    TimelineNode {
        event: event.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_tree_shape_and_child_order() {
        let root = Uuid::new_v4();
        let late = Uuid::new_v4();
        let early = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let events = vec![
            Event::new(root, "root", ts(8, 0), ts(18, 0)),
            Event::new(late, "late", ts(14, 0), ts(15, 0)).with_parent(root),
            Event::new(early, "early", ts(9, 0), ts(10, 0)).with_parent(root),
            Event::new(grandchild, "grandchild", ts(9, 15), ts(9, 45)).with_parent(early),
        ];

        let tree = build_timeline(root, &events).unwrap();
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children.len(), 2);
        // Children ordered by start date, not by input order.
        assert_eq!(tree.children[0].event.event_name, "early");
        assert_eq!(tree.children[1].event.event_name, "late");
        assert_eq!(tree.children[0].children[0].event.event_name, "grandchild");
    }

    #[test]
    fn test_subtree_root() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let events = vec![
            Event::new(root, "root", ts(8, 0), ts(18, 0)),
            Event::new(child, "child", ts(9, 0), ts(12, 0)).with_parent(root),
            Event::new(grandchild, "grandchild", ts(10, 0), ts(11, 0)).with_parent(child),
        ];

        let tree = build_timeline(child, &events).unwrap();
        assert_eq!(tree.event.event_name, "child");
        assert_eq!(tree.size(), 2);
    }

    #[test]
    fn test_unknown_root() {
        let events = vec![Event::new(Uuid::new_v4(), "a", ts(8, 0), ts(9, 0))];
        assert_eq!(build_timeline(Uuid::new_v4(), &events), None);
    }

    #[test]
    fn test_leaf_root_has_no_children() {
        let id = Uuid::new_v4();
        let events = vec![Event::new(id, "leaf", ts(8, 0), ts(9, 0))];
        let tree = build_timeline(id, &events).unwrap();
        assert!(tree.children.is_empty());
    }
}
