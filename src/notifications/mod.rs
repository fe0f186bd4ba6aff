//! Change facts for notification and audit consumers
//!
//! Scheduling operations describe what they changed as [`ScheduleChange`]
//! values. Facts are published to a [`ChangeSink`] only after the
//! transaction that produced them committed; formatting and delivery belong
//! to whoever consumes the sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use rota::notifications::{ChangeSink, MemorySink};
//!
//! let sink = MemorySink::new();
//! // ... run an override with a context holding `sink` ...
//! for change in sink.changes() {
//!     println!("{} on team {}", change.kind, change.team_id);
//! }
//! ```

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, RoleId, TeamId, UserId};

/// What happened to the calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    EventCreated,
    EventEdited,
    EventDeleted,
    EventSubstituted,
    EventSwapped,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventCreated => "event_created",
            Self::EventEdited => "event_edited",
            Self::EventDeleted => "event_deleted",
            Self::EventSubstituted => "event_substituted",
            Self::EventSwapped => "event_swapped",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One committed calendar change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleChange {
    pub kind: ChangeKind,
    pub team_id: TeamId,
    /// Affected roles, sorted and deduplicated
    pub role_ids: Vec<RoleId>,
    /// Affected users, sorted and deduplicated
    pub user_ids: Vec<UserId>,
    /// Earliest affected instant
    pub start: DateTime<Utc>,
    /// Latest affected instant
    pub end: DateTime<Utc>,
}

impl ScheduleChange {
    /// Fact covering every event in `events`
    ///
    /// `extra_users` are added to the affected users (e.g. the previous
    /// assignee of a reassigned event). Returns `None` for an empty slice.
    pub fn from_events(
        kind: ChangeKind,
        events: &[Event],
        extra_users: &[UserId],
    ) -> Option<Self> {
        let first = events.first()?;
        let mut role_ids: Vec<RoleId> = events.iter().map(|e| e.role_id).collect();
        let mut user_ids: Vec<UserId> = events
            .iter()
            .map(|e| e.user_id)
            .chain(extra_users.iter().copied())
            .collect();
        role_ids.sort_unstable();
        role_ids.dedup();
        user_ids.sort_unstable();
        user_ids.dedup();

        Some(Self {
            kind,
            team_id: first.team_id,
            role_ids,
            user_ids,
            start: events.iter().map(|e| e.start).min().unwrap_or(first.start),
            end: events.iter().map(|e| e.end).max().unwrap_or(first.end),
        })
    }
}

/// Receiver of committed change facts
pub trait ChangeSink: Send + Sync {
    fn publish(&self, change: &ScheduleChange);

    fn publish_all(&self, changes: &[ScheduleChange]) {
        for change in changes {
            self.publish(change);
        }
    }
}

/// Writes every change as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ChangeSink for TracingSink {
    fn publish(&self, change: &ScheduleChange) {
        tracing::info!(
            kind = %change.kind,
            team_id = change.team_id,
            role_ids = ?change.role_ids,
            user_ids = ?change.user_ids,
            start = %change.start.to_rfc3339(),
            end = %change.end.to_rfc3339(),
            "Schedule changed"
        );
    }
}

/// Collects changes in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    changes: Mutex<Vec<ScheduleChange>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far
    pub fn changes(&self) -> Vec<ScheduleChange> {
        self.changes
            .lock()
            .map(|changes| changes.clone())
            .unwrap_or_default()
    }

    /// Drain everything published so far
    pub fn take(&self) -> Vec<ScheduleChange> {
        self.changes
            .lock()
            .map(|mut changes| std::mem::take(&mut *changes))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.changes.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeSink for MemorySink {
    fn publish(&self, change: &ScheduleChange) {
        if let Ok(mut changes) = self.changes.lock() {
            changes.push(change.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event(id: i64, role_id: RoleId, user_id: UserId, hours: (i64, i64)) -> Event {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Event {
            id,
            team_id: 7,
            role_id,
            user_id,
            schedule_id: None,
            start: base + Duration::hours(hours.0),
            end: base + Duration::hours(hours.1),
            link_id: None,
            note: None,
        }
    }

    #[test]
    fn test_change_from_events_spans_all() {
        let events = vec![event(1, 2, 10, (4, 8)), event(2, 1, 10, (0, 4))];
        let change = ScheduleChange::from_events(ChangeKind::EventEdited, &events, &[3]).unwrap();

        assert_eq!(change.team_id, 7);
        assert_eq!(change.role_ids, vec![1, 2]);
        assert_eq!(change.user_ids, vec![3, 10]);
        assert_eq!(change.end - change.start, Duration::hours(8));
    }

    #[test]
    fn test_change_from_no_events() {
        assert!(ScheduleChange::from_events(ChangeKind::EventDeleted, &[], &[]).is_none());
    }

    #[test]
    fn test_memory_sink_collects_and_drains() {
        let sink = MemorySink::new();
        let change =
            ScheduleChange::from_events(ChangeKind::EventCreated, &[event(1, 1, 1, (0, 1))], &[])
                .unwrap();
        sink.publish_all(&[change.clone(), change]);

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ChangeKind::EventSwapped.to_string(), "event_swapped");
    }
}
