//! Core data structures for rota
//!
//! Teams own rosters and schedules; schedules carry weekly templates that the
//! scheduler expands into concrete [`Event`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::strategy::SelectionStrategy;

pub type TeamId = i64;
pub type RoleId = i64;
pub type UserId = i64;
pub type RosterId = i64;
pub type ScheduleId = i64;
pub type EventId = i64;

/// A team and the civil timezone its schedules are expressed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// IANA identifier, e.g. "US/Pacific"
    pub scheduling_timezone: String,
    pub active: bool,
}

/// On-call role such as "primary" or "secondary"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub full_name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub id: RosterId,
    pub team_id: TeamId,
    pub name: String,
}

/// Membership of a user in a roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub roster_id: RosterId,
    pub user_id: UserId,
    pub in_rotation: bool,
    /// Lower values come first in round-robin order
    pub roster_priority: i64,
    /// Whether the underlying user account is active
    pub active: bool,
}

impl RosterMember {
    /// Whether this member may be picked by the scheduler
    pub fn is_candidate(&self) -> bool {
        self.in_rotation && self.active
    }
}

/// A team following another team's role on its own calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSubscription {
    pub team_id: TeamId,
    pub subscription_team_id: TeamId,
    pub role_id: RoleId,
}

/// One template entry of a schedule, relative to the start of a civil week
/// (Sunday 00:00 in the team's timezone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    /// Seconds from Sunday 00:00
    pub start: i64,
    pub duration: i64,
}

impl ScheduleEvent {
    pub fn new(start: i64, duration: i64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// A recurring schedule feeding one role of one team from one roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub team_id: TeamId,
    pub roster_id: RosterId,
    pub role_id: RoleId,

    /// Days into the future to materialize
    pub auto_populate_threshold: i64,

    /// Presentation hint only
    pub advanced_mode: bool,

    pub strategy: SelectionStrategy,

    /// Explicit round-robin order; members not listed follow by roster priority
    #[serde(default)]
    pub order: Vec<UserId>,

    pub events: Vec<ScheduleEvent>,

    /// Most recent period boundary already materialized
    pub last_epoch_scheduled: Option<DateTime<Utc>>,

    /// Round-robin pointer
    pub last_scheduled_user_id: Option<UserId>,
}

/// Insert form of [`Schedule`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub team_id: TeamId,
    pub roster_id: RosterId,
    pub role_id: RoleId,
    pub auto_populate_threshold: i64,
    pub advanced_mode: bool,
    pub strategy: SelectionStrategy,
    #[serde(default)]
    pub order: Vec<UserId>,
    pub events: Vec<ScheduleEvent>,
}

/// A concrete, timezone-resolved `[start, end)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Occurrence {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Half-open overlap test
    pub fn overlaps(&self, other: &Occurrence) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// A persisted shift assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub team_id: TeamId,
    pub role_id: RoleId,
    pub user_id: UserId,
    /// `None` for manually created events
    pub schedule_id: Option<ScheduleId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub link_id: Option<String>,
    pub note: Option<String>,
}

impl Event {
    pub fn occurrence(&self) -> Occurrence {
        Occurrence::new(self.start, self.end)
    }
}

/// Insert form of [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub team_id: TeamId,
    pub role_id: RoleId,
    pub user_id: UserId,
    pub schedule_id: Option<ScheduleId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub link_id: Option<String>,
    pub note: Option<String>,
}

impl NewEvent {
    /// Manual (schedule-less, unlinked) event
    pub fn manual(
        team_id: TeamId,
        role_id: RoleId,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id,
            role_id,
            user_id,
            schedule_id: None,
            start,
            end,
            link_id: None,
            note: None,
        }
    }

    pub fn with_link(mut self, link_id: impl Into<String>) -> Self {
        self.link_id = Some(link_id.into());
        self
    }

    pub fn with_schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }
}

/// Fresh identifier grouping events that form one logical shift
pub fn gen_link_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
