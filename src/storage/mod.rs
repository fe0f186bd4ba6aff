//! Persistence gateway
//!
//! The scheduler never talks to a database directly. Every operation runs
//! inside a [`Store`] transaction and receives a [`Gateway`] for the
//! queries and batched mutations it needs.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   scheduler (cycle, populate, override, swap) │
//! └──────────────────────────────────────────────┘
//!                        │ &dyn Gateway
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │        Store::execute (commit / rollback)     │
//! └──────────────────────────────────────────────┘
//!              │                       │
//!              ▼                       ▼
//!    ┌─────────────────┐     ┌─────────────────┐
//!    │   SqliteStore   │     │   MemoryStore   │
//!    └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use rota::storage::{SqliteStore, StoreExt};
//!
//! let store = SqliteStore::open("rota.db")?;
//! let teams = store.transaction(|gw| gw.active_teams())?;
//! ```

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{
    Event, EventId, NewEvent, NewSchedule, Occurrence, Role, RoleId, Roster, RosterId,
    RosterMember, Schedule, ScheduleId, Team, TeamId, TeamSubscription, User, UserId,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A team, optionally narrowed to one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamScope {
    pub team_id: TeamId,
    pub role_id: Option<RoleId>,
}

impl TeamScope {
    pub fn team(team_id: TeamId) -> Self {
        Self {
            team_id,
            role_id: None,
        }
    }

    pub fn role(team_id: TeamId, role_id: RoleId) -> Self {
        Self {
            team_id,
            role_id: Some(role_id),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        self.team_id == event.team_id && self.role_id.map_or(true, |r| r == event.role_id)
    }
}

/// Event query
///
/// Empty lists and `None` bounds do not restrict the result. Non-empty lists
/// match if any element matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub scopes: Vec<TeamScope>,
    pub user_ids: Vec<UserId>,
    /// Event must overlap at least one of these ranges
    pub overlapping: Vec<Occurrence>,
    pub schedule_id: Option<ScheduleId>,
    pub link_id: Option<String>,
    pub starts_at_or_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub starts_at_or_before: Option<DateTime<Utc>>,
    pub ends_at_or_before: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: TeamScope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_ids.push(user_id);
        self
    }

    pub fn users(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.user_ids.extend(user_ids);
        self
    }

    pub fn overlapping(mut self, ranges: impl IntoIterator<Item = Occurrence>) -> Self {
        self.overlapping.extend(ranges);
        self
    }

    pub fn schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    pub fn link(mut self, link_id: impl Into<String>) -> Self {
        self.link_id = Some(link_id.into());
        self
    }

    pub fn starts_at_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.starts_at_or_after = Some(instant);
        self
    }

    pub fn starts_before(mut self, instant: DateTime<Utc>) -> Self {
        self.starts_before = Some(instant);
        self
    }

    pub fn starts_at_or_before(mut self, instant: DateTime<Utc>) -> Self {
        self.starts_at_or_before = Some(instant);
        self
    }

    pub fn ends_at_or_before(mut self, instant: DateTime<Utc>) -> Self {
        self.ends_at_or_before = Some(instant);
        self
    }

    /// In-process evaluation, used by [`MemoryStore`]
    pub fn matches(&self, event: &Event) -> bool {
        (self.scopes.is_empty() || self.scopes.iter().any(|s| s.matches(event)))
            && (self.user_ids.is_empty() || self.user_ids.contains(&event.user_id))
            && (self.overlapping.is_empty()
                || self
                    .overlapping
                    .iter()
                    .any(|o| o.overlaps(&event.occurrence())))
            && self.schedule_id.map_or(true, |id| event.schedule_id == Some(id))
            && self
                .link_id
                .as_deref()
                .map_or(true, |link| event.link_id.as_deref() == Some(link))
            && self.starts_at_or_after.map_or(true, |t| event.start >= t)
            && self.starts_before.map_or(true, |t| event.start < t)
            && self.starts_at_or_before.map_or(true, |t| event.start <= t)
            && self.ends_at_or_before.map_or(true, |t| event.end <= t)
    }
}

/// Queries and mutations available inside a transaction
///
/// All event-list mutations take id slices and apply as one set operation.
pub trait Gateway {
    // Teams, roles, users

    fn insert_team(&self, name: &str, scheduling_timezone: &str) -> Result<Team>;

    fn team(&self, id: TeamId) -> Result<Option<Team>>;

    /// Active teams ordered by id
    fn active_teams(&self) -> Result<Vec<Team>>;

    fn set_team_active(&self, id: TeamId, active: bool) -> Result<()>;

    fn insert_role(&self, name: &str) -> Result<Role>;

    fn insert_user(&self, name: &str, full_name: Option<&str>) -> Result<User>;

    fn user(&self, id: UserId) -> Result<Option<User>>;

    fn set_user_active(&self, id: UserId, active: bool) -> Result<()>;

    // Rosters

    fn insert_roster(&self, team_id: TeamId, name: &str) -> Result<Roster>;

    fn add_roster_member(
        &self,
        roster_id: RosterId,
        user_id: UserId,
        in_rotation: bool,
        roster_priority: i64,
    ) -> Result<()>;

    /// Members ordered by `(roster_priority, user_id)`, with the user's
    /// active flag joined in
    fn roster_members(&self, roster_id: RosterId) -> Result<Vec<RosterMember>>;

    /// Whether the user is on any roster of the team
    fn user_in_team(&self, user_id: UserId, team_id: TeamId) -> Result<bool>;

    // Subscriptions

    fn insert_subscription(&self, subscription: TeamSubscription) -> Result<()>;

    fn subscriptions(&self, team_id: TeamId) -> Result<Vec<TeamSubscription>>;

    // Schedules

    fn insert_schedule(&self, schedule: &NewSchedule) -> Result<Schedule>;

    fn schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;

    /// Schedules of a team ordered by id
    fn team_schedules(&self, team_id: TeamId) -> Result<Vec<Schedule>>;

    fn set_last_epoch(&self, schedule_id: ScheduleId, watermark: DateTime<Utc>) -> Result<()>;

    fn set_last_scheduled_user(
        &self,
        schedule_id: ScheduleId,
        user_id: Option<UserId>,
    ) -> Result<()>;

    // Events

    /// Matching events ordered by `(start, id)`
    fn events(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Existing events among `ids`, ordered by `(start, id)`
    fn events_by_id(&self, ids: &[EventId]) -> Result<Vec<Event>>;

    /// Number of `occurrences` with at least one event of the team and role
    /// at exactly that `(start, end)`
    fn count_matching_events(
        &self,
        team_id: TeamId,
        role_id: RoleId,
        occurrences: &[Occurrence],
    ) -> Result<usize>;

    /// Insert all events, returning their ids in input order
    fn insert_events(&self, events: &[NewEvent]) -> Result<Vec<EventId>>;

    fn delete_events(&self, ids: &[EventId]) -> Result<usize>;

    fn set_event_start(&self, ids: &[EventId], start: DateTime<Utc>) -> Result<()>;

    fn set_event_end(&self, ids: &[EventId], end: DateTime<Utc>) -> Result<()>;

    /// Assign events to `user_id`, optionally detaching them from their link
    fn reassign_events(&self, ids: &[EventId], user_id: UserId, clear_link: bool) -> Result<()>;
}

/// Whether a unit of work keeps its changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Commit when the work returns `Ok`, roll back on `Err`
    Commit,
    /// Always roll back
    Rollback,
}

/// Transactional access to a [`Gateway`]
///
/// Object safe so callers can hold an `Arc<dyn Store>`; the typed entry
/// points live on [`StoreExt`].
pub trait Store: Send + Sync {
    fn execute(
        &self,
        mode: TxMode,
        work: &mut dyn FnMut(&dyn Gateway) -> Result<()>,
    ) -> Result<()>;
}

pub trait StoreExt: Store {
    /// Run `f` in one transaction, committing on `Ok`
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Gateway) -> Result<T>,
    {
        run(self, TxMode::Commit, f)
    }

    /// Run `f` and discard every change it made
    fn dry_run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Gateway) -> Result<T>,
    {
        run(self, TxMode::Rollback, f)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

fn run<S, T, F>(store: &S, mode: TxMode, f: F) -> Result<T>
where
    S: Store + ?Sized,
    F: FnOnce(&dyn Gateway) -> Result<T>,
{
    let mut f = Some(f);
    let mut output = None;
    store.execute(mode, &mut |gw| {
        let f = f
            .take()
            .ok_or_else(|| Error::other("transaction body invoked twice"))?;
        output = Some(f(gw)?);
        Ok(())
    })?;
    output.ok_or_else(|| Error::other("transaction body was not invoked"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Every backend, so repository tests run against each of them
    pub fn create_test_stores() -> Vec<(&'static str, Box<dyn Store>)> {
        vec![
            ("sqlite", Box::new(SqliteStore::in_memory().unwrap())),
            ("memory", Box::new(MemoryStore::new())),
        ]
    }
}
