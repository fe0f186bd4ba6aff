//! Assignee selection strategies
//!
//! A strategy is chosen per schedule and is asked once per occurrence batch.
//! Every linked occurrence of a batch receives the same assignee.
//!
//! | Strategy           | Busy check                  | Skip-matching |
//! |--------------------|-----------------------------|---------------|
//! | `default`          | team + role, subscriptions  | yes           |
//! | `round-robin`      | none                        | no            |
//! | `multi-team`       | any team, any role          | no            |
//! | `no-skip-matching` | team + role, subscriptions  | no            |

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use crate::error::Result;
use crate::models::{Occurrence, Schedule, UserId};
use crate::storage::{EventFilter, Gateway, TeamScope};

/// Assignee selection policy of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Least recently active available member, new members first
    #[default]
    Default,
    /// Fixed rotation order
    RoundRobin,
    /// Default, treating events on any team as conflicts
    MultiTeam,
    /// Default, always materializing
    NoSkipMatching,
}

/// Where existing events make a candidate unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusyScope {
    TeamRole,
    AnyTeam,
}

impl SelectionStrategy {
    pub const ALL: [SelectionStrategy; 4] = [
        Self::Default,
        Self::RoundRobin,
        Self::MultiTeam,
        Self::NoSkipMatching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::RoundRobin => "round-robin",
            Self::MultiTeam => "multi-team",
            Self::NoSkipMatching => "no-skip-matching",
        }
    }

    /// Every configurable strategy name
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Self::as_str).collect()
    }

    /// Whether a batch identical to existing events is left alone
    pub fn skip_matching(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// Pick the assignee for one occurrence batch
    ///
    /// `None` means nobody is eligible; the batch is skipped.
    pub fn select_assignee(
        &self,
        gw: &dyn Gateway,
        schedule: &Schedule,
        batch: &[Occurrence],
    ) -> Result<Option<UserId>> {
        if batch.is_empty() {
            return Ok(None);
        }
        match self {
            Self::Default | Self::NoSkipMatching => {
                least_recently_active(gw, schedule, batch, BusyScope::TeamRole)
            }
            Self::MultiTeam => least_recently_active(gw, schedule, batch, BusyScope::AnyTeam),
            Self::RoundRobin => next_in_rotation(gw, schedule, batch),
        }
    }

    /// Bookkeeping after `user_id` was assigned a batch of `schedule`
    pub fn record_assignment(
        &self,
        gw: &dyn Gateway,
        schedule: &mut Schedule,
        user_id: UserId,
    ) -> Result<()> {
        if *self == Self::RoundRobin {
            gw.set_last_scheduled_user(schedule.id, Some(user_id))?;
            schedule.last_scheduled_user_id = Some(user_id);
        }
        Ok(())
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| SchedulerError::unknown_strategy(s))
    }
}

fn batch_start(batch: &[Occurrence]) -> Option<DateTime<Utc>> {
    batch.iter().map(|o| o.start).min()
}

/// In-rotation, active roster members ordered by `(roster_priority, user_id)`
fn rotation_candidates(gw: &dyn Gateway, schedule: &Schedule) -> Result<Vec<UserId>> {
    Ok(gw
        .roster_members(schedule.roster_id)?
        .into_iter()
        .filter(|m| m.is_candidate())
        .map(|m| m.user_id)
        .collect())
}

fn busy_users(
    gw: &dyn Gateway,
    schedule: &Schedule,
    candidates: &[UserId],
    batch: &[Occurrence],
    scope: BusyScope,
) -> Result<HashSet<UserId>> {
    let mut filter = EventFilter::new()
        .users(candidates.iter().copied())
        .overlapping(batch.iter().copied());

    if scope == BusyScope::TeamRole {
        filter = filter.scope(TeamScope::role(schedule.team_id, schedule.role_id));
        for sub in gw.subscriptions(schedule.team_id)? {
            filter = filter.scope(TeamScope::role(sub.subscription_team_id, sub.role_id));
        }
    }

    Ok(gw.events(&filter)?.into_iter().map(|e| e.user_id).collect())
}

fn least_recently_active(
    gw: &dyn Gateway,
    schedule: &Schedule,
    batch: &[Occurrence],
    scope: BusyScope,
) -> Result<Option<UserId>> {
    let candidates = rotation_candidates(gw, schedule)?;
    if candidates.is_empty() {
        tracing::info!(schedule_id = schedule.id, "Empty roster, skipping");
        return Ok(None);
    }

    let busy = busy_users(gw, schedule, &candidates, batch, scope)?;
    let available: Vec<UserId> = candidates
        .into_iter()
        .filter(|u| !busy.contains(u))
        .collect();
    if available.is_empty() {
        tracing::info!(
            schedule_id = schedule.id,
            busy = busy.len(),
            "All users have conflicting events, skipping"
        );
        return Ok(None);
    }

    let Some(start) = batch_start(batch) else {
        return Ok(None);
    };

    // Only this team and role count as history; shifts elsewhere are ignored
    let history = gw.events(
        &EventFilter::new()
            .scope(TeamScope::role(schedule.team_id, schedule.role_id))
            .users(available.iter().copied())
            .ends_at_or_before(start),
    )?;
    let mut last_end: HashMap<UserId, DateTime<Utc>> = HashMap::new();
    for event in history {
        let entry = last_end.entry(event.user_id).or_insert(event.end);
        if event.end > *entry {
            *entry = event.end;
        }
    }

    if let Some(&new_user) = available.iter().filter(|u| !last_end.contains_key(*u)).min() {
        tracing::debug!(schedule_id = schedule.id, user_id = new_user, "Picking new member");
        return Ok(Some(new_user));
    }

    Ok(last_end
        .into_iter()
        .min_by_key(|&(user_id, end)| (end, user_id))
        .map(|(user_id, _)| user_id))
}

/// Rotation sequence: the schedule's explicit order first, then everyone
/// else by roster priority
fn rotation_order(explicit: &[UserId], candidates: &[UserId]) -> Vec<UserId> {
    let mut order: Vec<UserId> = Vec::with_capacity(candidates.len());
    for user_id in explicit {
        if candidates.contains(user_id) && !order.contains(user_id) {
            order.push(*user_id);
        }
    }
    for user_id in candidates {
        if !order.contains(user_id) {
            order.push(*user_id);
        }
    }
    order
}

/// Rotation member whose shift for this team and role started most recently
/// at or before `start`
///
/// A shift still running at `start` counts, so its holder is not picked again.
fn guess_last_scheduled_user(
    gw: &dyn Gateway,
    schedule: &Schedule,
    rotation: &[UserId],
    start: DateTime<Utc>,
) -> Result<Option<UserId>> {
    let history = gw.events(
        &EventFilter::new()
            .scope(TeamScope::role(schedule.team_id, schedule.role_id))
            .users(rotation.iter().copied())
            .starts_at_or_before(start),
    )?;
    Ok(history
        .into_iter()
        .max_by_key(|e| (e.start, e.id))
        .map(|e| e.user_id))
}

fn next_in_rotation(
    gw: &dyn Gateway,
    schedule: &Schedule,
    batch: &[Occurrence],
) -> Result<Option<UserId>> {
    let candidates = rotation_candidates(gw, schedule)?;
    if candidates.is_empty() {
        tracing::info!(schedule_id = schedule.id, "Empty roster, skipping");
        return Ok(None);
    }
    let rotation = rotation_order(&schedule.order, &candidates);

    let pointer = schedule
        .last_scheduled_user_id
        .filter(|user_id| rotation.contains(user_id));
    let last = match pointer {
        Some(user_id) => Some(user_id),
        None => match batch_start(batch) {
            Some(start) => guess_last_scheduled_user(gw, schedule, &rotation, start)?,
            None => None,
        },
    };

    let next = match last.and_then(|user_id| rotation.iter().position(|u| *u == user_id)) {
        Some(index) => rotation[(index + 1) % rotation.len()],
        None => rotation[0],
    };
    Ok(Some(next))
}
