//! Exchanging the assignees of two event groups
//!
//! A swap side is either a single event or a whole linked shift. Every
//! event of side A goes to B's user and vice versa; a single event pulled
//! out of a linked shift loses its link.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::overrides::EditPolicy;
use crate::error::Result;
use crate::models::{Event, EventId, UserId};
use crate::notifications::{ChangeKind, ScheduleChange};
use crate::storage::{EventFilter, Gateway};

/// One side of a swap
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum SwapTarget {
    Event(EventId),
    Link(String),
}

impl SwapTarget {
    /// Human-readable reference used in errors
    pub fn reference(&self) -> String {
        match self {
            Self::Event(id) => format!("event {}", id),
            Self::Link(link) => format!("link {}", link),
        }
    }

    fn is_single(&self) -> bool {
        matches!(self, Self::Event(_))
    }
}

impl fmt::Display for SwapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

fn resolve(gw: &dyn Gateway, target: &SwapTarget) -> Result<Vec<Event>> {
    let events = match target {
        SwapTarget::Event(id) => gw.events_by_id(&[*id])?,
        SwapTarget::Link(link) => gw.events(&EventFilter::new().link(link.as_str()))?,
    };
    if events.is_empty() {
        return Err(SchedulerError::SwapGroupNotFound {
            reference: target.reference(),
        }
        .into());
    }
    Ok(events)
}

fn single_user(events: &[Event]) -> Result<UserId> {
    let user_id = events[0].user_id;
    if events.iter().any(|e| e.user_id != user_id) {
        return Err(SchedulerError::MixedUsers.into());
    }
    Ok(user_id)
}

/// Swap the assignees of `a` and `b`
///
/// Both sides must belong to the same team and each side must be held by a
/// single user. Returns the change fact to publish after commit.
pub fn swap(
    gw: &dyn Gateway,
    a: &SwapTarget,
    b: &SwapTarget,
    policy: &EditPolicy,
) -> Result<Vec<ScheduleChange>> {
    let events_a = resolve(gw, a)?;
    let events_b = resolve(gw, b)?;

    for event in events_a.iter().chain(&events_b) {
        policy.check(event.start)?;
    }

    let team_id = events_a[0].team_id;
    if events_a.iter().chain(&events_b).any(|e| e.team_id != team_id) {
        return Err(SchedulerError::MixedTeams.into());
    }

    let user_a = single_user(&events_a)?;
    let user_b = single_user(&events_b)?;

    let ids_a: Vec<EventId> = events_a.iter().map(|e| e.id).collect();
    let ids_b: Vec<EventId> = events_b.iter().map(|e| e.id).collect();
    gw.reassign_events(&ids_a, user_b, a.is_single())?;
    gw.reassign_events(&ids_b, user_a, b.is_single())?;

    tracing::info!(team_id, %a, %b, user_a, user_b, "Swapped events");

    let all: Vec<Event> = events_a.into_iter().chain(events_b).collect();
    Ok(ScheduleChange::from_events(ChangeKind::EventSwapped, &all, &[])
        .into_iter()
        .collect())
}
