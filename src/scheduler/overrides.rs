//! Substituting a user into existing events
//!
//! An override takes a run of back-to-back events held by one user and
//! hands `[start, end)` of it to a substitute. Each affected event is
//! classified against the (clamped) range:
//!
//! ```text
//!   range:            [=========)
//!   delete:           [---)  [--)          fully covered
//!   edit end:      [-----)                 starts before, ends inside
//!   edit start:                [-----)     starts inside, ends after
//!   split:       [---------------------)   range strictly inside
//! ```
//!
//! Edits are applied as set operations, then the substitute event is
//! inserted.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};
use crate::error::{Error, Result};
use crate::models::{Event, EventId, NewEvent, UserId};
use crate::notifications::{ChangeKind, ScheduleChange};
use crate::storage::Gateway;

/// Who may edit how far into the past
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPolicy {
    pub now: DateTime<Utc>,
    pub grace_period: Duration,
    /// Privileged requests ignore the grace period
    pub privileged: bool,
}

impl EditPolicy {
    pub fn new(now: DateTime<Utc>, grace_period: Duration) -> Self {
        Self {
            now,
            grace_period,
            privileged: false,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Reject edits starting before `now - grace_period`
    pub fn check(&self, start: DateTime<Utc>) -> SchedulerResult<()> {
        if !self.privileged && start < self.now - self.grace_period {
            return Err(SchedulerError::EditInPast { start });
        }
        Ok(())
    }
}

/// Substitution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub event_ids: Vec<EventId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The substitute
    pub user_id: UserId,
}

/// Events after an override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideOutcome {
    /// Surviving original events, split remainders and the substitute
    /// event, ordered by start
    pub events: Vec<Event>,
    pub substitute: Event,
    pub changes: Vec<ScheduleChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Delete,
    EditEnd,
    EditStart,
    Split,
}

fn classify(start: DateTime<Utc>, end: DateTime<Utc>, event: &Event) -> SchedulerResult<Edit> {
    if start <= event.start && end >= event.end {
        Ok(Edit::Delete)
    } else if start > event.start && start < event.end && event.end <= end {
        Ok(Edit::EditEnd)
    } else if start <= event.start && event.start < end && end < event.end {
        Ok(Edit::EditStart)
    } else if start > event.start && end < event.end {
        Ok(Edit::Split)
    } else {
        Err(SchedulerError::NoOverlap { event_id: event.id })
    }
}

fn check_uniform(events: &[Event]) -> SchedulerResult<()> {
    let first = &events[0];
    if events.iter().any(|e| e.team_id != first.team_id) {
        return Err(SchedulerError::MixedTeams);
    }
    if events.iter().any(|e| e.role_id != first.role_id) {
        return Err(SchedulerError::MixedRoles);
    }
    if events.iter().any(|e| e.user_id != first.user_id) {
        return Err(SchedulerError::MixedUsers);
    }
    Ok(())
}

/// Hand part of a run of events to another user
pub fn override_events(
    gw: &dyn Gateway,
    request: &OverrideRequest,
    policy: &EditPolicy,
) -> Result<OverrideOutcome> {
    // Stored instants have whole-second precision
    let request_start = request.start.trunc_subsecs(0);
    let request_end = request.end.trunc_subsecs(0);
    if request_start >= request_end {
        return Err(SchedulerError::InvalidRange {
            start: request.start,
            end: request.end,
        }
        .into());
    }

    let mut ids = request.event_ids.clone();
    ids.sort_unstable();
    ids.dedup();

    let events = gw.events_by_id(&ids)?;
    if events.is_empty() || events.len() != ids.len() {
        let missing = ids
            .iter()
            .filter(|id| !events.iter().any(|e| e.id == **id))
            .copied()
            .collect();
        return Err(SchedulerError::EventsNotFound { ids: missing }.into());
    }

    policy.check(request_start)?;
    check_uniform(&events)?;

    let first = &events[0];
    let (team_id, role_id, original_user) = (first.team_id, first.role_id, first.user_id);
    if !gw.user_in_team(request.user_id, team_id)? {
        return Err(SchedulerError::SubstituteNotInTeam {
            user_id: request.user_id,
            team_id,
        }
        .into());
    }

    for pair in events.windows(2) {
        if pair[1].start != pair[0].end {
            return Err(SchedulerError::non_consecutive(pair[0].end, pair[1].start).into());
        }
    }

    let start = request_start.max(first.start);
    let end = events
        .iter()
        .map(|e| e.end)
        .max()
        .map_or(request_end, |last| request_end.min(last));

    let mut delete: Vec<EventId> = Vec::new();
    let mut edit_end: Vec<EventId> = Vec::new();
    let mut edit_start: Vec<EventId> = Vec::new();
    let mut remainders: Vec<NewEvent> = Vec::new();
    for event in &events {
        match classify(start, end, event)? {
            Edit::Delete => delete.push(event.id),
            Edit::EditEnd => edit_end.push(event.id),
            Edit::EditStart => edit_start.push(event.id),
            Edit::Split => {
                delete.push(event.id);
                remainders.push(NewEvent::manual(
                    team_id,
                    role_id,
                    original_user,
                    event.start,
                    start,
                ));
                remainders.push(NewEvent::manual(team_id, role_id, original_user, end, event.end));
            }
        }
    }

    gw.set_event_start(&edit_start, end)?;
    gw.set_event_end(&edit_end, start)?;
    gw.delete_events(&delete)?;

    let substitute = NewEvent::manual(team_id, role_id, request.user_id, start, end);
    let mut inserts = remainders;
    inserts.push(substitute);
    let inserted = gw.insert_events(&inserts)?;
    let substitute_id = inserted
        .last()
        .copied()
        .ok_or_else(|| Error::other("substitute event was not inserted"))?;

    let edited_ids: Vec<EventId> = edit_start.into_iter().chain(edit_end).collect();
    let mut result_ids = edited_ids.clone();
    result_ids.extend(inserted);
    let result = gw.events_by_id(&result_ids)?;
    let substitute = result
        .iter()
        .find(|e| e.id == substitute_id)
        .cloned()
        .ok_or_else(|| Error::other("substitute event vanished"))?;

    tracing::info!(
        team_id,
        role_id,
        from_user = original_user,
        to_user = request.user_id,
        deleted = delete.len(),
        "Override applied"
    );

    let edited: Vec<Event> = result
        .iter()
        .filter(|e| edited_ids.contains(&e.id))
        .cloned()
        .collect();
    let changes = ScheduleChange::from_events(
        ChangeKind::EventSubstituted,
        std::slice::from_ref(&substitute),
        &[original_user],
    )
    .into_iter()
    .chain(ScheduleChange::from_events(ChangeKind::EventEdited, &edited, &[]))
    .collect();

    Ok(OverrideOutcome {
        events: result,
        substitute,
        changes,
    })
}
