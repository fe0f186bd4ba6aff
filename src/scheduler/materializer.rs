//! Persisting occurrence batches as events
//!
//! Also hosts the manual populate entry point, which rebuilds a schedule's
//! calendar from an arbitrary future instant.

use chrono::{DateTime, Utc};

use super::error::SchedulerError;
use super::generator::OccurrenceGenerator;
use super::strategy::SelectionStrategy;
use crate::error::Result;
use crate::models::{
    gen_link_id, Event, EventId, NewEvent, Occurrence, Schedule, ScheduleId, UserId,
};
use crate::notifications::{ChangeKind, ScheduleChange};
use crate::storage::{EventFilter, Gateway, TeamScope};

/// Result of materializing one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// New events were inserted
    Created(Vec<Event>),
    /// Identical events already exist; nothing was written
    Matched,
}

impl Materialized {
    pub fn events(&self) -> &[Event] {
        match self {
            Self::Created(events) => events,
            Self::Matched => &[],
        }
    }
}

/// Insert events for one batch assigned to `user_id`
///
/// With `skip_matching`, a batch whose every occurrence already exists for
/// the schedule's team and role is left alone. Batches with more than one
/// occurrence share a fresh link id.
pub fn materialize(
    gw: &dyn Gateway,
    schedule: &Schedule,
    user_id: UserId,
    batch: &[Occurrence],
    skip_matching: bool,
) -> Result<Materialized> {
    if batch.is_empty() {
        return Ok(Materialized::Created(Vec::new()));
    }

    if skip_matching {
        let existing = gw.count_matching_events(schedule.team_id, schedule.role_id, batch)?;
        if existing == batch.len() {
            tracing::debug!(
                schedule_id = schedule.id,
                occurrences = batch.len(),
                "Matching events exist, skipping batch"
            );
            return Ok(Materialized::Matched);
        }
    }

    let link_id = (batch.len() > 1).then(gen_link_id);
    let new_events: Vec<NewEvent> = batch
        .iter()
        .map(|occurrence| NewEvent {
            team_id: schedule.team_id,
            role_id: schedule.role_id,
            user_id,
            schedule_id: Some(schedule.id),
            start: occurrence.start,
            end: occurrence.end,
            link_id: link_id.clone(),
            note: None,
        })
        .collect();

    let ids = gw.insert_events(&new_events)?;
    tracing::debug!(
        schedule_id = schedule.id,
        user_id,
        events = ids.len(),
        "Inserted events"
    );

    Ok(Materialized::Created(
        ids.into_iter()
            .zip(new_events)
            .map(|(id, new)| event_from_insert(id, new))
            .collect(),
    ))
}

fn event_from_insert(id: EventId, new: NewEvent) -> Event {
    Event {
        id,
        team_id: new.team_id,
        role_id: new.role_id,
        user_id: new.user_id,
        schedule_id: new.schedule_id,
        start: new.start,
        end: new.end,
        link_id: new.link_id,
        note: new.note,
    }
}

/// Select an assignee for `batch` and persist it
///
/// Returns `None` when no candidate is available.
pub fn assign_batch(
    gw: &dyn Gateway,
    schedule: &mut Schedule,
    batch: &[Occurrence],
) -> Result<Option<Materialized>> {
    let strategy = schedule.strategy;
    let Some(user_id) = strategy.select_assignee(gw, schedule, batch)? else {
        tracing::info!(schedule_id = schedule.id, "Failed to find available user");
        return Ok(None);
    };

    let outcome = materialize(gw, schedule, user_id, batch, strategy.skip_matching())?;
    if let Materialized::Created(events) = &outcome {
        if !events.is_empty() {
            strategy.record_assignment(gw, schedule, user_id)?;
        }
    }
    Ok(Some(outcome))
}

/// Outcome of a manual populate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateOutcome {
    /// Events removed before re-materializing
    pub deleted: Vec<Event>,
    /// Events inserted
    pub created: Vec<Event>,
    /// Batches without an available assignee
    pub skipped: usize,
    /// Batches that already existed
    pub matched: usize,
    pub changes: Vec<ScheduleChange>,
}

/// Materialize a schedule from `start` onwards
///
/// Existing events of the schedule from the first regenerated occurrence on
/// are replaced. Fails when the first hand-off at or after `start` lies
/// before `now`.
pub fn populate(
    gw: &dyn Gateway,
    schedule_id: ScheduleId,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<PopulateOutcome> {
    let mut schedule = gw
        .schedule(schedule_id)?
        .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))?;
    let team = gw
        .team(schedule.team_id)?
        .ok_or(SchedulerError::TeamNotFound {
            id: schedule.team_id,
        })?;

    let generator = OccurrenceGenerator::for_team(&team)?;
    let start_epoch = generator.populate_epoch(&schedule, start, now)?;

    if schedule.strategy == SelectionStrategy::RoundRobin {
        gw.set_last_scheduled_user(schedule.id, None)?;
        schedule.last_scheduled_user_id = None;
    }

    let generated = generator.generate_future_occurrences(&schedule, Some(start_epoch), now)?;
    gw.set_last_epoch(schedule.id, generated.watermark)?;
    schedule.last_epoch_scheduled = Some(generated.watermark);

    let batches: Vec<Vec<Occurrence>> = generated
        .batches
        .into_iter()
        .map(|batch| batch.into_iter().filter(|o| o.start >= start).collect::<Vec<_>>())
        .filter(|batch| !batch.is_empty())
        .collect();

    let mut outcome = PopulateOutcome::default();
    let Some(first_start) = batches.iter().flatten().map(|o| o.start).min() else {
        tracing::info!(schedule_id, "Nothing to populate");
        return Ok(outcome);
    };

    outcome.deleted = gw.events(
        &EventFilter::new()
            .schedule(schedule.id)
            .starts_at_or_after(first_start),
    )?;
    let stale: Vec<EventId> = outcome.deleted.iter().map(|e| e.id).collect();
    gw.delete_events(&stale)?;
    outcome
        .changes
        .extend(ScheduleChange::from_events(ChangeKind::EventDeleted, &outcome.deleted, &[]));

    for batch in &batches {
        match assign_batch(gw, &mut schedule, batch)? {
            None => outcome.skipped += 1,
            Some(Materialized::Matched) => outcome.matched += 1,
            Some(Materialized::Created(events)) => {
                outcome
                    .changes
                    .extend(ScheduleChange::from_events(ChangeKind::EventCreated, &events, &[]));
                outcome.created.extend(events);
            }
        }
    }

    tracing::info!(
        schedule_id,
        deleted = outcome.deleted.len(),
        created = outcome.created.len(),
        skipped = outcome.skipped,
        "Populated schedule"
    );
    Ok(outcome)
}

/// Events of the schedule's team (any role) and of its subscribed
/// `(team, role)` pairs overlapping `[start, window_end)`, after a populate
/// from `start`
///
/// Meant to run inside a dry-run transaction.
pub fn preview(
    gw: &dyn Gateway,
    schedule_id: ScheduleId,
    start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<Event>> {
    if window_end <= start {
        return Err(SchedulerError::InvalidRange {
            start,
            end: window_end,
        }
        .into());
    }

    populate(gw, schedule_id, start, now)?;
    let schedule = gw
        .schedule(schedule_id)?
        .ok_or_else(|| SchedulerError::schedule_not_found(schedule_id))?;
    let mut filter = EventFilter::new()
        .scope(TeamScope::team(schedule.team_id))
        .overlapping([Occurrence::new(start, window_end)]);
    for sub in gw.subscriptions(schedule.team_id)? {
        filter = filter.scope(TeamScope::role(sub.subscription_team_id, sub.role_id));
    }
    gw.events(&filter)
}
