//! Periodic scheduling cycle
//!
//! One cycle walks every active team. Each team is processed in its own
//! transaction: schedules are grouped by strategy, their pending batches are
//! generated, and batches are assigned in start order so that earlier shifts
//! inform the selection of later ones.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::SchedulerError;
use super::generator::{OccurrenceBatch, OccurrenceGenerator};
use super::materializer::{assign_batch, Materialized};
use super::strategy::SelectionStrategy;
use crate::error::{ErrorCategory, Result};
use crate::models::Team;
use crate::notifications::{ChangeKind, ChangeSink, ScheduleChange};
use crate::storage::{Gateway, Store, StoreExt};

/// Counters for one scheduling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    pub teams: usize,
    /// Teams rolled back because of a validation error
    pub teams_failed: usize,
    pub schedules: usize,
    pub batches_materialized: usize,
    /// Batches without an available assignee
    pub batches_skipped: usize,
    /// Batches already present in the calendar
    pub batches_matched: usize,
    pub events_created: usize,
}

impl CycleStats {
    fn absorb(&mut self, other: &CycleStats) {
        self.teams += other.teams;
        self.teams_failed += other.teams_failed;
        self.schedules += other.schedules;
        self.batches_materialized += other.batches_materialized;
        self.batches_skipped += other.batches_skipped;
        self.batches_matched += other.batches_matched;
        self.events_created += other.events_created;
    }
}

/// Result of scheduling one team
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamOutcome {
    pub stats: CycleStats,
    pub changes: Vec<ScheduleChange>,
}

/// Generate and assign every pending batch of one team
pub fn schedule_team(gw: &dyn Gateway, team: &Team, now: DateTime<Utc>) -> Result<TeamOutcome> {
    let generator = OccurrenceGenerator::for_team(team)?;
    let mut schedules = gw.team_schedules(team.id)?;

    let mut outcome = TeamOutcome::default();
    outcome.stats.teams = 1;
    outcome.stats.schedules = schedules.len();

    for strategy in SelectionStrategy::ALL {
        let mut pending: Vec<(usize, OccurrenceBatch)> = Vec::new();

        for (index, schedule) in schedules.iter_mut().enumerate() {
            if schedule.strategy != strategy {
                continue;
            }
            let generated = match generator.generate_future_occurrences(schedule, None, now) {
                Ok(generated) => generated,
                Err(SchedulerError::InvalidTemplate { schedule_id, reason }) => {
                    tracing::warn!(schedule_id, %reason, "Skipping schedule with invalid template");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            gw.set_last_epoch(schedule.id, generated.watermark)?;
            schedule.last_epoch_scheduled = Some(generated.watermark);

            tracing::debug!(
                schedule_id = schedule.id,
                batches = generated.batches.len(),
                "Generated occurrences"
            );
            pending.extend(generated.batches.into_iter().map(|batch| (index, batch)));
        }

        pending.sort_by_key(|(_, batch)| batch.iter().map(|o| o.start).min());

        for (index, batch) in &pending {
            let schedule = &mut schedules[*index];
            match assign_batch(gw, schedule, batch)? {
                None => outcome.stats.batches_skipped += 1,
                Some(Materialized::Matched) => outcome.stats.batches_matched += 1,
                Some(Materialized::Created(events)) => {
                    outcome.stats.batches_materialized += 1;
                    outcome.stats.events_created += events.len();
                    outcome
                        .changes
                        .extend(ScheduleChange::from_events(ChangeKind::EventCreated, &events, &[]));
                }
            }
        }
    }

    Ok(outcome)
}

/// Run one cycle over every active team
///
/// A team failing validation (for instance an unknown timezone) is rolled
/// back and counted; storage failures abort the cycle.
pub fn run_cycle<S>(store: &S, sink: &dyn ChangeSink, now: DateTime<Utc>) -> Result<CycleStats>
where
    S: Store + ?Sized,
{
    let teams = store.transaction(|gw| gw.active_teams())?;
    let mut stats = CycleStats::default();

    for team in &teams {
        tracing::info!(team_id = team.id, team = %team.name, "Scheduling team");
        match store.transaction(|gw| schedule_team(gw, team, now)) {
            Ok(outcome) => {
                sink.publish_all(&outcome.changes);
                stats.absorb(&outcome.stats);
            }
            Err(err) if err.category() == ErrorCategory::Validation => {
                tracing::warn!(team_id = team.id, error = %err, "Team scheduling failed");
                stats.teams += 1;
                stats.teams_failed += 1;
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        teams = stats.teams,
        schedules = stats.schedules,
        materialized = stats.batches_materialized,
        skipped = stats.batches_skipped,
        matched = stats.batches_matched,
        "Scheduling cycle complete"
    );
    Ok(stats)
}
