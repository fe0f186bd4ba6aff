//! Per-process scheduling context
//!
//! Bundles the validated configuration with the sink that receives change
//! facts. Every entry point runs its work in one transaction and publishes
//! facts only once that transaction committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::cycle::{self, CycleStats};
use super::materializer::{self, PopulateOutcome};
use super::overrides::{self, EditPolicy, OverrideOutcome, OverrideRequest};
use super::swap::{self, SwapTarget};
use crate::config::Config;
use crate::error::Result;
use crate::models::{Event, ScheduleId};
use crate::notifications::{ChangeSink, ScheduleChange, TracingSink};
use crate::storage::{Store, StoreExt};

#[derive(Clone)]
pub struct SchedulerContext {
    config: Config,
    sink: Arc<dyn ChangeSink>,
}

impl SchedulerContext {
    pub fn new(config: Config, sink: Arc<dyn ChangeSink>) -> Self {
        Self { config, sink }
    }

    /// Context logging every change fact
    pub fn with_tracing(config: Config) -> Self {
        Self::new(config, Arc::new(TracingSink))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sink(&self) -> &dyn ChangeSink {
        self.sink.as_ref()
    }

    /// Edit policy for a request made at `now`
    pub fn edit_policy(&self, now: DateTime<Utc>, privileged: bool) -> EditPolicy {
        EditPolicy::new(now, self.config.grace_period()).privileged(privileged)
    }

    /// One scheduling cycle over every active team
    pub fn run_cycle<S: Store + ?Sized>(&self, store: &S, now: DateTime<Utc>) -> Result<CycleStats> {
        cycle::run_cycle(store, self.sink(), now)
    }

    pub fn populate<S: Store + ?Sized>(
        &self,
        store: &S,
        schedule_id: ScheduleId,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<PopulateOutcome> {
        let outcome = store.transaction(|gw| materializer::populate(gw, schedule_id, start, now))?;
        self.sink.publish_all(&outcome.changes);
        Ok(outcome)
    }

    /// Events a populate would leave in `[start, window_end)`; nothing is
    /// persisted or published
    pub fn preview<S: Store + ?Sized>(
        &self,
        store: &S,
        schedule_id: ScheduleId,
        start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        store.dry_run(|gw| materializer::preview(gw, schedule_id, start, window_end, now))
    }

    pub fn override_events<S: Store + ?Sized>(
        &self,
        store: &S,
        request: &OverrideRequest,
        now: DateTime<Utc>,
        privileged: bool,
    ) -> Result<OverrideOutcome> {
        let policy = self.edit_policy(now, privileged);
        let outcome = store.transaction(|gw| overrides::override_events(gw, request, &policy))?;
        self.sink.publish_all(&outcome.changes);
        Ok(outcome)
    }

    pub fn swap<S: Store + ?Sized>(
        &self,
        store: &S,
        a: &SwapTarget,
        b: &SwapTarget,
        now: DateTime<Utc>,
        privileged: bool,
    ) -> Result<Vec<ScheduleChange>> {
        let policy = self.edit_policy(now, privileged);
        let changes = store.transaction(|gw| swap::swap(gw, a, b, &policy))?;
        self.sink.publish_all(&changes);
        Ok(changes)
    }
}

impl std::fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
