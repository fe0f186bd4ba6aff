//! Occurrence generation from schedule templates
//!
//! A schedule template is a list of `(offset, duration)` pairs relative to a
//! civil epoch. The template repeats every *period* (a whole number of weeks)
//! and each repetition becomes one batch of occurrences that share an
//! assignee.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use super::civil_time::{closest_epoch, CivilTimeConverter};
use super::error::{SchedulerError, SchedulerResult};
use crate::models::{Occurrence, Schedule, Team};

pub const SECONDS_IN_A_DAY: i64 = 24 * 60 * 60;
pub const SECONDS_IN_A_WEEK: i64 = 7 * SECONDS_IN_A_DAY;

/// Occurrences produced by one application of a template
pub type OccurrenceBatch = Vec<Occurrence>;

/// Output of a generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOccurrences {
    /// One batch per period, in chronological order
    pub batches: Vec<OccurrenceBatch>,

    /// Instant of the last period boundary covered; becomes the schedule's
    /// `last_epoch_scheduled`
    pub watermark: DateTime<Utc>,
}

impl GeneratedOccurrences {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Template repetition length in whole weeks, rounded up
///
/// Measured from the earliest template start to the latest template end.
pub fn period_weeks(schedule: &Schedule) -> SchedulerResult<i64> {
    let first_start = schedule
        .events
        .iter()
        .map(|e| e.start)
        .min()
        .ok_or_else(|| SchedulerError::invalid_template(schedule.id, "schedule has no events"))?;

    if let Some(bad) = schedule.events.iter().find(|e| e.duration <= 0) {
        return Err(SchedulerError::invalid_template(
            schedule.id,
            format!("event at offset {} has non-positive duration", bad.start),
        ));
    }
    if first_start < 0 {
        return Err(SchedulerError::invalid_template(
            schedule.id,
            format!("event offset {} is before the start of the week", first_start),
        ));
    }

    let last_end = schedule.events.iter().map(|e| e.end()).max().unwrap_or(first_start);
    let span = last_end - first_start;
    Ok((span + SECONDS_IN_A_WEEK - 1) / SECONDS_IN_A_WEEK)
}

/// Expands schedule templates into concrete occurrences for one timezone
#[derive(Debug, Clone, Copy)]
pub struct OccurrenceGenerator {
    converter: CivilTimeConverter,
}

impl OccurrenceGenerator {
    /// Create a generator for an IANA timezone name
    pub fn new(timezone: &str) -> SchedulerResult<Self> {
        Ok(Self {
            converter: CivilTimeConverter::new(timezone)?,
        })
    }

    /// Create a generator for a team's scheduling timezone
    pub fn for_team(team: &Team) -> SchedulerResult<Self> {
        Self::new(&team.scheduling_timezone)
    }

    pub fn converter(&self) -> &CivilTimeConverter {
        &self.converter
    }

    /// Apply every template entry of `schedule` to one epoch
    ///
    /// Both ends are computed as wall-clock times and converted separately,
    /// so a DST shift inside an occurrence changes its length instead of
    /// moving the next hand-off.
    pub fn generate_events(&self, schedule: &Schedule, epoch: NaiveDateTime) -> OccurrenceBatch {
        schedule
            .events
            .iter()
            .map(|event| {
                let start = epoch + Duration::seconds(event.start);
                let end = epoch + Duration::seconds(event.end());
                Occurrence::new(
                    self.converter.to_instant(start),
                    self.converter.to_instant(end),
                )
            })
            .collect()
    }

    /// Civil epoch a regular scheduling run starts from
    ///
    /// New schedules start from the week containing `now`. Otherwise the run
    /// continues one period after the epoch closest to the watermark; the
    /// watermark is not assumed to be a Sunday midnight in the current
    /// timezone because the team's timezone may have changed since.
    pub fn next_epoch(&self, schedule: &Schedule, now: DateTime<Utc>) -> SchedulerResult<NaiveDateTime> {
        let period = period_weeks(schedule)?;
        Ok(match schedule.last_epoch_scheduled {
            None => self.converter.epoch_from_instant(now),
            Some(watermark) => {
                closest_epoch(self.converter.to_local(watermark)) + Duration::weeks(period)
            }
        })
    }

    /// Generate every batch from `start_epoch` (or the watermark) up to
    /// `now + auto_populate_threshold` days
    pub fn generate_future_occurrences(
        &self,
        schedule: &Schedule,
        start_epoch: Option<NaiveDateTime>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<GeneratedOccurrences> {
        if schedule.auto_populate_threshold <= 0 {
            return Ok(GeneratedOccurrences {
                batches: Vec::new(),
                watermark: now,
            });
        }

        let period = Duration::weeks(period_weeks(schedule)?);
        let mut epoch = match start_epoch {
            Some(epoch) => epoch,
            None => self.next_epoch(schedule, now)?,
        };

        let cutoff = now + Duration::days(schedule.auto_populate_threshold);
        let mut batches = Vec::new();
        while self.converter.to_instant(epoch) < cutoff {
            let batch = self.generate_events(schedule, epoch);
            epoch += period;
            if !batch.is_empty() {
                batches.push(batch);
            }
        }

        Ok(GeneratedOccurrences {
            batches,
            watermark: self.converter.to_instant(epoch - period),
        })
    }

    /// Epoch a manual populate starting at `start` should generate from
    ///
    /// The first hand-off is the earliest template start within the week of
    /// `start`; if `start` is already past it, generation moves one period
    /// forward. A hand-off before `now` is rejected.
    pub fn populate_epoch(
        &self,
        schedule: &Schedule,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SchedulerResult<NaiveDateTime> {
        let period = Duration::weeks(period_weeks(schedule)?);
        let first_offset = schedule.events.iter().map(|e| e.start).min().unwrap_or(0);

        let mut epoch = self.converter.epoch_from_instant(start);
        let mut handoff = self
            .converter
            .to_instant(epoch + Duration::seconds(first_offset));
        if start > handoff {
            epoch += period;
            handoff = self
                .converter
                .to_instant(epoch + Duration::seconds(first_offset));
        }
        if handoff < now {
            return Err(SchedulerError::populate_in_past(handoff));
        }
        Ok(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleEvent;
    use crate::scheduler::strategy::SelectionStrategy;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    const HOUR: i64 = 3600;
    const DAY: i64 = SECONDS_IN_A_DAY;
    const WEEK: i64 = SECONDS_IN_A_WEEK;

    fn schedule(threshold: i64, events: Vec<ScheduleEvent>) -> Schedule {
        Schedule {
            id: 1,
            team_id: 1,
            roster_id: 1,
            role_id: 1,
            auto_populate_threshold: threshold,
            advanced_mode: false,
            strategy: SelectionStrategy::Default,
            order: Vec::new(),
            events,
            last_epoch_scheduled: None,
            last_scheduled_user_id: None,
        }
    }

    fn local(gen: &OccurrenceGenerator, instant: DateTime<Utc>) -> NaiveDateTime {
        gen.converter().to_local(instant)
    }

    #[test]
    fn test_period_weeks() {
        let weekly = schedule(14, vec![ScheduleEvent::new(DAY + 9 * HOUR, WEEK)]);
        assert_eq!(period_weeks(&weekly).unwrap(), 1);

        let daily: Vec<_> = (0..14)
            .map(|i| ScheduleEvent::new(3 * DAY + 12 * HOUR + i * DAY, 12 * HOUR))
            .collect();
        assert_eq!(period_weeks(&schedule(14, daily)).unwrap(), 2);
    }

    #[test]
    fn test_period_weeks_rejects_bad_templates() {
        assert!(period_weeks(&schedule(14, vec![])).is_err());
        assert!(period_weeks(&schedule(14, vec![ScheduleEvent::new(0, 0)])).is_err());
        assert!(period_weeks(&schedule(14, vec![ScheduleEvent::new(-5, HOUR)])).is_err());
    }

    #[test]
    fn test_weekly_shift_from_current_week() {
        let gen = OccurrenceGenerator::new("US/Pacific").unwrap();
        // Tuesday 2017-02-07 10:00 Pacific
        let now = Utc.with_ymd_and_hms(2017, 2, 7, 18, 0, 0).unwrap();
        let sched = schedule(21, vec![ScheduleEvent::new(DAY + 9 * HOUR, WEEK)]);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();

        // The current week's batch started yesterday; three more follow it
        assert_eq!(generated.batches.len(), 4);
        let upcoming: Vec<_> = generated
            .batches
            .iter()
            .flatten()
            .filter(|o| o.start > now)
            .collect();
        assert_eq!(upcoming.len(), 3);

        for (batch, monday) in generated.batches.iter().zip([6, 13, 20, 27]) {
            assert_eq!(batch.len(), 1);
            let start = local(&gen, batch[0].start);
            assert_eq!(start.weekday(), Weekday::Mon);
            assert_eq!(start.day(), monday);
            assert_eq!((start.hour(), start.minute()), (9, 0));
            assert_eq!(batch[0].duration(), Duration::weeks(1));
        }
        for pair in generated.batches.windows(2) {
            assert_eq!(pair[0][0].end, pair[1][0].start);
        }
    }

    #[test]
    fn test_daily_shifts_week_period() {
        let gen = OccurrenceGenerator::new("US/Eastern").unwrap();
        let now = Utc.with_ymd_and_hms(2016, 9, 9, 14, 0, 0).unwrap();
        let events = (0..7)
            .map(|i| ScheduleEvent::new(3 * DAY + 12 * HOUR + i * DAY, 12 * HOUR))
            .collect();
        let sched = schedule(7, events);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert_eq!(generated.batches.len(), 2);
        assert_eq!(generated.batches[0].len(), 7);
        assert_eq!(generated.batches[1].len(), 7);

        for (occ, day) in generated.batches[1].iter().zip(14..21) {
            let start = local(&gen, occ.start);
            assert_eq!(start.day(), day);
            assert_eq!(start.hour(), 12);
        }
    }

    #[test]
    fn test_two_week_period() {
        let gen = OccurrenceGenerator::new("US/Central").unwrap();
        let now = Utc.with_ymd_and_hms(2016, 9, 9, 15, 0, 0).unwrap();
        let events = (0..14)
            .map(|i| ScheduleEvent::new(3 * DAY + 12 * HOUR + i * DAY, 12 * HOUR))
            .collect();
        let sched = schedule(21, events);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert_eq!(generated.batches.len(), 2);
        assert_eq!(generated.batches[1].len(), 14);

        let days: Vec<u32> = (21..=30).chain(1..=4).collect();
        for (occ, day) in generated.batches[1].iter().zip(days) {
            let start = local(&gen, occ.start);
            assert_eq!(start.day(), day);
            assert_eq!(start.hour(), 12);
        }
    }

    #[test]
    fn test_fall_back_ambiguous_start_has_no_gap() {
        let gen = OccurrenceGenerator::new("US/Central").unwrap();
        let now = Utc.with_ymd_and_hms(2016, 10, 29, 15, 0, 0).unwrap();
        // Sunday 01:30, which happens twice on 2016-11-06
        let sched = schedule(14, vec![ScheduleEvent::new(HOUR + 30 * 60, WEEK)]);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert_eq!(generated.batches.len(), 3);

        let across = [generated.batches[1][0], generated.batches[2][0]];
        assert_eq!(across[0].end, across[1].start);
    }

    #[test]
    fn test_fall_back_keeps_wall_clock_start() {
        let gen = OccurrenceGenerator::new("US/Central").unwrap();
        let now = Utc.with_ymd_and_hms(2016, 10, 29, 15, 0, 0).unwrap();
        let sched = schedule(14, vec![ScheduleEvent::new(DAY + 11 * HOUR, WEEK)]);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert_eq!(generated.batches.len(), 3);

        let across = [generated.batches[1][0], generated.batches[2][0]];
        assert_eq!(across[0].end, across[1].start);
        // The week containing the transition is one hour longer
        assert_eq!(across[0].duration(), Duration::weeks(1) + Duration::hours(1));
        for occ in across {
            assert_eq!(local(&gen, occ.start).hour(), 11);
        }
    }

    #[test]
    fn test_spring_forward_nonexistent_start_has_no_gap() {
        let gen = OccurrenceGenerator::new("US/Pacific").unwrap();
        let now = Utc.with_ymd_and_hms(2016, 3, 1, 12, 0, 0).unwrap();
        // Sunday 02:30, which does not exist on 2016-03-13
        let sched = schedule(28, vec![ScheduleEvent::new(2 * HOUR + 30 * 60, WEEK)]);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        let occurrences: Vec<_> = generated.batches.iter().flatten().copied().collect();
        assert!(occurrences.len() >= 4);
        for pair in occurrences.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn test_continues_after_watermark() {
        let gen = OccurrenceGenerator::new("US/Pacific").unwrap();
        let mut sched = schedule(21, vec![ScheduleEvent::new(DAY + 10 * HOUR + 30 * 60, WEEK)]);
        // Sunday 2017-02-05 00:00 Pacific
        sched.last_epoch_scheduled = Some(Utc.with_ymd_and_hms(2017, 2, 5, 8, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2017, 2, 7, 8, 0, 0).unwrap();

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert_eq!(generated.batches.len(), 3);
        for (batch, monday) in generated.batches.iter().zip([13, 20, 27]) {
            let start = local(&gen, batch[0].start);
            assert_eq!(start.day(), monday);
            assert_eq!((start.hour(), start.minute()), (10, 30));
        }
        // Sunday 2017-02-26 00:00 Pacific
        assert_eq!(
            generated.watermark,
            Utc.with_ymd_and_hms(2017, 2, 26, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_watermark_near_epoch_survives_timezone_change() {
        let gen = OccurrenceGenerator::new("US/Eastern").unwrap();
        let mut sched = schedule(7, vec![ScheduleEvent::new(DAY, WEEK)]);
        // Sunday 2017-02-05 00:00 Pacific, i.e. 03:00 Eastern
        sched.last_epoch_scheduled = Some(Utc.with_ymd_and_hms(2017, 2, 5, 8, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2017, 2, 7, 8, 0, 0).unwrap();

        let next = gen.next_epoch(&sched, now).unwrap();
        assert_eq!(next.date().day(), 12);
        assert_eq!(next.hour(), 0);
    }

    #[test]
    fn test_non_positive_threshold_generates_nothing() {
        let gen = OccurrenceGenerator::new("UTC").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let sched = schedule(0, vec![ScheduleEvent::new(0, WEEK)]);

        let generated = gen.generate_future_occurrences(&sched, None, now).unwrap();
        assert!(generated.is_empty());
        assert_eq!(generated.watermark, now);
    }

    #[test]
    fn test_populate_epoch_moves_past_started_handoff() {
        let gen = OccurrenceGenerator::new("UTC").unwrap();
        let sched = schedule(14, vec![ScheduleEvent::new(DAY + 9 * HOUR, WEEK)]);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        // Tuesday 2024-01-09; this week's Monday hand-off already happened
        let start = Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap();
        let epoch = gen.populate_epoch(&sched, start, now).unwrap();
        assert_eq!(epoch.date().day(), 14);

        // Sunday 2024-01-07, before Monday's hand-off
        let start = Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap();
        let epoch = gen.populate_epoch(&sched, start, now).unwrap();
        assert_eq!(epoch.date().day(), 7);
    }

    #[test]
    fn test_populate_epoch_rejects_past_handoff() {
        let gen = OccurrenceGenerator::new("UTC").unwrap();
        let sched = schedule(14, vec![ScheduleEvent::new(DAY + 9 * HOUR, WEEK)]);
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap();

        let err = gen.populate_epoch(&sched, start, now).unwrap_err();
        assert!(matches!(err, SchedulerError::PopulateInPast { .. }));
    }
}
