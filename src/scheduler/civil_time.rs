//! Civil time arithmetic for team timezones
//!
//! Schedules are anchored on the *civil epoch*: Sunday 00:00:00 in the team's
//! scheduling timezone. Local date-times are resolved to instants with one
//! fixed rule for ambiguous (fall-back) and nonexistent (spring-forward) wall
//! times: the daylight-saving interpretation always wins. Applying the same
//! rule to both ends of every generated occurrence keeps consecutive
//! occurrences back-to-back across a transition.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::{OffsetComponents, Tz};

use super::error::{SchedulerError, SchedulerResult};

/// Converts between a team's civil time and absolute instants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTimeConverter {
    tz: Tz,
}

impl CivilTimeConverter {
    /// Create a converter for an IANA timezone name
    pub fn new(timezone: &str) -> SchedulerResult<Self> {
        let tz = timezone
            .parse::<Tz>()
            .map_err(|_| SchedulerError::invalid_timezone(timezone))?;
        Ok(Self { tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Wall-clock time of an instant in this timezone
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    /// Most recent civil epoch at or before `instant`
    pub fn epoch_from_instant(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        epoch_of(self.to_local(instant))
    }

    /// Resolve a wall-clock time to an instant, preferring DST
    pub fn to_instant(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earlier, later) => {
                let pick = if is_dst(&later) && !is_dst(&earlier) {
                    later
                } else {
                    earlier
                };
                pick.with_timezone(&Utc)
            }
            LocalResult::None => {
                // Inside a gap: read the wall time with the offset in effect on
                // the DST side of the transition.
                let before = self
                    .tz
                    .offset_from_utc_datetime(&(local - Duration::days(1)));
                let after = self
                    .tz
                    .offset_from_utc_datetime(&(local + Duration::days(1)));
                let offset = if before.dst_offset() != Duration::zero()
                    && after.dst_offset() == Duration::zero()
                {
                    before
                } else {
                    after
                };
                let utc_offset = i64::from(offset.fix().local_minus_utc());
                Utc.from_utc_datetime(&(local - Duration::seconds(utc_offset)))
            }
        }
    }
}

fn is_dst(dt: &DateTime<Tz>) -> bool {
    dt.offset().dst_offset() != Duration::zero()
}

/// Sunday 00:00:00 at or before the given wall-clock time
pub fn epoch_of(local: NaiveDateTime) -> NaiveDateTime {
    let days_back = i64::from(local.weekday().num_days_from_sunday());
    (local.date() - Duration::days(days_back)).and_time(NaiveTime::MIN)
}

/// Whichever of the surrounding Sunday midnights is nearer
///
/// Ties resolve to the following Sunday.
pub fn closest_epoch(local: NaiveDateTime) -> NaiveDateTime {
    let before = epoch_of(local);
    if before == local {
        return before;
    }
    let after = before + Duration::weeks(1);
    if local - before < after - local {
        before
    } else {
        after
    }
}
