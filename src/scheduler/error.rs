//! Error types for the scheduler module

use chrono::{DateTime, Utc};
use std::fmt;

use crate::models::{EventId, ScheduleId, TeamId, UserId};

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// Every variant except the `*NotFound` ones describes a request the caller
/// can correct; none of them are raised for skipped or already-materialized
/// batches, which are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Timezone identifier could not be resolved
    InvalidTimezone {
        tz: String,
    },

    /// Schedule template cannot be reduced to a period
    InvalidTemplate {
        schedule_id: ScheduleId,
        reason: String,
    },

    /// Unknown selection strategy name
    UnknownStrategy {
        name: String,
    },

    ScheduleNotFound {
        id: ScheduleId,
    },

    TeamNotFound {
        id: TeamId,
    },

    /// Some of the referenced events do not exist
    EventsNotFound {
        ids: Vec<EventId>,
    },

    /// A swap group resolved to no events
    SwapGroupNotFound {
        reference: String,
    },

    /// Populate would start handing off before now
    PopulateInPast {
        handoff: DateTime<Utc>,
    },

    /// Start is not strictly before end
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Edit touches events older than the grace period
    EditInPast {
        start: DateTime<Utc>,
    },

    /// Events span more than one team
    MixedTeams,

    /// Events span more than one role
    MixedRoles,

    /// Events (or a swap group) span more than one user
    MixedUsers,

    /// Sorted override events are not back-to-back
    NonConsecutiveEvents {
        previous_end: DateTime<Utc>,
        next_start: DateTime<Utc>,
    },

    /// Override range does not overlap one of the events
    NoOverlap {
        event_id: EventId,
    },

    /// Substitute is not on any roster of the team
    SubstituteNotInTeam {
        user_id: UserId,
        team_id: TeamId,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimezone { tz } => {
                write!(f, "Invalid timezone: {}", tz)
            }
            Self::InvalidTemplate {
                schedule_id,
                reason,
            } => {
                write!(f, "Invalid template for schedule {}: {}", schedule_id, reason)
            }
            Self::UnknownStrategy { name } => {
                write!(
                    f,
                    "Unknown scheduler '{}'. Valid options: {}",
                    name,
                    super::strategy::SelectionStrategy::names().join(", ")
                )
            }
            Self::ScheduleNotFound { id } => {
                write!(f, "Schedule not found: {}", id)
            }
            Self::TeamNotFound { id } => {
                write!(f, "Team not found: {}", id)
            }
            Self::EventsNotFound { ids } => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "Events not found: {}", ids.join(", "))
            }
            Self::SwapGroupNotFound { reference } => {
                write!(f, "No events found for swap target {}", reference)
            }
            Self::PopulateInPast { handoff } => {
                write!(
                    f,
                    "Cannot populate starting in the past (hand-off at {})",
                    handoff.to_rfc3339()
                )
            }
            Self::InvalidRange { start, end } => {
                write!(
                    f,
                    "Invalid time range: {} is not before {}",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                )
            }
            Self::EditInPast { start } => {
                write!(f, "Cannot edit events in the past ({})", start.to_rfc3339())
            }
            Self::MixedTeams => write!(f, "Events must be from the same team"),
            Self::MixedRoles => write!(f, "Events must have the same role"),
            Self::MixedUsers => write!(f, "Events must have the same user"),
            Self::NonConsecutiveEvents {
                previous_end,
                next_start,
            } => {
                write!(
                    f,
                    "Events must be consecutive: gap between {} and {}",
                    previous_end.to_rfc3339(),
                    next_start.to_rfc3339()
                )
            }
            Self::NoOverlap { event_id } => {
                write!(
                    f,
                    "Event {} must overlap with the override time range",
                    event_id
                )
            }
            Self::SubstituteNotInTeam { user_id, team_id } => {
                write!(
                    f,
                    "Substituting user {} must be part of team {}",
                    user_id, team_id
                )
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid timezone error
    pub fn invalid_timezone(tz: impl Into<String>) -> Self {
        Self::InvalidTimezone { tz: tz.into() }
    }

    /// Create an invalid template error
    pub fn invalid_template(schedule_id: ScheduleId, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            schedule_id,
            reason: reason.into(),
        }
    }

    /// Create an unknown strategy error
    pub fn unknown_strategy(name: impl Into<String>) -> Self {
        Self::UnknownStrategy { name: name.into() }
    }

    /// Create a schedule not found error
    pub fn schedule_not_found(id: ScheduleId) -> Self {
        Self::ScheduleNotFound { id }
    }

    /// Create a populate-in-the-past error
    pub fn populate_in_past(handoff: DateTime<Utc>) -> Self {
        Self::PopulateInPast { handoff }
    }

    /// Create a non-consecutive events error
    pub fn non_consecutive(previous_end: DateTime<Utc>, next_start: DateTime<Utc>) -> Self {
        Self::NonConsecutiveEvents {
            previous_end,
            next_start,
        }
    }

    /// Whether the caller can fix the request (4xx-equivalent)
    pub fn is_client_error(&self) -> bool {
        !self.is_not_found()
    }

    /// Whether a referenced entity is missing (404-equivalent)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ScheduleNotFound { .. }
                | Self::TeamNotFound { .. }
                | Self::EventsNotFound { .. }
                | Self::SwapGroupNotFound { .. }
        )
    }

    /// Check if the error is recoverable
    ///
    /// Validation failures never succeed on retry without a changed request.
    pub fn is_recoverable(&self) -> bool {
        false
    }
}
