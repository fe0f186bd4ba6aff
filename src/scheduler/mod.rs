//! On-call scheduling engine
//!
//! Schedules describe a weekly template in the team's civil timezone. The
//! engine expands templates into concrete occurrences, groups them into
//! batches (one batch is one person's shift), picks an assignee per batch
//! and persists the result as events. Overrides and swaps edit the
//! resulting calendar.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │  CivilTime   │──▶│  Generator   │──▶│  Strategy    │
//!  │  Converter   │   │  (batches)   │   │  (assignee)  │
//!  └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                               │
//!                                        ┌──────▼───────┐
//!   override / swap ────────────────────▶│ Materializer │──▶ Gateway
//!                                        └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`civil_time`]: local wall-clock to instant conversion across DST
//! - [`generator`]: template expansion and the scheduling watermark
//! - [`strategy`]: assignee selection policies
//! - [`materializer`]: batch persistence, populate and preview
//! - [`cycle`]: the periodic pass over every active team
//! - [`overrides`]: substituting a user into a run of events
//! - [`swap`]: exchanging the assignees of two event groups
//! - [`context`]: configuration and change sink shared by all entry points

pub mod civil_time;
pub mod context;
pub mod cycle;
pub mod error;
pub mod generator;
pub mod materializer;
pub mod overrides;
pub mod strategy;
pub mod swap;

pub use civil_time::CivilTimeConverter;
pub use context::SchedulerContext;
pub use cycle::{run_cycle, schedule_team, CycleStats};
pub use error::{SchedulerError, SchedulerResult};
pub use generator::{GeneratedOccurrences, OccurrenceGenerator};
pub use materializer::{populate, preview, Materialized, PopulateOutcome};
pub use overrides::{override_events, EditPolicy, OverrideOutcome, OverrideRequest};
pub use strategy::SelectionStrategy;
pub use swap::{swap, SwapTarget};
