//! rota - On-call auto-scheduling
//!
//! Turns recurring weekly schedule templates into concrete on-call events,
//! assigns them to roster members and lets operators override or swap the
//! resulting shifts.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`scheduler`] - Occurrence generation, assignment, overrides and swaps
//! - [`storage`] - Transactional persistence (SQLite, in-memory)
//! - [`notifications`] - Change facts and sinks
//! - [`error`] - Crate-wide error type
//!
//! # Example
//!
//! ```no_run
//! use rota::config::Config;
//! use rota::scheduler::SchedulerContext;
//! use rota::storage::SqliteStore;
//!
//! fn main() -> rota::error::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = SqliteStore::open(&config.database.sqlite_path)?;
//!     let ctx = SchedulerContext::with_tracing(config);
//!     let stats = ctx.run_cycle(&store, chrono::Utc::now())?;
//!     println!("{} events created", stats.events_created);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod notifications;
pub mod scheduler;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{Event, NewEvent, Schedule, ScheduleEvent, Team};
    pub use crate::notifications::{ChangeKind, ChangeSink, ScheduleChange};
    pub use crate::scheduler::{SchedulerContext, SchedulerError, SelectionStrategy, SwapTarget};
    pub use crate::storage::{Gateway, MemoryStore, SqliteStore, Store, StoreExt};
}

// Direct re-exports for convenience
pub use models::{Event, Schedule, Team};
