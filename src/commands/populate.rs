use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use rota::config::Config;
use rota::models::ScheduleId;
use rota::scheduler::SchedulerContext;

pub async fn populate(config: Config, schedule_id: ScheduleId, start: DateTime<Utc>) -> Result<()> {
    let store = super::open_store(&config)?;
    let ctx = SchedulerContext::with_tracing(config);

    let outcome = ctx
        .populate(&store, schedule_id, start, Utc::now())
        .with_context(|| format!("Failed to populate schedule {schedule_id}"))?;

    println!("Populated schedule {schedule_id}");
    println!("  Deleted: {}", outcome.deleted.len());
    println!("  Created: {}", outcome.created.len());
    println!("  Skipped: {}", outcome.skipped);
    println!("  Matched: {}", outcome.matched);
    Ok(())
}

/// Print the events a populate would produce, as JSON
pub async fn preview(
    config: Config,
    schedule_id: ScheduleId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let store = super::open_store(&config)?;
    let ctx = SchedulerContext::with_tracing(config);

    let events = ctx
        .preview(&store, schedule_id, start, end, Utc::now())
        .with_context(|| format!("Failed to preview schedule {schedule_id}"))?;

    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}
