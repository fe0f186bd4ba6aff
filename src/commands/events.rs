use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use rota::config::Config;
use rota::models::{EventId, UserId};
use rota::scheduler::{OverrideRequest, SchedulerContext, SwapTarget};

/// Parameters for the override command
#[derive(Debug, Clone)]
pub struct OverrideParams {
    pub event_ids: Vec<EventId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub user_id: UserId,
    pub privileged: bool,
}

pub async fn override_events(config: Config, params: OverrideParams) -> Result<()> {
    let store = super::open_store(&config)?;
    let ctx = SchedulerContext::with_tracing(config);

    let request = OverrideRequest {
        event_ids: params.event_ids,
        start: params.start,
        end: params.end,
        user_id: params.user_id,
    };
    let outcome = ctx
        .override_events(&store, &request, Utc::now(), params.privileged)
        .context("Override failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome.events)?);
    Ok(())
}

/// Parse `event:<id>` or `link:<id>`; a bare number is an event id
pub fn parse_target(raw: &str) -> Result<SwapTarget> {
    match raw.split_once(':') {
        Some(("event", id)) => Ok(SwapTarget::Event(
            id.parse().with_context(|| format!("Invalid event id '{id}'"))?,
        )),
        Some(("link", link)) if !link.is_empty() => Ok(SwapTarget::Link(link.to_string())),
        None => Ok(SwapTarget::Event(
            raw.parse()
                .with_context(|| format!("Invalid swap target '{raw}'"))?,
        )),
        _ => anyhow::bail!("Invalid swap target '{raw}', expected event:<id> or link:<id>"),
    }
}

pub async fn swap(config: Config, a: String, b: String, privileged: bool) -> Result<()> {
    let a = parse_target(&a)?;
    let b = parse_target(&b)?;

    let store = super::open_store(&config)?;
    let ctx = SchedulerContext::with_tracing(config);

    let changes = ctx
        .swap(&store, &a, &b, Utc::now(), privileged)
        .with_context(|| format!("Failed to swap {a} and {b}"))?;

    println!("Swapped {a} and {b} ({} change(s))", changes.len());
    Ok(())
}
