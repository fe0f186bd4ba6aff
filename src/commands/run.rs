use anyhow::{Context, Result};
use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};

use rota::config::Config;
use rota::scheduler::SchedulerContext;

/// Run scheduling cycles until ctrl-c, or a single cycle with `once`
pub async fn run(config: Config, once: bool) -> Result<()> {
    let store = super::open_store(&config)?;
    let period = config.cycle_interval();
    let ctx = SchedulerContext::with_tracing(config);

    if once {
        let stats = ctx
            .run_cycle(&store, Utc::now())
            .context("Scheduling cycle failed")?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    tracing::info!(interval_secs = period.as_secs(), "Starting scheduling loop");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match ctx.run_cycle(&store, Utc::now()) {
                    Ok(stats) => {
                        tracing::debug!(events_created = stats.events_created, "Cycle finished");
                    }
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(error = %e, "Scheduling cycle failed, retrying next tick");
                    }
                    Err(e) => return Err(e).context("Scheduling cycle failed"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
