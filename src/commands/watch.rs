use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::render::{Render, render_change};

/// Re-run sync every `interval` so the horizon rolls forward, printing each
/// change to the event collection as it lands and a summary of every pass
/// that changed something. Stops on Ctrl-C.
pub async fn run(engine: &EventSyncEngine, interval: Duration) -> Result<()> {
    let tz = engine.config().timezone;
    let mut changes = engine
        .watch_changes()
        .await
        .context("Could not subscribe to event changes")?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    println!(
        "{}",
        format!(
            "  Watching; syncing every {} (Ctrl-C to stop)",
            humantime::format_duration(interval)
        )
        .dimmed()
    );

    loop {
        tokio::select! {
            Some(change) = changes.next() => {
                println!("{}", render_change(&change, tz));
            }
            _ = ticker.tick() => {
                match engine.sync_recurring_events().await {
                    Ok(report) => {
                        if report.changed() || !report.is_clean() {
                            let stamp = engine.now().with_timezone(&tz);
                            println!("{}", stamp.format("%Y-%m-%d %H:%M").to_string().bold());
                            println!("{}", report.render());
                        }
                    }
                    Err(e) => warn!(error = %e, "Sync pass failed; retrying next interval"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "  Stopped".dimmed());
                return Ok(());
            }
        }
    }
}
