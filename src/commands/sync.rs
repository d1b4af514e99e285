use anyhow::Result;
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;

use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(engine: &EventSyncEngine) -> Result<()> {
    let spinner = create_spinner(format!(
        "Syncing recurring events ({} ahead)...",
        engine.config().horizon
    ));
    let result = engine.sync_recurring_events().await;
    spinner.finish_and_clear();

    let report = result?;
    println!("{}", report.render());

    if !report.is_clean() {
        println!(
            "{}",
            "  Some events are partially materialized; the next sync will retry.".yellow()
        );
    }

    Ok(())
}
