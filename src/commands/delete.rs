use anyhow::Result;
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;

use crate::render::pluralize;

pub async fn run(engine: &EventSyncEngine, id: &str) -> Result<()> {
    let deleted = engine.delete_event(id).await?;

    println!("{}", format!("  Deleted: {}", deleted.event.title).red());
    if deleted.cascaded > 0 {
        println!(
            "{}",
            format!(
                "  Also removed {} upcoming {}",
                deleted.cascaded,
                pluralize("instance", deleted.cascaded)
            )
            .dimmed()
        );
    } else if deleted.event.is_instance() {
        println!("{}", "  Skipped this occurrence; the series continues.".dimmed());
    }

    Ok(())
}
