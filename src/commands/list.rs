use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;

use crate::render::{EventRender, format_date_label};

pub async fn run(engine: &EventSyncEngine, json: bool, templates: bool) -> Result<()> {
    let occurrences = engine.fetch_events().await?;
    let events = if templates {
        engine.list_templates()
    } else {
        occurrences
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        let empty = if templates { "No recurring events" } else { "No events found" };
        println!("{}", empty.dimmed());
        return Ok(());
    }

    let tz = engine.config().timezone;
    let today = engine.now().with_timezone(&tz).date_naive();

    // Group events by day
    let mut current_date: Option<NaiveDate> = None;

    for event in &events {
        let date = event.start_time.with_timezone(&tz).date_naive();

        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, today).bold());
            current_date = Some(date);
        }

        println!("{}", event.render_line(tz));
    }

    Ok(())
}
