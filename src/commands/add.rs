use anyhow::Result;
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;
use parish_core::{Event, RecurrenceType};

use crate::time_input;

pub struct AddArgs {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub repeat: Option<RecurrenceType>,
}

pub async fn run(engine: &EventSyncEngine, args: AddArgs) -> Result<()> {
    let tz = engine.config().timezone;

    let start = time_input::parse_datetime(&args.start, tz)?;
    let end = time_input::resolve_end(start, args.end.as_deref(), args.duration.as_deref(), tz)?;

    let event = Event::new(args.title, start, end)
        .with_location(args.location.unwrap_or_default())
        .with_description(args.description.unwrap_or_default())
        .with_recurrence(args.repeat.unwrap_or_default());

    let saved = engine.add_event(event).await?;

    if saved.event.start_time != start {
        println!(
            "{}",
            "  Start time was in the past; moved to now.".yellow()
        );
    }
    println!(
        "{} {}",
        format!("  Created: {}", saved.event.title).green(),
        format!("[{}]", saved.event.id).dimmed()
    );
    super::print_sync(saved.sync.as_ref());

    Ok(())
}
