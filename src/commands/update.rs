use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use parish_core::engine::EventSyncEngine;
use parish_core::RecurrenceType;

use crate::time_input;

pub struct UpdateArgs {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub repeat: Option<RecurrenceType>,
}

pub async fn run(engine: &EventSyncEngine, id: &str, args: UpdateArgs) -> Result<()> {
    let tz = engine.config().timezone;
    let mut event = engine
        .get_event(id)
        .await
        .with_context(|| format!("Could not load event '{}'", id))?;

    if let Some(title) = args.title {
        event.title = title;
    }
    if let Some(location) = args.location {
        event.location = location;
    }
    if let Some(description) = args.description {
        event.description = description;
    }
    if let Some(repeat) = args.repeat {
        event.recurrence_type = repeat;
    }

    if let Some(start) = &args.start {
        let length = event.duration();
        event.start_time = time_input::parse_datetime(start, tz)?;
        event.end_time = event.start_time + length;
    }
    if args.end.is_some() || args.duration.is_some() {
        event.end_time = time_input::resolve_end(
            event.start_time,
            args.end.as_deref(),
            args.duration.as_deref(),
            tz,
        )?;
    }

    let saved = engine.update_event(event).await?;

    println!(
        "{} {}",
        format!("  Updated: {}", saved.event.title).yellow(),
        format!("[{}]", saved.event.id).dimmed()
    );
    if saved.event.is_template() {
        println!(
            "{}",
            "  Instances already created keep their schedule; only new ones follow the change."
                .dimmed()
        );
    }
    super::print_sync(saved.sync.as_ref());

    Ok(())
}
