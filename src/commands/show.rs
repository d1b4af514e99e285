use anyhow::Result;
use parish_core::engine::EventSyncEngine;

use crate::render::EventRender;

pub async fn run(engine: &EventSyncEngine, id: &str, json: bool) -> Result<()> {
    let event = engine.get_event(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        println!("{}", event.render_detail(engine.config().timezone));
    }

    Ok(())
}
