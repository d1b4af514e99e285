pub mod add;
pub mod delete;
pub mod list;
pub mod show;
pub mod sync;
pub mod update;
pub mod watch;

use owo_colors::OwoColorize;
use parish_core::engine::SyncReport;

use crate::render::Render;

/// Print the sync pass a save triggered, if any.
fn print_sync(sync: Option<&SyncReport>) {
    if let Some(report) = sync {
        println!("{}", "  Recurring events:".dimmed());
        println!("{}", report.render());
    }
}
