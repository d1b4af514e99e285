//! Colored terminal rendering for parish types.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;
use parish_core::engine::{EventChange, Materialization, SyncReport, TemplateSync};
use parish_core::{Event, RecurrenceType};

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

/// Rendering that needs the zone times are shown in.
pub trait EventRender {
    /// One line for a listing: time, title, location and id.
    fn render_line(&self, tz: Tz) -> String;
    /// Every field, one per line.
    fn render_detail(&self, tz: Tz) -> String;
}

impl Render for RecurrenceType {
    fn render(&self) -> String {
        match self {
            RecurrenceType::None => self.to_string().dimmed().to_string(),
            _ => format!("↻ {}", self).cyan().to_string(),
        }
    }
}

impl EventRender for Event {
    fn render_line(&self, tz: Tz) -> String {
        let time = self.start_time.with_timezone(&tz).format("%H:%M").to_string();
        let mut line = format!("  {:>5} {}", time, self.title);

        if !self.location.is_empty() {
            line.push_str(&format!(" {}", format!("@ {}", self.location).dimmed()));
        }
        if self.is_template() {
            line.push_str(&format!(" {}", self.recurrence_type.render()));
        }
        line.push_str(&format!(" {}", format!("[{}]", self.id).dimmed()));
        line
    }

    fn render_detail(&self, tz: Tz) -> String {
        let mut lines = vec![self.title.bold().to_string()];

        lines.push(format!("  {:<11} {}", "id".dimmed(), self.id));
        lines.push(format!(
            "  {:<11} {}",
            "when".dimmed(),
            format_span(self.start_time, self.end_time, tz)
        ));
        if !self.location.is_empty() {
            lines.push(format!("  {:<11} {}", "where".dimmed(), self.location));
        }
        if !self.description.is_empty() {
            lines.push(format!("  {:<11} {}", "notes".dimmed(), self.description));
        }
        lines.push(format!("  {:<11} {}", "repeats".dimmed(), self.recurrence_type.render()));
        if let Some(parent) = &self.parent_event_id {
            lines.push(format!("  {:<11} {}", "series".dimmed(), parent));
        }
        if !self.excluded_dates.is_empty() {
            let skipped: Vec<String> = self
                .excluded_dates
                .iter()
                .map(|d| d.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string())
                .collect();
            lines.push(format!("  {:<11} {}", "skipped".dimmed(), skipped.join(", ")));
        }

        lines.join("\n")
    }
}

/// One line per change seen by `parish watch`.
pub fn render_change(change: &EventChange, tz: Tz) -> String {
    match change {
        EventChange::Saved(event) => format!(
            "  {} {} {} {}",
            "+".green(),
            event.title,
            event.start_time.with_timezone(&tz).format("%a %b %-d %H:%M").to_string().dimmed(),
            format!("[{}]", event.id).dimmed()
        ),
        EventChange::Removed { id } => format!("  {} {}", "-".red(), format!("[{}]", id).dimmed()),
    }
}

fn format_span(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> String {
    let start = start.with_timezone(&tz);
    let end = end.with_timezone(&tz);

    if start.date_naive() == end.date_naive() {
        format!(
            "{} {}-{} {}",
            start.format("%a %b %-d %Y"),
            start.format("%H:%M"),
            end.format("%H:%M"),
            tz
        )
    } else {
        format!(
            "{} → {} {}",
            start.format("%a %b %-d %Y %H:%M"),
            end.format("%a %b %-d %Y %H:%M"),
            tz
        )
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

impl Render for TemplateSync {
    fn render(&self) -> String {
        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("+{}", self.created).green().to_string());
        }
        if self.pruned > 0 {
            parts.push(format!("-{}", self.pruned).red().to_string());
        }
        if self.deduplicated > 0 {
            parts.push(
                format!("({} {} merged)", self.deduplicated, pluralize("duplicate", self.deduplicated))
                    .yellow()
                    .to_string(),
            );
        }
        let counts = if parts.is_empty() {
            "up to date".dimmed().to_string()
        } else {
            parts.join(" ")
        };

        match (self.state(), &self.error) {
            (Materialization::Partial, Some(error)) => format!(
                "   {} {} {} {}",
                "!".red(),
                self.title,
                counts,
                format!("(stopped early: {})", error).red()
            ),
            _ => format!("   {} {} {}", "✓".green(), self.title, counts),
        }
    }
}

impl Render for SyncReport {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        if self.templates.is_empty() {
            lines.push("   No recurring events".dimmed().to_string());
        }
        for template in &self.templates {
            lines.push(template.render());
        }

        if self.orphans_removed > 0 {
            lines.push(format!(
                "   {} {}",
                "-".red(),
                format!("({} orphaned {} removed)", self.orphans_removed, pluralize("instance", self.orphans_removed)).red()
            ));
        }
        if self.detached_pruned > 0 {
            lines.push(format!(
                "   {} {}",
                "-".red(),
                format!("({} past {} removed)", self.detached_pruned, pluralize("instance", self.detached_pruned)).red()
            ));
        }
        for error in &self.errors {
            lines.push(format!("   {} {}", "!".red(), error.red()));
        }

        lines.push(
            format!("   Materialized through {}", self.horizon_end.format("%Y-%m-%d %H:%M UTC"))
                .dimmed()
                .to_string(),
        );

        lines.join("\n")
    }
}

pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(format_date_label(today, today), "Today");
        assert_eq!(format_date_label(today.succ_opt().unwrap(), today), "Tomorrow");
        assert_eq!(
            format_date_label(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(), today),
            "Tue Jan 9"
        );
    }

    #[test]
    fn span_in_configured_zone() {
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 3, 1, 30, 0).unwrap();
        assert_eq!(
            format_span(start, end, chrono_tz::America::Chicago),
            "Tue Jan 2 2024 18:00-19:30 America/Chicago"
        );
    }

    #[test]
    fn change_lines_name_the_event() {
        let mut event = Event::new(
            "Vespers",
            Utc.with_ymd_and_hms(2024, 1, 5, 23, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap(),
        );
        event.id = "ev-1".to_string();

        let saved = render_change(&EventChange::Saved(event), chrono_tz::America::Chicago);
        assert!(saved.contains("Vespers"));
        assert!(saved.contains("Fri Jan 5 17:00"));
        assert!(saved.contains("[ev-1]"));

        let removed = render_change(&EventChange::Removed { id: "ev-1".to_string() }, Tz::UTC);
        assert!(removed.contains("[ev-1]"));
    }

    #[test]
    fn pluralize_counts() {
        assert_eq!(pluralize("instance", 1), "instance");
        assert_eq!(pluralize("instance", 3), "instances");
    }
}
