//! Parsing of the dates, times and durations typed on the command line.
//!
//! Wall-clock input is read in the configured time zone, the same zone
//! recurrence rules follow.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parse a start or end time: RFC 3339, `YYYY-MM-DDTHH:MM`, or natural
/// language such as "sun 10am".
pub fn parse_datetime(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let exact = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok());

    let naive = match exact {
        Some(naive) => naive,
        None => fuzzydate::parse(&expand_abbreviations(input))
            .map_err(|_| anyhow::anyhow!("Could not parse date/time: \"{}\"", input))?,
    };

    localize(naive, tz)
}

/// Pin a wall-clock time to `tz`. Ambiguous times take the earlier instant.
fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("{} does not exist in {} (clocks skip it)", naive, tz))
}

/// Parse an end input. Tries a duration first ("90m"), then a date/time,
/// optionally prefixed with "until" or "to".
pub fn parse_end(input: &str, start: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(duration) = parse_duration(input) {
        return Ok(start + duration);
    }

    let cleaned = input
        .strip_prefix("until ")
        .or_else(|| input.strip_prefix("to "))
        .unwrap_or(input);

    parse_datetime(cleaned, tz)
}

pub fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input.trim()).map_err(|e| anyhow::anyhow!("{}", e))?;
    Duration::from_std(std_dur).context("Duration too large")
}

/// Interval for `parish watch`; must be non-zero.
pub fn parse_interval(input: &str) -> Result<std::time::Duration> {
    let interval = humantime::parse_duration(input.trim())
        .with_context(|| format!("Could not parse interval: \"{}\"", input))?;
    if interval.is_zero() {
        anyhow::bail!("The watch interval must be longer than zero");
    }
    Ok(interval)
}

/// Resolve the end of an event from `--end` / `--duration`, defaulting to one hour.
pub fn resolve_end(
    start: DateTime<Utc>,
    end: Option<&str>,
    duration: Option<&str>,
    tz: Tz,
) -> Result<DateTime<Utc>> {
    match (end, duration) {
        (Some(end), _) => parse_end(end, start, tz),
        (None, Some(duration)) => Ok(start
            + parse_duration(duration)
                .with_context(|| format!("Could not parse duration: \"{}\"", duration))?),
        (None, None) => Ok(start + Duration::hours(1)),
    }
}

/// Expand common abbreviations that fuzzydate doesn't handle.
fn expand_abbreviations(input: &str) -> String {
    let abbrevs = [
        ("mon", "monday"),
        ("tue", "tuesday"),
        ("tues", "tuesday"),
        ("wed", "wednesday"),
        ("thu", "thursday"),
        ("thur", "thursday"),
        ("thurs", "thursday"),
        ("fri", "friday"),
        ("sat", "saturday"),
        ("sun", "sunday"),
        ("jan", "january"),
        ("feb", "february"),
        ("mar", "march"),
        ("apr", "april"),
        ("jun", "june"),
        ("jul", "july"),
        ("aug", "august"),
        ("sep", "september"),
        ("sept", "september"),
        ("oct", "october"),
        ("nov", "november"),
        ("dec", "december"),
    ];

    input
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            abbrevs
                .iter()
                .find(|(abbr, _)| *abbr == word)
                .map(|(_, full)| *full)
                .unwrap_or(word)
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::America::Chicago;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    // --- parse_datetime ---

    #[test]
    fn rfc3339_keeps_its_offset() {
        let dt = parse_datetime("2024-01-02T18:00:00-06:00", Tz::UTC).unwrap();
        assert_eq!(dt, utc(2024, 1, 3, 0, 0));
    }

    #[test]
    fn local_format_uses_configured_zone() {
        assert_eq!(
            parse_datetime("2024-01-02T18:00", Chicago).unwrap(),
            utc(2024, 1, 3, 0, 0)
        );
        assert_eq!(
            parse_datetime("2024-07-02 18:00", Chicago).unwrap(),
            utc(2024, 7, 2, 23, 0)
        );
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // Chicago springs forward at 02:00 on 2024-03-10
        assert!(parse_datetime("2024-03-10T02:30", Chicago).is_err());
    }

    #[test]
    fn natural_language_with_time() {
        let dt = parse_datetime("tomorrow 3pm", Tz::UTC).unwrap();
        assert_eq!(dt.hour(), 15);
    }

    #[test]
    fn invalid_input_is_an_error() {
        assert!(parse_datetime("not a date at all xyz", Tz::UTC).is_err());
    }

    // --- expand_abbreviations ---

    #[test]
    fn expand_day_abbreviations() {
        assert_eq!(expand_abbreviations("sat 3pm"), "saturday 3pm");
        assert_eq!(expand_abbreviations("Sun 10am"), "sunday 10am");
        assert_eq!(expand_abbreviations("tues 10am"), "tuesday 10am");
    }

    #[test]
    fn expand_month_abbreviations() {
        assert_eq!(expand_abbreviations("sept 5"), "september 5");
        assert_eq!(expand_abbreviations("jan 20"), "january 20");
    }

    #[test]
    fn expand_preserves_non_abbreviations() {
        assert_eq!(expand_abbreviations("next friday"), "next friday");
    }

    // --- end and duration ---

    #[test]
    fn end_as_duration() {
        let start = utc(2024, 1, 2, 18, 0);
        assert_eq!(parse_end("90m", start, Tz::UTC).unwrap(), utc(2024, 1, 2, 19, 30));
    }

    #[test]
    fn end_as_datetime() {
        let start = utc(2024, 1, 2, 18, 0);
        assert_eq!(
            parse_end("until 2024-01-02T20:00", start, Tz::UTC).unwrap(),
            utc(2024, 1, 2, 20, 0)
        );
    }

    #[test]
    fn end_defaults_to_one_hour() {
        let start = utc(2024, 1, 2, 18, 0);
        assert_eq!(resolve_end(start, None, None, Tz::UTC).unwrap(), utc(2024, 1, 2, 19, 0));
        assert_eq!(
            resolve_end(start, None, Some("2hours"), Tz::UTC).unwrap(),
            utc(2024, 1, 2, 20, 0)
        );
        assert!(resolve_end(start, None, Some("soon"), Tz::UTC).is_err());
    }

    #[test]
    fn interval_must_be_positive() {
        assert_eq!(parse_interval("15m").unwrap(), std::time::Duration::from_secs(900));
        assert!(parse_interval("0s").is_err());
        assert!(parse_interval("often").is_err());
    }
}
