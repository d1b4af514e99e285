//! Recurrence arithmetic for repeating events.
//!
//! Calendar math happens on local wall-clock time in whatever zone the input
//! carries, so a 09:00 service stays at 09:00 across DST changes. Nothing
//! here does I/O or panics.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Weekday};

use crate::event::RecurrenceType;

/// The occurrence that follows `after` under `rule`.
///
/// Returns `None` for [`RecurrenceType::None`], or if the result would fall
/// outside chrono's representable range. For every other rule the result is
/// strictly later than `after`.
pub fn next_occurrence<Tz: TimeZone>(
    after: &DateTime<Tz>,
    rule: RecurrenceType,
) -> Option<DateTime<Tz>> {
    let local = after.naive_local();

    let next_local = match rule {
        RecurrenceType::None => return None,
        RecurrenceType::Weekly => local.checked_add_signed(Duration::days(7))?,
        RecurrenceType::Biweekly => local.checked_add_signed(Duration::days(14))?,
        // chrono clamps to the last day of a shorter month
        RecurrenceType::Monthly => local.checked_add_months(Months::new(1))?,
        RecurrenceType::FirstTuesdayOfMonth => {
            let this_month = first_tuesday(local.year(), local.month())?.and_time(local.time());
            if this_month > local {
                this_month
            } else {
                let (year, month) = following_month(local.year(), local.month());
                first_tuesday(year, month)?.and_time(local.time())
            }
        }
    };

    Some(resolve_local(after, next_local))
}

/// Occurrences of a series anchored at `start`, restricted to `[from, until)`.
///
/// The chain is `start, next(start), next(next(start)), ...`; entries before
/// `from` are skipped but still advance the chain, so dates stay on the
/// series' own schedule.
pub fn occurrences<Tz: TimeZone>(
    start: DateTime<Tz>,
    rule: RecurrenceType,
    from: DateTime<Tz>,
    until: DateTime<Tz>,
) -> Occurrences<Tz> {
    Occurrences {
        next: Some(start),
        rule,
        from,
        until,
    }
}

/// Iterator returned by [`occurrences`].
#[derive(Debug, Clone)]
pub struct Occurrences<Tz: TimeZone> {
    next: Option<DateTime<Tz>>,
    rule: RecurrenceType,
    from: DateTime<Tz>,
    until: DateTime<Tz>,
}

impl<Tz: TimeZone> Iterator for Occurrences<Tz> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let current = self.next.take()?;
            if current >= self.until {
                return None;
            }

            self.next = next_occurrence(&current, self.rule);

            if current >= self.from {
                return Some(current);
            }
        }
    }
}

fn first_tuesday(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Tue, 1)
}

fn following_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 { (year + 1, 1) } else { (year, month + 1) }
}

/// Map a local wall-clock time back into `after`'s zone.
///
/// Times inside a DST gap have no mapping; those fall back to adding the
/// same wall-clock delta as a fixed duration, which still moves forward.
fn resolve_local<Tz: TimeZone>(after: &DateTime<Tz>, local: NaiveDateTime) -> DateTime<Tz> {
    match after.timezone().from_local_datetime(&local).earliest() {
        Some(resolved) if resolved > *after => resolved,
        _ => after.clone() + (local - after.naive_local()),
    }
}
