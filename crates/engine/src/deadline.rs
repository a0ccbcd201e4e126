use std::sync::OnceLock;

use regex::Regex;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, macros::time};

const DEADLINE_TIME: Time = time!(23:59:59);
const WEEK_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Parse a spreadsheet deadline cell.
///
/// Dates are day-first (`08.03`, `08.03.2024`, `8/3/24`) or ISO (`2024-03-08`). A missing
/// year is taken from `current_year`. The deadline is the end of that day in `offset`.
pub fn parse_deadline(raw: &str, current_year: i32, offset: UtcOffset) -> Option<OffsetDateTime> {
    static DAY_FIRST: OnceLock<Regex> = OnceLock::new();
    static ISO: OnceLock<Regex> = OnceLock::new();
    let raw = raw.trim();
    let caps = ISO
        .get_or_init(|| {
            Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})$").unwrap()
        })
        .captures(raw)
        .or_else(|| {
            DAY_FIRST
                .get_or_init(|| {
                    Regex::new(
                        r"^(?P<day>\d{1,2})[./-](?P<month>\d{1,2})(?:[./-](?P<year>\d{4}|\d{2}))?$",
                    )
                    .unwrap()
                })
                .captures(raw)
        })?;
    let day: u8 = caps["day"].parse().ok()?;
    let month: u8 = caps["month"].parse().ok()?;
    let year = match caps.name("year") {
        Some(m) if m.len() == 2 => 2000 + m.as_str().parse::<i32>().ok()?,
        Some(m) => m.as_str().parse().ok()?,
        None => current_year,
    };
    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    Some(PrimitiveDateTime::new(date, DEADLINE_TIME).assume_offset(offset))
}

/// Late penalty: one point per started week after `deadline`, capped at `max_penalty`.
pub fn compute_penalty(
    completed_at: OffsetDateTime,
    deadline: OffsetDateTime,
    max_penalty: u32,
) -> u32 {
    if completed_at <= deadline {
        return 0;
    }
    let overdue = (completed_at - deadline).whole_seconds();
    let weeks = (overdue + WEEK_SECONDS - 1) / WEEK_SECONDS;
    u32::try_from(weeks).unwrap_or(u32::MAX).min(max_penalty)
}
