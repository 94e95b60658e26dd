// src/query/dates.rs
//
// Date expression resolution for the date filters
//
// Accepted inputs:
// - absolute: "YYYY-MM-DD HH:MM:SS", "YYYY-MM-DD HH:MM", "YYYY-MM-DD", RFC 3339
// - relative: "now", "today", "yesterday", "tomorrow", or one or more
//   "[+-]N unit" terms ("-1 week", "+2 days 3 hours", "3 hours ago")
//
// Absolute inputs without an offset are taken to already be in the zone of
// the column being filtered (site-local for `date`, UTC for `date_gmt`).
// RFC 3339 inputs carry their own offset and are converted.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;

use super::clause::DateColumn;
use crate::error::{AppError, AppResult};

pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Time reference used to resolve relative expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FilterContext {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// "Now" as seen by the given column
    pub fn now_in(&self, column: DateColumn) -> NaiveDateTime {
        match column {
            DateColumn::Local => self.now.with_timezone(&self.offset).naive_local(),
            DateColumn::Gmt => self.now.naive_utc(),
        }
    }
}

/// Resolves `expression` to a timestamp in the zone of `column`
pub fn resolve_date_expression(
    expression: &str,
    column: DateColumn,
    ctx: &FilterContext,
) -> AppResult<NaiveDateTime> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(AppError::DateParse("empty date expression".to_string()));
    }

    if let Some(absolute) = parse_absolute(trimmed, column, ctx) {
        return Ok(absolute);
    }

    resolve_relative(trimmed, column, ctx)
}

fn parse_absolute(input: &str, column: DateColumn, ctx: &FilterContext) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(input) {
        return Some(match column {
            DateColumn::Local => with_offset.with_timezone(&ctx.offset).naive_local(),
            DateColumn::Gmt => with_offset.naive_utc(),
        });
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(|day| day.and_time(NaiveTime::MIN))
}

fn relative_term_regex() -> Option<&'static Regex> {
    static TERM: OnceLock<Option<Regex>> = OnceLock::new();
    TERM.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*([+-]?)\s*(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|days?|weeks?|months?|years?)\b",
        )
        .ok()
    })
    .as_ref()
}

fn resolve_relative(input: &str, column: DateColumn, ctx: &FilterContext) -> AppResult<NaiveDateTime> {
    let now = ctx.now_in(column);
    let midnight = now.date().and_time(NaiveTime::MIN);

    match input.to_ascii_lowercase().as_str() {
        "now" => return Ok(now),
        "today" | "midnight" => return Ok(midnight),
        "yesterday" => return Ok(midnight - Duration::days(1)),
        "tomorrow" => return Ok(midnight + Duration::days(1)),
        _ => {}
    }

    let unparsable = || AppError::DateParse(format!("unrecognized date expression '{}'", input));

    let lowered = input.to_ascii_lowercase();
    let (body, ago) = match lowered.trim_end().strip_suffix("ago") {
        Some(rest) => (rest.to_string(), true),
        None => (lowered.clone(), false),
    };

    let term = relative_term_regex()
        .ok_or_else(|| AppError::DateParse("relative date pattern failed to build".to_string()))?;
    let mut rest = body.as_str();
    let mut resolved = now;
    let mut terms = 0;

    while !rest.trim().is_empty() {
        let captures = term.captures(rest).ok_or_else(unparsable)?;
        let whole = captures.get(0).ok_or_else(unparsable)?;

        let negative = captures.get(1).map(|m| m.as_str() == "-").unwrap_or(false) ^ ago;
        let amount: i64 = captures[2].parse().map_err(|_| unparsable())?;
        let unit = &captures[3];

        resolved = shift(resolved, amount, unit, negative).ok_or_else(unparsable)?;
        rest = &rest[whole.end()..];
        terms += 1;
    }

    if terms == 0 {
        return Err(unparsable());
    }
    Ok(resolved)
}

fn shift(at: NaiveDateTime, amount: i64, unit: &str, negative: bool) -> Option<NaiveDateTime> {
    let signed = if negative { -amount } else { amount };
    let unit = unit.trim_end_matches('s');
    match unit {
        "sec" | "second" => at.checked_add_signed(Duration::try_seconds(signed)?),
        "min" | "minute" => at.checked_add_signed(Duration::try_minutes(signed)?),
        "hour" => at.checked_add_signed(Duration::try_hours(signed)?),
        "day" => at.checked_add_signed(Duration::try_days(signed)?),
        "week" => at.checked_add_signed(Duration::try_weeks(signed)?),
        "month" | "year" => {
            let months = if unit == "year" { amount.checked_mul(12)? } else { amount };
            let months = Months::new(u32::try_from(months).ok()?);
            if negative {
                at.checked_sub_months(months)
            } else {
                at.checked_add_months(months)
            }
        }
        _ => None,
    }
}

/// Formats a timestamp the way stores keep them
pub fn format_storage(at: &NaiveDateTime) -> String {
    at.format(STORAGE_FORMAT).to_string()
}
