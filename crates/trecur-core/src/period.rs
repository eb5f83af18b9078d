//! Taskwarrior duration expressions (`3d`, `1w`, `weekly`, `P1M`, ...) and the
//! calendar arithmetic that shifts task dates by them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Duration, Months, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::timezone::resolve_local;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsePeriodError {
    #[error("Invalid duration: '{0}'")]
    Invalid(String),
    #[error("Recurrence period must be positive: '{0}'")]
    NotPositive(String),
}

/// A signed calendar span.
///
/// Months and days are applied on the local wall clock so that "1mo" lands on
/// the same day of the month and "1d" keeps the time of day across DST changes.
/// Seconds are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub months: i32,
    pub days: i32,
    pub seconds: i64,
}

impl Span {
    pub const fn new(months: i32, days: i32, seconds: i64) -> Self {
        Self { months, days, seconds }
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self { months: 0, days: 0, seconds }
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.seconds == 0
    }

    /// True when no component is negative and at least one is positive.
    pub fn is_positive(&self) -> bool {
        self.months >= 0 && self.days >= 0 && self.seconds >= 0 && !self.is_zero()
    }

    pub fn negate(self) -> Self {
        Self::new(-self.months, -self.days, -self.seconds)
    }

    pub fn checked_add(self, other: Span) -> Option<Span> {
        Some(Span::new(
            self.months.checked_add(other.months)?,
            self.days.checked_add(other.days)?,
            self.seconds.checked_add(other.seconds)?,
        ))
    }

    /// Scales every component by `n`.
    pub fn times(self, n: u32) -> Option<Span> {
        let n32 = i32::try_from(n).ok()?;
        Some(Span::new(
            self.months.checked_mul(n32)?,
            self.days.checked_mul(n32)?,
            self.seconds.checked_mul(i64::from(n))?,
        ))
    }

    /// Shifts `instant` by this span, interpreting months and days in `tz`.
    pub fn add_to(&self, instant: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        let shifted = if self.months == 0 && self.days == 0 {
            instant
        } else {
            let mut local = instant.with_timezone(tz).naive_local();
            if self.months > 0 {
                local = local.checked_add_months(Months::new(self.months.unsigned_abs()))?;
            } else if self.months < 0 {
                local = local.checked_sub_months(Months::new(self.months.unsigned_abs()))?;
            }
            if self.days > 0 {
                local = local.checked_add_days(Days::new(u64::from(self.days.unsigned_abs())))?;
            } else if self.days < 0 {
                local = local.checked_sub_days(Days::new(u64::from(self.days.unsigned_abs())))?;
            }
            resolve_local(tz, local)?
        };
        shifted.checked_add_signed(Duration::seconds(self.seconds))
    }
}

/// Parses the text of a duration into a [`Span`] without enforcing a sign.
pub fn parse_span(text: &str) -> Result<Span, ParsePeriodError> {
    let trimmed = text.trim();
    let invalid = || ParsePeriodError::Invalid(text.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    if trimmed.starts_with(['P', 'p']) && trimmed.len() > 1 {
        return parse_iso(&trimmed[1..]).ok_or_else(invalid);
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(span) = named_period(&lower) {
        return Ok(span);
    }

    let split = lower
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (number, unit) = lower.split_at(split);
    let unit = unit.trim();

    if number.is_empty() {
        return unit_span(unit, 1).ok_or_else(invalid);
    }
    if let Ok(count) = number.parse::<i64>() {
        return unit_span(unit, count).ok_or_else(invalid);
    }

    // Fractional counts are only meaningful for fixed-length units.
    let count: f64 = number.parse().map_err(|_| invalid())?;
    let unit_seconds = match unit_span(unit, 1).ok_or_else(invalid)? {
        Span { months: 0, days, seconds } => i64::from(days) * 86_400 + seconds,
        _ => return Err(invalid()),
    };
    Ok(Span::from_seconds((count * unit_seconds as f64).round() as i64))
}

fn named_period(word: &str) -> Option<Span> {
    let span = match word {
        "hourly" => Span::from_seconds(3_600),
        "daily" => Span::new(0, 1, 0),
        "weekly" => Span::new(0, 7, 0),
        "biweekly" | "fortnight" => Span::new(0, 14, 0),
        "monthly" => Span::new(1, 0, 0),
        "bimonthly" => Span::new(2, 0, 0),
        "quarterly" => Span::new(3, 0, 0),
        "semiannual" | "biannual" => Span::new(6, 0, 0),
        "annual" | "yearly" => Span::new(12, 0, 0),
        _ => return None,
    };
    Some(span)
}

fn unit_span(unit: &str, count: i64) -> Option<Span> {
    let count32 = i32::try_from(count).ok();
    let span = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Span::from_seconds(count),
        "min" | "mins" | "minute" | "minutes" => Span::from_seconds(count.checked_mul(60)?),
        "h" | "hr" | "hrs" | "hour" | "hours" => Span::from_seconds(count.checked_mul(3_600)?),
        "d" | "day" | "days" => Span::new(0, count32?, 0),
        "w" | "wk" | "wks" | "week" | "weeks" => Span::new(0, count32?.checked_mul(7)?, 0),
        "mo" | "mos" | "mth" | "mths" | "month" | "months" => Span::new(count32?, 0, 0),
        "q" | "qtr" | "qtrs" | "quarter" | "quarters" => Span::new(count32?.checked_mul(3)?, 0, 0),
        "y" | "yr" | "yrs" | "year" | "years" => Span::new(count32?.checked_mul(12)?, 0, 0),
        _ => return None,
    };
    Some(span)
}

/// ISO-8601 duration body, after the leading `P`.
fn parse_iso(body: &str) -> Option<Span> {
    let mut span = Span::default();
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for c in body.chars().map(|c| c.to_ascii_uppercase()) {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c == 'T' {
            if in_time || !digits.is_empty() {
                return None;
            }
            in_time = true;
            continue;
        }
        let n: i64 = digits.parse().ok()?;
        digits.clear();
        let n32 = i32::try_from(n).ok()?;
        let part = match (in_time, c) {
            (false, 'Y') => Span::new(n32.checked_mul(12)?, 0, 0),
            (false, 'M') => Span::new(n32, 0, 0),
            (false, 'W') => Span::new(0, n32.checked_mul(7)?, 0),
            (false, 'D') => Span::new(0, n32, 0),
            (true, 'H') => Span::from_seconds(n.checked_mul(3_600)?),
            (true, 'M') => Span::from_seconds(n.checked_mul(60)?),
            (true, 'S') => Span::from_seconds(n),
            _ => return None,
        };
        span = span.checked_add(part)?;
        seen_component = true;
    }

    (digits.is_empty() && seen_component).then_some(span)
}

/// A recurrence period as written on a task (`r:3d`).
///
/// Keeps the user's original text so the record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    raw: String,
    span: Span,
}

impl Period {
    pub fn span(&self) -> Span {
        self.span
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `instant + self`.
    pub fn add_to(&self, instant: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        self.span.add_to(instant, tz)
    }

    pub fn times(&self, n: u32) -> Option<Span> {
        self.span.times(n)
    }

    /// `anchor + self × n`, computed in one step so month-end clamping never drifts.
    pub fn nth_after(&self, anchor: DateTime<Utc>, n: u32, tz: &Tz) -> Option<DateTime<Utc>> {
        self.times(n)?.add_to(anchor, tz)
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let span = parse_span(s)?;
        if !span.is_positive() {
            return Err(ParsePeriodError::NotPositive(s.to_string()));
        }
        Ok(Period { raw: s.trim().to_string(), span })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
