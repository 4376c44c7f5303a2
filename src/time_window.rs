//! Time-window parsing: turn `--since` / `--till` expressions into instants.
//!
//! Two grammars are accepted, and exactly one must match the whole string:
//!
//! | Form | Example | Meaning |
//! |------|---------|---------|
//! | `[L:]N{d\|h\|m\|s}` | `2:3d` | `now - (L×carry + N) units` |
//! | `yyyy-MM-ddThh:mm:ss` | `1977-03-12T07:00:01` | local date-time in the given zone |
//!
//! The carry factor multiplies the optional leading count: 7 for days (so
//! `2:3d` is two weeks and three days), 24 for hours, 60 for minutes and
//! seconds.
//!
//! Relative expressions are anchored to a [`Clock`] so tests can pin "now".

use crate::error::TimeExprError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    // ASCII-only classes: `\d` and `\s` would also accept Unicode digits and spaces.
    Regex::new(
        r"^(?:((?:([0-9]+):)?([0-9]+)[ \t\n\x0B\f\r]*([dhms]))|(([0-9]+)-([0-9]+)-([0-9]+)T([0-9]+):([0-9]+):([0-9]+)))$",
    )
        .expect("time expression pattern is valid")
});

/// Digit counts of year, month, day, hour, minute and second in a literal.
const DATE_TIME_WIDTHS: [usize; 6] = [4, 2, 2, 2, 2, 2];

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Unit of a relative expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl Unit {
    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "d" => Some(Unit::Days),
            "h" => Some(Unit::Hours),
            "m" => Some(Unit::Minutes),
            "s" => Some(Unit::Seconds),
            _ => None,
        }
    }

    /// Factor applied to the leading count before adding the main count.
    fn carry(self) -> i64 {
        match self {
            Unit::Days => 7,
            Unit::Hours => 24,
            Unit::Minutes | Unit::Seconds => 60,
        }
    }

    fn delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            Unit::Days => TimeDelta::try_days(amount),
            Unit::Hours => TimeDelta::try_hours(amount),
            Unit::Minutes => TimeDelta::try_minutes(amount),
            Unit::Seconds => TimeDelta::try_seconds(amount),
        }
    }
}

/// Resolves time expressions against a clock.
pub struct TimeWindowParser<C: Clock = SystemClock> {
    clock: C,
}

impl Default for TimeWindowParser<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> TimeWindowParser<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Resolve `expression` to an absolute instant.
    ///
    /// Absolute literals are interpreted in `zone`; relative expressions are
    /// subtracted from the clock's current instant and do not depend on it.
    ///
    /// # Errors
    /// [`TimeExprError::Invalid`] when neither grammar matches, a number
    /// overflows, or the literal is not a real calendar date-time.
    pub fn resolve<Tz: TimeZone>(
        &self,
        expression: &str,
        zone: &Tz,
    ) -> Result<DateTime<Utc>, TimeExprError> {
        let caps = TIME_EXPRESSION.captures(expression).ok_or_else(|| {
            TimeExprError::invalid(expression, "matches neither [N:]N{d|h|m|s} nor a date-time")
        })?;

        if caps.get(1).is_some() {
            let leading = match caps.get(2) {
                Some(m) => parse_number(expression, m.as_str())?,
                None => 0,
            };
            let number = parse_number(expression, &caps[3])?;
            let unit = Unit::from_suffix(&caps[4])
                .ok_or_else(|| TimeExprError::invalid(expression, "unknown unit"))?;
            self.relative(expression, leading, number, unit)
        } else {
            let widths_ok = DATE_TIME_WIDTHS
                .iter()
                .enumerate()
                .all(|(i, width)| caps[i + 6].len() == *width);
            if !widths_ok {
                return Err(TimeExprError::invalid(
                    expression,
                    "expected yyyy-MM-ddThh:mm:ss",
                ));
            }
            let field = |i: usize| parse_number(expression, &caps[i]);
            let naive = local_date_time(
                expression,
                [field(6)?, field(7)?, field(8)?, field(9)?, field(10)?, field(11)?],
            )?;
            to_instant(expression, &naive, zone)
        }
    }

    fn relative(
        &self,
        expression: &str,
        leading: i64,
        number: i64,
        unit: Unit,
    ) -> Result<DateTime<Utc>, TimeExprError> {
        let overflow = || TimeExprError::invalid(expression, "value is out of range");
        let total = leading
            .checked_mul(unit.carry())
            .and_then(|v| v.checked_add(number))
            .ok_or_else(overflow)?;
        let delta = unit.delta(total).ok_or_else(overflow)?;
        self.clock
            .now()
            .checked_sub_signed(delta)
            .ok_or_else(overflow)
    }
}

fn parse_number(expression: &str, digits: &str) -> Result<i64, TimeExprError> {
    digits
        .parse::<i64>()
        .map_err(|e| TimeExprError::invalid(expression, format!("bad number '{digits}': {e}")))
}

fn local_date_time(expression: &str, parts: [i64; 6]) -> Result<NaiveDateTime, TimeExprError> {
    let [year, month, day, hour, minute, second] = parts;
    let narrow = |v: i64| u32::try_from(v).ok();

    let date = i32::try_from(year)
        .ok()
        .zip(narrow(month))
        .zip(narrow(day))
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| TimeExprError::invalid(expression, "not a valid calendar date"))?;
    let time = narrow(hour)
        .zip(narrow(minute))
        .zip(narrow(second))
        .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s))
        .ok_or_else(|| TimeExprError::invalid(expression, "not a valid time of day"))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Map a local date-time to an instant.
///
/// A time repeated by a DST fold takes the earlier offset. A time skipped by
/// a DST gap is moved later by the gap length, i.e. read with the offset in
/// effect before the transition.
fn to_instant<Tz: TimeZone>(
    expression: &str,
    naive: &NaiveDateTime,
    zone: &Tz,
) -> Result<DateTime<Utc>, TimeExprError> {
    if let Some(dt) = zone.from_local_datetime(naive).earliest() {
        return Ok(dt.with_timezone(&Utc));
    }

    let unmappable = || TimeExprError::invalid(expression, "local time does not exist in zone");
    let before = naive
        .checked_sub_signed(TimeDelta::days(1))
        .ok_or_else(unmappable)?;
    let offset = zone
        .offset_from_local_datetime(&before)
        .earliest()
        .ok_or_else(unmappable)?
        .fix();
    let utc = naive
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
        .ok_or_else(unmappable)?;
    Ok(Utc.from_utc_datetime(&utc))
}

/// Half-open `[since, till)` filter on modification time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub till: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(since: Option<DateTime<Utc>>, till: Option<DateTime<Utc>>) -> Self {
        Self { since, till }
    }

    /// Resolve optional `--since` / `--till` expressions into a window.
    pub fn resolve<C: Clock, Tz: TimeZone>(
        parser: &TimeWindowParser<C>,
        since: Option<&str>,
        till: Option<&str>,
        zone: &Tz,
    ) -> Result<Self, TimeExprError> {
        Ok(Self {
            since: since.map(|s| parser.resolve(s, zone)).transpose()?,
            till: till.map(|s| parser.resolve(s, zone)).transpose()?,
        })
    }

    /// True when `instant` is inside the window.
    ///
    /// An unset `since` admits everything before `till`; an unset `till` is
    /// open-ended.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| instant >= since)
            && self.till.map_or(true, |till| instant < till)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn parser() -> TimeWindowParser<FixedClock> {
        let now = Utc.with_ymd_and_hms(1977, 3, 12, 6, 0, 0).unwrap();
        TimeWindowParser::new(FixedClock(now))
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn relative_days() {
        assert_eq!(parser().resolve("1d", &Utc).unwrap(), utc(1977, 3, 11, 6, 0, 0));
    }

    #[test]
    fn relative_hours() {
        assert_eq!(parser().resolve("1h", &Utc).unwrap(), utc(1977, 3, 12, 5, 0, 0));
    }

    #[test]
    fn relative_minutes() {
        assert_eq!(parser().resolve("60m", &Utc).unwrap(), utc(1977, 3, 12, 5, 0, 0));
    }

    #[test]
    fn relative_seconds() {
        assert_eq!(parser().resolve("2s", &Utc).unwrap(), utc(1977, 3, 12, 5, 59, 58));
    }

    #[test]
    fn leading_count_uses_carry_factor() {
        let p = parser();
        // 1 week + 1 day
        assert_eq!(p.resolve("1:1d", &Utc).unwrap(), utc(1977, 3, 4, 6, 0, 0));
        // 1 day + 2 hours
        assert_eq!(p.resolve("1:2h", &Utc).unwrap(), utc(1977, 3, 11, 4, 0, 0));
        // 1 hour + 30 minutes
        assert_eq!(p.resolve("1:30m", &Utc).unwrap(), utc(1977, 3, 12, 4, 30, 0));
        // 2 minutes + 5 seconds
        assert_eq!(p.resolve("2:5s", &Utc).unwrap(), utc(1977, 3, 12, 5, 57, 55));
    }

    #[test]
    fn whitespace_before_unit_is_allowed() {
        assert_eq!(parser().resolve("3 h", &Utc).unwrap(), utc(1977, 3, 12, 3, 0, 0));
        assert_eq!(parser().resolve("3\th", &Utc).unwrap(), utc(1977, 3, 12, 3, 0, 0));
    }

    #[test]
    fn relative_ignores_zone() {
        let zone = FixedOffset::east_opt(5 * 3600).unwrap();
        assert_eq!(parser().resolve("1h", &zone).unwrap(), utc(1977, 3, 12, 5, 0, 0));
    }

    #[test]
    fn absolute_utc() {
        assert_eq!(
            parser().resolve("1977-03-12T07:00:01", &Utc).unwrap(),
            utc(1977, 3, 12, 7, 0, 1)
        );
    }

    #[test]
    fn absolute_uses_zone_offset() {
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            parser().resolve("1977-03-12T07:00:01", &zone).unwrap(),
            utc(1977, 3, 12, 5, 0, 1)
        );
    }

    #[test]
    fn malformed_expressions_fail() {
        let p = parser();
        for bad in [
            "abc",
            "5x",
            "",
            "1:d",
            "d",
            "-1d",
            "1977-03-12",
            "1977-03-12 07:00:01",
            "1dd",
            "24-03-12T07:00:01",
            "1977-3-12T7:0:1",
            "0001977-03-12T07:00:01",
            "1977-03-12T07:00:001",
            "3\u{a0}h",
            "3\u{2003}h",
            "\u{661}d",
        ] {
            assert!(
                matches!(p.resolve(bad, &Utc), Err(TimeExprError::Invalid { .. })),
                "expected failure for {bad:?}"
            );
        }
    }

    #[test]
    fn invalid_calendar_values_fail() {
        let p = parser();
        assert!(p.resolve("1977-13-12T07:00:01", &Utc).is_err());
        assert!(p.resolve("1977-02-30T07:00:01", &Utc).is_err());
        assert!(p.resolve("1977-03-12T25:00:01", &Utc).is_err());
    }

    #[test]
    fn overflow_fails() {
        let p = parser();
        assert!(p.resolve("99999999999999999999d", &Utc).is_err());
        assert!(p.resolve("9223372036854775807:1d", &Utc).is_err());
        assert!(p.resolve("9999999999999d", &Utc).is_err());
    }

    #[test]
    fn window_contains_is_half_open() {
        let since = utc(2024, 1, 1, 0, 0, 0);
        let till = utc(2024, 1, 2, 0, 0, 0);
        let w = TimeWindow::new(Some(since), Some(till));
        assert!(w.contains(since));
        assert!(w.contains(utc(2024, 1, 1, 12, 0, 0)));
        assert!(!w.contains(till));
        assert!(!w.contains(utc(2023, 12, 31, 23, 59, 59)));

        let open = TimeWindow::new(Some(since), None);
        assert!(open.contains(utc(2099, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn window_resolve_both_bounds() {
        let w = TimeWindow::resolve(&parser(), Some("2h"), Some("1h"), &Utc).unwrap();
        assert_eq!(w.since, Some(utc(1977, 3, 12, 4, 0, 0)));
        assert_eq!(w.till, Some(utc(1977, 3, 12, 5, 0, 0)));
    }

    #[test]
    fn window_resolve_propagates_errors() {
        assert!(TimeWindow::resolve(&parser(), Some("1d"), Some("bogus"), &Utc).is_err());
    }
}
