//! Serialization of legacy series patterns.
//!
//! The inverse of [`crate::parse`]: fields are emitted in the fixed order
//! `t,i,a,b,c,o,e,s`, absent fields omitted, always prefixed with the
//! absolute duration and the `~` separator.

use kagami_core::constants::DURATION_SEPARATOR;
use kagami_core::types::Period;

use crate::error::PatternResult;
use crate::recur::{RecurrenceRule, absolute_duration_days};
use crate::series::{SeriesEnd, SeriesPattern};

/// ## Summary
/// Serializes a pattern into the stored legacy column value, including the
/// absolute-duration prefix.
#[must_use]
pub fn encode(pattern: &SeriesPattern, absolute_duration_days: i64) -> String {
    format!(
        "{absolute_duration_days}{DURATION_SEPARATOR}{}",
        build_pattern(pattern)
    )
}

/// ## Summary
/// Serializes a pattern body (the part after the `~` separator).
#[must_use]
pub fn build_pattern(pattern: &SeriesPattern) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(8);
    parts.push(format!("t|{}", pattern.kind.code()));
    parts.push(format!("i|{}", pattern.interval));

    if !pattern.weekdays.is_empty() {
        parts.push(format!("a|{}", pattern.weekdays.bits()));
    }
    if let Some(day) = pattern.day_of_month {
        parts.push(format!("b|{day}"));
    }
    if let Some(ordinal) = pattern.ordinal {
        parts.push(format!("b|{ordinal}"));
    }
    if let Some(month) = pattern.month {
        parts.push(format!("c|{month}"));
    }

    match pattern.end {
        SeriesEnd::Never => {}
        SeriesEnd::Count(count) => parts.push(format!("o|{count}")),
        SeriesEnd::Until(until) => parts.push(format!("e|{}", until.timestamp_millis())),
    }

    if let Some(start) = pattern.series_start {
        parts.push(format!("s|{}", start.timestamp_millis()));
    }

    parts.join("|")
}

/// ## Summary
/// Encodes a modern recurrence rule into the legacy column value, deriving
/// the absolute duration from the first occurrence's period.
///
/// ## Errors
/// Returns an error if the rule uses features the legacy grammar cannot
/// represent.
pub fn encode_rule(
    rule: &RecurrenceRule,
    first_occurrence: &Period,
) -> PatternResult<(String, i64)> {
    let pattern = SeriesPattern::from_recurrence(rule)?;
    let duration_days = absolute_duration_days(first_occurrence);
    let stored = encode(&pattern, duration_days);
    tracing::trace!(stored = %stored, "Encoded legacy pattern");
    Ok((stored, duration_days))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc, Weekday};

    use super::*;
    use crate::parse::{decode, parse_pattern};
    use crate::series::{PatternKind, WeekdayMask};

    fn sample_patterns() -> Vec<SeriesPattern> {
        let until = Utc.with_ymd_and_hms(2027, 6, 30, 12, 0, 0).unwrap();
        vec![
            SeriesPattern::daily(1),
            SeriesPattern {
                end: SeriesEnd::Until(until),
                ..SeriesPattern::daily(4)
            },
            SeriesPattern {
                kind: PatternKind::Weekly,
                weekdays: WeekdayMask::EMPTY.with(Weekday::Tue).with(Weekday::Thu),
                end: SeriesEnd::Count(26),
                ..SeriesPattern::daily(2)
            },
            SeriesPattern {
                kind: PatternKind::MonthlyDate,
                day_of_month: Some(15),
                ..SeriesPattern::daily(1)
            },
            SeriesPattern {
                kind: PatternKind::MonthlyWeekday,
                weekdays: WeekdayMask::EMPTY.with(Weekday::Fri),
                ordinal: Some(5),
                ..SeriesPattern::daily(3)
            },
            SeriesPattern {
                kind: PatternKind::YearlyDate,
                day_of_month: Some(24),
                month: Some(12),
                ..SeriesPattern::daily(1)
            },
            SeriesPattern {
                kind: PatternKind::YearlyWeekday,
                weekdays: WeekdayMask::EMPTY.with(Weekday::Mon),
                ordinal: Some(1),
                month: Some(9),
                ..SeriesPattern::daily(1)
            },
        ]
    }

    #[test]
    fn build_then_parse_round_trips() {
        for pattern in sample_patterns() {
            let body = build_pattern(&pattern);
            let reparsed = parse_pattern(&body)
                .unwrap_or_else(|err| panic!("{body} failed to reparse: {err}"));
            assert_eq!(reparsed, pattern, "round trip of {body}");
        }
    }

    #[test]
    fn encode_prefixes_duration() {
        let stored = encode(&SeriesPattern::daily(1), 2);
        assert!(stored.starts_with("2~"));
        let (pattern, duration) = decode(&stored).unwrap();
        assert_eq!(duration, 2);
        assert_eq!(pattern, SeriesPattern::daily(1));
    }

    #[test]
    fn series_start_survives_round_trip() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let pattern = SeriesPattern {
            series_start: Some(start),
            ..SeriesPattern::daily(1)
        };
        let (reparsed, _) = decode(&encode(&pattern, 0)).unwrap();
        assert_eq!(reparsed.series_start, Some(start));
    }
}
