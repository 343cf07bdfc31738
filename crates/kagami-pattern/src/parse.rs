//! Parser for the legacy series-pattern column.
//!
//! The stored value has the shape `"<absoluteDurationDays>~<body>"`; the body
//! is a `|`-separated list of single-letter keys, each followed by its value.
//! Unknown keys are ignored: four generations of writers have extended this
//! grammar and rows from all of them are still in the wild.

use chrono::{DateTime, Utc};
use kagami_core::constants::DURATION_SEPARATOR;

use crate::error::{PatternError, PatternErrorKind, PatternResult};
use crate::series::{PatternKind, SeriesEnd, SeriesPattern, WeekdayMask};

/// ## Summary
/// Decodes a stored legacy pattern column into the parsed pattern and the
/// absolute duration (whole days of a single occurrence).
///
/// ## Errors
/// Returns an error if the duration prefix is missing or non-numeric, or if
/// the body is not a valid pattern.
pub fn decode(stored: &str) -> PatternResult<(SeriesPattern, i64)> {
    let (prefix, body) = stored
        .split_once(DURATION_SEPARATOR)
        .ok_or_else(|| PatternError::missing_separator(stored))?;

    let duration_days = prefix
        .trim()
        .parse::<i64>()
        .map_err(|_| PatternError::invalid_duration(prefix))?;

    let pattern = parse_pattern(body)?;
    tracing::trace!(duration_days, ?pattern, "Decoded legacy pattern");
    Ok((pattern, duration_days))
}

/// Raw field values before kind-specific assembly.
#[derive(Debug, Default)]
struct RawFields {
    kind: Option<i64>,
    interval: Option<i64>,
    weekday_bits: Option<i64>,
    day_or_ordinal: Option<i64>,
    month: Option<i64>,
    count: Option<i64>,
    until_ms: Option<i64>,
    start_ms: Option<i64>,
}

/// ## Summary
/// Parses a pattern body (the part after the `~` separator).
///
/// ## Errors
/// Returns an error if a key has no value, a value is malformed or out of
/// range, a required field for the pattern kind is absent, or both an
/// occurrence count and an until bound are present.
pub fn parse_pattern(body: &str) -> PatternResult<SeriesPattern> {
    let mut raw = RawFields::default();

    let mut tokens = body.split('|');
    while let Some(key) = tokens.next() {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let Some(value) = tokens.next() else {
            return Err(PatternError::new(
                PatternErrorKind::TruncatedBody,
                format!("field {key} has no value"),
            ));
        };
        parse_field(&mut raw, key, value.trim())?;
    }

    assemble(&raw)
}

/// Parses a single key/value pair into the raw holder.
fn parse_field(raw: &mut RawFields, key: &str, value: &str) -> PatternResult<()> {
    match key {
        "t" => raw.kind = Some(parse_number('t', value)?),
        "i" => raw.interval = Some(parse_number('i', value)?),
        "a" => raw.weekday_bits = Some(parse_number('a', value)?),
        "b" => raw.day_or_ordinal = Some(parse_number('b', value)?),
        "c" => raw.month = Some(parse_number('c', value)?),
        "o" => {
            if raw.until_ms.is_some() {
                return Err(PatternError::new(
                    PatternErrorKind::ConflictingEnd,
                    "count and until are mutually exclusive",
                ));
            }
            raw.count = Some(parse_number('o', value)?);
        }
        "e" => {
            if raw.count.is_some() {
                return Err(PatternError::new(
                    PatternErrorKind::ConflictingEnd,
                    "count and until are mutually exclusive",
                ));
            }
            raw.until_ms = Some(parse_number('e', value)?);
        }
        "s" => raw.start_ms = Some(parse_number('s', value)?),
        _ => {
            // Unknown field - ignore
            tracing::trace!(key, value, "Ignoring unknown pattern field");
        }
    }
    Ok(())
}

fn parse_number(key: char, value: &str) -> PatternResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| PatternError::invalid_value(key, value))
}

fn parse_millis(key: char, millis: i64) -> PatternResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PatternError::invalid_value(key, &millis.to_string()))
}

/// Kind-specific validation and assembly of the raw fields.
fn assemble(raw: &RawFields) -> PatternResult<SeriesPattern> {
    let code = raw.kind.ok_or_else(|| PatternError::missing_field('t'))?;
    let kind = PatternKind::from_code(code).ok_or_else(|| {
        PatternError::new(
            PatternErrorKind::UnknownKind,
            format!("unknown pattern kind code: {code}"),
        )
    })?;

    let interval = match raw.interval {
        None => 1,
        Some(value) => u32::try_from(value)
            .ok()
            .filter(|interval| *interval >= 1)
            .ok_or_else(|| PatternError::invalid_value('i', &value.to_string()))?,
    };

    let weekdays = if kind.is_weekday_based() {
        let bits = raw
            .weekday_bits
            .ok_or_else(|| PatternError::missing_field('a'))?;
        u8::try_from(bits)
            .ok()
            .and_then(WeekdayMask::from_bits)
            .filter(|mask| !mask.is_empty())
            .ok_or_else(|| PatternError::invalid_value('a', &bits.to_string()))?
    } else {
        WeekdayMask::EMPTY
    };

    let (day_of_month, ordinal) = match kind {
        PatternKind::MonthlyDate | PatternKind::YearlyDate => {
            let day = raw
                .day_or_ordinal
                .ok_or_else(|| PatternError::missing_field('b'))?;
            let day = u8::try_from(day)
                .ok()
                .filter(|day| (1..=31).contains(day))
                .ok_or_else(|| PatternError::invalid_value('b', &day.to_string()))?;
            (Some(day), None)
        }
        PatternKind::MonthlyWeekday | PatternKind::YearlyWeekday => {
            let ordinal = raw
                .day_or_ordinal
                .ok_or_else(|| PatternError::missing_field('b'))?;
            let ordinal = u8::try_from(ordinal)
                .ok()
                .filter(|ordinal| (1..=5).contains(ordinal))
                .ok_or_else(|| PatternError::invalid_value('b', &ordinal.to_string()))?;
            (None, Some(ordinal))
        }
        PatternKind::Daily | PatternKind::Weekly => (None, None),
    };

    let month = if kind.is_yearly() {
        let month = raw.month.ok_or_else(|| PatternError::missing_field('c'))?;
        let month = u8::try_from(month)
            .ok()
            .filter(|month| (1..=12).contains(month))
            .ok_or_else(|| PatternError::invalid_value('c', &month.to_string()))?;
        Some(month)
    } else {
        None
    };

    let end = match (raw.count, raw.until_ms) {
        (None, None) => SeriesEnd::Never,
        (Some(count), None) => {
            let count = u32::try_from(count)
                .ok()
                .filter(|count| *count >= 1)
                .ok_or_else(|| PatternError::invalid_value('o', &count.to_string()))?;
            SeriesEnd::Count(count)
        }
        (None, Some(millis)) => SeriesEnd::Until(parse_millis('e', millis)?),
        // parse_field already rejects the pair; unreachable via parse_pattern.
        (Some(_), Some(_)) => {
            return Err(PatternError::new(
                PatternErrorKind::ConflictingEnd,
                "count and until are mutually exclusive",
            ));
        }
    };

    let series_start = match raw.start_ms {
        None => None,
        Some(millis) => Some(parse_millis('s', millis)?),
    };

    Ok(SeriesPattern {
        kind,
        interval,
        weekdays,
        day_of_month,
        ordinal,
        month,
        end,
        series_start,
    })
}
