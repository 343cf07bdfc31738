//! RECUR rule text (RFC 5545 §3.3.10) and its mapping onto the legacy
//! grammar.
//!
//! The modern representation stores recurrence as RECUR text anchored at the
//! first occurrence's start. This module parses and serializes that text and
//! converts it to and from [`SeriesPattern`]; occurrence enumeration itself
//! is delegated to the iteration collaborator.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use kagami_core::types::Period;

use crate::error::{PatternError, PatternErrorKind, PatternResult};
use crate::series::{PatternKind, SeriesEnd, SeriesPattern, WeekdayMask};

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Parses a FREQ value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Some(Self::Secondly),
            "MINUTELY" => Some(Self::Minutely),
            "HOURLY" => Some(Self::Hourly),
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

/// A weekday with an optional ordinal prefix (e.g. "MO", "2TU", "-1FR").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

/// Parses a two-letter RFC weekday code.
#[must_use]
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_uppercase().as_str() {
        "SU" => Some(Weekday::Sun),
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        _ => None,
    }
}

/// The two-letter RFC code for a weekday.
#[must_use]
pub const fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "SU",
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
    }
}

/// Parsed RECUR rule text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecurRule {
    pub freq: Option<Frequency>,
    pub interval: Option<u32>,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub by_second: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_hour: Vec<u8>,
    pub by_day: Vec<WeekdayNum>,
    pub by_monthday: Vec<i8>,
    pub by_yearday: Vec<i16>,
    pub by_weekno: Vec<i8>,
    pub by_month: Vec<u8>,
    pub by_setpos: Vec<i16>,
    pub wkst: Option<Weekday>,
}

impl RecurRule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// ## Summary
/// Parses RECUR rule text (e.g. `"FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE"`).
///
/// Unknown rule parts are ignored.
///
/// ## Errors
/// Returns an error if a part is not `KEY=value`, a value is malformed, or
/// COUNT and UNTIL are both present.
pub fn parse_recur(s: &str) -> PatternResult<RecurRule> {
    let mut rule = RecurRule::new();

    for part in s.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let eq_pos = part.find('=').ok_or_else(|| {
            PatternError::new(
                PatternErrorKind::InvalidValue,
                format!("rule part without '=': {part:?}"),
            )
        })?;

        let key = &part[..eq_pos];
        let value = &part[eq_pos + 1..];

        parse_recur_part(&mut rule, key, value)?;
    }

    Ok(rule)
}

/// Parses a single RECUR key-value pair.
fn parse_recur_part(rule: &mut RecurRule, key: &str, value: &str) -> PatternResult<()> {
    match key.to_ascii_uppercase().as_str() {
        "FREQ" => {
            rule.freq =
                Some(Frequency::parse(value).ok_or_else(|| {
                    PatternError::invalid_part("FREQ", value)
                })?);
        }
        "INTERVAL" => {
            rule.interval = Some(
                value
                    .parse()
                    .map_err(|_| PatternError::invalid_part("INTERVAL", value))?,
            );
        }
        "COUNT" => {
            if rule.until.is_some() {
                return Err(PatternError::new(
                    PatternErrorKind::ConflictingEnd,
                    "COUNT and UNTIL are mutually exclusive",
                ));
            }
            rule.count = Some(
                value
                    .parse()
                    .map_err(|_| PatternError::invalid_part("COUNT", value))?,
            );
        }
        "UNTIL" => {
            if rule.count.is_some() {
                return Err(PatternError::new(
                    PatternErrorKind::ConflictingEnd,
                    "COUNT and UNTIL are mutually exclusive",
                ));
            }
            rule.until = Some(parse_until(value)?);
        }
        "WKST" => {
            rule.wkst =
                Some(parse_weekday(value).ok_or_else(|| {
                    PatternError::invalid_part("WKST", value)
                })?);
        }
        "BYSECOND" => rule.by_second = parse_list("BYSECOND", value)?,
        "BYMINUTE" => rule.by_minute = parse_list("BYMINUTE", value)?,
        "BYHOUR" => rule.by_hour = parse_list("BYHOUR", value)?,
        "BYDAY" => rule.by_day = parse_byday(value)?,
        "BYMONTHDAY" => rule.by_monthday = parse_list("BYMONTHDAY", value)?,
        "BYYEARDAY" => rule.by_yearday = parse_list("BYYEARDAY", value)?,
        "BYWEEKNO" => rule.by_weekno = parse_list("BYWEEKNO", value)?,
        "BYMONTH" => rule.by_month = parse_list("BYMONTH", value)?,
        "BYSETPOS" => rule.by_setpos = parse_list("BYSETPOS", value)?,
        _ => {} // Unknown rule part - ignore
    }
    Ok(())
}

/// Parses an UNTIL value, either DATE or DATE-TIME form. A bare date is the
/// midnight that starts it, UTC.
fn parse_until(value: &str) -> PatternResult<DateTime<Utc>> {
    let naive = if value.contains('T') {
        NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S")
            .map_err(|_| PatternError::invalid_part("UNTIL", value))?
    } else {
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|_| PatternError::invalid_part("UNTIL", value))?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| PatternError::invalid_part("UNTIL", value))?
    };
    Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Parses a comma-separated list of numeric values.
fn parse_list<T: std::str::FromStr>(part: &'static str, value: &str) -> PatternResult<Vec<T>> {
    value
        .split(',')
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| PatternError::invalid_part(part, value))
        })
        .collect()
}

/// Parses a BYDAY value (weekdays with optional ordinals).
fn parse_byday(value: &str) -> PatternResult<Vec<WeekdayNum>> {
    value
        .split(',')
        .map(|v| parse_weekday_num(v.trim(), value))
        .collect()
}

/// Parses a single weekday with optional ordinal (e.g. "MO", "1MO", "-1FR").
fn parse_weekday_num(s: &str, raw: &str) -> PatternResult<WeekdayNum> {
    if s.len() < 2 {
        return Err(PatternError::invalid_part("BYDAY", raw));
    }

    let weekday_str = &s[s.len() - 2..];
    let ordinal_str = &s[..s.len() - 2];

    let weekday =
        parse_weekday(weekday_str).ok_or_else(|| PatternError::invalid_part("BYDAY", raw))?;

    let ordinal = if ordinal_str.is_empty() {
        None
    } else {
        Some(
            ordinal_str
                .parse()
                .map_err(|_| PatternError::invalid_part("BYDAY", raw))?,
        )
    };

    Ok(WeekdayNum { ordinal, weekday })
}

impl std::fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{ordinal}")?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

impl std::fmt::Display for RecurRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = Vec::new();

        if let Some(freq) = self.freq {
            parts.push(format!("FREQ={}", freq.as_str()));
        }
        if let Some(interval) = self.interval {
            parts.push(format!("INTERVAL={interval}"));
        }
        if let Some(count) = self.count {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
        }
        push_list(&mut parts, "BYSECOND", &self.by_second);
        push_list(&mut parts, "BYMINUTE", &self.by_minute);
        push_list(&mut parts, "BYHOUR", &self.by_hour);
        push_list(&mut parts, "BYDAY", &self.by_day);
        push_list(&mut parts, "BYMONTHDAY", &self.by_monthday);
        push_list(&mut parts, "BYYEARDAY", &self.by_yearday);
        push_list(&mut parts, "BYWEEKNO", &self.by_weekno);
        push_list(&mut parts, "BYMONTH", &self.by_month);
        push_list(&mut parts, "BYSETPOS", &self.by_setpos);
        if let Some(wkst) = self.wkst {
            parts.push(format!("WKST={}", weekday_code(wkst)));
        }

        f.write_str(&parts.join(";"))
    }
}

fn push_list<T: std::fmt::Display>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
    parts.push(format!("{key}={}", rendered.join(",")));
}

/// A fully specified recurrence: the rule plus the series anchor the
/// iteration collaborator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub rule: RecurRule,
    /// Start of the first occurrence, UTC.
    pub start: DateTime<Utc>,
    /// Originating zone; `None` for floating events.
    pub tz: Option<Tz>,
    pub all_day: bool,
}

impl RecurrenceRule {
    #[must_use]
    pub const fn new(rule: RecurRule, start: DateTime<Utc>, tz: Option<Tz>, all_day: bool) -> Self {
        Self {
            rule,
            start,
            tz,
            all_day,
        }
    }

    /// Zone used for wall-clock arithmetic. All-day and floating events use
    /// UTC.
    #[must_use]
    pub fn effective_tz(&self) -> Tz {
        if self.all_day {
            Tz::UTC
        } else {
            self.tz.unwrap_or(Tz::UTC)
        }
    }

    /// RECUR text of the rule.
    #[must_use]
    pub fn rrule_text(&self) -> String {
        self.rule.to_string()
    }
}

/// ## Summary
/// Whole-day length of a single occurrence, the anchor used to invert the
/// stored series span back to one occurrence. Computed on UTC calendar
/// dates, matching the legacy storage's day arithmetic, so a late-evening
/// occurrence crossing UTC midnight counts as one day.
#[must_use]
pub fn absolute_duration_days(period: &Period) -> i64 {
    let start = period.start.date_naive();
    let end = period.end.date_naive();
    end.signed_duration_since(start).num_days()
}

impl SeriesPattern {
    /// ## Summary
    /// Renders the legacy pattern as a modern RECUR rule.
    ///
    /// ## Errors
    /// Returns an error if the pattern is structurally incomplete for its
    /// kind (possible only for hand-built values; [`crate::parse`] validates).
    pub fn to_recur(&self) -> PatternResult<RecurRule> {
        let mut rule = RecurRule::new();
        if self.interval != 1 {
            rule.interval = Some(self.interval);
        }

        match self.end {
            SeriesEnd::Never => {}
            SeriesEnd::Count(count) => rule.count = Some(count),
            SeriesEnd::Until(until) => rule.until = Some(until),
        }

        match self.kind {
            PatternKind::Daily => {
                rule.freq = Some(Frequency::Daily);
            }
            PatternKind::Weekly => {
                rule.freq = Some(Frequency::Weekly);
                rule.by_day = self
                    .weekdays
                    .iter()
                    .map(|weekday| WeekdayNum {
                        ordinal: None,
                        weekday,
                    })
                    .collect();
                if rule.by_day.is_empty() {
                    return Err(PatternError::missing_field('a'));
                }
            }
            PatternKind::MonthlyDate | PatternKind::YearlyDate => {
                rule.freq = Some(if self.kind.is_yearly() {
                    Frequency::Yearly
                } else {
                    Frequency::Monthly
                });
                let day = self.day_of_month.ok_or_else(|| {
                    PatternError::missing_field('b')
                })?;
                rule.by_monthday = vec![i8::try_from(day)
                    .map_err(|_| PatternError::invalid_value('b', &day.to_string()))?];
            }
            PatternKind::MonthlyWeekday | PatternKind::YearlyWeekday => {
                rule.freq = Some(if self.kind.is_yearly() {
                    Frequency::Yearly
                } else {
                    Frequency::Monthly
                });
                let weekday = self
                    .weekdays
                    .single()
                    .ok_or_else(|| PatternError::missing_field('a'))?;
                let ordinal = self.ordinal.ok_or_else(|| PatternError::missing_field('b'))?;
                // Ordinal 5 is the legacy spelling of "last".
                let by_ordinal = if ordinal == 5 {
                    -1
                } else {
                    i8::try_from(ordinal)
                        .map_err(|_| PatternError::invalid_value('b', &ordinal.to_string()))?
                };
                rule.by_day = vec![WeekdayNum {
                    ordinal: Some(by_ordinal),
                    weekday,
                }];
            }
        }

        if self.kind.is_yearly() {
            let month = self.month.ok_or_else(|| PatternError::missing_field('c'))?;
            rule.by_month = vec![month];
        }

        Ok(rule)
    }

    /// ## Summary
    /// Derives a legacy pattern from a modern rule. Parts the rule leaves to
    /// its start (weekday, day of month, month) are taken from the series
    /// start in the rule's effective zone.
    ///
    /// BYHOUR/BYMINUTE/BYSECOND are ignored: they restate the start's
    /// time-of-day. WKST is ignored.
    ///
    /// ## Errors
    /// Returns an `Unrepresentable` error for rules outside the legacy
    /// grammar: sub-daily frequencies, BYYEARDAY/BYWEEKNO, negative month
    /// days, multiple BYDAY/BYMONTHDAY/BYMONTH entries, or ordinals beyond
    /// fourth-from-start other than "last".
    pub fn from_recurrence(rule: &RecurrenceRule) -> PatternResult<Self> {
        let recur = &rule.rule;
        let freq = recur
            .freq
            .ok_or_else(|| PatternError::new(PatternErrorKind::MissingField, "rule has no FREQ"))?;

        if !recur.by_yearday.is_empty() || !recur.by_weekno.is_empty() {
            return Err(PatternError::unrepresentable(
                "BYYEARDAY/BYWEEKNO have no legacy form",
            ));
        }

        let interval = recur.interval.unwrap_or(1);
        let end = match (recur.count, recur.until) {
            (None, None) => SeriesEnd::Never,
            (Some(count), None) => SeriesEnd::Count(count),
            (None, Some(until)) => SeriesEnd::Until(until),
            (Some(_), Some(_)) => {
                return Err(PatternError::new(
                    PatternErrorKind::ConflictingEnd,
                    "COUNT and UNTIL are mutually exclusive",
                ));
            }
        };

        let start_local = rule.start.with_timezone(&rule.effective_tz());
        let mut pattern = Self {
            end,
            ..Self::daily(interval)
        };

        match freq {
            Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => {
                return Err(PatternError::unrepresentable(
                    "sub-daily frequencies have no legacy form",
                ));
            }
            Frequency::Daily => {
                if !recur.by_monthday.is_empty() || !recur.by_setpos.is_empty() {
                    return Err(PatternError::unrepresentable(
                        "DAILY with BYMONTHDAY/BYSETPOS has no legacy form",
                    ));
                }
                if recur.by_day.is_empty() {
                    pattern.kind = PatternKind::Daily;
                } else if interval == 1 {
                    // Weekday-filtered daily rules ("every weekday") only
                    // exist in the legacy grammar as a weekly pattern.
                    pattern.kind = PatternKind::Weekly;
                    pattern.weekdays = plain_weekday_mask(&recur.by_day)?;
                } else {
                    return Err(PatternError::unrepresentable(
                        "DAILY with BYDAY and an interval has no legacy form",
                    ));
                }
            }
            Frequency::Weekly => {
                if !recur.by_monthday.is_empty() || !recur.by_setpos.is_empty() {
                    return Err(PatternError::unrepresentable(
                        "WEEKLY with BYMONTHDAY/BYSETPOS has no legacy form",
                    ));
                }
                pattern.kind = PatternKind::Weekly;
                pattern.weekdays = if recur.by_day.is_empty() {
                    WeekdayMask::EMPTY.with(start_local.weekday())
                } else {
                    plain_weekday_mask(&recur.by_day)?
                };
            }
            Frequency::Monthly => {
                monthly_fields(&mut pattern, recur, start_local.day(), false)?;
            }
            Frequency::Yearly => {
                monthly_fields(&mut pattern, recur, start_local.day(), true)?;
                let month = match recur.by_month.as_slice() {
                    [] => u8::try_from(start_local.month())
                        .map_err(|_| PatternError::unrepresentable("month out of range"))?,
                    [month] => *month,
                    _ => {
                        return Err(PatternError::unrepresentable(
                            "multiple BYMONTH entries have no legacy form",
                        ));
                    }
                };
                pattern.month = Some(month);
            }
        }

        pattern.series_start = Some(rule.start);
        Ok(pattern)
    }
}

/// Fills the monthly/yearly day selector (fixed day of month, or n-th
/// weekday) shared by MONTHLY and YEARLY rules.
fn monthly_fields(
    pattern: &mut SeriesPattern,
    recur: &RecurRule,
    start_day: u32,
    yearly: bool,
) -> PatternResult<()> {
    let date_kind = if yearly {
        PatternKind::YearlyDate
    } else {
        PatternKind::MonthlyDate
    };
    let weekday_kind = if yearly {
        PatternKind::YearlyWeekday
    } else {
        PatternKind::MonthlyWeekday
    };

    match (recur.by_monthday.as_slice(), recur.by_day.as_slice()) {
        ([], []) => {
            pattern.kind = date_kind;
            pattern.day_of_month = Some(
                u8::try_from(start_day)
                    .map_err(|_| PatternError::unrepresentable("day of month out of range"))?,
            );
        }
        ([day], []) => {
            let day = u8::try_from(*day)
                .ok()
                .filter(|day| (1..=31).contains(day))
                .ok_or_else(|| {
                    PatternError::unrepresentable("negative BYMONTHDAY has no legacy form")
                })?;
            pattern.kind = date_kind;
            pattern.day_of_month = Some(day);
        }
        ([], [weekday_num]) => {
            let ordinal = byday_ordinal(weekday_num.ordinal, &recur.by_setpos)?;
            pattern.kind = weekday_kind;
            pattern.weekdays = WeekdayMask::EMPTY.with(weekday_num.weekday);
            pattern.ordinal = Some(ordinal);
        }
        _ => {
            return Err(PatternError::unrepresentable(
                "multiple BYMONTHDAY/BYDAY entries have no legacy form",
            ));
        }
    }
    Ok(())
}

/// Resolves the weekday ordinal from a BYDAY prefix or a lone BYSETPOS.
/// Ordinals 1..=4 map through; -1 ("last") maps to the legacy 5.
fn byday_ordinal(byday: Option<i8>, by_setpos: &[i16]) -> PatternResult<u8> {
    let ordinal = match (byday, by_setpos) {
        (Some(ordinal), []) => i16::from(ordinal),
        (None, [setpos]) => *setpos,
        (None, []) => {
            return Err(PatternError::unrepresentable(
                "monthly BYDAY without an ordinal has no legacy form",
            ));
        }
        _ => {
            return Err(PatternError::unrepresentable(
                "combined or repeated ordinals have no legacy form",
            ));
        }
    };

    match ordinal {
        1..=4 => u8::try_from(ordinal)
            .map_err(|_| PatternError::unrepresentable("ordinal out of range")),
        -1 => Ok(5),
        _ => Err(PatternError::unrepresentable(
            "only ordinals 1..=4 and last have a legacy form",
        )),
    }
}

/// A weekday mask from BYDAY entries that must not carry ordinals.
fn plain_weekday_mask(by_day: &[WeekdayNum]) -> PatternResult<WeekdayMask> {
    by_day
        .iter()
        .map(|weekday_num| {
            if weekday_num.ordinal.is_some() {
                Err(PatternError::unrepresentable(
                    "ordinal BYDAY outside MONTHLY/YEARLY has no legacy form",
                ))
            } else {
                Ok(weekday_num.weekday)
            }
        })
        .collect()
}
