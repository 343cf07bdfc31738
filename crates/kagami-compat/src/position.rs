//! Recurrence-identifier translation.
//!
//! Legacy storage addresses an exception by its 1-based ordinal within the
//! generated occurrence sequence, and keeps exception dates as UTC-midnight
//! "date positions" (comma-joined epoch milliseconds on the wire). The
//! modern model addresses both by absolute occurrence start. Translation
//! walks the sibling rule's occurrence sequence; individually stale items
//! are dropped with a diagnostic, never failing the surrounding set.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};
use kagami_core::constants::DATE_POSITION_SEPARATOR;
use kagami_core::diagnostics::{Diagnostic, DiagnosticSink};
use kagami_core::error::CoreError;
use kagami_core::types::{ProblemSeverity, RecurrenceId};
use kagami_pattern::RecurrenceRule;
use uuid::Uuid;

use crate::error::{CompatError, CompatResult};
use crate::event::EventField;
use crate::recurrence::OccurrenceSource;

/// Ordinal/temporal translation over one occurrence source with a fixed
/// iteration bound.
pub struct PositionTranslator<'a> {
    source: &'a dyn OccurrenceSource,
    max_occurrences: usize,
}

impl<'a> PositionTranslator<'a> {
    #[must_use]
    pub const fn new(source: &'a dyn OccurrenceSource, max_occurrences: usize) -> Self {
        Self {
            source,
            max_occurrences,
        }
    }

    /// ## Summary
    /// Resolves an occurrence start timestamp to its 1-based ordinal within
    /// the rule's sequence.
    ///
    /// ## Errors
    /// Returns the dedicated unresolvable-position kind if no occurrence
    /// starts at the given timestamp; any occurrence-source failure
    /// propagates as-is.
    pub fn position_from_temporal(
        &self,
        start: DateTime<Utc>,
        rule: &RecurrenceRule,
    ) -> CompatResult<u32> {
        let occurrences = self.source.occurrences(rule)?;
        let mut ordinal = 0u32;
        for occurrence in occurrences.take(self.max_occurrences) {
            ordinal += 1;
            if occurrence == start {
                return Ok(ordinal);
            }
            if occurrence > start {
                break;
            }
        }
        Err(CompatError::UnresolvablePosition(format!(
            "no occurrence starts at {start}"
        )))
    }

    /// ## Summary
    /// Resolves a 1-based ordinal to the occurrence's start timestamp.
    ///
    /// ## Errors
    /// Returns the dedicated unresolvable-position kind if the rule yields
    /// fewer occurrences (a stale position left behind by a rule edit) or
    /// the ordinal is zero.
    pub fn temporal_from_position(
        &self,
        ordinal: u32,
        rule: &RecurrenceRule,
    ) -> CompatResult<DateTime<Utc>> {
        if ordinal == 0 {
            return Err(CompatError::UnresolvablePosition(
                "recurrence positions are 1-based".to_string(),
            ));
        }
        let index = usize::try_from(ordinal - 1).map_err(|_| {
            CompatError::UnresolvablePosition(format!("position {ordinal} out of range"))
        })?;
        self.source
            .occurrences(rule)?
            .take(self.max_occurrences)
            .nth(index)
            .ok_or_else(|| {
                CompatError::UnresolvablePosition(format!(
                    "series yields fewer than {ordinal} occurrences"
                ))
            })
    }

    /// ## Summary
    /// Translates a set of truncated date positions into real recurrence
    /// ids, each resolving to the first occurrence landing on its UTC date.
    ///
    /// Items with no matching occurrence are dropped individually with a
    /// diagnostic of the given severity; the rest of the set is still
    /// returned. The output is chronologically ordered and duplicate-free.
    ///
    /// ## Errors
    /// Returns an error only if the occurrence source itself fails.
    pub fn resolve_date_positions(
        &self,
        dates: &BTreeSet<RecurrenceId>,
        rule: &RecurrenceRule,
        event_id: Option<Uuid>,
        field: EventField,
        severity: ProblemSeverity,
        sink: &mut dyn DiagnosticSink,
    ) -> CompatResult<BTreeSet<RecurrenceId>> {
        let mut resolved = BTreeSet::new();
        for id in dates {
            let Some(date) = id.as_temporal() else {
                sink.record(Diagnostic::new(
                    event_id,
                    field.as_str(),
                    severity,
                    "dropped positional entry in exception-date set",
                ));
                continue;
            };
            match self.occurrence_on_date(date, rule)? {
                Some(start) => {
                    resolved.insert(RecurrenceId::temporal(start));
                }
                None => {
                    sink.record(Diagnostic::new(
                        event_id,
                        field.as_str(),
                        severity,
                        format!("no occurrence on {}, date dropped", date.date_naive()),
                    ));
                }
            }
        }
        Ok(resolved)
    }

    /// First occurrence starting on the given UTC date, if any.
    fn occurrence_on_date(
        &self,
        date: DateTime<Utc>,
        rule: &RecurrenceRule,
    ) -> CompatResult<Option<DateTime<Utc>>> {
        let target = date.date_naive();
        for occurrence in self.source.occurrences(rule)?.take(self.max_occurrences) {
            let occurrence_date = occurrence.date_naive();
            if occurrence_date == target {
                return Ok(Some(occurrence));
            }
            if occurrence_date > target {
                break;
            }
        }
        Ok(None)
    }
}

/// Truncates a timestamp to its UTC-midnight date position.
#[must_use]
pub fn date_position(start: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(start.date_naive().and_time(NaiveTime::MIN), Utc)
}

/// ## Summary
/// Parses a legacy exception-date column: comma-joined UTC epoch
/// milliseconds, each truncated to midnight.
///
/// ## Errors
/// Returns a parse error on any non-numeric entry.
pub fn parse_date_positions(column: &str) -> CompatResult<BTreeSet<RecurrenceId>> {
    let mut dates = BTreeSet::new();
    for token in column.split(DATE_POSITION_SEPARATOR) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let millis = token.parse::<i64>().map_err(|_| {
            CoreError::ParseError(format!("invalid exception date position: {token:?}"))
        })?;
        let ts = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            CoreError::ParseError(format!("exception date position out of range: {millis}"))
        })?;
        dates.insert(RecurrenceId::temporal(date_position(ts)));
    }
    Ok(dates)
}

/// Serializes recurrence ids as the legacy exception-date column. Positional
/// ids have no date and are skipped.
#[must_use]
pub fn format_date_positions(dates: &BTreeSet<RecurrenceId>) -> String {
    let rendered: Vec<String> = dates
        .iter()
        .filter_map(RecurrenceId::as_temporal)
        .map(|ts| date_position(ts).timestamp_millis().to_string())
        .collect();
    rendered.join(&DATE_POSITION_SEPARATOR.to_string())
}
