//! Save-direction adjustments: modern record to legacy column values.

use std::collections::BTreeSet;

use chrono::SubsecRound;
use kagami_core::diagnostics::{Diagnostic, DiagnosticSink};
use kagami_core::types::{ProblemSeverity, RecurrenceId};
use kagami_pattern::build::encode_rule;
use kagami_pattern::recur::parse_recur;
use kagami_pattern::RecurrenceRule;

use super::CompatAdjuster;
use crate::error::{CompatError, CompatResult};
use crate::event::{EventField, EventRecord};
use crate::period::implicit_series_period;
use crate::position::date_position;

/// Series master: encode the rule into the legacy pattern column and widen
/// the stored period to the whole-series span.
pub(super) fn master(
    adjuster: &CompatAdjuster<'_>,
    mut record: EventRecord,
    sink: &mut dyn DiagnosticSink,
) -> CompatResult<EventRecord> {
    let Some(text) = record.rrule.clone() else {
        return Err(CompatError::InvariantViolation(
            "series master without recurrence rule",
        ));
    };
    let Some(first) = record.period() else {
        return Err(CompatError::InvariantViolation(
            "series master without stored period",
        ));
    };

    let recur = parse_recur(&text)?;
    let rule = RecurrenceRule::new(recur, first.start, record.timezone, record.is_all_day());
    let (stored, duration_days) = encode_rule(&rule, &first)?;
    tracing::trace!(event_id = ?record.id, duration_days, "Encoded master pattern");

    record.series_pattern = Some(stored);
    record.touch(EventField::SeriesPattern);
    record.rrule = None;
    record.touch(EventField::RecurrenceRule);

    // Legacy storage wants the whole-series span, not the first occurrence.
    let span = implicit_series_period(&first, &rule, adjuster.occurrences, adjuster.max_occurrences)?;
    record.set_period(span);

    if let Some(dates) = record.delete_exceptions.take() {
        let truncated =
            truncate_exception_set(dates, record.id, EventField::DeleteExceptions, sink);
        record.delete_exceptions = Some(truncated);
        record.touch(EventField::DeleteExceptions);
    }
    if let Some(dates) = record.change_exceptions.take() {
        let truncated =
            truncate_exception_set(dates, record.id, EventField::ChangeExceptions, sink);
        record.change_exceptions = Some(truncated);
        record.touch(EventField::ChangeExceptions);
    }

    // The backing store rounds timestamps to whole seconds; truncate up
    // front so a reload compares equal.
    if let Some(created) = record.created {
        let truncated = created.trunc_subsecs(0);
        if truncated != created {
            record.created = Some(truncated);
            record.touch(EventField::Created);
        }
    }

    Ok(record)
}

/// Series exception: resolve the recurrence id into the stored ordinal and
/// truncated date position; restate a still-attached rule in the legacy
/// pattern column for old readers.
pub(super) fn exception(
    adjuster: &CompatAdjuster<'_>,
    mut record: EventRecord,
    sink: &mut dyn DiagnosticSink,
) -> CompatResult<EventRecord> {
    let Some(recurrence_id) = record.recurrence_id else {
        return Err(CompatError::InvariantViolation(
            "series exception without recurrence id",
        ));
    };

    let series_rule = match record.series_id {
        Some(series_id) => adjuster.series.recurrence_data(series_id)?,
        None => None,
    };
    let series_rule = series_rule
        .ok_or_else(|| CompatError::LookupError("series master not found".to_string()))?;

    let (ordinal, start) = match recurrence_id {
        RecurrenceId::Positional(ordinal) => {
            // Already position-aware; only the date position is missing.
            let start = adjuster
                .translator()
                .temporal_from_position(ordinal, &series_rule)?;
            (ordinal, start)
        }
        RecurrenceId::Temporal(start, _) => {
            let ordinal = adjuster
                .translator()
                .position_from_temporal(start, &series_rule)?;
            (ordinal, start)
        }
    };

    record.recurrence_id = Some(RecurrenceId::Positional(ordinal));
    record.touch(EventField::RecurrenceId);
    record.date_position = Some(date_position(start));
    record.touch(EventField::DatePosition);

    // Redundant restatement of a rule the exception still carries, kept only
    // for readers of the master's format. Omission is safe.
    if let Some(text) = record.rrule.take() {
        record.touch(EventField::RecurrenceRule);
        match restate_rule(&text, &record) {
            Ok(stored) => {
                record.series_pattern = Some(stored);
                record.touch(EventField::SeriesPattern);
            }
            Err(err) => sink.record(
                Diagnostic::new(
                    record.id,
                    EventField::SeriesPattern.as_str(),
                    ProblemSeverity::Trivial,
                    "exception rule not restatable in legacy pattern, omitted",
                )
                .with_cause(err),
            ),
        }
    }

    Ok(record)
}

/// Legacy storage only keeps UTC dates with the time truncated to midnight.
fn truncate_exception_set(
    dates: BTreeSet<RecurrenceId>,
    event_id: Option<uuid::Uuid>,
    field: EventField,
    sink: &mut dyn DiagnosticSink,
) -> BTreeSet<RecurrenceId> {
    let mut truncated = BTreeSet::new();
    for id in dates {
        match id.as_temporal() {
            Some(start) => {
                truncated.insert(RecurrenceId::temporal(date_position(start)));
            }
            None => sink.record(Diagnostic::new(
                event_id,
                field.as_str(),
                ProblemSeverity::Minor,
                "dropped positional entry in exception-date set",
            )),
        }
    }
    truncated
}

fn restate_rule(text: &str, record: &EventRecord) -> CompatResult<String> {
    let Some(period) = record.period() else {
        return Err(CompatError::InvariantViolation(
            "exception rule without period",
        ));
    };
    let recur = parse_recur(text)?;
    let rule = RecurrenceRule::new(recur, period.start, record.timezone, record.is_all_day());
    let (stored, _) = encode_rule(&rule, &period)?;
    Ok(stored)
}
