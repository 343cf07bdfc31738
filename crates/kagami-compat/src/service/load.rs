//! Load-direction adjustments: legacy row to modern record.

use kagami_core::diagnostics::{Diagnostic, DiagnosticSink};
use kagami_core::types::{ProblemSeverity, RecurrenceId};
use kagami_pattern::RecurrenceRule;
use kagami_pattern::parse as pattern_parse;

use super::CompatAdjuster;
use crate::error::{CompatError, CompatResult};
use crate::event::{EventField, EventRecord};
use crate::period::recurrence_master_period;

/// Series master: decode the stored pattern, recover the first occurrence
/// from the series span, translate the exception-date sets. An unreadable
/// pattern demotes the whole series instead of failing the load.
pub(super) fn master(
    adjuster: &CompatAdjuster<'_>,
    mut record: EventRecord,
    sink: &mut dyn DiagnosticSink,
) -> CompatResult<EventRecord> {
    let Some(stored) = record.series_pattern.clone() else {
        return Err(CompatError::InvariantViolation(
            "series master without stored pattern",
        ));
    };

    let (pattern, duration_days) = match pattern_parse::decode(&stored) {
        Ok(decoded) => decoded,
        Err(err) => {
            demote_master(&mut record, sink, &err);
            return Ok(record);
        }
    };

    let Some(span) = record.period() else {
        demote_master(&mut record, sink, &"master row without stored span");
        return Ok(record);
    };

    let first = recurrence_master_period(&span, duration_days);
    record.set_period(first);

    let recur = match pattern.to_recur() {
        Ok(recur) => recur,
        Err(err) => {
            demote_master(&mut record, sink, &err);
            return Ok(record);
        }
    };
    let rule = RecurrenceRule::new(recur, first.start, record.timezone, record.is_all_day());
    record.rrule = Some(rule.rrule_text());
    record.touch(EventField::RecurrenceRule);
    record.series_pattern = None;
    record.touch(EventField::SeriesPattern);

    let translator = adjuster.translator();
    if let Some(dates) = record.delete_exceptions.take() {
        let resolved = translator.resolve_date_positions(
            &dates,
            &rule,
            record.id,
            EventField::DeleteExceptions,
            ProblemSeverity::Minor,
            sink,
        )?;
        record.delete_exceptions = Some(resolved);
        record.touch(EventField::DeleteExceptions);
    }
    if let Some(dates) = record.change_exceptions.take() {
        let resolved = translator.resolve_date_positions(
            &dates,
            &rule,
            record.id,
            EventField::ChangeExceptions,
            ProblemSeverity::Normal,
            sink,
        )?;
        record.change_exceptions = Some(resolved);
        record.touch(EventField::ChangeExceptions);
    }

    Ok(record)
}

/// Series exception: drop any inherited rule, translate the stored ordinal
/// position through the sibling master's rule. A stale position detaches the
/// exception from its series; any other failure propagates.
pub(super) fn exception(
    adjuster: &CompatAdjuster<'_>,
    mut record: EventRecord,
    sink: &mut dyn DiagnosticSink,
) -> CompatResult<EventRecord> {
    // Exceptions never carry a rule, whatever the row says.
    let had_rule = record.rrule.take().is_some() | record.series_pattern.take().is_some();
    if had_rule {
        record.touch(EventField::RecurrenceRule);
        record.touch(EventField::SeriesPattern);
        sink.record(Diagnostic::new(
            record.id,
            EventField::RecurrenceRule.as_str(),
            ProblemSeverity::Trivial,
            "dropped recurrence rule inherited by series exception",
        ));
    }

    let Some(RecurrenceId::Positional(ordinal)) = record.recurrence_id else {
        return Ok(record);
    };

    let Some(series_id) = record.series_id else {
        demote_exception(&mut record, sink, &"positional recurrence id without series");
        return Ok(record);
    };

    match adjuster.series.recurrence_data(series_id)? {
        None => demote_exception(&mut record, sink, &"series master not found"),
        Some(rule) => match adjuster.translator().temporal_from_position(ordinal, &rule) {
            Ok(start) => {
                record.recurrence_id = Some(RecurrenceId::temporal(start));
                record.touch(EventField::RecurrenceId);
            }
            Err(err) if err.is_unresolvable_position() => {
                demote_exception(&mut record, sink, &err);
            }
            Err(err) => return Err(err),
        },
    }

    Ok(record)
}

/// Full demotion of a master whose pattern cannot be read: the caller gets a
/// plain event and an operator-visible warning, never a failed request.
fn demote_master(
    record: &mut EventRecord,
    sink: &mut dyn DiagnosticSink,
    cause: &dyn std::fmt::Display,
) {
    tracing::debug!(event_id = ?record.id, %cause, "Demoting series master");
    let diagnostic = Diagnostic::new(
        record.id,
        EventField::SeriesPattern.as_str(),
        ProblemSeverity::Major,
        "unreadable recurrence pattern, series demoted to single event",
    )
    .with_cause(cause);
    record.clear_recurrence();
    sink.record(diagnostic);
}

/// Detaches a stale exception from its series, leaving a non-recurring
/// remnant.
fn demote_exception(
    record: &mut EventRecord,
    sink: &mut dyn DiagnosticSink,
    cause: &dyn std::fmt::Display,
) {
    tracing::debug!(event_id = ?record.id, %cause, "Detaching stale series exception");
    let diagnostic = Diagnostic::new(
        record.id,
        EventField::RecurrenceId.as_str(),
        ProblemSeverity::Minor,
        "unresolvable recurrence position, exception detached from series",
    )
    .with_cause(cause);
    record.clear_recurrence();
    sink.record(diagnostic);
}
