use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use kagami_core::diagnostics::DiagnosticLog;
use kagami_core::types::{ProblemSeverity, RecurrenceId};
use kagami_pattern::RecurrenceRule;
use kagami_pattern::parse::decode;
use kagami_pattern::recur::parse_recur;
use kagami_pattern::series::{PatternKind, SeriesEnd};
use uuid::Uuid;

use super::CompatAdjuster;
use crate::error::{CompatError, CompatResult};
use crate::event::{EventField, EventRecord};
use crate::recurrence::{RruleOccurrences, SeriesLookup, StaticSeriesLookup};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Mondays at 09:00Z from 2024-01-01 (a Monday), ten occurrences.
fn weekly_monday_rule() -> RecurrenceRule {
    RecurrenceRule::new(
        parse_recur("FREQ=WEEKLY;BYDAY=MO;COUNT=10").unwrap(),
        utc(2024, 1, 1, 9, 0),
        None,
        false,
    )
}

fn temporal_set(dates: &[DateTime<Utc>]) -> BTreeSet<RecurrenceId> {
    dates.iter().copied().map(RecurrenceId::temporal).collect()
}

/// A legacy master row for the weekly-Monday series: span columns cover the
/// whole series, exceptions are midnight date positions.
fn legacy_master_row(id: Uuid) -> EventRecord {
    let mut row = EventRecord::new();
    row.id = Some(id);
    row.series_id = Some(id);
    row.start = Some(utc(2024, 1, 1, 9, 0));
    row.end = Some(utc(2024, 3, 4, 10, 0));
    row.all_day = Some(false);
    row.series_pattern = Some("0~t|2|i|1|a|2|o|10".to_string());
    row.delete_exceptions = Some(temporal_set(&[utc(2024, 1, 8, 0, 0)]));
    row.change_exceptions = Some(temporal_set(&[utc(2024, 1, 15, 0, 0)]));
    row
}

struct FailingLookup;

impl SeriesLookup for FailingLookup {
    fn recurrence_data(&self, _series_id: Uuid) -> CompatResult<Option<RecurrenceRule>> {
        Err(CompatError::LookupError("connection lost".to_string()))
    }
}

#[test]
fn plain_event_gets_only_normalization() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut row = EventRecord::new();
    row.id = Some(Uuid::new_v4());
    row.start = Some(utc(2024, 5, 1, 8, 0));
    row.timestamp = Some(utc(2024, 5, 2, 12, 0));

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert_eq!(record.end, Some(utc(2024, 5, 1, 8, 0)));
    assert_eq!(record.last_modified, Some(utc(2024, 5, 2, 12, 0)));
    assert!(record.rrule.is_none());
    assert!(sink.is_empty());
}

#[test]
fn master_load_recovers_first_occurrence() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup).with_max_occurrences(500);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let record = adjuster
        .adjust_after_load(legacy_master_row(id), &mut sink)
        .unwrap();

    // The span columns now describe exactly one occurrence.
    assert_eq!(record.start, Some(utc(2024, 1, 1, 9, 0)));
    assert_eq!(record.end, Some(utc(2024, 1, 1, 10, 0)));
    assert_eq!(record.rrule.as_deref(), Some("FREQ=WEEKLY;COUNT=10;BYDAY=MO"));
    assert!(record.series_pattern.is_none());

    // Date positions resolved to real occurrence starts.
    assert_eq!(
        record.delete_exceptions,
        Some(temporal_set(&[utc(2024, 1, 8, 9, 0)]))
    );
    assert_eq!(
        record.change_exceptions,
        Some(temporal_set(&[utc(2024, 1, 15, 9, 0)]))
    );
    assert!(sink.is_empty());
}

#[test]
fn master_load_demotes_on_corrupt_pattern() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut row = legacy_master_row(id);
    row.series_pattern = Some("banana".to_string());

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert!(record.rrule.is_none());
    assert!(record.series_pattern.is_none());
    assert!(record.series_id.is_none());
    assert!(record.recurrence_id.is_none());
    assert!(record.delete_exceptions.is_none());
    assert!(record.change_exceptions.is_none());

    assert_eq!(sink.len(), 1);
    let entry = &sink.entries()[0];
    assert_eq!(entry.severity, ProblemSeverity::Major);
    assert_eq!(entry.event_id, Some(id));
}

#[test]
fn master_load_tolerates_bad_exception_dates() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut row = legacy_master_row(id);
    // A Wednesday that never matches, between two valid Mondays.
    row.delete_exceptions = Some(temporal_set(&[
        utc(2024, 1, 8, 0, 0),
        utc(2024, 1, 10, 0, 0),
        utc(2024, 1, 22, 0, 0),
    ]));

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    let resolved = record.delete_exceptions.unwrap();
    assert_eq!(
        resolved,
        temporal_set(&[utc(2024, 1, 8, 9, 0), utc(2024, 1, 22, 9, 0)])
    );
    assert_eq!(sink.len(), 1);
    assert!(sink.entries()[0].severity <= ProblemSeverity::Normal);
}

#[test]
fn master_save_produces_series_span_and_pattern() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup).with_max_occurrences(500);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut record = EventRecord::new();
    record.id = Some(id);
    record.series_id = Some(id);
    record.start = Some(utc(2024, 1, 1, 9, 0));
    record.end = Some(utc(2024, 1, 1, 10, 0));
    record.all_day = Some(false);
    record.rrule = Some("FREQ=WEEKLY;BYDAY=MO;COUNT=10".to_string());
    record.delete_exceptions = Some(temporal_set(&[utc(2024, 1, 8, 9, 0)]));

    let row = adjuster.adjust_prior_update(record, &mut sink).unwrap();

    // Span columns cover the whole series again.
    assert_eq!(row.start, Some(utc(2024, 1, 1, 9, 0)));
    assert_eq!(row.end, Some(utc(2024, 3, 4, 10, 0)));
    assert!(row.rrule.is_none());

    let (pattern, duration_days) = decode(row.series_pattern.as_deref().unwrap()).unwrap();
    assert_eq!(duration_days, 0);
    assert_eq!(pattern.kind, PatternKind::Weekly);
    assert_eq!(pattern.interval, 1);
    assert_eq!(pattern.end, SeriesEnd::Count(10));

    // Exception dates truncated back to midnight positions.
    assert_eq!(
        row.delete_exceptions,
        Some(temporal_set(&[utc(2024, 1, 8, 0, 0)]))
    );
    assert!(sink.is_empty());
}

#[test]
fn master_save_then_load_round_trips() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup).with_max_occurrences(500);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut record = EventRecord::new();
    record.id = Some(id);
    record.series_id = Some(id);
    record.start = Some(utc(2024, 1, 1, 9, 0));
    record.end = Some(utc(2024, 1, 1, 10, 0));
    record.all_day = Some(false);
    record.rrule = Some("FREQ=WEEKLY;BYDAY=MO;COUNT=10".to_string());

    let row = adjuster
        .adjust_prior_update(record.clone(), &mut sink)
        .unwrap();
    let reloaded = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert_eq!(reloaded.start, record.start);
    assert_eq!(reloaded.end, record.end);
    // Text layout may differ; the parsed rules must not.
    assert_eq!(
        parse_recur(reloaded.rrule.as_deref().unwrap()).unwrap(),
        parse_recur(record.rrule.as_deref().unwrap()).unwrap()
    );
    assert!(sink.is_empty());
}

#[test]
fn master_save_truncates_created_subseconds() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut record = EventRecord::new();
    record.id = Some(id);
    record.series_id = Some(id);
    record.start = Some(utc(2024, 1, 1, 9, 0));
    record.end = Some(utc(2024, 1, 1, 10, 0));
    record.rrule = Some("FREQ=DAILY;COUNT=3".to_string());
    record.created = Some(utc(2024, 1, 1, 8, 0) + TimeDelta::milliseconds(123));

    let row = adjuster.adjust_prior_insert(record, &mut sink).unwrap();

    assert_eq!(row.created, Some(utc(2024, 1, 1, 8, 0)));
}

#[test]
fn exception_load_translates_position_and_drops_rule() {
    let series_id = Uuid::new_v4();
    let mut lookup = StaticSeriesLookup::new();
    lookup.insert(series_id, weekly_monday_rule());
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut row = EventRecord::new();
    row.id = Some(Uuid::new_v4());
    row.series_id = Some(series_id);
    row.start = Some(utc(2024, 1, 15, 11, 0));
    row.end = Some(utc(2024, 1, 15, 12, 0));
    row.recurrence_id = Some(RecurrenceId::Positional(3));
    // Inherited from the master's format; exceptions never carry a rule.
    row.rrule = Some("FREQ=WEEKLY;BYDAY=MO;COUNT=10".to_string());

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert_eq!(
        record.recurrence_id,
        Some(RecurrenceId::temporal(utc(2024, 1, 15, 9, 0)))
    );
    assert!(record.rrule.is_none());
    assert_eq!(record.series_id, Some(series_id));

    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].severity, ProblemSeverity::Trivial);
}

#[test]
fn exception_load_demotes_stale_position() {
    let series_id = Uuid::new_v4();
    let mut lookup = StaticSeriesLookup::new();
    lookup.insert(series_id, weekly_monday_rule());
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut row = EventRecord::new();
    row.id = Some(id);
    row.series_id = Some(series_id);
    row.start = Some(utc(2024, 6, 1, 9, 0));
    row.end = Some(utc(2024, 6, 1, 10, 0));
    // A rule edit shortened the series; position 99 no longer exists.
    row.recurrence_id = Some(RecurrenceId::Positional(99));

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert!(record.series_id.is_none());
    assert!(record.recurrence_id.is_none());
    assert_eq!(sink.len(), 1);
    let entry = &sink.entries()[0];
    assert_eq!(entry.severity, ProblemSeverity::Minor);
    assert_eq!(entry.event_id, Some(id));
}

#[test]
fn exception_load_demotes_when_master_is_gone() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut row = EventRecord::new();
    row.id = Some(Uuid::new_v4());
    row.series_id = Some(Uuid::new_v4());
    row.recurrence_id = Some(RecurrenceId::Positional(2));

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert!(record.series_id.is_none());
    assert!(record.recurrence_id.is_none());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].severity, ProblemSeverity::Minor);
}

#[test]
fn exception_load_propagates_lookup_failure() {
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &FailingLookup);
    let mut sink = DiagnosticLog::new();

    let mut row = EventRecord::new();
    row.id = Some(Uuid::new_v4());
    row.series_id = Some(Uuid::new_v4());
    row.recurrence_id = Some(RecurrenceId::Positional(2));

    let err = adjuster.adjust_after_load(row, &mut sink).unwrap_err();
    assert!(!err.is_unresolvable_position());
    assert!(matches!(err, CompatError::LookupError(_)));
}

#[test]
fn exception_save_resolves_temporal_id() {
    let series_id = Uuid::new_v4();
    let mut lookup = StaticSeriesLookup::new();
    lookup.insert(series_id, weekly_monday_rule());
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut record = EventRecord::new();
    record.id = Some(Uuid::new_v4());
    record.series_id = Some(series_id);
    record.start = Some(utc(2024, 1, 15, 11, 0));
    record.end = Some(utc(2024, 1, 15, 12, 0));
    record.recurrence_id = Some(RecurrenceId::temporal(utc(2024, 1, 15, 9, 0)));

    let row = adjuster.adjust_prior_update(record, &mut sink).unwrap();

    assert_eq!(row.recurrence_id, Some(RecurrenceId::Positional(3)));
    assert_eq!(row.date_position, Some(utc(2024, 1, 15, 0, 0)));
    assert!(sink.is_empty());
}

#[test]
fn exception_save_keeps_direct_position() {
    let series_id = Uuid::new_v4();
    let mut lookup = StaticSeriesLookup::new();
    lookup.insert(series_id, weekly_monday_rule());
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut record = EventRecord::new();
    record.id = Some(Uuid::new_v4());
    record.series_id = Some(series_id);
    record.recurrence_id = Some(RecurrenceId::Positional(2));

    let row = adjuster.adjust_prior_update(record, &mut sink).unwrap();

    assert_eq!(row.recurrence_id, Some(RecurrenceId::Positional(2)));
    assert_eq!(row.date_position, Some(utc(2024, 1, 8, 0, 0)));
}

#[test]
fn exception_save_restates_attached_rule() {
    let series_id = Uuid::new_v4();
    let mut lookup = StaticSeriesLookup::new();
    lookup.insert(series_id, weekly_monday_rule());
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut record = EventRecord::new();
    record.id = Some(Uuid::new_v4());
    record.series_id = Some(series_id);
    record.start = Some(utc(2024, 1, 15, 11, 0));
    record.end = Some(utc(2024, 1, 15, 12, 0));
    record.recurrence_id = Some(RecurrenceId::temporal(utc(2024, 1, 15, 9, 0)));
    record.rrule = Some("FREQ=WEEKLY;BYDAY=MO;COUNT=10".to_string());

    let row = adjuster.adjust_prior_update(record, &mut sink).unwrap();

    assert!(row.rrule.is_none());
    let stored = row.series_pattern.unwrap();
    let (pattern, duration_days) = decode(&stored).unwrap();
    assert_eq!(duration_days, 0);
    assert_eq!(pattern.kind, PatternKind::Weekly);
    assert!(sink.is_empty());
}

#[test]
fn remnant_is_stripped_on_load() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut row = EventRecord::new();
    row.id = Some(id);
    row.series_id = Some(id);
    row.start = Some(utc(2024, 2, 1, 9, 0));
    row.end = Some(utc(2024, 2, 1, 10, 0));
    row.recurrence_id = Some(RecurrenceId::Positional(4));
    // No stored pattern: structurally a root, no longer a master.

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert!(record.series_id.is_none());
    assert!(record.recurrence_id.is_none());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].severity, ProblemSeverity::Trivial);
}

#[test]
fn insert_derives_acting_user() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut record = EventRecord::new();
    record.id = Some(Uuid::new_v4());
    record.start = Some(utc(2024, 5, 1, 8, 0));
    record.calendar_user = Some("mailto:otto@example.org".to_string());

    let row = adjuster.adjust_prior_insert(record, &mut sink).unwrap();

    assert_eq!(row.created_by.as_deref(), Some("mailto:otto@example.org"));
    assert_eq!(row.modified_by.as_deref(), Some("mailto:otto@example.org"));
    assert!(row.is_touched(EventField::CreatedBy));
}

#[test]
fn malformed_calendar_user_is_dropped() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();
    let id = Uuid::new_v4();

    let mut row = EventRecord::new();
    row.id = Some(id);
    row.calendar_user = Some("not-a-uri".to_string());

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert!(record.calendar_user.is_none());
    assert_eq!(sink.len(), 1);
    let entry = &sink.entries()[0];
    assert_eq!(entry.severity, ProblemSeverity::Normal);
    assert_eq!(entry.field, "calendar_user");
    assert_eq!(entry.event_id, Some(id));
}

#[test]
fn all_day_boundaries_are_pinned_to_midnight() {
    let lookup = StaticSeriesLookup::new();
    let adjuster = CompatAdjuster::new(&RruleOccurrences, &lookup);
    let mut sink = DiagnosticLog::new();

    let mut row = EventRecord::new();
    row.id = Some(Uuid::new_v4());
    row.all_day = Some(true);
    row.start = Some(utc(2024, 7, 1, 9, 13));
    row.end = Some(utc(2024, 7, 2, 9, 13));

    let record = adjuster.adjust_after_load(row, &mut sink).unwrap();

    assert_eq!(record.start, Some(utc(2024, 7, 1, 0, 0)));
    assert_eq!(record.end, Some(utc(2024, 7, 2, 0, 0)));
}
