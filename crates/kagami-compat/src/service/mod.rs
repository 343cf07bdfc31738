//! Compatibility orchestration.
//!
//! The storage layer calls these entry points once per row inside its own
//! transaction: [`CompatAdjuster::adjust_after_load`] turns a stored legacy
//! row into a modern record, [`CompatAdjuster::adjust_prior_insert`] /
//! [`CompatAdjuster::adjust_prior_update`] turn a modern record back into
//! legacy column values. Recoverable data-quality problems go to the
//! caller's diagnostics sink; only collaborator failures and structurally
//! impossible states abort.

mod load;
mod normalize;
mod save;

use kagami_core::constants::MAX_OCCURRENCES;
use kagami_core::diagnostics::{Diagnostic, DiagnosticSink};
use kagami_core::types::ProblemSeverity;

use crate::error::CompatResult;
use crate::event::{EventField, EventRecord};
use crate::position::PositionTranslator;
use crate::recurrence::{OccurrenceSource, SeriesLookup};

/// Classification of one row or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventClass {
    /// No series involvement; generic normalization only.
    Plain,
    /// The representative row of a recurring series.
    SeriesMaster,
    /// A materialized, individually modified occurrence.
    SeriesException,
    /// A row that is structurally a series root but no longer recognized as
    /// a master.
    FormerSeriesRemnant,
}

/// The translator. Stateless apart from its collaborators and the iteration
/// bound; safe to share across threads and invocations.
pub struct CompatAdjuster<'a> {
    occurrences: &'a dyn OccurrenceSource,
    series: &'a dyn SeriesLookup,
    max_occurrences: usize,
}

impl<'a> CompatAdjuster<'a> {
    #[must_use]
    pub fn new(occurrences: &'a dyn OccurrenceSource, series: &'a dyn SeriesLookup) -> Self {
        Self {
            occurrences,
            series,
            max_occurrences: MAX_OCCURRENCES,
        }
    }

    /// Overrides the occurrence-walk bound (configuration hook).
    #[must_use]
    pub fn with_max_occurrences(mut self, max_occurrences: usize) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }

    /// Applies the loaded compat settings.
    #[must_use]
    pub fn with_config(self, config: &kagami_core::config::CompatConfig) -> Self {
        self.with_max_occurrences(config.max_occurrences)
    }

    fn translator(&self) -> PositionTranslator<'_> {
        PositionTranslator::new(self.occurrences, self.max_occurrences)
    }

    /// Classifies a stored legacy row.
    fn classify_row(record: &EventRecord) -> EventClass {
        if record.is_series_root() {
            if record.series_pattern.is_some() {
                EventClass::SeriesMaster
            } else {
                EventClass::FormerSeriesRemnant
            }
        } else if record.series_id.is_some() || record.has_positional_id() {
            EventClass::SeriesException
        } else {
            EventClass::Plain
        }
    }

    /// Classifies a modern record on its way to storage.
    fn classify_record(record: &EventRecord) -> EventClass {
        if record.is_series_root() {
            if record.rrule.is_some() {
                EventClass::SeriesMaster
            } else {
                EventClass::FormerSeriesRemnant
            }
        } else if record.series_id.is_some() || record.recurrence_id.is_some() {
            EventClass::SeriesException
        } else {
            EventClass::Plain
        }
    }

    /// ## Summary
    /// Adjusts a freshly loaded legacy row into a modern event record.
    ///
    /// Recoverable anomalies (unreadable pattern, stale positions, bad
    /// exception dates, malformed calendar user) are recorded in the sink
    /// and repaired by demotion or dropping.
    ///
    /// ## Errors
    /// Returns an error only on collaborator failures that are not the
    /// dedicated unresolvable-position kind, or on structurally impossible
    /// input.
    pub fn adjust_after_load(
        &self,
        row: EventRecord,
        sink: &mut dyn DiagnosticSink,
    ) -> CompatResult<EventRecord> {
        let class = Self::classify_row(&row);
        tracing::trace!(event_id = ?row.id, ?class, "Adjusting loaded row");

        let mut record = match class {
            EventClass::Plain => row,
            EventClass::SeriesMaster => load::master(self, row, sink)?,
            EventClass::SeriesException => load::exception(self, row, sink)?,
            EventClass::FormerSeriesRemnant => strip_remnant(row, sink),
        };
        normalize::enhance(&mut record, sink);
        Ok(record)
    }

    /// ## Summary
    /// Adjusts a modern record into legacy column values before an insert.
    /// Additionally derives the acting user fields from the calendar user
    /// when absent.
    ///
    /// ## Errors
    /// Same contract as [`CompatAdjuster::adjust_after_load`], plus hard
    /// errors for rules the legacy grammar cannot represent.
    pub fn adjust_prior_insert(
        &self,
        record: EventRecord,
        sink: &mut dyn DiagnosticSink,
    ) -> CompatResult<EventRecord> {
        let mut record = self.adjust_prior_save(record, sink)?;
        normalize::derive_acting_user(&mut record);
        Ok(record)
    }

    /// ## Summary
    /// Adjusts a modern record into legacy column values before an update.
    ///
    /// ## Errors
    /// Same contract as [`CompatAdjuster::adjust_prior_insert`].
    pub fn adjust_prior_update(
        &self,
        record: EventRecord,
        sink: &mut dyn DiagnosticSink,
    ) -> CompatResult<EventRecord> {
        self.adjust_prior_save(record, sink)
    }

    fn adjust_prior_save(
        &self,
        record: EventRecord,
        sink: &mut dyn DiagnosticSink,
    ) -> CompatResult<EventRecord> {
        let class = Self::classify_record(&record);
        tracing::trace!(event_id = ?record.id, ?class, "Adjusting record for save");

        let mut record = match class {
            EventClass::Plain => record,
            EventClass::SeriesMaster => save::master(self, record, sink)?,
            EventClass::SeriesException => save::exception(self, record, sink)?,
            EventClass::FormerSeriesRemnant => strip_remnant(record, sink),
        };
        normalize::enhance(&mut record, sink);
        Ok(record)
    }
}

/// Strips recurrence leftovers from a former series root.
fn strip_remnant(mut record: EventRecord, sink: &mut dyn DiagnosticSink) -> EventRecord {
    sink.record(Diagnostic::new(
        record.id,
        EventField::SeriesId.as_str(),
        ProblemSeverity::Trivial,
        "stripped recurrence remnants from former series root",
    ));
    record.clear_recurrence();
    record
}

#[cfg(test)]
mod tests;
