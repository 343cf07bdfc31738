//! Collaborator seams: occurrence iteration and sibling-master lookup.
//!
//! The translator never enumerates occurrences itself. It consumes an
//! [`OccurrenceSource`], whose default implementation adapts the `rrule`
//! crate, and resolves exception rows against their sibling master through a
//! [`SeriesLookup`] scoped to the caller's transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kagami_pattern::RecurrenceRule;
use rrule::{RRule, RRuleSet, Tz as RruleTz, Unvalidated};
use uuid::Uuid;

use crate::error::{CompatError, CompatResult};

/// Lazily yields the ascending start timestamps of a rule's occurrences.
///
/// The sequence starts at the rule's defined start, is potentially infinite,
/// and is restarted on every call; implementations hold no shared cursor
/// state.
pub trait OccurrenceSource {
    /// ## Errors
    /// Returns an error if the rule cannot be materialized for iteration.
    fn occurrences(
        &self,
        rule: &RecurrenceRule,
    ) -> CompatResult<Box<dyn Iterator<Item = DateTime<Utc>>>>;
}

/// Default iteration collaborator backed by the `rrule` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RruleOccurrences;

impl RruleOccurrences {
    fn rrule_set(rule: &RecurrenceRule) -> CompatResult<RRuleSet> {
        let parsed = rule
            .rrule_text()
            .parse::<RRule<Unvalidated>>()
            .map_err(|err| CompatError::RuleError(err.to_string()))?;
        let dt_start = rule.start.with_timezone(&RruleTz::UTC);
        parsed
            .build(dt_start)
            .map_err(|err| CompatError::RuleError(err.to_string()))
    }
}

impl OccurrenceSource for RruleOccurrences {
    fn occurrences(
        &self,
        rule: &RecurrenceRule,
    ) -> CompatResult<Box<dyn Iterator<Item = DateTime<Utc>>>> {
        let set = Self::rrule_set(rule)?;
        tracing::trace!(rule = %rule.rrule_text(), start = %rule.start, "Iterating occurrences");
        Ok(Box::new(
            set.into_iter().map(|occurrence| occurrence.with_timezone(&Utc)),
        ))
    }
}

/// Read-only lookup of a sibling master's recurrence data, scoped to the
/// caller's transaction or snapshot.
pub trait SeriesLookup {
    /// ## Errors
    /// Returns an error if the lookup itself fails; an unknown series id is
    /// `Ok(None)`.
    fn recurrence_data(&self, series_id: Uuid) -> CompatResult<Option<RecurrenceRule>>;
}

/// Lookup over a prefetched in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticSeriesLookup {
    entries: BTreeMap<Uuid, RecurrenceRule>,
}

impl StaticSeriesLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series_id: Uuid, rule: RecurrenceRule) {
        self.entries.insert(series_id, rule);
    }
}

impl SeriesLookup for StaticSeriesLookup {
    fn recurrence_data(&self, series_id: Uuid) -> CompatResult<Option<RecurrenceRule>> {
        Ok(self.entries.get(&series_id).cloned())
    }
}
