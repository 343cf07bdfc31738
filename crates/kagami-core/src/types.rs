//! Value types shared across the compatibility translator.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a recoverable data-quality problem, ordered by real-world
/// impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemSeverity {
    /// Cosmetic; cleaned up silently.
    Trivial,
    /// Partial data loss limited to one item.
    Minor,
    /// A participant or user-authored datum was dropped.
    Normal,
    /// A whole recurrence was demoted.
    Major,
    /// Reserved for storage-layer faults.
    Critical,
}

impl ProblemSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Minor => "minor",
            Self::Normal => "normal",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ProblemSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualifier on a temporal recurrence id extending it beyond a single
/// occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMarker {
    ThisAndFuture,
}

/// Identifies one occurrence within a recurring series.
///
/// The legacy representation addresses occurrences by 1-based ordinal within
/// the generated sequence; the modern representation addresses them by the
/// occurrence's absolute start timestamp.
#[derive(Debug, Clone, Copy)]
pub enum RecurrenceId {
    /// Legacy 1-based ordinal recurrence position.
    Positional(u32),
    /// Occurrence start timestamp, optionally range-qualified.
    Temporal(DateTime<Utc>, Option<RangeMarker>),
}

impl RecurrenceId {
    #[must_use]
    pub const fn temporal(start: DateTime<Utc>) -> Self {
        Self::Temporal(start, None)
    }

    #[must_use]
    pub const fn as_temporal(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Temporal(start, _) => Some(*start),
            Self::Positional(_) => None,
        }
    }

    #[must_use]
    pub const fn as_positional(&self) -> Option<u32> {
        match self {
            Self::Positional(ordinal) => Some(*ordinal),
            Self::Temporal(..) => None,
        }
    }
}

// Temporal ids compare by timestamp alone; the range marker does not
// participate in identity. Positionals order before temporals so that mixed
// sets still have a total order.
impl PartialEq for RecurrenceId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Positional(a), Self::Positional(b)) => a == b,
            (Self::Temporal(a, _), Self::Temporal(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RecurrenceId {}

impl Ord for RecurrenceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Positional(a), Self::Positional(b)) => a.cmp(b),
            (Self::Temporal(a, _), Self::Temporal(b, _)) => a.cmp(b),
            (Self::Positional(_), Self::Temporal(..)) => Ordering::Less,
            (Self::Temporal(..), Self::Positional(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for RecurrenceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A closed date interval with an all-day flag.
///
/// For a series master loaded from legacy storage the interval spans the
/// whole series; after reconstruction it describes exactly one occurrence.
/// `end >= start` is only guaranteed after reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
}

impl Period {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>, all_day: bool) -> Self {
        Self {
            start,
            end,
            all_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn severity_is_ordered_by_impact() {
        assert!(ProblemSeverity::Trivial < ProblemSeverity::Minor);
        assert!(ProblemSeverity::Minor < ProblemSeverity::Normal);
        assert!(ProblemSeverity::Normal < ProblemSeverity::Major);
        assert!(ProblemSeverity::Major < ProblemSeverity::Critical);
    }

    #[test]
    fn temporal_identity_ignores_range_marker() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let plain = RecurrenceId::temporal(start);
        let ranged = RecurrenceId::Temporal(start, Some(RangeMarker::ThisAndFuture));
        assert_eq!(plain, ranged);
        assert_eq!(plain.cmp(&ranged), Ordering::Equal);
    }

    #[test]
    fn positional_orders_against_positional() {
        assert!(RecurrenceId::Positional(2) < RecurrenceId::Positional(10));
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert!(RecurrenceId::Positional(u32::MAX) < RecurrenceId::temporal(start));
    }
}
