//! Sparse event record shared by both storage representations.
//!
//! Presence is part of the contract: a field that is `None` was never bound
//! by the storage layer, which is distinct from a bound-but-empty value.
//! Fields written through the translator are additionally tracked in a
//! touched set, so partial-update callers can tell derived values from
//! untouched input.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use kagami_core::types::{Period, RecurrenceId};
use uuid::Uuid;

/// Stable field identity, used for diagnostics attribution and
/// touched-field tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventField {
    Id,
    SeriesId,
    Start,
    End,
    Timezone,
    AllDay,
    RecurrenceRule,
    SeriesPattern,
    RecurrenceId,
    DatePosition,
    DeleteExceptions,
    ChangeExceptions,
    Created,
    LastModified,
    Timestamp,
    CalendarUser,
    CreatedBy,
    ModifiedBy,
}

impl EventField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::SeriesId => "series_id",
            Self::Start => "start",
            Self::End => "end",
            Self::Timezone => "timezone",
            Self::AllDay => "all_day",
            Self::RecurrenceRule => "recurrence_rule",
            Self::SeriesPattern => "series_pattern",
            Self::RecurrenceId => "recurrence_id",
            Self::DatePosition => "date_position",
            Self::DeleteExceptions => "delete_exceptions",
            Self::ChangeExceptions => "change_exceptions",
            Self::Created => "created",
            Self::LastModified => "last_modified",
            Self::Timestamp => "timestamp",
            Self::CalendarUser => "calendar_user",
            Self::CreatedBy => "created_by",
            Self::ModifiedBy => "modified_by",
        }
    }
}

impl std::fmt::Display for EventField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event row, in either representation.
///
/// For a legacy series master, `start`/`end` span the whole series and
/// `series_pattern` holds the stored column; after load they describe the
/// first occurrence and `rrule` holds RECUR text instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub id: Option<Uuid>,
    pub series_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Originating zone; `None` for floating events.
    pub timezone: Option<Tz>,
    pub all_day: Option<bool>,
    /// Modern RECUR rule text.
    pub rrule: Option<String>,
    /// Legacy pattern column, `"<absoluteDurationDays>~<body>"`.
    pub series_pattern: Option<String>,
    pub recurrence_id: Option<RecurrenceId>,
    /// Legacy truncated date position of an exception row.
    pub date_position: Option<DateTime<Utc>>,
    pub delete_exceptions: Option<BTreeSet<RecurrenceId>>,
    pub change_exceptions: Option<BTreeSet<RecurrenceId>>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Calendar user as a mailto URI.
    pub calendar_user: Option<String>,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    touched: BTreeSet<EventField>,
}

impl EventRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a field as written by this translation call.
    pub fn touch(&mut self, field: EventField) {
        self.touched.insert(field);
    }

    #[must_use]
    pub fn is_touched(&self, field: EventField) -> bool {
        self.touched.contains(&field)
    }

    #[must_use]
    pub fn touched(&self) -> impl Iterator<Item = EventField> {
        self.touched.iter().copied()
    }

    #[must_use]
    pub fn is_all_day(&self) -> bool {
        self.all_day.unwrap_or(false)
    }

    /// Zone used for wall-clock arithmetic; all-day and floating events use
    /// UTC.
    #[must_use]
    pub fn effective_tz(&self) -> Tz {
        if self.is_all_day() {
            Tz::UTC
        } else {
            self.timezone.unwrap_or(Tz::UTC)
        }
    }

    /// The record's period, when both boundary fields are present.
    #[must_use]
    pub fn period(&self) -> Option<Period> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(Period::new(start, end, self.is_all_day())),
            _ => None,
        }
    }

    /// Writes a period back into the boundary fields.
    pub fn set_period(&mut self, period: Period) {
        self.start = Some(period.start);
        self.end = Some(period.end);
        self.touch(EventField::Start);
        self.touch(EventField::End);
    }

    /// Whether the row's own id equals its series id (structurally a series
    /// root, master or former master).
    #[must_use]
    pub fn is_series_root(&self) -> bool {
        matches!((self.id, self.series_id), (Some(id), Some(series_id)) if id == series_id)
    }

    /// Whether the stored recurrence id is a legacy ordinal.
    #[must_use]
    pub fn has_positional_id(&self) -> bool {
        matches!(self.recurrence_id, Some(RecurrenceId::Positional(_)))
    }

    /// Clears every recurrence-related field, demoting the record to a
    /// non-recurring event.
    pub fn clear_recurrence(&mut self) {
        self.rrule = None;
        self.series_pattern = None;
        self.series_id = None;
        self.recurrence_id = None;
        self.date_position = None;
        self.delete_exceptions = None;
        self.change_exceptions = None;
        self.touch(EventField::RecurrenceRule);
        self.touch(EventField::SeriesPattern);
        self.touch(EventField::SeriesId);
        self.touch(EventField::RecurrenceId);
        self.touch(EventField::DatePosition);
        self.touch(EventField::DeleteExceptions);
        self.touch(EventField::ChangeExceptions);
    }
}
