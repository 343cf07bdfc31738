//! Generic field normalization shared by every classification.

use kagami_core::diagnostics::{Diagnostic, DiagnosticSink};
use kagami_core::types::ProblemSeverity;

use crate::event::{EventField, EventRecord};
use crate::position::date_position;

/// Applies the normalizations every record gets, in either direction: end
/// boundary inherited from the start, all-day periods pinned to UTC
/// midnight, timestamp folded into last-modified, malformed calendar users
/// dropped.
pub(super) fn enhance(record: &mut EventRecord, sink: &mut dyn DiagnosticSink) {
    if record.end.is_none() && record.start.is_some() {
        record.end = record.start;
        record.touch(EventField::End);
    }

    if record.is_all_day() {
        if let Some(start) = record.start {
            let pinned = date_position(start);
            if pinned != start {
                record.start = Some(pinned);
                record.touch(EventField::Start);
            }
        }
        if let Some(end) = record.end {
            let pinned = date_position(end);
            if pinned != end {
                record.end = Some(pinned);
                record.touch(EventField::End);
            }
        }
    }

    if record.last_modified.is_none() && record.timestamp.is_some() {
        record.last_modified = record.timestamp;
        record.touch(EventField::LastModified);
    }

    if let Some(user) = record.calendar_user.clone() {
        if !is_valid_calendar_user(&user) {
            record.calendar_user = None;
            record.touch(EventField::CalendarUser);
            sink.record(
                Diagnostic::new(
                    record.id,
                    EventField::CalendarUser.as_str(),
                    ProblemSeverity::Normal,
                    "malformed calendar user dropped",
                )
                .with_cause(user),
            );
        }
    }
}

/// Insert-only derivation: the acting-user fields default to the calendar
/// user.
pub(super) fn derive_acting_user(record: &mut EventRecord) {
    let Some(user) = record.calendar_user.clone() else {
        return;
    };
    if record.created_by.is_none() {
        record.created_by = Some(user.clone());
        record.touch(EventField::CreatedBy);
    }
    if record.modified_by.is_none() {
        record.modified_by = Some(user);
        record.touch(EventField::ModifiedBy);
    }
}

/// A calendar user is stored as a mailto URI.
fn is_valid_calendar_user(uri: &str) -> bool {
    let Some(rest) = strip_prefix_ignore_case(uri, "mailto:") else {
        return false;
    };
    !rest.trim().is_empty() && rest.contains('@')
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
