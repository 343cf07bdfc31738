//! Series-span reconstruction.
//!
//! Legacy storage keeps one row per series whose start/end span the whole
//! series; the modern model keeps only the first occurrence. The two
//! transforms here invert each other approximately: the forward scan is
//! truncated at the iteration bound, so series longer than the bound do not
//! round-trip exactly. That boundary is inherited from the legacy format and
//! is kept as documented behavior.

use chrono::{DateTime, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use kagami_core::types::Period;
use kagami_pattern::RecurrenceRule;
use kagami_pattern::recur::absolute_duration_days;

use crate::error::CompatResult;
use crate::recurrence::OccurrenceSource;

/// ## Summary
/// Computes the whole-series span legacy storage wants for a master row,
/// from the first occurrence's period and the recurrence rule.
///
/// The wall-clock time-of-day of the first occurrence's boundaries is
/// recorded in the rule's effective zone, the occurrence sequence is walked
/// up to `max_occurrences`, and the recorded end fraction plus the single
/// occurrence's whole-day duration is re-applied to the last visited date.
/// If the zone's UTC offset differs between span start and span end, the end
/// is shifted by the delta so the wall-clock time-of-day survives the DST
/// transition.
///
/// ## Errors
/// Returns an error if the occurrence source fails.
pub fn implicit_series_period(
    first_occurrence: &Period,
    rule: &RecurrenceRule,
    source: &dyn OccurrenceSource,
    max_occurrences: usize,
) -> CompatResult<Period> {
    let tz = rule.effective_tz();
    let start_local = first_occurrence.start.with_timezone(&tz);
    let end_local = first_occurrence.end.with_timezone(&tz);
    let start_time = start_local.time();
    let end_time = end_local.time();
    let duration_days = absolute_duration_days(first_occurrence);

    let mut occurrences = source.occurrences(rule)?;
    let first = occurrences.next();
    let span_start_date =
        first.map_or_else(|| start_local.date_naive(), |ts| ts.with_timezone(&tz).date_naive());

    // The last occurrence date visited within the bound anchors the span
    // end. A sequence of one (or none) keeps the anchor on the start date.
    let mut span_end_date = span_start_date;
    if first.is_some() {
        let mut visited = 1usize;
        for occurrence in occurrences {
            visited += 1;
            span_end_date = occurrence.with_timezone(&tz).date_naive();
            if visited >= max_occurrences {
                tracing::debug!(
                    max_occurrences,
                    "Series-span scan truncated at iteration bound"
                );
                break;
            }
        }
    }

    let start_naive = span_start_date.and_time(start_time);
    let end_naive = span_end_date.and_time(end_time) + TimeDelta::days(duration_days);

    let span_start = local_to_utc(start_naive, tz);
    // The end is first placed with the start's offset, then corrected by the
    // offset delta so its wall-clock time-of-day matches the recorded
    // fraction on the far side of a DST transition.
    let start_offset = offset_seconds(tz, span_start);
    let provisional_end = naive_minus_offset(end_naive, start_offset);
    let end_offset = offset_seconds(tz, provisional_end);
    let span_end = if end_offset == start_offset {
        provisional_end
    } else {
        provisional_end - TimeDelta::seconds(i64::from(end_offset - start_offset))
    };

    Ok(Period::new(span_start, span_end, first_occurrence.all_day))
}

/// ## Summary
/// Recovers the first occurrence's period from a stored series span, the
/// inverse of [`implicit_series_period`].
///
/// The span start is kept as the occurrence start. The candidate end is the
/// span start's UTC date carrying the span end's UTC time-of-day, advanced
/// one day if that precedes the start, plus the single occurrence's
/// whole-day duration.
///
/// Best-effort: series truncated by the forward scan's bound, or occurrences
/// crossing UTC midnight, reconstruct conservatively. The legacy format
/// cannot always represent the true original value.
#[must_use]
pub fn recurrence_master_period(series_span: &Period, absolute_duration_days: i64) -> Period {
    let start = series_span.start;
    let end_time = series_span.end.time();

    let mut candidate =
        DateTime::from_naive_utc_and_offset(start.date_naive().and_time(end_time), Utc);
    if candidate < start {
        candidate += TimeDelta::days(1);
    }
    let end = candidate + TimeDelta::days(absolute_duration_days);

    Period::new(start, end, series_span.all_day)
}

/// UTC offset of the zone at the given instant, in seconds.
fn offset_seconds(tz: Tz, at: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc()
}

/// Interprets a wall-clock value with a known offset.
fn naive_minus_offset(naive: NaiveDateTime, offset: i32) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive - TimeDelta::seconds(i64::from(offset)), Utc)
}

/// Resolves a wall-clock value in the zone. Ambiguous values (fall-back)
/// take the earlier reading; values inside a spring-forward gap are placed
/// by the offset the zone reports for the raw value.
fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix().local_minus_utc();
            naive_minus_offset(naive, offset)
        }
    }
}
