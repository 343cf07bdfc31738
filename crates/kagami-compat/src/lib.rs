//! Bidirectional compatibility translator between the legacy series storage
//! representation and the modern event model.
//!
//! Legacy storage keeps one row per series whose start/end span the whole
//! series, a proprietary pattern column, and 1-based ordinal positions for
//! exceptions. The modern model keeps the first occurrence's span, RECUR
//! rule text, and timestamp-addressed exceptions. [`service::CompatAdjuster`]
//! is the only entry point external callers use; everything else here is its
//! machinery.

pub mod error;
pub mod event;
pub mod period;
pub mod position;
pub mod recurrence;
pub mod service;

pub use error::{CompatError, CompatResult};
pub use event::{EventField, EventRecord};
pub use recurrence::{OccurrenceSource, RruleOccurrences, SeriesLookup, StaticSeriesLookup};
pub use service::CompatAdjuster;
