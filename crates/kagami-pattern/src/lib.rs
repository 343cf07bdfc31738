//! Legacy series-pattern grammar and its RFC5545 RECUR counterpart.
//!
//! The stored legacy column has the shape `"<absoluteDurationDays>~<body>"`
//! where the body is a pipe-delimited key/value list. This crate models the
//! grammar (`series`), parses it (`parse`), serializes it (`build`), and
//! converts it to and from RECUR rule text (`recur`).

pub mod build;
pub mod error;
pub mod parse;
pub mod recur;
pub mod series;

pub use error::{PatternError, PatternErrorKind, PatternResult};
pub use recur::{Frequency, RecurRule, RecurrenceRule, WeekdayNum};
pub use series::{PatternKind, SeriesEnd, SeriesPattern, WeekdayMask};
