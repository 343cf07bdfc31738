//! Pattern codec error types.

use std::fmt;

/// Result type for pattern parsing and building.
pub type PatternResult<T> = Result<T, PatternError>;

/// An error raised while decoding or encoding a legacy series pattern.
#[derive(Debug)]
pub struct PatternError {
    /// Error kind.
    pub kind: PatternErrorKind,
    /// Error message.
    pub message: String,
}

impl PatternError {
    /// Creates a new pattern error.
    #[must_use]
    pub fn new(kind: PatternErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a missing-separator error (stored value lacks the `~` prefix).
    #[must_use]
    pub fn missing_separator(stored: &str) -> Self {
        Self::new(
            PatternErrorKind::MissingSeparator,
            format!("no duration separator in {stored:?}"),
        )
    }

    /// Creates an invalid-duration error (non-numeric prefix).
    #[must_use]
    pub fn invalid_duration(prefix: &str) -> Self {
        Self::new(
            PatternErrorKind::InvalidDuration,
            format!("non-numeric duration prefix: {prefix:?}"),
        )
    }

    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(key: char) -> Self {
        Self::new(
            PatternErrorKind::MissingField,
            format!("missing required field: {key}"),
        )
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid_value(key: char, value: &str) -> Self {
        Self::new(
            PatternErrorKind::InvalidValue,
            format!("invalid value for field {key}: {value:?}"),
        )
    }

    /// Creates an invalid-value error for a named RECUR rule part.
    #[must_use]
    pub fn invalid_part(part: &str, value: &str) -> Self {
        Self::new(
            PatternErrorKind::InvalidValue,
            format!("invalid value for {part}: {value:?}"),
        )
    }

    /// Creates an unrepresentable-rule error (modern rule outside the legacy
    /// grammar).
    #[must_use]
    pub fn unrepresentable(message: impl Into<String>) -> Self {
        Self::new(PatternErrorKind::Unrepresentable, message)
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PatternError {}

/// Pattern error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternErrorKind {
    /// Stored value lacks the duration separator.
    MissingSeparator,
    /// Duration prefix is not an integer.
    InvalidDuration,
    /// Body ends in a key without a value.
    TruncatedBody,
    /// A required field for the pattern kind is absent.
    MissingField,
    /// A field value is out of range or malformed.
    InvalidValue,
    /// Unknown pattern kind code.
    UnknownKind,
    /// Both an occurrence count and an until bound are present.
    ConflictingEnd,
    /// A modern rule uses features the legacy grammar cannot hold.
    Unrepresentable,
}

impl fmt::Display for PatternErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingSeparator => "missing separator",
            Self::InvalidDuration => "invalid duration",
            Self::TruncatedBody => "truncated body",
            Self::MissingField => "missing field",
            Self::InvalidValue => "invalid value",
            Self::UnknownKind => "unknown pattern kind",
            Self::ConflictingEnd => "conflicting end",
            Self::Unrepresentable => "unrepresentable rule",
        };
        f.write_str(name)
    }
}
