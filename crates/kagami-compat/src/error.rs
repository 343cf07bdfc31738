use thiserror::Error;

/// Compatibility layer errors - combines all error types
#[derive(Error, Debug)]
pub enum CompatError {
    #[error(transparent)]
    PatternError(#[from] kagami_pattern::PatternError),

    #[error(transparent)]
    CoreError(#[from] kagami_core::error::CoreError),

    /// A recurrence position that no occurrence of the series resolves to.
    /// Distinguished from every other kind by [`CompatError::code`]; the
    /// orchestrator demotes on it instead of propagating.
    #[error("Unresolvable recurrence position: {0}")]
    UnresolvablePosition(String),

    #[error("Rule error: {0}")]
    RuleError(String),

    #[error("Lookup error: {0}")]
    LookupError(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),
}

impl CompatError {
    /// Stable code of the dedicated unresolvable-position kind.
    pub const UNRESOLVABLE_POSITION: &'static str = "KGM-4040";

    /// Stable error code for callers that route on kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnresolvablePosition(_) => Self::UNRESOLVABLE_POSITION,
            Self::CoreError(_) => "KGM-4000",
            Self::PatternError(_) => "KGM-4001",
            Self::RuleError(_) => "KGM-4002",
            Self::LookupError(_) => "KGM-4003",
            Self::InvariantViolation(_) => "KGM-5000",
        }
    }

    #[must_use]
    pub const fn is_unresolvable_position(&self) -> bool {
        matches!(self, Self::UnresolvablePosition(_))
    }
}

pub type CompatResult<T> = std::result::Result<T, CompatError>;
