//! Recoverable data-quality diagnostics.
//!
//! Historically malformed rows must not abort the surrounding load or save;
//! every tolerated anomaly is recorded here instead, for the storage layer
//! to surface to operators.

use uuid::Uuid;

use crate::types::ProblemSeverity;

/// One tolerated anomaly, attributed to the field and event it was found on.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Event the anomaly belongs to, when known.
    pub event_id: Option<Uuid>,
    /// Stable name of the offending field.
    pub field: &'static str,
    pub severity: ProblemSeverity,
    pub message: String,
    /// Rendered source error, when one exists.
    pub cause: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        event_id: Option<Uuid>,
        field: &'static str,
        severity: ProblemSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            field,
            severity,
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches the rendered source error.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Append-only sink for diagnostics. Implementations must not fail.
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

/// Vec-backed sink with drain-once semantics, owned by the calling storage
/// layer for the duration of one translation batch.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Entries recorded against one event id.
    pub fn for_event(&self, event_id: Uuid) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(move |entry| entry.event_id == Some(event_id))
    }

    /// Highest severity seen so far.
    #[must_use]
    pub fn max_severity(&self) -> Option<ProblemSeverity> {
        self.entries.iter().map(|entry| entry.severity).max()
    }

    /// Removes and returns all entries. A second drain yields nothing until
    /// new entries are recorded.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn record(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(
            event_id = ?diagnostic.event_id,
            field = diagnostic.field,
            severity = %diagnostic.severity,
            message = %diagnostic.message,
            "Recorded diagnostic"
        );
        self.entries.push(diagnostic);
    }
}
