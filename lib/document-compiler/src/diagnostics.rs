use std::fmt;

use graphql_syntax::ParseError;
use serde::Serialize;
use thiserror::Error;

use crate::ir::{Location, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Syntax,
    Schema,
    Binding,
    Transform,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<Location>,
    /// Secondary locations, e.g. the other half of a conflict.
    pub related: Vec<Location>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            location: Some(location),
            related: vec![],
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message, location)
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Schema,
            message: message.into(),
            location: None,
            related: vec![],
        }
    }

    pub fn internal(message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Internal,
            message: message.into(),
            location,
            related: vec![],
        }
    }

    pub fn syntax(source: &SourceId, error: &ParseError) -> Self {
        Self::error(
            DiagnosticKind::Syntax,
            error.message.clone(),
            Location::new(source.clone(), error.span),
        )
    }

    pub fn with_related(mut self, location: Location) -> Self {
        self.related.push(location);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn to_record(&self) -> DiagnosticRecord {
        let (file, span) = match &self.location {
            Some(location) => (Some(location.source.to_string()), Some(location.span)),
            None => (None, None),
        };

        DiagnosticRecord {
            severity: self.severity,
            message: self.message.clone(),
            file,
            line_start: span.map(|s| s.start.line),
            column_start: span.map(|s| s.start.column),
            line_end: span.map(|s| s.end.line),
            column_end: span.map(|s| s.end.column),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.location {
            Some(location) => write!(f, "{}: {} ({})", label, self.message, location),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Flat, serializable form handed to callers outside the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line_start: Option<usize>,
    pub column_start: Option<usize>,
    pub line_end: Option<usize>,
    pub column_end: Option<usize>,
}

/// The schema failed to load. Fatal for the whole batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to load schema: {}", join_messages(.diagnostics))]
pub struct SchemaDiagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl SchemaDiagnostics {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

fn join_messages(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every diagnostic reported for one document source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDiagnostics {
    pub source: SourceId,
    #[serde(serialize_with = "serialize_records")]
    pub diagnostics: Vec<Diagnostic>,
}

impl DocumentDiagnostics {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

fn serialize_records<S: serde::Serializer>(
    diagnostics: &[Diagnostic],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(diagnostics.iter().map(Diagnostic::to_record))
}

/// Accumulates diagnostics for one document up to a fixed cap.
#[derive(Debug)]
pub struct DiagnosticsCollector {
    diagnostics: Vec<Diagnostic>,
    max_errors: usize,
    errors: usize,
    full: bool,
}

impl DiagnosticsCollector {
    pub fn new(max_errors: usize) -> Self {
        Self {
            diagnostics: vec![],
            max_errors: max_errors.max(1),
            errors: 0,
            full: false,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.full {
            return;
        }

        if diagnostic.is_error() {
            self.errors += 1;
        }
        let location = diagnostic.location.clone();
        self.diagnostics.push(diagnostic);

        if self.errors >= self.max_errors {
            self.full = true;
            self.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                kind: DiagnosticKind::Binding,
                message: "Too many errors".to_string(),
                location,
                related: vec![],
            });
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use graphql_syntax::{Pos, Span};

    use super::*;

    fn location(line: usize, column: usize) -> Location {
        Location::new(
            SourceId::new("query.graphql"),
            Span::new(
                Pos {
                    line,
                    column,
                    offset: 0,
                },
                Pos {
                    line,
                    column: column + 3,
                    offset: 3,
                },
            ),
        )
    }

    #[test]
    fn record_carries_the_span() {
        let diagnostic = Diagnostic::error(DiagnosticKind::Binding, "boom", location(2, 5));
        let record = serde_json::to_value(diagnostic.to_record()).unwrap();
        assert_eq!(
            record,
            serde_json::json!({
                "severity": "error",
                "message": "boom",
                "file": "query.graphql",
                "lineStart": 2,
                "columnStart": 5,
                "lineEnd": 2,
                "columnEnd": 8,
            })
        );
    }

    #[test]
    fn collector_stops_at_cap() {
        let mut collector = DiagnosticsCollector::new(2);
        for i in 0..5 {
            collector.push(Diagnostic::error(
                DiagnosticKind::Binding,
                format!("error {}", i),
                location(1, 1),
            ));
        }
        assert!(collector.is_full());
        let messages: Vec<_> = collector
            .into_inner()
            .into_iter()
            .map(|d| d.message)
            .collect();
        assert_eq!(messages, vec!["error 0", "error 1", "Too many errors"]);
    }

    #[test]
    fn warnings_do_not_count_towards_cap() {
        let mut collector = DiagnosticsCollector::new(1);
        collector.push(Diagnostic::warning(
            DiagnosticKind::Binding,
            "deprecated",
            location(1, 1),
        ));
        assert!(!collector.is_full());
        assert!(!collector.has_errors());
    }
}
