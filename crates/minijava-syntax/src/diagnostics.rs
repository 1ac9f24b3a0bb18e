//! Severity-tagged diagnostics with source spans.
//!
//! Every pass that can fail takes a [`DiagnosticSink`]; errors increment the
//! sink's counter while notes and warnings are purely observational.
//! Downstream passes consult [`DiagnosticSink::error_count`] and refuse to run
//! when an upstream pass has already failed.

use std::io::Write;

use serde::{Deserialize, Serialize};

/// A position in the source text. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Default for SourceLocation {
    fn default() -> Self {
        SourceLocation {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A half-open region of source text: `begin` is the location before the
/// first character, `end` the location after the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub begin: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    /// Span covering a whole line, for passes that only track line numbers.
    pub fn for_line(line: u32) -> Self {
        let loc = SourceLocation {
            offset: 0,
            line: line.max(1),
            column: 1,
        };
        SourceSpan {
            begin: loc,
            end: loc,
        }
    }
}

/// Message severity. Only `Error` affects pipeline control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: SourceSpan) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }
}

/// Receiver for diagnostics emitted by the compiler passes.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);

    /// Number of `Error`-severity diagnostics emitted so far.
    fn error_count(&self) -> usize;

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Sink that retains every diagnostic, used by tests and by callers that want
/// to inspect messages after a pass has run.
#[derive(Debug, Default)]
pub struct CollectingSink {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    fn error_count(&self) -> usize {
        self.errors
    }
}

/// Sink that echoes every message to a writer as it arrives, in addition to
/// counting errors. The CLI wires this to standard error.
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    out: W,
    errors: usize,
}

impl<W: Write> StreamSink<W> {
    pub fn new(out: W) -> Self {
        StreamSink { out, errors: 0 }
    }
}

impl StreamSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        StreamSink::new(std::io::stderr())
    }
}

impl<W: Write> DiagnosticSink for StreamSink<W> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors += 1;
        }
        // A failed write must not abort compilation.
        let _ = writeln!(self.out, "{}", diagnostic.message);
    }

    fn error_count(&self) -> usize {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_counts_only_errors() {
        let mut sink = CollectingSink::new();
        sink.emit(Diagnostic {
            severity: Severity::Note,
            message: "note".into(),
            span: SourceSpan::default(),
        });
        sink.emit(Diagnostic::error("boom", SourceSpan::for_line(3)));
        sink.emit(Diagnostic {
            severity: Severity::Warning,
            message: "warn".into(),
            span: SourceSpan::default(),
        });

        assert_eq!(sink.error_count(), 1);
        assert!(sink.has_errors());
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn stream_sink_writes_messages() {
        let mut buffer = Vec::new();
        {
            let mut sink = StreamSink::new(&mut buffer);
            sink.emit(Diagnostic::error("first", SourceSpan::default()));
            sink.emit(Diagnostic::error("second", SourceSpan::default()));
            assert_eq!(sink.error_count(), 2);
        }
        assert_eq!(String::from_utf8(buffer).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn for_line_clamps_to_one() {
        let span = SourceSpan::for_line(0);
        assert_eq!(span.begin.line, 1);
    }
}
