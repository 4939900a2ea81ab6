//! Per-stream diagnostic queue and process-wide routing
//!
//! Failed operations push a structured record onto their stream's queue
//! before returning the error, so a caller can run a sequence of calls and
//! drain the history afterwards. Printing goes to the process-wide
//! diagnostic sink, standard error by default, prefixed with the
//! registered program name.

use parking_lot::RwLock;
use sdf_core::SdfError;
use std::io::Write;

/// How serious a queued record is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One queued diagnostic
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable tag such as `DATA_TRUNCATED` or `ROW_LIMIT_HIT`
    pub tag: &'static str,
    pub message: String,
}

/// Accumulated diagnostics of one stream
#[derive(Debug, Default)]
pub struct ErrorQueue {
    records: Vec<Diagnostic>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error record and hand the error back for propagation
    pub fn record(&mut self, err: SdfError) -> SdfError {
        self.records.push(Diagnostic {
            severity: Severity::Error,
            tag: err.tag(),
            message: err.to_string(),
        });
        err
    }

    /// Queue a warning that does not fail the operation
    pub fn warn(&mut self, tag: &'static str, message: impl Into<String>) {
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            tag,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Take every queued record, leaving the queue empty
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.records)
    }

    /// Print and drain the queue through the process-wide sink
    pub fn print(&mut self) {
        let program = PROGRAM_NAME.read().clone();
        let sink = *DIAGNOSTIC_SINK.read();
        for record in self.drain() {
            let severity = match record.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
            };
            let line = match &program {
                Some(name) => format!("{name}: {severity}: {}: {}", record.tag, record.message),
                None => format!("{severity}: {}: {}", record.tag, record.message),
            };
            sink.write_line(&line);
        }
    }
}

/// Where printed diagnostics go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSink {
    Stderr,
    Stdout,
    /// Swallow printed diagnostics (the queue itself is unaffected)
    Quiet,
}

impl DiagnosticSink {
    fn write_line(self, line: &str) {
        match self {
            DiagnosticSink::Stderr => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
            DiagnosticSink::Stdout => {
                let _ = writeln!(std::io::stdout(), "{line}");
            }
            DiagnosticSink::Quiet => {}
        }
    }
}

static DIAGNOSTIC_SINK: RwLock<DiagnosticSink> = RwLock::new(DiagnosticSink::Stderr);
static PROGRAM_NAME: RwLock<Option<String>> = RwLock::new(None);

/// Route printed diagnostics; affects the whole process
pub fn set_diagnostic_sink(sink: DiagnosticSink) {
    *DIAGNOSTIC_SINK.write() = sink;
}

/// Register the program name used to prefix printed diagnostics
pub fn register_program_name(name: impl Into<String>) {
    *PROGRAM_NAME.write() = Some(name.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_drain() {
        let mut queue = ErrorQueue::new();
        let err = queue.record(SdfError::EndOfStream);
        assert!(matches!(err, SdfError::EndOfStream));
        queue.warn("ROW_LIMIT_HIT", "page clipped to 100 rows");
        assert_eq!(queue.len(), 2);
        let records = queue.drain();
        assert!(queue.is_empty());
        assert_eq!(records[0].severity, Severity::Error);
        assert_eq!(records[1].tag, "ROW_LIMIT_HIT");
    }
}
