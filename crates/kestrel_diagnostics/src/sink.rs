//! Accumulator for diagnostics emitted during legalization.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::Mutex;

/// An accumulator for diagnostics emitted during a legalization run.
///
/// Legalizers borrow the sink immutably, so it uses interior mutability; the
/// passes themselves are single-threaded and emit in a deterministic order.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Emits a diagnostic into the sink.
    pub fn emit(&self, diag: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diag);
    }

    /// Returns the number of warning-severity diagnostics emitted so far.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
