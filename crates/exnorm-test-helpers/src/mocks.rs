//! Mock implementations for testing

use std::sync::{Arc, Mutex, MutexGuard};

use exnorm_core::diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticLevel};

/// A diagnostic handler that collects diagnostics and can be shared with a
/// [`exnorm_core::Normalizer`] while the test keeps a handle on it
#[derive(Debug, Default)]
pub struct MockDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MockDiagnosticHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Messages of every diagnostic at `level`, in report order
    pub fn messages(&self, level: DiagnosticLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }

    /// A panicking test thread must not hide what was already reported.
    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticHandler for MockDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.messages(DiagnosticLevel::Error).len()
    }

    fn warning_count(&self) -> usize {
        self.messages(DiagnosticLevel::Warning).len()
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }
}
