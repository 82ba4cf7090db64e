use crate::span::Span;
use std::sync::Mutex;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// A diagnostic message with location and severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            span,
            message: message.into(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            span,
            message: message.into(),
        }
    }

    pub fn info(span: Span, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            span,
            message: message.into(),
        }
    }
}

/// Trait for handling diagnostics
/// This allows for dependency injection and testing with mock handlers
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn error(&self, span: Span, message: &str) {
        self.report(Diagnostic::error(span, message));
    }

    fn warning(&self, span: Span, message: &str) {
        self.report(Diagnostic::warning(span, message));
    }

    fn info(&self, span: Span, message: &str) {
        self.report(Diagnostic::info(span, message));
    }

    fn has_errors(&self) -> bool;
    fn error_count(&self) -> usize;
    fn warning_count(&self) -> usize;
    fn get_diagnostics(&self) -> Vec<Diagnostic>;
}

/// Forwards diagnostics to `tracing` and keeps a copy
#[derive(Default)]
pub struct TracingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl TracingDiagnosticHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_diagnostics<T>(&self, f: impl FnOnce(&Vec<Diagnostic>) -> T) -> T {
        // A poisoned lock still holds a usable vector.
        let guard = self
            .diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }
}

impl DiagnosticHandler for TracingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Error => {
                tracing::error!(at = %diagnostic.span, "{}", diagnostic.message)
            }
            DiagnosticLevel::Warning => {
                tracing::warn!(at = %diagnostic.span, "{}", diagnostic.message)
            }
            DiagnosticLevel::Info => {
                tracing::info!(at = %diagnostic.span, "{}", diagnostic.message)
            }
        }

        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.with_diagnostics(|d| d.iter().any(|d| d.level == DiagnosticLevel::Error))
    }

    fn error_count(&self) -> usize {
        self.with_diagnostics(|d| {
            d.iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count()
        })
    }

    fn warning_count(&self) -> usize {
        self.with_diagnostics(|d| {
            d.iter()
                .filter(|d| d.level == DiagnosticLevel::Warning)
                .count()
        })
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.with_diagnostics(|d| d.clone())
    }
}

/// Collecting diagnostic handler for testing
/// Collects all diagnostics without printing
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| d.level == level)
            .count()
    }
}

impl Default for CollectingDiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.count(DiagnosticLevel::Error) > 0
    }

    fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        self.count(DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let span = Span::new(0, 5, 1, 1);
        let diag = Diagnostic::error(span, "Test error");

        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.message, "Test error");
    }

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingDiagnosticHandler::new();
        let span = Span::new(0, 5, 1, 1);

        handler.error(span, "Error 1");
        handler.warning(span, "Warning 1");
        handler.error(span, "Error 2");

        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.has_errors());
        assert_eq!(handler.get_diagnostics().len(), 3);
    }

    #[test]
    fn test_tracing_handler_keeps_diagnostics() {
        let handler = TracingDiagnosticHandler::new();
        handler.warning(Span::dummy(), "did not converge");
        handler.info(Span::dummy(), "synthesized shim");

        assert!(!handler.has_errors());
        assert_eq!(handler.warning_count(), 1);
        assert_eq!(handler.get_diagnostics().len(), 2);
    }
}
