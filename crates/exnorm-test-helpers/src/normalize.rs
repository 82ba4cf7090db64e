//! Pipeline helpers for tests
//!
//! Thin wrappers that build a [`Normalizer`] with a collecting handler and
//! flatten the error into a message, so tests can `assert!` on the result.

use std::sync::Arc;

use exnorm_core::diagnostics::{CollectingDiagnosticHandler, Diagnostic, DiagnosticHandler};
use exnorm_core::{Node, NormalizeReport, Normalizer, NormalizerConfig};

/// Run the full default pipeline with the default configuration
pub fn normalize(tree: Node) -> Result<Node, String> {
    normalize_with_config(tree, NormalizerConfig::default())
}

/// Run the full default pipeline with `config`
pub fn normalize_with_config(tree: Node, config: NormalizerConfig) -> Result<Node, String> {
    let handler: Arc<dyn DiagnosticHandler> = Arc::new(CollectingDiagnosticHandler::new());
    let normalizer = Normalizer::new(config, handler).map_err(|e| e.to_string())?;
    normalizer.normalize(tree).map_err(|e| e.to_string())
}

/// Run only the named passes, in catalog order
pub fn normalize_only(tree: Node, passes: &[&str]) -> Result<Node, String> {
    let handler: Arc<dyn DiagnosticHandler> = Arc::new(CollectingDiagnosticHandler::new());
    let normalizer = Normalizer::only(NormalizerConfig::default(), handler, passes)
        .map_err(|e| e.to_string())?;
    normalizer.normalize(tree).map_err(|e| e.to_string())
}

/// Run the full pipeline and return the report and every diagnostic
/// reported along the way
pub fn normalize_reporting(
    tree: Node,
    config: NormalizerConfig,
) -> Result<(Node, NormalizeReport, Vec<Diagnostic>), String> {
    let handler = Arc::new(CollectingDiagnosticHandler::new());
    let normalizer = Normalizer::new(config, handler.clone()).map_err(|e| e.to_string())?;
    let (tree, report) = normalizer
        .normalize_with_report(tree)
        .map_err(|e| e.to_string())?;
    Ok((tree, report, handler.get_diagnostics()))
}
