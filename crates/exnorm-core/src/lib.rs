pub mod analysis;
pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod normalizer;
pub mod span;

pub use ast::{Literal, Metadata, MetaFlags, Node, NodeKind, Pattern};
pub use config::NormalizerConfig;
pub use diagnostics::{
    CollectingDiagnosticHandler, Diagnostic, DiagnosticHandler, DiagnosticLevel,
    TracingDiagnosticHandler,
};
pub use errors::{NormalizeError, Result};
pub use normalizer::{NormalizationPass, NormalizeReport, Normalizer, PassContext};
pub use span::Span;
