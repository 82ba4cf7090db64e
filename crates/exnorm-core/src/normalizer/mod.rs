//! Normalization pipeline for generated target-language trees
//!
//! The [`Normalizer`] owns the ordered pass catalog and runs every pass over
//! a unit's tree, optionally iterating each pass and then the whole pipeline
//! until nothing changes. Passes never fail; the driver is the only place
//! errors are produced (bad configuration, a pass that panics, or a pass
//! that leaves a malformed tree behind).

use std::any::Any;
use std::fmt;
use std::ops::BitOr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, debug_span, info, trace, warn};

use crate::analysis::{map_scope_bodies, ScopeInfo};
use crate::ast::{transform, validate, walk, Node, NodeKind};
use crate::config::NormalizerConfig;
use crate::diagnostics::DiagnosticHandler;
use crate::errors::{NormalizeError, Result};

pub mod passes;

pub use passes::default_passes;

// =============================================================================
// Tree features
// =============================================================================

/// Coarse summary of which constructs a tree contains, used to skip passes
/// that cannot possibly match.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeFeatures(u16);

impl TreeFeatures {
    pub const NONE: TreeFeatures = TreeFeatures(0);
    pub const HAS_BLOCKS: TreeFeatures = TreeFeatures(1 << 0);
    pub const HAS_CONDITIONALS: TreeFeatures = TreeFeatures(1 << 1);
    pub const HAS_CLOSURES: TreeFeatures = TreeFeatures(1 << 2);
    /// Calls into `Enum.reduce`, `Enum.reduce_while` or `Enum.each`
    pub const HAS_FOLDS: TreeFeatures = TreeFeatures(1 << 3);
    pub const HAS_MODULES: TreeFeatures = TreeFeatures(1 << 4);
    pub const HAS_MODULE_REFS: TreeFeatures = TreeFeatures(1 << 5);
    pub const HAS_LOCAL_CALLS: TreeFeatures = TreeFeatures(1 << 6);
    pub const HAS_RAW: TreeFeatures = TreeFeatures(1 << 7);

    const NAMES: [(TreeFeatures, &'static str); 8] = [
        (Self::HAS_BLOCKS, "HAS_BLOCKS"),
        (Self::HAS_CONDITIONALS, "HAS_CONDITIONALS"),
        (Self::HAS_CLOSURES, "HAS_CLOSURES"),
        (Self::HAS_FOLDS, "HAS_FOLDS"),
        (Self::HAS_MODULES, "HAS_MODULES"),
        (Self::HAS_MODULE_REFS, "HAS_MODULE_REFS"),
        (Self::HAS_LOCAL_CALLS, "HAS_LOCAL_CALLS"),
        (Self::HAS_RAW, "HAS_RAW"),
    ];

    pub const fn contains(self, other: TreeFeatures) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: TreeFeatures) -> Self {
        TreeFeatures(self.0 | other.0)
    }

    pub fn scan(tree: &Node) -> Self {
        let mut features = TreeFeatures::NONE;
        walk(tree, &mut |n| {
            let found = match &n.kind {
                NodeKind::Block(_) => TreeFeatures::HAS_BLOCKS,
                NodeKind::If { .. }
                | NodeKind::Unless { .. }
                | NodeKind::Case { .. }
                | NodeKind::Cond(_) => TreeFeatures::HAS_CONDITIONALS,
                NodeKind::Fn(_) => TreeFeatures::HAS_CLOSURES,
                NodeKind::Module { .. } => TreeFeatures::HAS_MODULES,
                NodeKind::ModuleRef(_) | NodeKind::Struct { .. } => TreeFeatures::HAS_MODULE_REFS,
                NodeKind::Call { .. } | NodeKind::Capture { module: None, .. } => {
                    TreeFeatures::HAS_LOCAL_CALLS
                }
                NodeKind::Raw(_) => TreeFeatures::HAS_RAW,
                _ => TreeFeatures::NONE,
            };
            features = features | found;
            if let Some(("Enum", "reduce" | "reduce_while" | "each", _)) = n.as_remote_call() {
                features = features | TreeFeatures::HAS_FOLDS;
            }
        });
        features
    }
}

impl BitOr for TreeFeatures {
    type Output = TreeFeatures;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Debug for TreeFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TreeFeatures({})", names.join(" | "))
    }
}

// =============================================================================
// Pass interface
// =============================================================================

/// Everything a pass may consult besides the tree itself
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub config: &'a NormalizerConfig,
    pub handler: &'a dyn DiagnosticHandler,
}

impl<'a> PassContext<'a> {
    pub fn new(config: &'a NormalizerConfig, handler: &'a dyn DiagnosticHandler) -> Self {
        Self { config, handler }
    }
}

/// One shape-driven rewrite. `run` must be a pure function of its input:
/// when the target shape is not found, or cannot be proven safe to rewrite,
/// the input is returned unchanged.
pub trait NormalizationPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Passes are skipped on trees lacking any of these features
    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::NONE
    }

    /// Passes that must run before this one when both are registered
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node;
}

/// Statement-window rewrite applied to every scope body in the tree
pub trait BlockRewrite {
    fn rewrite_block(&self, scope: &ScopeInfo, stmts: Vec<Node>, ctx: &PassContext<'_>)
        -> Vec<Node>;
}

/// Drive a [`BlockRewrite`] over every scope body, innermost first.
pub fn rewrite_blocks<R>(tree: Node, rewriter: &R, ctx: &PassContext<'_>) -> Node
where
    R: BlockRewrite + ?Sized,
{
    transform(tree, &mut |node| {
        map_scope_bodies(node, &mut |scope, stmts| rewriter.rewrite_block(scope, stmts, ctx))
    })
}

// =============================================================================
// Normalizer
// =============================================================================

/// Outcome of one [`Normalizer::normalize_with_report`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Whole-pipeline iterations run
    pub iterations: usize,
    /// Passes that changed the tree at least once, in first-change order
    pub changed_passes: Vec<&'static str>,
}

const INPUT_STAGE: &str = "<input>";

pub struct Normalizer {
    config: NormalizerConfig,
    handler: Arc<dyn DiagnosticHandler>,
    passes: Vec<Box<dyn NormalizationPass>>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("passes", &self.pass_names())
            .finish()
    }
}

impl Normalizer {
    /// Register the default catalog minus the passes the configuration
    /// disables.
    pub fn new(config: NormalizerConfig, handler: Arc<dyn DiagnosticHandler>) -> Result<Self> {
        let catalog = default_passes();
        for disabled in &config.disabled_passes {
            if !catalog.iter().any(|p| p.name() == disabled.as_str()) {
                return Err(NormalizeError::UnknownPass(disabled.clone()));
            }
        }
        let passes = catalog
            .into_iter()
            .filter(|p| !config.is_disabled(p.name()))
            .collect();
        Self::with_passes(config, handler, passes)
    }

    /// Restrict the default catalog to `names`, keeping the declared order.
    pub fn only(
        config: NormalizerConfig,
        handler: Arc<dyn DiagnosticHandler>,
        names: &[&str],
    ) -> Result<Self> {
        let catalog = default_passes();
        for name in names {
            if !catalog.iter().any(|p| p.name() == *name) {
                return Err(NormalizeError::UnknownPass((*name).to_string()));
            }
        }
        let passes = catalog
            .into_iter()
            .filter(|p| names.contains(&p.name()))
            .collect();
        Self::with_passes(config, handler, passes)
    }

    /// Use an explicit pass list in the given order.
    pub fn with_passes(
        config: NormalizerConfig,
        handler: Arc<dyn DiagnosticHandler>,
        passes: Vec<Box<dyn NormalizationPass>>,
    ) -> Result<Self> {
        check_ordering(&passes)?;
        Ok(Self {
            config,
            handler,
            passes,
        })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Returns the number of registered passes
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Returns the names of all registered passes, in run order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn normalize(&self, tree: Node) -> Result<Node> {
        self.normalize_with_report(tree).map(|(tree, _)| tree)
    }

    pub fn normalize_with_report(&self, tree: Node) -> Result<(Node, NormalizeReport)> {
        let ctx = PassContext::new(&self.config, self.handler.as_ref());
        let mut report = NormalizeReport::default();

        if self.config.validate_between_passes {
            check_structure(&tree, INPUT_STAGE)?;
        }

        let max_iterations = self.config.max_pipeline_iterations.max(1);
        let mut current = tree;
        let mut stable = false;

        for iteration in 1..=max_iterations {
            let before = current.clone();
            let features = TreeFeatures::scan(&current);
            trace!(iteration, ?features, "pipeline iteration");

            for pass in &self.passes {
                if !features.contains(pass.required_features()) {
                    trace!(pass = pass.name(), "skipped, required features absent");
                    continue;
                }
                let (next, changed) = self.run_pass(pass.as_ref(), current, &ctx)?;
                if changed {
                    debug!(pass = pass.name(), iteration, "pass changed the tree");
                    if !report.changed_passes.contains(&pass.name()) {
                        report.changed_passes.push(pass.name());
                    }
                    if self.config.validate_between_passes {
                        check_structure(&next, pass.name())?;
                    }
                }
                current = next;
            }

            report.iterations = iteration;
            if current == before {
                stable = true;
                break;
            }
        }

        if !stable && max_iterations > 1 {
            let message = format!(
                "pipeline did not reach a fixpoint within {} iterations",
                max_iterations
            );
            warn!("{}", message);
            self.handler.warning(current.span, &message);
        }

        info!(
            passes = self.passes.len(),
            changed = report.changed_passes.len(),
            iterations = report.iterations,
            "normalized unit"
        );
        Ok((current, report))
    }

    /// Normalize independent compilation units in parallel. Each unit still
    /// runs the pipeline sequentially.
    pub fn normalize_units(&self, units: Vec<Node>) -> Vec<Result<Node>> {
        units
            .into_par_iter()
            .map(|unit| self.normalize(unit))
            .collect()
    }

    fn run_pass(
        &self,
        pass: &dyn NormalizationPass,
        tree: Node,
        ctx: &PassContext<'_>,
    ) -> Result<(Node, bool)> {
        let span = debug_span!("normalize_pass", pass = pass.name());
        let _enter = span.enter();

        let max_iterations = if self.config.fixpoint {
            self.config.max_pass_iterations.max(1)
        } else {
            1
        };

        let mut current = tree;
        let mut changed = false;
        for iteration in 0..max_iterations {
            let input = current.clone();
            let output = catch_unwind(AssertUnwindSafe(|| pass.run(input, ctx))).map_err(
                |payload| NormalizeError::PassPanicked {
                    pass: pass.name().to_string(),
                    message: panic_message(payload.as_ref()),
                },
            )?;
            trace!(iteration, "pass iteration");
            if output == current {
                return Ok((current, changed));
            }
            changed = true;
            current = output;
        }

        if self.config.fixpoint {
            let message = format!(
                "pass '{}' did not converge within {} iterations",
                pass.name(),
                max_iterations
            );
            warn!("{}", message);
            self.handler.warning(current.span, &message);
        }
        Ok((current, changed))
    }
}

fn check_ordering(passes: &[Box<dyn NormalizationPass>]) -> Result<()> {
    for (i, pass) in passes.iter().enumerate() {
        for dependency in pass.depends_on() {
            let registered_after = passes[i + 1..].iter().any(|p| p.name() == *dependency);
            if registered_after {
                return Err(NormalizeError::PassOrdering {
                    pass: pass.name(),
                    dependency: *dependency,
                });
            }
        }
    }
    Ok(())
}

fn check_structure(tree: &Node, stage: &str) -> Result<()> {
    validate(tree).map_err(|message| NormalizeError::StructuralDefect {
        pass: stage.to_string(),
        message,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
