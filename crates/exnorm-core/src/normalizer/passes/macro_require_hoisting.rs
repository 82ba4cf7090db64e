// =============================================================================
// Macro Require Hoisting Pass
// =============================================================================

use indexmap::IndexSet;
use tracing::debug;

use crate::analysis::map_statements;
use crate::ast::{MetaFlags, Node, NodeKind};
use crate::config::NormalizerConfig;
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};

use super::{rewrite_module_bodies, walk_module_body};

/// Makes macro modules available where they are called.
///
/// `require` statements sitting inside a `def` body move to the module
/// level. Then any macro module (see `NormalizerConfig::macro_modules`)
/// that the module calls without a module-level `require`, `import` or `use`
/// gets a synthesized `require` after the leading directives.
pub struct MacroRequireHoistingPass;

impl MacroRequireHoistingPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for MacroRequireHoistingPass {
    fn name(&self) -> &'static str {
        "macro-require-hoisting"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_MODULES
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_module_bodies(tree, &mut |module, stmts| {
            hoist_requires(module, stmts, ctx.config)
        })
    }
}

/// Whether `stmt` makes `module`'s macros available
fn provides(stmt: &Node, module: &str) -> bool {
    match &stmt.kind {
        NodeKind::Require { module: m, .. }
        | NodeKind::Import { module: m, .. }
        | NodeKind::Use { module: m, .. } => m == module,
        _ => false,
    }
}

fn is_leading_directive(stmt: &Node) -> bool {
    match &stmt.kind {
        NodeKind::Alias { .. }
        | NodeKind::Require { .. }
        | NodeKind::Import { .. }
        | NodeKind::Use { .. } => true,
        NodeKind::ModuleAttribute { name, .. } => {
            matches!(name.as_str(), "moduledoc" | "behaviour")
        }
        _ => false,
    }
}

/// Pull non-final `require` statements out of a def body
fn take_def_requires(stmt: Node, hoisted: &mut Vec<Node>) -> Node {
    let Node { kind, meta, span } = stmt;
    let kind = match kind {
        NodeKind::Def(mut def) => {
            def.body = Box::new(map_statements(*def.body, |stmts| {
                let last = stmts.len().saturating_sub(1);
                stmts
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, s)| {
                        if i != last && matches!(s.kind, NodeKind::Require { .. }) {
                            hoisted.push(s);
                            None
                        } else {
                            Some(s)
                        }
                    })
                    .collect()
            }));
            NodeKind::Def(def)
        }
        kind => kind,
    };
    Node { kind, meta, span }
}

fn hoist_requires(module: &str, stmts: Vec<Node>, config: &NormalizerConfig) -> Vec<Node> {
    let mut hoisted = Vec::new();
    let mut stmts: Vec<Node> = stmts
        .into_iter()
        .map(|s| take_def_requires(s, &mut hoisted))
        .collect();

    let mut called = IndexSet::new();
    walk_module_body(&stmts, &mut |node| {
        if let Some((callee, _, _)) = node.as_remote_call() {
            if config.is_macro_module(callee) {
                called.insert(callee.to_string());
            }
        }
    });

    let mut inserted: Vec<Node> = Vec::new();
    for require in hoisted {
        let present = stmts
            .iter()
            .chain(&inserted)
            .any(|s| s.kind == require.kind);
        if !present {
            debug!(module, "hoisted require out of def");
            inserted.push(require);
        }
    }
    for callee in called {
        if stmts.iter().chain(&inserted).any(|s| provides(s, &callee)) {
            continue;
        }
        debug!(module, required = %callee, "inserted require for macro module");
        inserted.push(
            Node::new(NodeKind::Require {
                module: callee,
                as_name: None,
            })
            .with_flag(MetaFlags::SYNTHESIZED),
        );
    }

    if !inserted.is_empty() {
        let at = stmts
            .iter()
            .position(|s| !is_leading_directive(s))
            .unwrap_or(stmts.len());
        stmts.splice(at..at, inserted);
    }
    stmts
}
