// =============================================================================
// Arity Shim Synthesis Pass
// =============================================================================

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::ast::{DefKind, MetaFlags, Node, NodeKind, Pattern};
use crate::diagnostics::DiagnosticHandler;
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};
use crate::span::Span;

use super::rewrite_module_bodies;

/// Lowering sometimes drops trailing optional arguments at call sites:
/// `format(x)` is emitted while only `format/2` is defined. For every local
/// call or capture whose arity no clause of the name has, when a larger
/// arity exists, a forwarding definition is synthesized that pads the
/// missing trailing arguments with `nil`:
///
/// ```text
/// def format(arg0), do: format(arg0, nil)
/// ```
///
/// The shim has the kind (`def`/`defp`) of the existing definition and is
/// placed after its last clause. Macros never get shims.
pub struct AritySynthesisPass;

impl AritySynthesisPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for AritySynthesisPass {
    fn name(&self) -> &'static str {
        "arity-shim-synthesis"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_MODULES | TreeFeatures::HAS_LOCAL_CALLS
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_module_bodies(tree, &mut |module, stmts| {
            synthesize_shims(module, stmts, ctx.handler)
        })
    }
}

/// Clauses of one function name in a module body
struct Defined {
    kind: DefKind,
    arities: IndexSet<usize>,
    last_clause: usize,
}

fn defined_functions(stmts: &[Node]) -> IndexMap<&str, Defined> {
    let mut defined: IndexMap<&str, Defined> = IndexMap::new();
    for (i, stmt) in stmts.iter().enumerate() {
        if let NodeKind::Def(def) = &stmt.kind {
            let entry = defined.entry(def.name.as_str()).or_insert_with(|| Defined {
                kind: def.kind,
                arities: IndexSet::new(),
                last_clause: i,
            });
            entry.arities.insert(def.arity());
            entry.last_clause = i;
        }
    }
    defined
}

/// Local call sites as `(name, arity, span)`, counting the piped argument
/// of `x |> f(y)`. Nested modules are not entered.
fn collect_local_calls(node: &Node, out: &mut Vec<(String, usize, Span)>) {
    match &node.kind {
        NodeKind::Module { .. } => return,
        NodeKind::Pipe(left, right) => {
            collect_local_calls(left, out);
            match &right.kind {
                NodeKind::Call { name, args } => {
                    out.push((name.clone(), args.len() + 1, right.span));
                    for arg in args {
                        collect_local_calls(arg, out);
                    }
                }
                _ => collect_local_calls(right, out),
            }
            return;
        }
        NodeKind::Call { name, args } => out.push((name.clone(), args.len(), node.span)),
        NodeKind::Capture {
            module: None,
            function,
            arity,
        } => out.push((function.clone(), *arity, node.span)),
        _ => {}
    }
    node.for_each_child(&mut |child| collect_local_calls(child, out));
}

fn shim(kind: DefKind, name: &str, arity: usize, target: usize) -> Node {
    let params = (0..arity).map(|i| Pattern::var(format!("arg{i}"))).collect();
    let args = (0..arity)
        .map(|i| Node::var(format!("arg{i}")))
        .chain((arity..target).map(|_| Node::nil()))
        .collect();
    Node::def(kind, name, params, Node::call(name, args))
        .with_flag(MetaFlags::SYNTHESIZED | MetaFlags::KEEP_BINDER_NAMES)
}

fn synthesize_shims(
    module: &str,
    mut stmts: Vec<Node>,
    handler: &dyn DiagnosticHandler,
) -> Vec<Node> {
    let mut calls = Vec::new();
    for stmt in &stmts {
        collect_local_calls(stmt, &mut calls);
    }
    if calls.is_empty() {
        return stmts;
    }

    let mut shims: Vec<(usize, Node)> = Vec::new();
    {
        let defined = defined_functions(&stmts);
        let mut seen = IndexSet::new();
        for (name, arity, span) in calls {
            let Some(existing) = defined.get(name.as_str()) else {
                continue;
            };
            if existing.kind.is_macro()
                || existing.arities.contains(&arity)
                || !seen.insert((name.clone(), arity))
            {
                continue;
            }
            let larger = existing.arities.iter().copied().filter(|&a| a > arity);
            let Some(target) = larger.min() else {
                continue;
            };
            debug!(module, function = %name, arity, target, "synthesized arity shim");
            handler.info(span, &format!("synthesized arity shim {name}/{arity}"));
            shims.push((existing.last_clause, shim(existing.kind, &name, arity, target)));
        }
    }

    shims.sort_by_key(|(after, _)| *after);
    for (after, node) in shims.into_iter().rev() {
        stmts.insert(after + 1, node);
    }
    stmts
}
