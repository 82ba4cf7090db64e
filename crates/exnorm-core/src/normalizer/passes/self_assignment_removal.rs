// =============================================================================
// Self Assignment Removal Pass
// =============================================================================

use tracing::trace;

use crate::analysis::{map_scope_bodies, ScopeInfo};
use crate::ast::{transform, MetaFlags, Node, NodeKind};
use crate::normalizer::{BlockRewrite, NormalizationPass, PassContext};

/// Removes `x = x` statements. A final `x = x` is the value of its body and
/// becomes a plain read of `x`. Bodies of owners flagged
/// `KEEP_BINDER_NAMES` are left as written.
pub struct SelfAssignmentRemovalPass;

impl SelfAssignmentRemovalPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for SelfAssignmentRemovalPass {
    fn name(&self) -> &'static str {
        "self-assignment-removal"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        transform(tree, &mut |node| {
            if node.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
                return node;
            }
            map_scope_bodies(node, &mut |scope, stmts| self.rewrite_block(scope, stmts, ctx))
        })
    }
}

fn self_assigned(stmt: &Node) -> Option<&str> {
    match &stmt.kind {
        NodeKind::Match(pattern, value) => {
            let name = pattern.as_var()?;
            value.is_var(name).then_some(name)
        }
        _ => None,
    }
}

impl BlockRewrite for SelfAssignmentRemovalPass {
    fn rewrite_block(
        &self,
        _scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !stmts.iter().any(|s| self_assigned(s).is_some()) {
            return stmts;
        }
        let last = stmts.len() - 1;
        stmts
            .into_iter()
            .enumerate()
            .filter_map(|(i, stmt)| match self_assigned(&stmt) {
                Some(name) if i == last => {
                    trace!(name, "self assignment replaced by read");
                    Some(stmt.rebuild(NodeKind::Var(name.to_string())))
                }
                Some(name) => {
                    trace!(name, "self assignment removed");
                    None
                }
                None => Some(stmt),
            })
            .collect()
    }
}
