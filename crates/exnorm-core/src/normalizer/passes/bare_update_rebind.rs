// =============================================================================
// Bare Update Rebind Pass
// =============================================================================

use tracing::debug;

use crate::analysis::naming::is_underscored;
use crate::analysis::ScopeInfo;
use crate::ast::{BinaryOp, Node, NodeKind, Pattern};
use crate::normalizer::{
    rewrite_blocks, BlockRewrite, NormalizationPass, PassContext, TreeFeatures,
};

/// Inside conditional branches, a bare `name <op> expr` statement is an
/// update whose result was meant to be kept: `count + 1` becomes
/// `count = count + 1`.
///
/// Only the update operators `+ - * <> ++` qualify, the left operand must
/// be a plain variable, and the branch owner must not bind that name itself.
pub struct BareUpdateRebindPass;

impl BareUpdateRebindPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for BareUpdateRebindPass {
    fn name(&self) -> &'static str {
        "bare-update-rebind"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_CONDITIONALS
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

fn is_update_op(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Concat | BinaryOp::ListConcat
    )
}

/// Name updated by a bare `name <op> expr` statement
fn updated_name<'a>(stmt: &'a Node, scope: &ScopeInfo) -> Option<&'a str> {
    match &stmt.kind {
        NodeKind::Binary(op, left, _) if is_update_op(*op) => {
            let name = left.as_var()?;
            let eligible = !is_underscored(name) && !scope.bound_by_owner.contains(name);
            eligible.then_some(name)
        }
        _ => None,
    }
}

impl BlockRewrite for BareUpdateRebindPass {
    fn rewrite_block(
        &self,
        scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !scope.owner.is_branch() {
            return stmts;
        }
        stmts
            .into_iter()
            .map(|stmt| match updated_name(&stmt, scope).map(str::to_string) {
                Some(name) => {
                    debug!(name = %name, "bare update rebound");
                    let span = stmt.span;
                    Node::matching(Pattern::var(name), stmt).with_span(span)
                }
                None => stmt,
            })
            .collect()
    }
}
