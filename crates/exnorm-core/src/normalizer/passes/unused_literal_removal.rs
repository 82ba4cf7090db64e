// =============================================================================
// Unused Literal Removal Pass
// =============================================================================

use tracing::trace;

use crate::analysis::ScopeInfo;
use crate::ast::Node;
use crate::normalizer::{rewrite_blocks, BlockRewrite, NormalizationPass, PassContext};

/// Drops constant statements whose value is thrown away: every statement
/// but the last that is a literal or a container built only of literals.
pub struct UnusedLiteralRemovalPass;

impl UnusedLiteralRemovalPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for UnusedLiteralRemovalPass {
    fn name(&self) -> &'static str {
        "unused-literal-removal"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

impl BlockRewrite for UnusedLiteralRemovalPass {
    fn rewrite_block(
        &self,
        _scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        let last = stmts.len().saturating_sub(1);
        stmts
            .into_iter()
            .enumerate()
            .filter(|(i, stmt)| {
                let unused = *i != last && stmt.is_constant();
                if unused {
                    trace!(position = i, "removed unused literal");
                }
                !unused
            })
            .map(|(_, stmt)| stmt)
            .collect()
    }
}
