// =============================================================================
// Branch Rebind Hoisting Pass
// =============================================================================

use tracing::debug;

use crate::analysis::binders::collect_bound;
use crate::analysis::naming::is_underscored;
use crate::analysis::{ScopeInfo, UsageIndex};
use crate::ast::{Node, Pattern};
use crate::normalizer::passes::{
    branch_bodies, case_clauses, is_conditional, yield_from_branches,
};
use crate::normalizer::{
    rewrite_blocks, BlockRewrite, NormalizationPass, PassContext, TreeFeatures,
};

/// Rebinding a variable inside a branch does not leak out of the branch.
/// When a conditional statement ends a branch with `x = e` and `x` is read
/// after the conditional, the rebinding is hoisted:
///
/// ```text
/// if c do ...; x = e end          x = if c do ...; e else x end
/// use(x)                     =>   use(x)
/// ```
///
/// Branches that do not rebind `x` yield the current `x`.
pub struct BranchRebindHoistingPass;

impl BranchRebindHoistingPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for BranchRebindHoistingPass {
    fn name(&self) -> &'static str {
        "branch-rebind-hoisting"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_CONDITIONALS
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

/// Name rebound by the final statement of the first branch that ends with
/// a plain rebinding
fn rebound_name(conditional: &Node) -> Option<String> {
    branch_bodies(conditional)?
        .into_iter()
        .flatten()
        .filter_map(|body| body.statements().last())
        .find_map(|last| match &last.kind {
            crate::ast::NodeKind::Match(Pattern::Var(name), _) if !is_underscored(name) => {
                Some(name.clone())
            }
            _ => None,
        })
}

impl BlockRewrite for BranchRebindHoistingPass {
    fn rewrite_block(
        &self,
        scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !stmts.iter().any(is_conditional) {
            return stmts;
        }
        let index = UsageIndex::build(&stmts);
        let last = stmts.len() - 1;

        stmts
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| {
                if i == last || !is_conditional(&stmt) {
                    return stmt;
                }
                let Some(name) = rebound_name(&stmt) else {
                    return stmt;
                };
                let bound = index.bound_before(i, &name) || scope.bound_by_owner.contains(&name);
                let shadowed = case_clauses(&stmt)
                    .iter()
                    .any(|c| collect_bound(&c.pattern).contains(&name));
                if !bound || shadowed || !index.used_later(i + 1, &name) {
                    return stmt;
                }
                debug!(name = %name, "hoisted branch rebinding");
                let span = stmt.span;
                let value = yield_from_branches(stmt, &name);
                Node::matching(Pattern::var(name), value).with_span(span)
            })
            .collect()
    }
}
