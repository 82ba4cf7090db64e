// =============================================================================
// Dead Discard Elimination Pass
// =============================================================================

use tracing::trace;

use crate::analysis::{ScopeInfo, UsageIndex};
use crate::ast::{Node, NodeKind, Pattern};
use crate::normalizer::{rewrite_blocks, BlockRewrite, NormalizationPass, PassContext};

/// Removes `_ = ...` statements that serve no purpose:
///
/// - `_ = <literal>`;
/// - `_ = x` where `x` is only bound later in the body (a forward
///   reference that would not compile);
/// - `_ = x` where `x` is read by some other statement anyway;
/// - `_ = x` repeating an earlier `_ = x`.
///
/// The final statement of a body is its value and is never removed.
pub struct DeadDiscardEliminationPass;

impl DeadDiscardEliminationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for DeadDiscardEliminationPass {
    fn name(&self) -> &'static str {
        "dead-discard-elimination"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

/// Value of a `_ = value` statement
fn discarded(stmt: &Node) -> Option<&Node> {
    match &stmt.kind {
        NodeKind::Match(Pattern::Wildcard, value) => Some(value),
        _ => None,
    }
}

fn discarded_var(stmt: &Node) -> Option<&str> {
    discarded(stmt)?.as_var()
}

fn is_dead_discard(stmts: &[Node], i: usize, index: &UsageIndex, scope: &ScopeInfo) -> bool {
    let Some(value) = discarded(&stmts[i]) else {
        return false;
    };
    if value.is_constant() {
        return true;
    }
    let Some(name) = value.as_var() else {
        return false;
    };

    let forward = index.bound_after(i, name)
        && !index.bound_before(i, name)
        && !scope.bound_by_owner.contains(name);
    let read_elsewhere = index
        .read_positions(name)
        .iter()
        .any(|&p| p != i && discarded_var(&stmts[p]) != Some(name));
    let repeated = stmts[..i]
        .iter()
        .any(|s| discarded_var(s) == Some(name));

    if forward || read_elsewhere || repeated {
        trace!(name, forward, read_elsewhere, repeated, "dead discard");
        return true;
    }
    false
}

impl BlockRewrite for DeadDiscardEliminationPass {
    fn rewrite_block(
        &self,
        scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !stmts.iter().any(|s| discarded(s).is_some()) {
            return stmts;
        }
        let index = UsageIndex::build(&stmts);
        let last = stmts.len() - 1;
        let dead: Vec<bool> = (0..stmts.len())
            .map(|i| i != last && is_dead_discard(&stmts, i, &index, scope))
            .collect();
        stmts
            .into_iter()
            .zip(dead)
            .filter(|(_, dead)| !dead)
            .map(|(stmt, _)| stmt)
            .collect()
    }
}
