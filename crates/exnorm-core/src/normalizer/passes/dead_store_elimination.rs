// =============================================================================
// Dead Store Elimination Pass
// =============================================================================

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::analysis::{references, ScopeInfo, UsageIndex};
use crate::ast::{MetaFlags, Node};
use crate::normalizer::passes::as_assignment;
use crate::normalizer::{rewrite_blocks, BlockRewrite, NormalizationPass, PassContext};

/// Removes `x = <pure>` when `x` is rebound later in the same body before
/// anything reads it. The rebinding statement itself must not read `x`
/// (`x = x + 1` keeps the earlier store alive).
///
/// Only side-effect-free values qualify, so dropping the statement never
/// drops an effect.
pub struct DeadStoreEliminationPass;

impl DeadStoreEliminationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for DeadStoreEliminationPass {
    fn name(&self) -> &'static str {
        "dead-store-elimination"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

fn is_dead_store(stmts: &[Node], i: usize, index: &UsageIndex) -> bool {
    let stmt = &stmts[i];
    if stmt.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
        return false;
    }
    let Some((name, value)) = as_assignment(stmt) else {
        return false;
    };
    if !value.is_pure() {
        return false;
    }
    let Some(next) = index.next_binding(i, name) else {
        return false;
    };
    !index.used_between(i + 1, next, name) && !references(&stmts[next], name)
}

impl BlockRewrite for DeadStoreEliminationPass {
    fn rewrite_block(
        &self,
        _scope: &ScopeInfo,
        stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if stmts.len() < 2 {
            return stmts;
        }
        let index = UsageIndex::build(&stmts);
        let dead: FxHashSet<usize> = (0..stmts.len())
            .filter(|&i| is_dead_store(&stmts, i, &index))
            .collect();
        if dead.is_empty() {
            return stmts;
        }
        debug!(count = dead.len(), "removed dead stores");
        stmts
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !dead.contains(i))
            .map(|(_, stmt)| stmt)
            .collect()
    }
}
