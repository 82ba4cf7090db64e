// =============================================================================
// Alias Chain Collapse Pass
// =============================================================================

use tracing::debug;

use crate::analysis::{ScopeInfo, UsageIndex};
use crate::ast::{MetaFlags, Node, NodeKind, Pattern};
use crate::normalizer::passes::as_assignment;
use crate::normalizer::{rewrite_blocks, BlockRewrite, NormalizationPass, PassContext};

/// Collapses alias chains into a single binding:
///
/// ```text
/// a = (b = expr)      =>   a = expr      (b never read again)
/// b = expr; a = b     =>   a = expr      (b never read again)
/// ```
///
/// When the inner name is still read but the outer one is not, the outer
/// binding is dropped instead. Both names read later leaves the chain alone.
pub struct AliasChainCollapsePass;

impl AliasChainCollapsePass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for AliasChainCollapsePass {
    fn name(&self) -> &'static str {
        "alias-chain-collapse"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

fn is_kept(stmt: &Node) -> bool {
    stmt.has_flag(MetaFlags::KEEP_BINDER_NAMES)
}

/// `a = (b = expr)`
fn nested_chain(stmt: &Node) -> Option<(&str, &str, &Node)> {
    let (outer, value) = as_assignment(stmt)?;
    let (inner, expr) = as_assignment(value)?;
    (outer != inner && !is_kept(stmt) && !is_kept(value)).then_some((outer, inner, expr))
}

/// `b = expr` followed by `a = b`
fn split_chain<'n>(first: &'n Node, second: &'n Node) -> Option<(&'n str, &'n str, &'n Node)> {
    let (inner, expr) = as_assignment(first)?;
    let (outer, value) = as_assignment(second)?;
    let chained = value.is_var(inner) && outer != inner && !is_kept(first) && !is_kept(second);
    chained.then_some((outer, inner, expr))
}

fn bind(name: &str, value: Node, template: &Node) -> Node {
    Node::matching(Pattern::var(name), value).with_span(template.span)
}

/// Collapse the first chain found, if any
fn collapse_once(stmts: &[Node]) -> Option<Vec<Node>> {
    let index = UsageIndex::build(stmts);

    for i in 0..stmts.len() {
        if let Some((outer, inner, expr)) = nested_chain(&stmts[i]) {
            let keep = if !index.used_later(i + 1, inner) {
                outer
            } else if !index.used_later(i + 1, outer) {
                inner
            } else {
                continue;
            };
            debug!(outer, inner, keep, "collapsed nested alias chain");
            let mut out = stmts.to_vec();
            out[i] = bind(keep, expr.clone(), &stmts[i]);
            return Some(out);
        }

        let Some(next) = stmts.get(i + 1) else {
            continue;
        };
        if let Some((outer, inner, expr)) = split_chain(&stmts[i], next) {
            let mut out = stmts.to_vec();
            if !index.used_later(i + 2, inner) {
                debug!(outer, inner, "collapsed alias chain");
                out.splice(i..i + 2, [bind(outer, expr.clone(), &stmts[i])]);
            } else if !index.used_later(i + 2, outer) {
                debug!(outer, inner, "dropped unused alias");
                out.remove(i + 1);
            } else {
                continue;
            }
            return Some(out);
        }
    }
    None
}

impl BlockRewrite for AliasChainCollapsePass {
    fn rewrite_block(
        &self,
        _scope: &ScopeInfo,
        mut stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        if !stmts.iter().any(|s| matches!(s.kind, NodeKind::Match(..))) {
            return stmts;
        }
        while let Some(next) = collapse_once(&stmts) {
            stmts = next;
        }
        stmts
    }
}
