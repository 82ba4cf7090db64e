// =============================================================================
// Temporary Inlining Pass
// =============================================================================

use tracing::debug;

use crate::analysis::{references, ScopeInfo, UsageIndex};
use crate::ast::{CaseClause, MetaFlags, Node, NodeKind, Pattern};
use crate::normalizer::passes::as_assignment;
use crate::normalizer::{rewrite_blocks, BlockRewrite, NormalizationPass, PassContext};

/// Inlines single-use temporaries:
///
/// ```text
/// tmp = e; tmp                      =>   e
/// tmp = e; case tmp do ... end      =>   case e do ... end
/// ```
///
/// The `case` form requires `tmp` to be read nowhere else: not in the
/// clauses and not after the `case`.
pub struct TemporaryInliningPass;

impl TemporaryInliningPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for TemporaryInliningPass {
    fn name(&self) -> &'static str {
        "temporary-inlining"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        rewrite_blocks(tree, self, ctx)
    }
}

fn temporary(stmt: &Node) -> Option<(&str, &Node)> {
    if stmt.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
        return None;
    }
    as_assignment(stmt)
}

fn clause_references(clause: &CaseClause, name: &str) -> bool {
    let mut pinned = false;
    clause.pattern.walk(&mut |p| {
        if matches!(p, Pattern::Pin(pin) if pin == name) {
            pinned = true;
        }
    });
    pinned
        || references(&clause.body, name)
        || clause.guard.as_ref().is_some_and(|g| references(g, name))
}

/// Clauses of `case name do ... end` when none of them reads `name`
fn case_on<'n>(stmt: &'n Node, name: &str) -> Option<&'n [CaseClause]> {
    match &stmt.kind {
        NodeKind::Case { subject, clauses }
            if subject.is_var(name) && !clauses.iter().any(|c| clause_references(c, name)) =>
        {
            Some(clauses)
        }
        _ => None,
    }
}

fn inline_once(stmts: &[Node]) -> Option<Vec<Node>> {
    let last = stmts.len().checked_sub(1)?;
    let index = UsageIndex::build(stmts);

    for i in 0..last {
        let Some((name, value)) = temporary(&stmts[i]) else {
            continue;
        };
        let next = &stmts[i + 1];

        if i + 1 == last && next.is_var(name) {
            debug!(name, "inlined returned temporary");
            let mut out = stmts[..i].to_vec();
            out.push(value.clone());
            return Some(out);
        }

        if index.used_later(i + 2, name) {
            continue;
        }
        if let Some(clauses) = case_on(next, name) {
            debug!(name, "inlined case subject");
            let inlined = next.rebuild(NodeKind::Case {
                subject: Box::new(value.clone()),
                clauses: clauses.to_vec(),
            });
            let mut out = stmts.to_vec();
            out.splice(i..i + 2, [inlined]);
            return Some(out);
        }
    }
    None
}

impl BlockRewrite for TemporaryInliningPass {
    fn rewrite_block(
        &self,
        _scope: &ScopeInfo,
        mut stmts: Vec<Node>,
        _ctx: &PassContext<'_>,
    ) -> Vec<Node> {
        while let Some(next) = inline_once(&stmts) {
            stmts = next;
        }
        stmts
    }
}
