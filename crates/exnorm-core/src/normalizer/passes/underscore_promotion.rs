// =============================================================================
// Underscore Promotion Pass
// =============================================================================

use indexmap::IndexSet;
use tracing::debug;

use crate::analysis::binders::{binds_anywhere, rename_binder, rename_clause, rename_reads};
use crate::analysis::naming::{is_underscored, is_valid_variable_name, strip_underscore};
use crate::analysis::usage::any_references;
use crate::analysis::{collect_bound, collect_bound_params, map_scope_bodies, references};
use crate::ast::{any_node, transform, walk_patterns, MetaFlags, Node, NodeKind, Pattern};
use crate::normalizer::{NormalizationPass, PassContext};

use super::{map_clauses, ClauseParts};

/// Drops the unused marker from binders that are in fact used.
///
/// - A binder `_v` whose clause reads `_v` (and not `v`) is renamed to `v`
///   together with those reads.
/// - A binder `_v` whose clause reads `v` but never `_v` is renamed to `v`
///   alone, provided nothing else in the enclosing function binds `v`: the
///   read was meant for this binder.
///
/// Block-level matches are treated the same way, with the rest of the block
/// as the governed body. Owners flagged `KEEP_BINDER_NAMES` are skipped.
pub struct UnderscorePromotionPass;

impl UnderscorePromotionPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for UnderscorePromotionPass {
    fn name(&self) -> &'static str {
        "underscore-promotion"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["identifier-normalization"]
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        let has_defs = any_node(&tree, &mut |n| matches!(n.kind, NodeKind::Def(_)));
        if !has_defs {
            return promote_in_scope(tree);
        }
        transform(tree, &mut |node| match node.kind {
            NodeKind::Def(_) => promote_in_scope(node),
            _ => node,
        })
    }
}

/// The promoted name for an underscored binder, if it is a usable name
fn promoted(name: &str) -> Option<String> {
    if !is_underscored(name) {
        return None;
    }
    let stripped = strip_underscore(name);
    (stripped != name && is_valid_variable_name(stripped)).then(|| stripped.to_string())
}

fn promote_in_scope(root: Node) -> Node {
    if root.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
        return root;
    }
    let mut bound_in_scope: IndexSet<String> = IndexSet::new();
    walk_patterns(&root, &mut |p| bound_in_scope.extend(collect_bound(p)));

    transform(root, &mut |node| {
        if node.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
            return node;
        }
        let node = map_clauses(node, &mut |parts| promote_clause(parts, &bound_in_scope));
        map_scope_bodies(node, &mut |_, stmts| promote_block(stmts, &bound_in_scope))
    })
}

fn clause_references(parts: &ClauseParts, name: &str) -> bool {
    references(&parts.body, name) || parts.guard.as_ref().is_some_and(|g| references(g, name))
}

fn promote_clause(mut parts: ClauseParts, bound_in_scope: &IndexSet<String>) -> ClauseParts {
    let candidates: Vec<String> = collect_bound_params(&parts.patterns)
        .into_iter()
        .filter(|name| is_underscored(name))
        .collect();

    for from in candidates {
        let Some(to) = promoted(&from) else {
            continue;
        };
        let reads_from = clause_references(&parts, &from);
        let reads_to = clause_references(&parts, &to);

        if reads_from && !reads_to {
            if let Some((patterns, guard, body)) =
                rename_clause(&parts.patterns, parts.guard.as_ref(), &parts.body, &from, &to)
            {
                debug!(from = %from, to = %to, "promoted used underscored binder");
                parts = ClauseParts {
                    patterns,
                    guard,
                    body,
                };
            }
        } else if reads_to
            && !reads_from
            && !bound_in_scope.contains(&to)
            && !binds_anywhere(&parts.body, &to)
            && !collect_bound_params(&parts.patterns).contains(&to)
        {
            debug!(from = %from, to = %to, "promoted binder to match its reads");
            parts.patterns = parts
                .patterns
                .into_iter()
                .map(|p| rename_binder(p, &from, &to))
                .collect();
        }
    }
    parts
}

fn match_pattern(stmt: &Node) -> Option<&Pattern> {
    match &stmt.kind {
        NodeKind::Match(pattern, _) if !stmt.has_flag(MetaFlags::KEEP_BINDER_NAMES) => {
            Some(pattern)
        }
        _ => None,
    }
}

fn rename_match_binder(stmt: Node, from: &str, to: &str) -> Node {
    let Node { kind, meta, span } = stmt;
    let kind = match kind {
        NodeKind::Match(pattern, value) => NodeKind::Match(rename_binder(pattern, from, to), value),
        other => other,
    };
    Node { kind, meta, span }
}

fn promote_block(mut stmts: Vec<Node>, bound_in_scope: &IndexSet<String>) -> Vec<Node> {
    for i in 0..stmts.len() {
        let Some(pattern) = match_pattern(&stmts[i]) else {
            continue;
        };
        let bound = collect_bound(pattern);
        for from in bound.iter().filter(|name| is_underscored(name)) {
            let Some(to) = promoted(from) else {
                continue;
            };
            if bound.contains(&to) {
                continue;
            }
            let rest = &stmts[i + 1..];
            let reads_from = any_references(rest, from);
            let reads_to = any_references(rest, &to);

            if reads_from && !reads_to {
                let renamed: Option<Vec<Node>> =
                    rest.iter().map(|s| rename_reads(s, from, &to)).collect();
                if let Some(renamed) = renamed {
                    debug!(from = %from, to = %to, "promoted used underscored match binder");
                    stmts.truncate(i + 1);
                    stmts.extend(renamed);
                    let stmt = std::mem::replace(&mut stmts[i], Node::nil());
                    stmts[i] = rename_match_binder(stmt, from, &to);
                }
            } else if reads_to
                && !reads_from
                && !bound_in_scope.contains(&to)
                && !rest.iter().any(|s| binds_anywhere(s, &to))
            {
                debug!(from = %from, to = %to, "promoted match binder to match its reads");
                let stmt = std::mem::replace(&mut stmts[i], Node::nil());
                stmts[i] = rename_match_binder(stmt, from, &to);
            }
        }
    }
    stmts
}
