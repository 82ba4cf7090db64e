// =============================================================================
// Binder Hygiene Pass
// =============================================================================

use indexmap::IndexMap;
use tracing::trace;

use crate::analysis::binders::{mentions, rename_binder};
use crate::analysis::naming::underscored;
use crate::analysis::{map_scope_bodies, references, UsageIndex};
use crate::ast::{transform, Generator, MetaFlags, Node, NodeKind, Pattern, WithClause};
use crate::normalizer::{NormalizationPass, PassContext};

use super::{map_clauses, ClauseParts};

/// Marks unreferenced binders with the `_` prefix so the target compiler
/// does not warn about them.
///
/// Covers function parameters, case/receive/catch/rescue/with-else clause
/// patterns, comprehension generators, `with` clauses and block-level
/// matches. A binder is left alone when it appears more than once in its
/// patterns (the repetition is an equality check), when the underscored name
/// is already in use, or when its owner carries `KEEP_BINDER_NAMES`.
pub struct BinderHygienePass;

impl BinderHygienePass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for BinderHygienePass {
    fn name(&self) -> &'static str {
        "binder-hygiene"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["underscore-promotion"]
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        transform(tree, &mut |node| {
            if node.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
                return node;
            }
            let node = map_clauses(node, &mut hygiene_clause);
            let node = hygiene_binding_forms(node);
            map_scope_bodies(node, &mut |_, stmts| hygiene_block(stmts))
        })
    }
}

/// How often each name is bound across `patterns`
fn binder_counts<'a>(patterns: impl IntoIterator<Item = &'a Pattern>) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for pattern in patterns {
        pattern.walk(&mut |p| match p {
            Pattern::Var(name) | Pattern::Alias { name, .. } => {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
            _ => {}
        });
    }
    counts
}

/// Names eligible for the marker: bound once and not already marked
fn candidates(counts: &IndexMap<String, usize>) -> Vec<String> {
    counts
        .iter()
        .filter(|(name, count)| **count == 1 && !name.starts_with('_'))
        .map(|(name, _)| name.clone())
        .collect()
}

fn pins(pattern: &Pattern, name: &str) -> bool {
    let mut found = false;
    pattern.walk(&mut |p| {
        if matches!(p, Pattern::Pin(pinned) if pinned == name) {
            found = true;
        }
    });
    found
}

fn hygiene_clause(mut parts: ClauseParts) -> ClauseParts {
    let counts = binder_counts(&parts.patterns);
    for name in candidates(&counts) {
        let guard = parts.guard.as_ref();
        let used = references(&parts.body, &name) || guard.is_some_and(|g| references(g, &name));
        if used {
            continue;
        }
        let target = underscored(&name);
        let collides = counts.contains_key(&target)
            || mentions(&parts.body, &target)
            || guard.is_some_and(|g| mentions(g, &target));
        if collides {
            continue;
        }
        trace!(name = %name, "marked unused clause binder");
        parts.patterns = parts
            .patterns
            .into_iter()
            .map(|p| rename_binder(p, &name, &target))
            .collect();
    }
    parts
}

/// Generators and `with` clauses: a binder is in scope for every later
/// clause and the body.
fn hygiene_binding_forms(node: Node) -> Node {
    let Node { kind, meta, span } = node;
    let kind = match kind {
        NodeKind::For {
            generators,
            filters,
            into,
            body,
        } => {
            let generators = hygiene_generators(generators, &filters, &body);
            NodeKind::For {
                generators,
                filters,
                into,
                body,
            }
        }
        NodeKind::With {
            clauses,
            body,
            else_clauses,
        } => NodeKind::With {
            clauses: hygiene_with_clauses(clauses, &body),
            body,
            else_clauses,
        },
        other => other,
    };
    Node { kind, meta, span }
}

fn hygiene_generators(
    mut generators: Vec<Generator>,
    filters: &[Node],
    body: &Node,
) -> Vec<Generator> {
    let counts = binder_counts(generators.iter().map(|g| &g.pattern));
    for k in 0..generators.len() {
        let own = binder_counts(std::iter::once(&generators[k].pattern));
        for name in candidates(&own) {
            let later = &generators[k + 1..];
            let used = counts.get(&name).copied().unwrap_or(0) > 1
                || later
                    .iter()
                    .any(|g| references(&g.source, &name) || pins(&g.pattern, &name))
                || filters.iter().any(|f| references(f, &name))
                || references(body, &name);
            let target = underscored(&name);
            let collides = counts.contains_key(&target)
                || mentions(body, &target)
                || filters.iter().any(|f| mentions(f, &target));
            if used || collides {
                continue;
            }
            trace!(name = %name, "marked unused generator binder");
            let pattern = std::mem::replace(&mut generators[k].pattern, Pattern::Wildcard);
            generators[k].pattern = rename_binder(pattern, &name, &target);
        }
    }
    generators
}

fn hygiene_with_clauses(mut clauses: Vec<WithClause>, body: &Node) -> Vec<WithClause> {
    let counts = binder_counts(clauses.iter().filter_map(|c| c.pattern.as_ref()));
    for k in 0..clauses.len() {
        let Some(pattern) = &clauses[k].pattern else {
            continue;
        };
        let own = binder_counts(std::iter::once(pattern));
        for name in candidates(&own) {
            let later = &clauses[k + 1..];
            let used = counts.get(&name).copied().unwrap_or(0) > 1
                || later.iter().any(|c| {
                    references(&c.expr, &name)
                        || c.pattern.as_ref().is_some_and(|p| pins(p, &name))
                })
                || references(body, &name);
            let target = underscored(&name);
            let collides = counts.contains_key(&target) || mentions(body, &target);
            if used || collides {
                continue;
            }
            trace!(name = %name, "marked unused with binder");
            clauses[k].pattern = clauses[k]
                .pattern
                .take()
                .map(|p| rename_binder(p, &name, &target));
        }
    }
    clauses
}

fn hygiene_block(mut stmts: Vec<Node>) -> Vec<Node> {
    if !stmts.iter().any(|s| matches!(s.kind, NodeKind::Match(..))) {
        return stmts;
    }
    let index = UsageIndex::build(&stmts);
    for i in 0..stmts.len() {
        let names = match &stmts[i].kind {
            NodeKind::Match(pattern, _) if !stmts[i].has_flag(MetaFlags::KEEP_BINDER_NAMES) => {
                candidates(&binder_counts(std::iter::once(pattern)))
            }
            _ => continue,
        };
        for name in names {
            if index.used_later(i + 1, &name) {
                continue;
            }
            let target = underscored(&name);
            if stmts.iter().any(|s| mentions(s, &target)) {
                continue;
            }
            trace!(name = %name, position = i, "marked unused match binder");
            let Node { kind, meta, span } = std::mem::replace(&mut stmts[i], Node::nil());
            let kind = match kind {
                NodeKind::Match(pattern, value) => {
                    NodeKind::Match(rename_binder(pattern, &name, &target), value)
                }
                other => other,
            };
            stmts[i] = Node { kind, meta, span };
        }
    }
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CaseClause, DefKind};
    use crate::normalizer::passes::test_support::{assert_idempotent, def_body, in_def, run};

    fn for_node(generators: Vec<Generator>, body: Node) -> Node {
        Node::new(NodeKind::For {
            generators,
            filters: vec![],
            into: None,
            body: Box::new(body),
        })
    }

    #[test]
    fn test_unused_param_marked() {
        let tree = Node::def(
            DefKind::Def,
            "handle",
            vec![Pattern::var("conn"), Pattern::var("params")],
            Node::call("render", vec![Node::var("conn")]),
        );
        let expected = Node::def(
            DefKind::Def,
            "handle",
            vec![Pattern::var("conn"), Pattern::var("_params")],
            Node::call("render", vec![Node::var("conn")]),
        );
        assert_eq!(run(&BinderHygienePass::new(), tree), expected);
    }

    #[test]
    fn test_case_clause_binder_marked() {
        let tree = Node::case(
            Node::var("result"),
            vec![CaseClause::new(
                Pattern::tagged("ok", Pattern::var("value")),
                Node::atom("ok"),
            )],
        );
        let expected = Node::case(
            Node::var("result"),
            vec![CaseClause::new(
                Pattern::tagged("ok", Pattern::var("_value")),
                Node::atom("ok"),
            )],
        );
        assert_eq!(run(&BinderHygienePass::new(), tree), expected);
    }

    #[test]
    fn test_guard_read_counts_as_use() {
        let mut clause = CaseClause::new(Pattern::var("n"), Node::atom("positive"));
        clause.guard = Some(Node::binary(
            crate::ast::BinaryOp::Gt,
            Node::var("n"),
            Node::int(0),
        ));
        let tree = Node::case(Node::var("x"), vec![clause]);
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_repeated_binder_untouched() {
        let tree = Node::lambda(
            vec![Pattern::Tuple(vec![Pattern::var("x"), Pattern::var("x")])],
            Node::atom("same"),
        );
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_collision_untouched() {
        let tree = Node::lambda(vec![Pattern::var("x")], Node::var("_x"));
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_generator_binder_marked() {
        let tree = for_node(
            vec![Generator {
                pattern: Pattern::Tuple(vec![Pattern::var("k"), Pattern::var("v")]),
                source: Node::var("pairs"),
            }],
            Node::var("v"),
        );
        let expected = for_node(
            vec![Generator {
                pattern: Pattern::Tuple(vec![Pattern::var("_k"), Pattern::var("v")]),
                source: Node::var("pairs"),
            }],
            Node::var("v"),
        );
        assert_eq!(run(&BinderHygienePass::new(), tree), expected);
    }

    #[test]
    fn test_generator_binder_read_by_later_source_kept() {
        let tree = for_node(
            vec![
                Generator {
                    pattern: Pattern::var("x"),
                    source: Node::var("xs"),
                },
                Generator {
                    pattern: Pattern::var("y"),
                    source: Node::call("children", vec![Node::var("x")]),
                },
            ],
            Node::var("y"),
        );
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_with_clause_binder_marked() {
        let tree = Node::new(NodeKind::With {
            clauses: vec![
                WithClause {
                    pattern: Some(Pattern::tagged("ok", Pattern::var("user"))),
                    expr: Node::call("fetch_user", vec![]),
                },
                WithClause {
                    pattern: Some(Pattern::tagged("ok", Pattern::var("token"))),
                    expr: Node::call("issue", vec![]),
                },
            ],
            body: Box::new(Node::var("token")),
            else_clauses: vec![],
        });
        let out = run(&BinderHygienePass::new(), tree);
        match &out.kind {
            NodeKind::With { clauses, .. } => {
                assert_eq!(
                    clauses[0].pattern,
                    Some(Pattern::tagged("ok", Pattern::var("_user")))
                );
                assert_eq!(
                    clauses[1].pattern,
                    Some(Pattern::tagged("ok", Pattern::var("token")))
                );
            }
            other => panic!("expected with, got {other:?}"),
        }
    }

    #[test]
    fn test_unused_match_binder_marked() {
        let tree = in_def(vec![
            Node::assign("result", Node::call("save", vec![])),
            Node::matching(
                Pattern::tagged("ok", Pattern::var("id")),
                Node::call("insert", vec![]),
            ),
            Node::call("notify", vec![Node::var("id")]),
        ]);
        let body = def_body(&run(&BinderHygienePass::new(), tree));
        assert_eq!(body[0], Node::assign("_result", Node::call("save", vec![])));
        assert_eq!(
            body[1],
            Node::matching(
                Pattern::tagged("ok", Pattern::var("id")),
                Node::call("insert", vec![]),
            )
        );
    }

    #[test]
    fn test_interpolated_read_counts_as_use() {
        let tree = in_def(vec![
            Node::assign("name", Node::call("fetch", vec![])),
            Node::string("hello #{name}"),
        ]);
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_kept_names_untouched() {
        let tree = Node::def(DefKind::Def, "f", vec![Pattern::var("unused")], Node::nil())
            .with_flag(MetaFlags::KEEP_BINDER_NAMES);
        assert_eq!(run(&BinderHygienePass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_idempotent() {
        assert_idempotent(
            &BinderHygienePass::new(),
            Node::def(
                DefKind::Def,
                "f",
                vec![Pattern::var("a"), Pattern::var("b")],
                Node::block(vec![
                    Node::assign("c", Node::var("a")),
                    Node::lambda(vec![Pattern::var("d")], Node::atom("ok")),
                ]),
            ),
        );
    }
}
