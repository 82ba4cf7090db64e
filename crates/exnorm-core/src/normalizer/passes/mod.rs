use crate::analysis::map_statements;
use crate::ast::{transform, CaseClause, FnClause, Literal, Node, NodeKind, Pattern, RescueClause};

use super::NormalizationPass;

mod block_flattening;
pub use block_flattening::BlockFlatteningPass;

mod identifier_normalization;
pub use identifier_normalization::IdentifierNormalizationPass;

mod self_assignment_removal;
pub use self_assignment_removal::SelfAssignmentRemovalPass;

mod bare_update_rebind;
pub use bare_update_rebind::BareUpdateRebindPass;

mod branch_rebind_hoisting;
pub use branch_rebind_hoisting::BranchRebindHoistingPass;

mod accumulator_threading;
pub use accumulator_threading::{AccumulatorThreadingPass, ScanState};

mod alias_chain_collapse;
pub use alias_chain_collapse::AliasChainCollapsePass;

mod temporary_inlining;
pub use temporary_inlining::TemporaryInliningPass;

mod dead_store_elimination;
pub use dead_store_elimination::DeadStoreEliminationPass;

mod dead_discard_elimination;
pub use dead_discard_elimination::DeadDiscardEliminationPass;

mod unused_literal_removal;
pub use unused_literal_removal::UnusedLiteralRemovalPass;

mod conditional_normalization;
pub use conditional_normalization::ConditionalNormalizationPass;

mod eta_reduction;
pub use eta_reduction::EtaReductionPass;

mod module_qualification;
pub use module_qualification::ModuleQualificationPass;

mod macro_require_hoisting;
pub use macro_require_hoisting::MacroRequireHoistingPass;

mod directive_deduplication;
pub use directive_deduplication::DirectiveDeduplicationPass;

mod arity_shim_synthesis;
pub use arity_shim_synthesis::AritySynthesisPass;

mod underscore_promotion;
pub use underscore_promotion::UnderscorePromotionPass;

mod binder_hygiene;
pub use binder_hygiene::BinderHygienePass;

/// The full catalog in pipeline order. This is the single place the order
/// is declared; [`NormalizationPass::depends_on`] is checked against it.
pub fn default_passes() -> Vec<Box<dyn NormalizationPass>> {
    vec![
        Box::new(BlockFlatteningPass::new()),
        Box::new(IdentifierNormalizationPass::new()),
        Box::new(SelfAssignmentRemovalPass::new()),
        Box::new(BareUpdateRebindPass::new()),
        Box::new(BranchRebindHoistingPass::new()),
        Box::new(AccumulatorThreadingPass::new()),
        Box::new(AliasChainCollapsePass::new()),
        Box::new(TemporaryInliningPass::new()),
        Box::new(DeadStoreEliminationPass::new()),
        Box::new(DeadDiscardEliminationPass::new()),
        Box::new(UnusedLiteralRemovalPass::new()),
        Box::new(ConditionalNormalizationPass::new()),
        Box::new(EtaReductionPass::new()),
        Box::new(ModuleQualificationPass::new()),
        Box::new(MacroRequireHoistingPass::new()),
        Box::new(DirectiveDeduplicationPass::new()),
        Box::new(AritySynthesisPass::new()),
        Box::new(UnderscorePromotionPass::new()),
        Box::new(BinderHygienePass::new()),
    ]
}

// =============================================================================
// Shared shape helpers
// =============================================================================

/// `name = value` with a plain binder: the bound value
pub(crate) fn rebound_value<'a>(stmt: &'a Node, name: &str) -> Option<&'a Node> {
    match &stmt.kind {
        NodeKind::Match(pattern, value) if pattern.as_var() == Some(name) => Some(value),
        _ => None,
    }
}

/// Plain binder name and value of `name = value`
pub(crate) fn as_assignment(stmt: &Node) -> Option<(&str, &Node)> {
    match &stmt.kind {
        NodeKind::Match(pattern, value) => pattern.as_var().map(|name| (name, value.as_ref())),
        _ => None,
    }
}

pub(crate) fn is_conditional(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::If { .. } | NodeKind::Unless { .. } | NodeKind::Case { .. }
    )
}

/// Branch bodies of an if/unless/case, with `None` for a missing else.
/// Returns `None` for any other node.
pub(crate) fn branch_bodies(node: &Node) -> Option<Vec<Option<&Node>>> {
    match &node.kind {
        NodeKind::If {
            then_branch,
            else_branch,
            ..
        }
        | NodeKind::Unless {
            then_branch,
            else_branch,
            ..
        } => Some(vec![Some(then_branch.as_ref()), else_branch.as_deref()]),
        NodeKind::Case { clauses, .. } => Some(clauses.iter().map(|c| Some(&c.body)).collect()),
        _ => None,
    }
}

/// Case clauses of `node`, empty for if/unless
pub(crate) fn case_clauses(node: &Node) -> &[CaseClause] {
    match &node.kind {
        NodeKind::Case { clauses, .. } => clauses,
        _ => &[],
    }
}

/// Rewrite every branch of an if/unless/case as a statement list. A missing
/// else branch is handed to `f` as an empty list. Other nodes are returned
/// unchanged.
pub(crate) fn map_branches<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(Vec<Node>) -> Vec<Node>,
{
    let Node { kind, meta, span } = node;
    let mut rewrite = |body: Node| {
        let span = body.span;
        Node::from_statements(f(body.into_statements()), span)
    };
    let kind = match kind {
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let then_branch = Box::new(rewrite(*then_branch));
            let else_branch = rewrite_else(else_branch, &mut rewrite);
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            }
        }
        NodeKind::Unless {
            condition,
            then_branch,
            else_branch,
        } => {
            let then_branch = Box::new(rewrite(*then_branch));
            let else_branch = rewrite_else(else_branch, &mut rewrite);
            NodeKind::Unless {
                condition,
                then_branch,
                else_branch,
            }
        }
        NodeKind::Case { subject, clauses } => NodeKind::Case {
            subject,
            clauses: clauses
                .into_iter()
                .map(|mut c| {
                    c.body = rewrite(c.body);
                    c
                })
                .collect(),
        },
        other => other,
    };
    Node { kind, meta, span }
}

/// Make every branch of an if/unless/case end in `wrap(value of name)`: a
/// final `name = e` contributes `e`, any other branch contributes the
/// branch-local `name`.
pub(crate) fn thread_branches(conditional: Node, name: &str, wrap: &dyn Fn(Node) -> Node) -> Node {
    map_branches(conditional, &mut |mut stmts| {
        let rebound = stmts
            .last()
            .and_then(|last| rebound_value(last, name))
            .cloned();
        let value = match rebound {
            Some(value) => {
                stmts.pop();
                value
            }
            None => Node::var(name),
        };
        stmts.push(wrap(value));
        stmts
    })
}

/// [`thread_branches`] without a wrapper: every branch yields `name`
pub(crate) fn yield_from_branches(conditional: Node, name: &str) -> Node {
    thread_branches(conditional, name, &|value| value)
}

fn rewrite_else(
    else_branch: Option<Box<Node>>,
    rewrite: &mut impl FnMut(Node) -> Node,
) -> Option<Box<Node>> {
    match else_branch {
        Some(e) => Some(Box::new(rewrite(*e))),
        None => {
            let materialized = rewrite(Node::block(Vec::new()));
            match &materialized.kind {
                NodeKind::Literal(Literal::Nil) => None,
                _ => Some(Box::new(materialized)),
            }
        }
    }
}

/// Apply `f` to the statement list of every module body in the tree,
/// innermost modules first.
pub(crate) fn rewrite_module_bodies<F>(tree: Node, f: &mut F) -> Node
where
    F: FnMut(&str, Vec<Node>) -> Vec<Node>,
{
    transform(tree, &mut |node| match node.kind {
        NodeKind::Module { name, body } => {
            let body = map_statements(*body, |stmts| f(&name, stmts));
            Node {
                kind: NodeKind::Module {
                    name,
                    body: Box::new(body),
                },
                meta: node.meta,
                span: node.span,
            }
        }
        kind => Node { kind, ..node },
    })
}

/// Visit every node of a module body without entering nested modules.
pub(crate) fn walk_module_body<F>(stmts: &[Node], f: &mut F)
where
    F: FnMut(&Node),
{
    fn go<F: FnMut(&Node)>(node: &Node, f: &mut F) {
        if matches!(node.kind, NodeKind::Module { .. }) {
            return;
        }
        f(node);
        node.for_each_child(&mut |child| go(child, &mut *f));
    }
    for stmt in stmts {
        go(stmt, f);
    }
}

/// Patterns, guard and body of one clause: function parameters, a case or
/// receive clause, a rescue binder.
pub(crate) struct ClauseParts {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Node>,
    pub body: Node,
}

fn map_case_clauses<F>(clauses: Vec<CaseClause>, f: &mut F) -> Vec<CaseClause>
where
    F: FnMut(ClauseParts) -> ClauseParts,
{
    clauses
        .into_iter()
        .map(|c| {
            let mut parts = f(ClauseParts {
                patterns: vec![c.pattern],
                guard: c.guard,
                body: c.body,
            });
            CaseClause {
                pattern: parts.patterns.pop().unwrap_or(Pattern::Wildcard),
                guard: parts.guard,
                body: parts.body,
            }
        })
        .collect()
}

/// Apply `f` to every clause `node` directly owns (def, fn, case, receive,
/// try and with-else clauses). `f` must hand back as many patterns as it
/// was given. Nested nodes are not visited.
pub(crate) fn map_clauses<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(ClauseParts) -> ClauseParts,
{
    let Node { kind, meta, span } = node;
    let kind = match kind {
        NodeKind::Def(mut def) => {
            let parts = f(ClauseParts {
                patterns: def.params,
                guard: def.guard.map(|g| *g),
                body: *def.body,
            });
            def.params = parts.patterns;
            def.guard = parts.guard.map(Box::new);
            def.body = Box::new(parts.body);
            NodeKind::Def(def)
        }
        NodeKind::Fn(clauses) => NodeKind::Fn(
            clauses
                .into_iter()
                .map(|c| {
                    let parts = f(ClauseParts {
                        patterns: c.params,
                        guard: c.guard,
                        body: c.body,
                    });
                    FnClause {
                        params: parts.patterns,
                        guard: parts.guard,
                        body: parts.body,
                    }
                })
                .collect(),
        ),
        NodeKind::Case { subject, clauses } => NodeKind::Case {
            subject,
            clauses: map_case_clauses(clauses, f),
        },
        NodeKind::Receive { clauses, after } => NodeKind::Receive {
            clauses: map_case_clauses(clauses, f),
            after,
        },
        NodeKind::With {
            clauses,
            body,
            else_clauses,
        } => NodeKind::With {
            clauses,
            body,
            else_clauses: map_case_clauses(else_clauses, f),
        },
        NodeKind::Try {
            body,
            rescue,
            catch,
            else_clauses,
            after,
        } => NodeKind::Try {
            body,
            rescue: rescue
                .into_iter()
                .map(|c| {
                    let mut parts = f(ClauseParts {
                        patterns: vec![c.binder],
                        guard: None,
                        body: c.body,
                    });
                    RescueClause {
                        binder: parts.patterns.pop().unwrap_or(Pattern::Wildcard),
                        exceptions: c.exceptions,
                        body: parts.body,
                    }
                })
                .collect(),
            catch: map_case_clauses(catch, f),
            else_clauses: map_case_clauses(else_clauses, f),
            after,
        },
        other => other,
    };
    Node { kind, meta, span }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ast::{DefKind, Node, NodeKind};
    use crate::config::NormalizerConfig;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::normalizer::{NormalizationPass, PassContext};

    pub fn run(pass: &dyn NormalizationPass, tree: Node) -> Node {
        run_with(pass, tree, &NormalizerConfig::default())
    }

    pub fn run_with(pass: &dyn NormalizationPass, tree: Node, config: &NormalizerConfig) -> Node {
        let handler = CollectingDiagnosticHandler::new();
        let ctx = PassContext::new(config, &handler);
        pass.run(tree, &ctx)
    }

    /// `def f, do: <stmts>`
    pub fn in_def(stmts: Vec<Node>) -> Node {
        Node::def(DefKind::Def, "f", vec![], Node::block(stmts))
    }

    /// Statements of the body of a def built by [`in_def`]
    pub fn def_body(node: &Node) -> Vec<Node> {
        match &node.kind {
            NodeKind::Def(def) => def.body.statements().to_vec(),
            other => panic!("expected def, got {other:?}"),
        }
    }

    /// Run twice and check the second run changes nothing
    pub fn assert_idempotent(pass: &dyn NormalizationPass, tree: Node) {
        let once = run(pass, tree);
        let twice = run(pass, once.clone());
        assert_eq!(once, twice, "{} is not idempotent", pass.name());
    }
}
