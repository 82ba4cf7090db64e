//! Scope owners: nodes whose bodies are closed variable scopes.

use indexmap::IndexSet;

use super::binders::{collect_bound, collect_bound_into, collect_bound_params};
use crate::ast::{CaseClause, Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Def,
    FnClause,
    /// case, receive, catch and with-else clauses
    CaseClause,
    CondClause,
    /// if/unless branches
    Branch,
    WithBody,
    Comprehension,
    TryBody,
    Rescue,
    After,
}

impl OwnerKind {
    /// Bodies of conditional forms, where a rebinding is invisible to the
    /// enclosing scope.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OwnerKind::Branch | OwnerKind::CaseClause | OwnerKind::CondClause
        )
    }
}

/// The owner of a body and the names the owner itself binds for it
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub owner: OwnerKind,
    pub bound_by_owner: IndexSet<String>,
}

impl ScopeInfo {
    pub fn new(owner: OwnerKind) -> Self {
        Self {
            owner,
            bound_by_owner: IndexSet::new(),
        }
    }

    pub fn with_bound(owner: OwnerKind, bound_by_owner: IndexSet<String>) -> Self {
        Self {
            owner,
            bound_by_owner,
        }
    }
}

/// Rewrite `body` as a statement list, keeping its shape: a block stays a
/// block, a lone statement stays unwrapped unless the rewrite produced more.
pub fn map_statements<F>(body: Node, f: F) -> Node
where
    F: FnOnce(Vec<Node>) -> Vec<Node>,
{
    let Node { kind, meta, span } = body;
    match kind {
        NodeKind::Block(stmts) => {
            let was_empty = stmts.is_empty();
            let stmts = f(stmts);
            if stmts.is_empty() && !was_empty {
                Node::nil().with_span(span)
            } else {
                Node {
                    kind: NodeKind::Block(stmts),
                    meta,
                    span,
                }
            }
        }
        kind => {
            let single = Node { kind, meta, span };
            Node::from_statements(f(vec![single]), span)
        }
    }
}

fn rewrite_body<F>(body: Node, info: &ScopeInfo, f: &mut F) -> Node
where
    F: FnMut(&ScopeInfo, Vec<Node>) -> Vec<Node>,
{
    map_statements(body, |stmts| f(info, stmts))
}

fn rewrite_box<F>(body: Box<Node>, info: &ScopeInfo, f: &mut F) -> Box<Node>
where
    F: FnMut(&ScopeInfo, Vec<Node>) -> Vec<Node>,
{
    Box::new(rewrite_body(*body, info, f))
}

fn rewrite_case_clauses<F>(clauses: Vec<CaseClause>, f: &mut F) -> Vec<CaseClause>
where
    F: FnMut(&ScopeInfo, Vec<Node>) -> Vec<Node>,
{
    clauses
        .into_iter()
        .map(|c| {
            let info = ScopeInfo::with_bound(OwnerKind::CaseClause, collect_bound(&c.pattern));
            CaseClause {
                body: rewrite_body(c.body, &info, f),
                ..c
            }
        })
        .collect()
}

/// Apply `f` to the statement list of every body `node` directly owns and
/// rebuild the node. Nested owners are not visited; combine with
/// [`crate::ast::transform`] to reach every scope, innermost first.
pub fn map_scope_bodies<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(&ScopeInfo, Vec<Node>) -> Vec<Node>,
{
    let Node { kind, meta, span } = node;
    let kind = match kind {
        NodeKind::Def(mut def) => {
            let info = ScopeInfo::with_bound(OwnerKind::Def, collect_bound_params(&def.params));
            def.body = rewrite_box(def.body, &info, f);
            NodeKind::Def(def)
        }
        NodeKind::Fn(clauses) => NodeKind::Fn(
            clauses
                .into_iter()
                .map(|mut c| {
                    let info =
                        ScopeInfo::with_bound(OwnerKind::FnClause, collect_bound_params(&c.params));
                    c.body = rewrite_body(c.body, &info, f);
                    c
                })
                .collect(),
        ),
        NodeKind::Case { subject, clauses } => NodeKind::Case {
            subject,
            clauses: rewrite_case_clauses(clauses, f),
        },
        NodeKind::Receive { clauses, after } => {
            let clauses = rewrite_case_clauses(clauses, f);
            let after = after.map(|mut a| {
                a.body = rewrite_box(a.body, &ScopeInfo::new(OwnerKind::After), f);
                a
            });
            NodeKind::Receive { clauses, after }
        }
        NodeKind::Cond(clauses) => {
            let info = ScopeInfo::new(OwnerKind::CondClause);
            NodeKind::Cond(
                clauses
                    .into_iter()
                    .map(|mut c| {
                        c.body = rewrite_body(c.body, &info, f);
                        c
                    })
                    .collect(),
            )
        }
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let info = ScopeInfo::new(OwnerKind::Branch);
            NodeKind::If {
                condition,
                then_branch: rewrite_box(then_branch, &info, f),
                else_branch: else_branch.map(|e| rewrite_box(e, &info, f)),
            }
        }
        NodeKind::Unless {
            condition,
            then_branch,
            else_branch,
        } => {
            let info = ScopeInfo::new(OwnerKind::Branch);
            NodeKind::Unless {
                condition,
                then_branch: rewrite_box(then_branch, &info, f),
                else_branch: else_branch.map(|e| rewrite_box(e, &info, f)),
            }
        }
        NodeKind::With {
            clauses,
            body,
            else_clauses,
        } => {
            let mut bound = IndexSet::new();
            for clause in &clauses {
                if let Some(p) = &clause.pattern {
                    collect_bound_into(p, &mut bound);
                }
            }
            let info = ScopeInfo::with_bound(OwnerKind::WithBody, bound);
            NodeKind::With {
                clauses,
                body: rewrite_box(body, &info, f),
                else_clauses: rewrite_case_clauses(else_clauses, f),
            }
        }
        NodeKind::For {
            generators,
            filters,
            into,
            body,
        } => {
            let mut bound = IndexSet::new();
            for generator in &generators {
                collect_bound_into(&generator.pattern, &mut bound);
            }
            let info = ScopeInfo::with_bound(OwnerKind::Comprehension, bound);
            NodeKind::For {
                generators,
                filters,
                into,
                body: rewrite_box(body, &info, f),
            }
        }
        NodeKind::Try {
            body,
            rescue,
            catch,
            else_clauses,
            after,
        } => {
            let body = rewrite_box(body, &ScopeInfo::new(OwnerKind::TryBody), f);
            let rescue = rescue
                .into_iter()
                .map(|mut c| {
                    let info = ScopeInfo::with_bound(OwnerKind::Rescue, collect_bound(&c.binder));
                    c.body = rewrite_body(c.body, &info, f);
                    c
                })
                .collect();
            NodeKind::Try {
                body,
                rescue,
                catch: rewrite_case_clauses(catch, f),
                else_clauses: rewrite_case_clauses(else_clauses, f),
                after: after.map(|a| rewrite_box(a, &ScopeInfo::new(OwnerKind::After), f)),
            }
        }
        other => other,
    };
    Node { kind, meta, span }
}
