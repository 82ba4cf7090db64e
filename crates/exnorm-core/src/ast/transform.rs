//! Generic rewrite driver.
//!
//! [`transform`] rebuilds every child of a node first and then hands the
//! rebuilt node to the rewrite function, so a rewrite always observes an
//! already-transformed subtree. Child dispatch is an exhaustive match: adding
//! a node variant without teaching it here is a compile error.

use super::node::{
    CaseClause, CondClause, FnClause, FunctionDef, Generator, Node, NodeKind, ReceiveAfter,
    RescueClause, WithClause,
};
use super::pattern::Pattern;

/// Post-order rewrite of `node` with `f` applied at every level.
pub fn transform<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(Node) -> Node,
{
    let rebuilt = node.map_children(&mut |child| transform(child, &mut *f));
    f(rebuilt)
}

fn map_box<G: FnMut(Node) -> Node>(node: Box<Node>, g: &mut G) -> Box<Node> {
    Box::new(g(*node))
}

fn map_vec<G: FnMut(Node) -> Node>(nodes: Vec<Node>, g: &mut G) -> Vec<Node> {
    nodes.into_iter().map(|n| g(n)).collect()
}

fn map_opt<G: FnMut(Node) -> Node>(node: Option<Box<Node>>, g: &mut G) -> Option<Box<Node>> {
    node.map(|n| map_box(n, g))
}

fn map_case_clauses<G: FnMut(Node) -> Node>(clauses: Vec<CaseClause>, g: &mut G) -> Vec<CaseClause> {
    clauses
        .into_iter()
        .map(|c| CaseClause {
            pattern: c.pattern,
            guard: c.guard.map(|guard| g(guard)),
            body: g(c.body),
        })
        .collect()
}

fn map_keyed<G: FnMut(Node) -> Node>(entries: Vec<(String, Node)>, g: &mut G) -> Vec<(String, Node)> {
    entries.into_iter().map(|(k, v)| (k, g(v))).collect()
}

fn map_pairs<G: FnMut(Node) -> Node>(entries: Vec<(Node, Node)>, g: &mut G) -> Vec<(Node, Node)> {
    entries.into_iter().map(|(k, v)| (g(k), g(v))).collect()
}

fn map_clause_patterns<F: FnMut(Pattern) -> Pattern>(
    clauses: Vec<CaseClause>,
    f: &mut F,
) -> Vec<CaseClause> {
    clauses
        .into_iter()
        .map(|c| CaseClause {
            pattern: f(c.pattern),
            guard: c.guard,
            body: c.body,
        })
        .collect()
}

impl Node {
    /// Rebuild this node with `g` applied to each direct child node.
    /// Patterns are carried over untouched.
    pub fn map_children<G>(self, g: &mut G) -> Node
    where
        G: FnMut(Node) -> Node,
    {
        let Node { kind, meta, span } = self;
        let kind = match kind {
            NodeKind::Literal(_)
            | NodeKind::Var(_)
            | NodeKind::ModuleRef(_)
            | NodeKind::AttributeRef(_)
            | NodeKind::Capture { .. }
            | NodeKind::CaptureArg(_)
            | NodeKind::Alias { .. }
            | NodeKind::Require { .. }
            | NodeKind::Raw(_) => kind,

            NodeKind::List(items) => NodeKind::List(map_vec(items, g)),
            NodeKind::Cons(head, tail) => NodeKind::Cons(map_box(head, g), map_box(tail, g)),
            NodeKind::Tuple(items) => NodeKind::Tuple(map_vec(items, g)),
            NodeKind::Map(entries) => NodeKind::Map(map_pairs(entries, g)),
            NodeKind::MapUpdate { base, updates } => NodeKind::MapUpdate {
                base: map_box(base, g),
                updates: map_pairs(updates, g),
            },
            NodeKind::Struct { module, fields } => NodeKind::Struct {
                module,
                fields: map_keyed(fields, g),
            },
            NodeKind::KeywordList(entries) => NodeKind::KeywordList(map_keyed(entries, g)),

            NodeKind::Field(base, field) => NodeKind::Field(map_box(base, g), field),
            NodeKind::Access(base, key) => NodeKind::Access(map_box(base, g), map_box(key, g)),

            NodeKind::Binary(op, left, right) => {
                NodeKind::Binary(op, map_box(left, g), map_box(right, g))
            }
            NodeKind::Unary(op, operand) => NodeKind::Unary(op, map_box(operand, g)),
            NodeKind::Pipe(left, right) => NodeKind::Pipe(map_box(left, g), map_box(right, g)),
            NodeKind::Range(first, last) => NodeKind::Range(map_box(first, g), map_box(last, g)),

            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => NodeKind::If {
                condition: map_box(condition, g),
                then_branch: map_box(then_branch, g),
                else_branch: map_opt(else_branch, g),
            },
            NodeKind::Unless {
                condition,
                then_branch,
                else_branch,
            } => NodeKind::Unless {
                condition: map_box(condition, g),
                then_branch: map_box(then_branch, g),
                else_branch: map_opt(else_branch, g),
            },
            NodeKind::Case { subject, clauses } => NodeKind::Case {
                subject: map_box(subject, g),
                clauses: map_case_clauses(clauses, g),
            },
            NodeKind::Cond(clauses) => NodeKind::Cond(
                clauses
                    .into_iter()
                    .map(|c| CondClause {
                        condition: g(c.condition),
                        body: g(c.body),
                    })
                    .collect(),
            ),
            NodeKind::With {
                clauses,
                body,
                else_clauses,
            } => NodeKind::With {
                clauses: clauses
                    .into_iter()
                    .map(|c| WithClause {
                        pattern: c.pattern,
                        expr: g(c.expr),
                    })
                    .collect(),
                body: map_box(body, g),
                else_clauses: map_case_clauses(else_clauses, g),
            },
            NodeKind::Try {
                body,
                rescue,
                catch,
                else_clauses,
                after,
            } => NodeKind::Try {
                body: map_box(body, g),
                rescue: rescue
                    .into_iter()
                    .map(|c| RescueClause {
                        binder: c.binder,
                        exceptions: c.exceptions,
                        body: g(c.body),
                    })
                    .collect(),
                catch: map_case_clauses(catch, g),
                else_clauses: map_case_clauses(else_clauses, g),
                after: map_opt(after, g),
            },
            NodeKind::Receive { clauses, after } => NodeKind::Receive {
                clauses: map_case_clauses(clauses, g),
                after: after.map(|a| ReceiveAfter {
                    timeout: map_box(a.timeout, g),
                    body: map_box(a.body, g),
                }),
            },
            NodeKind::Block(stmts) => NodeKind::Block(map_vec(stmts, g)),

            NodeKind::Match(pattern, value) => NodeKind::Match(pattern, map_box(value, g)),
            NodeKind::For {
                generators,
                filters,
                into,
                body,
            } => NodeKind::For {
                generators: generators
                    .into_iter()
                    .map(|generator| Generator {
                        pattern: generator.pattern,
                        source: g(generator.source),
                    })
                    .collect(),
                filters: map_vec(filters, g),
                into: map_opt(into, g),
                body: map_box(body, g),
            },

            NodeKind::Call { name, args } => NodeKind::Call {
                name,
                args: map_vec(args, g),
            },
            NodeKind::RemoteCall {
                module,
                function,
                args,
            } => NodeKind::RemoteCall {
                module: map_box(module, g),
                function,
                args: map_vec(args, g),
            },
            NodeKind::DynamicCall { callee, args } => NodeKind::DynamicCall {
                callee: map_box(callee, g),
                args: map_vec(args, g),
            },
            NodeKind::Fn(clauses) => NodeKind::Fn(
                clauses
                    .into_iter()
                    .map(|c| FnClause {
                        params: c.params,
                        guard: c.guard.map(|guard| g(guard)),
                        body: g(c.body),
                    })
                    .collect(),
            ),
            NodeKind::CaptureExpr(inner) => NodeKind::CaptureExpr(map_box(inner, g)),

            NodeKind::Module { name, body } => NodeKind::Module {
                name,
                body: map_box(body, g),
            },
            NodeKind::Def(def) => NodeKind::Def(FunctionDef {
                kind: def.kind,
                name: def.name,
                params: def.params,
                guard: map_opt(def.guard, g),
                body: map_box(def.body, g),
            }),
            NodeKind::Import { module, opts } => NodeKind::Import {
                module,
                opts: map_keyed(opts, g),
            },
            NodeKind::Use { module, opts } => NodeKind::Use {
                module,
                opts: map_keyed(opts, g),
            },
            NodeKind::ModuleAttribute { name, value } => NodeKind::ModuleAttribute {
                name,
                value: map_box(value, g),
            },
        };
        Node { kind, meta, span }
    }

    /// Rebuild this node with `f` applied to each pattern it directly owns
    /// (match left-hand side, clause patterns, parameters, generators, rescue
    /// binders). Patterns of nested nodes are not touched.
    pub fn map_own_patterns<F>(self, f: &mut F) -> Node
    where
        F: FnMut(Pattern) -> Pattern,
    {
        let Node { kind, meta, span } = self;
        let kind = match kind {
            NodeKind::Match(pattern, value) => NodeKind::Match(f(pattern), value),
            NodeKind::Case { subject, clauses } => NodeKind::Case {
                subject,
                clauses: map_clause_patterns(clauses, &mut *f),
            },
            NodeKind::Receive { clauses, after } => NodeKind::Receive {
                clauses: map_clause_patterns(clauses, &mut *f),
                after,
            },
            NodeKind::With {
                clauses,
                body,
                else_clauses,
            } => NodeKind::With {
                clauses: clauses
                    .into_iter()
                    .map(|c| WithClause {
                        pattern: c.pattern.map(|p| f(p)),
                        expr: c.expr,
                    })
                    .collect(),
                body,
                else_clauses: map_clause_patterns(else_clauses, &mut *f),
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
                    .map(|c| RescueClause {
                        binder: f(c.binder),
                        exceptions: c.exceptions,
                        body: c.body,
                    })
                    .collect(),
                catch: map_clause_patterns(catch, &mut *f),
                else_clauses: map_clause_patterns(else_clauses, &mut *f),
                after,
            },
            NodeKind::For {
                generators,
                filters,
                into,
                body,
            } => NodeKind::For {
                generators: generators
                    .into_iter()
                    .map(|generator| Generator {
                        pattern: f(generator.pattern),
                        source: generator.source,
                    })
                    .collect(),
                filters,
                into,
                body,
            },
            NodeKind::Fn(clauses) => NodeKind::Fn(
                clauses
                    .into_iter()
                    .map(|c| FnClause {
                        params: c.params.into_iter().map(|p| f(p)).collect(),
                        guard: c.guard,
                        body: c.body,
                    })
                    .collect(),
            ),
            NodeKind::Def(def) => NodeKind::Def(FunctionDef {
                params: def.params.into_iter().map(|p| f(p)).collect(),
                ..def
            }),
            other => other,
        };
        Node { kind, meta, span }
    }
}
