//! Read-only traversal, the borrowing counterpart of [`super::transform`].

use super::node::{CaseClause, Node, NodeKind};
use super::pattern::Pattern;

fn each_case_clause<G: FnMut(&Node)>(clauses: &[CaseClause], g: &mut G) {
    for clause in clauses {
        if let Some(guard) = &clause.guard {
            g(guard);
        }
        g(&clause.body);
    }
}

impl Node {
    /// Call `g` on each direct child node, in source order.
    pub fn for_each_child<G>(&self, g: &mut G)
    where
        G: FnMut(&Node),
    {
        match &self.kind {
            NodeKind::Literal(_)
            | NodeKind::Var(_)
            | NodeKind::ModuleRef(_)
            | NodeKind::AttributeRef(_)
            | NodeKind::Capture { .. }
            | NodeKind::CaptureArg(_)
            | NodeKind::Alias { .. }
            | NodeKind::Require { .. }
            | NodeKind::Raw(_) => {}

            NodeKind::List(items) | NodeKind::Tuple(items) | NodeKind::Block(items) => {
                items.iter().for_each(|n| g(n))
            }
            NodeKind::Cons(a, b)
            | NodeKind::Access(a, b)
            | NodeKind::Binary(_, a, b)
            | NodeKind::Pipe(a, b)
            | NodeKind::Range(a, b) => {
                g(a);
                g(b);
            }
            NodeKind::Map(entries) => {
                for (k, v) in entries {
                    g(k);
                    g(v);
                }
            }
            NodeKind::MapUpdate { base, updates } => {
                g(base);
                for (k, v) in updates {
                    g(k);
                    g(v);
                }
            }
            NodeKind::Struct { fields: entries, .. }
            | NodeKind::KeywordList(entries)
            | NodeKind::Import { opts: entries, .. }
            | NodeKind::Use { opts: entries, .. } => entries.iter().for_each(|(_, v)| g(v)),
            NodeKind::Field(base, _) => g(base),
            NodeKind::Unary(_, operand) => g(operand),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            }
            | NodeKind::Unless {
                condition,
                then_branch,
                else_branch,
            } => {
                g(condition);
                g(then_branch);
                if let Some(e) = else_branch {
                    g(e);
                }
            }
            NodeKind::Case { subject, clauses } => {
                g(subject);
                each_case_clause(clauses, g);
            }
            NodeKind::Cond(clauses) => {
                for clause in clauses {
                    g(&clause.condition);
                    g(&clause.body);
                }
            }
            NodeKind::With {
                clauses,
                body,
                else_clauses,
            } => {
                for clause in clauses {
                    g(&clause.expr);
                }
                g(body);
                each_case_clause(else_clauses, g);
            }
            NodeKind::Try {
                body,
                rescue,
                catch,
                else_clauses,
                after,
            } => {
                g(body);
                for clause in rescue {
                    g(&clause.body);
                }
                each_case_clause(catch, g);
                each_case_clause(else_clauses, g);
                if let Some(a) = after {
                    g(a);
                }
            }
            NodeKind::Receive { clauses, after } => {
                each_case_clause(clauses, g);
                if let Some(a) = after {
                    g(&a.timeout);
                    g(&a.body);
                }
            }
            NodeKind::Match(_, value) => g(value),
            NodeKind::For {
                generators,
                filters,
                into,
                body,
            } => {
                for generator in generators {
                    g(&generator.source);
                }
                filters.iter().for_each(|n| g(n));
                if let Some(into) = into {
                    g(into);
                }
                g(body);
            }
            NodeKind::Call { args, .. } => args.iter().for_each(|n| g(n)),
            NodeKind::RemoteCall { module, args, .. } => {
                g(module);
                args.iter().for_each(|n| g(n));
            }
            NodeKind::DynamicCall { callee, args } => {
                g(callee);
                args.iter().for_each(|n| g(n));
            }
            NodeKind::Fn(clauses) => {
                for clause in clauses {
                    if let Some(guard) = &clause.guard {
                        g(guard);
                    }
                    g(&clause.body);
                }
            }
            NodeKind::CaptureExpr(inner) => g(inner),
            NodeKind::Module { body, .. } => g(body),
            NodeKind::Def(def) => {
                if let Some(guard) = &def.guard {
                    g(guard);
                }
                g(&def.body);
            }
            NodeKind::ModuleAttribute { value, .. } => g(value),
        }
    }

    /// Call `f` on each pattern this node directly owns.
    pub fn for_each_own_pattern<F>(&self, f: &mut F)
    where
        F: FnMut(&Pattern),
    {
        match &self.kind {
            NodeKind::Match(pattern, _) => f(pattern),
            NodeKind::Case { clauses, .. } | NodeKind::Receive { clauses, .. } => {
                clauses.iter().for_each(|c| f(&c.pattern))
            }
            NodeKind::With {
                clauses,
                else_clauses,
                ..
            } => {
                clauses
                    .iter()
                    .filter_map(|c| c.pattern.as_ref())
                    .for_each(|p| f(p));
                else_clauses.iter().for_each(|c| f(&c.pattern));
            }
            NodeKind::Try {
                rescue,
                catch,
                else_clauses,
                ..
            } => {
                rescue.iter().for_each(|c| f(&c.binder));
                catch.iter().for_each(|c| f(&c.pattern));
                else_clauses.iter().for_each(|c| f(&c.pattern));
            }
            NodeKind::For { generators, .. } => generators.iter().for_each(|g| f(&g.pattern)),
            NodeKind::Fn(clauses) => clauses
                .iter()
                .flat_map(|c| c.params.iter())
                .for_each(|p| f(p)),
            NodeKind::Def(def) => def.params.iter().for_each(|p| f(p)),
            _ => {}
        }
    }
}

/// Pre-order walk over `node` and all of its descendants.
pub fn walk<F>(node: &Node, f: &mut F)
where
    F: FnMut(&Node),
{
    f(node);
    node.for_each_child(&mut |child| walk(child, &mut *f));
}

/// Whether any node in the tree satisfies `pred`.
pub fn any_node(node: &Node, pred: &mut impl FnMut(&Node) -> bool) -> bool {
    let mut found = false;
    walk(node, &mut |n| {
        if !found && pred(n) {
            found = true;
        }
    });
    found
}

/// Visit every pattern owned by any node in the tree.
pub fn walk_patterns<F>(node: &Node, f: &mut F)
where
    F: FnMut(&Pattern),
{
    walk(node, &mut |n| n.for_each_own_pattern(&mut |p| f(p)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::node::CaseClause;

    #[test]
    fn test_walk_counts_vars() {
        let tree = Node::block(vec![
            Node::assign("x", Node::var("a")),
            Node::call("f", vec![Node::var("x"), Node::var("b")]),
        ]);
        let mut count = 0;
        walk(&tree, &mut |n| {
            if matches!(n.kind, NodeKind::Var(_)) {
                count += 1;
            }
        });
        assert_eq!(count, 3);
    }

    #[test]
    fn test_walk_patterns_reaches_nested_clauses() {
        let tree = Node::case(
            Node::var("x"),
            vec![CaseClause::new(
                Pattern::tagged("ok", Pattern::var("v")),
                Node::lambda(vec![Pattern::var("y")], Node::var("y")),
            )],
        );
        let mut binders = Vec::new();
        walk_patterns(&tree, &mut |p| {
            p.walk(&mut |p| {
                if let Pattern::Var(name) = p {
                    binders.push(name.clone());
                }
            })
        });
        assert_eq!(binders, vec!["v", "y"]);
    }

    #[test]
    fn test_any_node() {
        let tree = Node::list(vec![Node::int(1), Node::raw("opaque")]);
        assert!(any_node(&tree, &mut |n| matches!(n.kind, NodeKind::Raw(_))));
        assert!(!any_node(&tree, &mut |n| n.is_nil()));
    }
}
