//! Bound-name collection, consistent renaming and pattern classification.

use indexmap::IndexSet;

use super::interpolation::{rename_in_segments, scan, Interpolation};
use super::naming::contains_token;
use crate::ast::{any_node, transform, walk_patterns, Literal, Node, NodeKind, Pattern};

/// Every name `pattern` binds, in source order. Pins are reads, not binders.
pub fn collect_bound(pattern: &Pattern) -> IndexSet<String> {
    let mut out = IndexSet::new();
    collect_bound_into(pattern, &mut out);
    out
}

pub fn collect_bound_into(pattern: &Pattern, out: &mut IndexSet<String>) {
    pattern.walk(&mut |p| match p {
        Pattern::Var(name) | Pattern::Alias { name, .. } => {
            out.insert(name.clone());
        }
        _ => {}
    });
}

/// Names bound by a parameter list
pub fn collect_bound_params(params: &[Pattern]) -> IndexSet<String> {
    let mut out = IndexSet::new();
    for p in params {
        collect_bound_into(p, &mut out);
    }
    out
}

/// Names a statement binds into its enclosing scope. Bodies of scope owners
/// (branches, clauses, closures) are closed and contribute nothing; only the
/// parts evaluated in the enclosing scope are inspected.
pub fn bound_in_node(node: &Node) -> IndexSet<String> {
    let mut out = IndexSet::new();
    bound_in_node_into(node, &mut out);
    out
}

fn bound_in_node_into(node: &Node, out: &mut IndexSet<String>) {
    match &node.kind {
        NodeKind::Match(pattern, value) => {
            collect_bound_into(pattern, out);
            bound_in_node_into(value, out);
        }
        NodeKind::If { condition, .. } | NodeKind::Unless { condition, .. } => {
            bound_in_node_into(condition, out)
        }
        NodeKind::Case { subject, .. } => bound_in_node_into(subject, out),
        NodeKind::Cond(_)
        | NodeKind::With { .. }
        | NodeKind::Try { .. }
        | NodeKind::Receive { .. }
        | NodeKind::For { .. }
        | NodeKind::Fn(_)
        | NodeKind::Def(_)
        | NodeKind::Module { .. } => {}
        _ => node.for_each_child(&mut |child| bound_in_node_into(child, out)),
    }
}

/// Whether any pattern anywhere inside `node` binds `name`
pub fn binds_anywhere(node: &Node, name: &str) -> bool {
    let mut found = false;
    walk_patterns(node, &mut |p| {
        if !found && collect_bound(p).contains(name) {
            found = true;
        }
    });
    found
}

/// Rename the binder `from` (plain or alias) in `pattern`. Pins refer to
/// the enclosing scope and are left alone.
pub fn rename_binder(pattern: Pattern, from: &str, to: &str) -> Pattern {
    pattern.map(&mut |p| match p {
        Pattern::Var(name) if name == from => Pattern::var(to),
        Pattern::Alias { name, inner } if name == from => Pattern::Alias {
            name: to.to_string(),
            inner,
        },
        other => other,
    })
}

fn rename_pins(pattern: Pattern, from: &str, to: &str) -> Pattern {
    pattern.map(&mut |p| match p {
        Pattern::Pin(name) if name == from => Pattern::Pin(to.to_string()),
        other => other,
    })
}

/// Rename every read of `from` in `node` to `to`: variable reads,
/// interpolation segments and pins in nested patterns.
///
/// Refuses (returns `None`) when `node` re-binds `from` anywhere, binds
/// `to` anywhere, contains a raw fragment mentioning `from`, or contains an
/// unbalanced interpolation mentioning `from`.
pub fn rename_reads(node: &Node, from: &str, to: &str) -> Option<Node> {
    if from == to {
        return Some(node.clone());
    }
    if binds_anywhere(node, from) || binds_anywhere(node, to) {
        return None;
    }
    let blocked = any_node(node, &mut |n| match &n.kind {
        NodeKind::Raw(text) => contains_token(text, from),
        NodeKind::Literal(Literal::String(text)) => {
            matches!(scan(text), Interpolation::Unbalanced) && contains_token(text, from)
        }
        _ => false,
    });
    if blocked {
        return None;
    }
    Some(transform(node.clone(), &mut |n| {
        let n = n.map_own_patterns(&mut |p| rename_pins(p, from, to));
        rename_leaf(n, from, to)
    }))
}

fn rename_leaf(n: Node, from: &str, to: &str) -> Node {
    let renamed = match &n.kind {
        NodeKind::Var(name) if name == from => Some(NodeKind::Var(to.to_string())),
        NodeKind::Literal(Literal::String(text)) if text.contains("#{") => Some(NodeKind::Literal(
            Literal::String(rename_in_segments(text, from, to)),
        )),
        _ => None,
    };
    match renamed {
        Some(kind) => n.rebuild(kind),
        None => n,
    }
}

/// Whether `name` occurs anywhere in `node`: as a read, a binder, a pin,
/// an interpolation token or a raw-fragment token.
pub fn mentions(node: &Node, name: &str) -> bool {
    binds_anywhere(node, name)
        || any_node(node, &mut |n| match &n.kind {
            NodeKind::Var(v) => v == name,
            NodeKind::Raw(text) | NodeKind::Literal(Literal::String(text)) => {
                contains_token(text, name)
            }
            _ => false,
        })
        || {
            let mut pinned = false;
            walk_patterns(node, &mut |p| {
                p.walk(&mut |q| {
                    if matches!(q, Pattern::Pin(v) if v == name) {
                        pinned = true;
                    }
                })
            });
            pinned
        }
}

/// Rename `from` to `to` everywhere in `node`, binders included. Used when a
/// name is replaced throughout a whole function. Refuses when `to` is
/// already mentioned or a raw fragment or unbalanced interpolation mentions
/// `from`.
pub fn rename_all(node: &Node, from: &str, to: &str) -> Option<Node> {
    if from == to {
        return Some(node.clone());
    }
    if mentions(node, to) {
        return None;
    }
    let blocked = any_node(node, &mut |n| match &n.kind {
        NodeKind::Raw(text) => contains_token(text, from),
        NodeKind::Literal(Literal::String(text)) => {
            matches!(scan(text), Interpolation::Unbalanced) && contains_token(text, from)
        }
        _ => false,
    });
    if blocked {
        return None;
    }
    Some(transform(node.clone(), &mut |n| {
        let n = n.map_own_patterns(&mut |p| rename_pins(rename_binder(p, from, to), from, to));
        rename_leaf(n, from, to)
    }))
}

/// Rename `from` to `to` in `pattern` and every corresponding read in the
/// body it governs. Refuses when `pattern` does not bind `from`, already
/// binds `to`, or when [`rename_reads`] refuses on the body.
pub fn rename_consistently(
    pattern: &Pattern,
    body: &Node,
    from: &str,
    to: &str,
) -> Option<(Pattern, Node)> {
    let bound = collect_bound(pattern);
    if !bound.contains(from) || bound.contains(to) {
        return None;
    }
    let body = rename_reads(body, from, to)?;
    Some((rename_binder(pattern.clone(), from, to), body))
}

/// A renamed clause: parameters, guard and body
pub type RenamedClause = (Vec<Pattern>, Option<Node>, Node);

/// [`rename_consistently`] for multi-pattern clauses (function parameters),
/// also renaming reads in the guard.
pub fn rename_clause(
    params: &[Pattern],
    guard: Option<&Node>,
    body: &Node,
    from: &str,
    to: &str,
) -> Option<RenamedClause> {
    let bound = collect_bound_params(params);
    if !bound.contains(from) || bound.contains(to) {
        return None;
    }
    let guard = match guard {
        Some(g) => Some(rename_reads(g, from, to)?),
        None => None,
    };
    let body = rename_reads(body, from, to)?;
    let params = params
        .iter()
        .map(|p| rename_binder(p.clone(), from, to))
        .collect();
    Some((params, guard, body))
}

/// Structural classification of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternShape<'a> {
    Wildcard,
    /// A plain name (possibly underscored)
    Binder(&'a str),
    Literal,
    Pin,
    /// `{:tag, name}`
    SinglePayload { tag: &'a str, binder: &'a str },
    /// `{:tag, ...}` with any other payload shape
    TaggedTuple { tag: &'a str, arity: usize },
    Tuple(usize),
    List,
    Map,
    Struct,
    Alias,
}

pub fn classify(pattern: &Pattern) -> PatternShape<'_> {
    match pattern {
        Pattern::Wildcard => PatternShape::Wildcard,
        Pattern::Var(name) => PatternShape::Binder(name),
        Pattern::Literal(_) => PatternShape::Literal,
        Pattern::Pin(_) => PatternShape::Pin,
        Pattern::Tuple(items) => match items.as_slice() {
            [Pattern::Literal(Literal::Atom(tag)), Pattern::Var(binder)] => {
                PatternShape::SinglePayload { tag, binder }
            }
            [Pattern::Literal(Literal::Atom(tag)), ..] => PatternShape::TaggedTuple {
                tag,
                arity: items.len(),
            },
            _ => PatternShape::Tuple(items.len()),
        },
        Pattern::List(_) | Pattern::Cons { .. } => PatternShape::List,
        Pattern::Map(_) => PatternShape::Map,
        Pattern::Struct { .. } => PatternShape::Struct,
        Pattern::Alias { .. } => PatternShape::Alias,
    }
}
