//! Forward-usage queries over a statement sequence.
//!
//! The index is built once per body and answers "is `name` read at or after
//! statement `i`" without rescanning. Everything that cannot be analysed
//! precisely is over-approximated: unbalanced interpolation makes its
//! statement read every name, raw fragments read every identifier token they
//! contain, and closures read their free names at the statement that creates
//! them.

use rustc_hash::{FxHashMap, FxHashSet};

use super::binders::bound_in_node;
use super::interpolation::{scan, segment_reads, Interpolation};
use super::naming::identifier_tokens;
use crate::ast::{walk, Literal, Node, NodeKind, Pattern};

/// Names a node may read
#[derive(Debug, Clone, Default)]
pub struct ReadSet {
    names: FxHashSet<String>,
    opaque: bool,
}

impl ReadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` may be read. Always true once the set is opaque.
    pub fn contains(&self, name: &str) -> bool {
        self.opaque || self.names.contains(name)
    }

    /// True when some construct made precise analysis impossible
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn insert(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    fn mark_opaque(&mut self) {
        self.opaque = true;
    }
}

fn collect_pattern_reads(pattern: &Pattern, out: &mut ReadSet) {
    pattern.walk(&mut |p| {
        if let Pattern::Pin(name) = p {
            out.insert(name);
        }
    });
}

/// Add every name `node` may read to `out`, descending into closures,
/// guards, interpolation segments and raw fragments.
pub fn collect_reads(node: &Node, out: &mut ReadSet) {
    walk(node, &mut |n| {
        match &n.kind {
            NodeKind::Var(name) => out.insert(name),
            NodeKind::Literal(Literal::String(text)) => match scan(text) {
                Interpolation::Segments(segments) => {
                    for segment in segments {
                        for name in segment_reads(segment) {
                            out.insert(name);
                        }
                    }
                }
                Interpolation::Unbalanced => out.mark_opaque(),
            },
            NodeKind::Raw(text) => {
                for token in identifier_tokens(text) {
                    out.insert(token);
                }
            }
            _ => {}
        }
        n.for_each_own_pattern(&mut |p| collect_pattern_reads(p, out));
    });
}

pub fn reads(node: &Node) -> ReadSet {
    let mut out = ReadSet::new();
    collect_reads(node, &mut out);
    out
}

/// Whether `node` may read `name`
pub fn references(node: &Node, name: &str) -> bool {
    reads(node).contains(name)
}

/// Whether any of `nodes` may read `name`
pub fn any_references(nodes: &[Node], name: &str) -> bool {
    nodes.iter().any(|n| references(n, name))
}

/// Position-indexed reads and bindings of one statement sequence.
#[derive(Debug, Default)]
pub struct UsageIndex {
    reads: FxHashMap<String, Vec<usize>>,
    binds: FxHashMap<String, Vec<usize>>,
    opaque: Vec<usize>,
    len: usize,
}

impl UsageIndex {
    pub fn build(stmts: &[Node]) -> Self {
        let mut index = UsageIndex {
            len: stmts.len(),
            ..Default::default()
        };
        for (pos, stmt) in stmts.iter().enumerate() {
            let stmt_reads = reads(stmt);
            if stmt_reads.is_opaque() {
                index.opaque.push(pos);
            }
            for name in stmt_reads.names() {
                index.reads.entry(name.to_string()).or_default().push(pos);
            }
            for name in bound_in_node(stmt) {
                index.binds.entry(name).or_default().push(pos);
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `name` may be read by statement `from` or any statement after it
    pub fn used_later(&self, from: usize, name: &str) -> bool {
        let last_read = self.reads.get(name).and_then(|p| p.last());
        last_read.is_some_and(|&p| p >= from) || self.opaque.last().is_some_and(|&p| p >= from)
    }

    /// Whether `name` may be read by a statement in `from..to`
    pub fn used_between(&self, from: usize, to: usize, name: &str) -> bool {
        if from >= to {
            return false;
        }
        let hit = |positions: &[usize]| {
            let first = positions.partition_point(|&p| p < from);
            positions.get(first).is_some_and(|&p| p < to)
        };
        self.reads.get(name).is_some_and(|p| hit(p)) || hit(&self.opaque)
    }

    /// Statements that read `name` precisely (opaque statements excluded)
    pub fn read_positions(&self, name: &str) -> &[usize] {
        self.reads.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether some statement before `at` binds `name` into the sequence's scope
    pub fn bound_before(&self, at: usize, name: &str) -> bool {
        self.binds
            .get(name)
            .and_then(|p| p.first())
            .is_some_and(|&p| p < at)
    }

    /// Whether some statement after `at` binds `name` into the sequence's scope
    pub fn bound_after(&self, at: usize, name: &str) -> bool {
        self.binds
            .get(name)
            .and_then(|p| p.last())
            .is_some_and(|&p| p > at)
    }

    /// First statement after `at` that binds `name`
    pub fn next_binding(&self, at: usize, name: &str) -> Option<usize> {
        let positions = self.binds.get(name)?;
        let i = positions.partition_point(|&p| p <= at);
        positions.get(i).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn stmts() -> Vec<Node> {
        vec![
            Node::assign("x", Node::int(1)),
            Node::assign("y", Node::binary(BinaryOp::Add, Node::var("x"), Node::int(1))),
            Node::call("log", vec![Node::string("value: #{y}")]),
            Node::lambda(vec![Pattern::var("n")], Node::var("z")),
        ]
    }

    #[test]
    fn test_used_later_direct_and_interpolated() {
        let index = UsageIndex::build(&stmts());
        assert!(index.used_later(0, "x"));
        assert!(index.used_later(1, "x"));
        assert!(!index.used_later(2, "x"));
        assert!(index.used_later(2, "y"));
    }

    #[test]
    fn test_closure_reads_anchor_at_creation() {
        let index = UsageIndex::build(&stmts());
        assert_eq!(index.read_positions("z"), &[3]);
    }

    #[test]
    fn test_raw_fragment_token_boundaries() {
        let index = UsageIndex::build(&[Node::raw("foo(values, my_x)")]);
        assert!(index.used_later(0, "values"));
        assert!(!index.used_later(0, "value"));
        assert!(!index.used_later(0, "x"));
    }

    #[test]
    fn test_unbalanced_interpolation_reads_everything() {
        let index = UsageIndex::build(&[Node::string("broken #{oops"), Node::int(1)]);
        assert!(index.used_later(0, "anything"));
        assert!(!index.used_later(1, "anything"));
        assert!(index.used_between(0, 1, "other"));
    }

    #[test]
    fn test_quoted_brace_inside_interpolation() {
        let stmt = Node::string(r#"#{Map.get(m, "}") <> x}"#);
        assert!(references(&stmt, "x"));
        assert!(references(&stmt, "m"));
        let index = UsageIndex::build(&[Node::assign("x", Node::int(1)), stmt]);
        assert!(index.used_later(0, "x"));
    }

    #[test]
    fn test_pins_are_reads() {
        let stmt = Node::matching(Pattern::Pin("expected".into()), Node::call("f", vec![]));
        assert!(references(&stmt, "expected"));
    }

    #[test]
    fn test_bindings() {
        let index = UsageIndex::build(&stmts());
        assert!(index.bound_before(1, "x"));
        assert!(!index.bound_before(0, "x"));
        assert!(index.bound_after(0, "y"));
        assert_eq!(index.next_binding(0, "y"), Some(1));
        // closure params do not leak
        assert!(!index.bound_after(0, "n"));
    }

    #[test]
    fn test_used_between() {
        let index = UsageIndex::build(&stmts());
        assert!(index.used_between(1, 2, "x"));
        assert!(!index.used_between(2, 4, "x"));
        assert!(!index.used_between(3, 3, "z"));
    }
}
