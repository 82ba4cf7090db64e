// =============================================================================
// Directive Deduplication Pass
// =============================================================================

use tracing::trace;

use crate::ast::{Node, NodeKind};
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};

use super::rewrite_module_bodies;

/// Keeps the first of several identical `alias`/`require`/`import`/`use`
/// directives in a module body. Directives differing in options or in the
/// `as:` name are distinct.
pub struct DirectiveDeduplicationPass;

impl DirectiveDeduplicationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for DirectiveDeduplicationPass {
    fn name(&self) -> &'static str {
        "directive-deduplication"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_MODULES
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        rewrite_module_bodies(tree, &mut |module, stmts| dedup(module, stmts))
    }
}

fn is_directive(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Alias { .. }
            | NodeKind::Require { .. }
            | NodeKind::Import { .. }
            | NodeKind::Use { .. }
    )
}

fn dedup(module: &str, stmts: Vec<Node>) -> Vec<Node> {
    let mut kept: Vec<Node> = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        let duplicate =
            is_directive(&stmt.kind) && kept.iter().any(|earlier| earlier.kind == stmt.kind);
        if duplicate {
            trace!(module, "dropped duplicate directive");
        } else {
            kept.push(stmt);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DefKind, MetaFlags};
    use crate::normalizer::passes::test_support::{assert_idempotent, run};

    fn alias(module: &str, as_name: Option<&str>) -> Node {
        Node::new(NodeKind::Alias {
            module: module.to_string(),
            as_name: as_name.map(str::to_string),
        })
    }

    fn require(module: &str) -> Node {
        Node::new(NodeKind::Require {
            module: module.to_string(),
            as_name: None,
        })
    }

    fn def() -> Node {
        Node::def(DefKind::Def, "f", vec![], Node::atom("ok"))
    }

    #[test]
    fn test_duplicates_dropped() {
        let tree = Node::module(
            "App.Mod",
            vec![
                alias("App.Repo", None),
                require("Logger"),
                alias("App.Repo", None),
                require("Logger").with_flag(MetaFlags::SYNTHESIZED),
                def(),
            ],
        );
        let expected = Node::module(
            "App.Mod",
            vec![alias("App.Repo", None), require("Logger"), def()],
        );
        assert_eq!(run(&DirectiveDeduplicationPass::new(), tree), expected);
    }

    #[test]
    fn test_different_as_names_kept() {
        let tree = Node::module(
            "App.Mod",
            vec![alias("App.Repo", None), alias("App.Repo", Some("R")), def()],
        );
        assert_eq!(run(&DirectiveDeduplicationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_identical_non_directives_untouched() {
        let tree = Node::module("App.Mod", vec![def(), def()]);
        assert_eq!(run(&DirectiveDeduplicationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_idempotent() {
        assert_idempotent(
            &DirectiveDeduplicationPass::new(),
            Node::module(
                "App.Mod",
                vec![require("Logger"), require("Logger"), require("Logger")],
            ),
        );
    }
}
