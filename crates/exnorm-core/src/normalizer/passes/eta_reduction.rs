// =============================================================================
// Eta Reduction Pass
// =============================================================================

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::ast::{transform, FnClause, Node, NodeKind, Pattern};
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};

/// `fn a, b -> f(a, b) end` becomes `&f/2`, and
/// `fn a -> Mod.f(a) end` becomes `&Mod.f/1`.
///
/// Parameters must be distinct plain names forwarded unchanged and in order.
pub struct EtaReductionPass;

impl EtaReductionPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for EtaReductionPass {
    fn name(&self) -> &'static str {
        "eta-reduction"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_CLOSURES
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        transform(tree, &mut |node| match reduced(&node) {
            Some(kind) => {
                trace!("eta reduced closure");
                node.rebuild(kind)
            }
            None => node,
        })
    }
}

fn forwards(params: &[Pattern], args: &[Node]) -> bool {
    let mut seen = FxHashSet::default();
    params.len() == args.len()
        && params.iter().zip(args).all(|(param, arg)| match param {
            Pattern::Var(name) => seen.insert(name.as_str()) && arg.is_var(name),
            _ => false,
        })
}

fn reduced(node: &Node) -> Option<NodeKind> {
    let NodeKind::Fn(clauses) = &node.kind else {
        return None;
    };
    let [FnClause {
        params,
        guard: None,
        body,
    }] = clauses.as_slice()
    else {
        return None;
    };
    let arity = params.len();
    if let Some((module, function, args)) = body.as_remote_call() {
        return forwards(params, args).then(|| NodeKind::Capture {
            module: Some(module.to_string()),
            function: function.to_string(),
            arity,
        });
    }
    match &body.kind {
        NodeKind::Call { name, args } if forwards(params, args) => Some(NodeKind::Capture {
            module: None,
            function: name.clone(),
            arity,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::passes::test_support::{assert_idempotent, run};

    fn capture(module: Option<&str>, function: &str, arity: usize) -> Node {
        Node::new(NodeKind::Capture {
            module: module.map(str::to_string),
            function: function.to_string(),
            arity,
        })
    }

    #[test]
    fn test_local_call_reduced() {
        let tree = Node::lambda(
            vec![Pattern::var("a"), Pattern::var("b")],
            Node::call("merge", vec![Node::var("a"), Node::var("b")]),
        );
        assert_eq!(
            run(&EtaReductionPass::new(), tree),
            capture(None, "merge", 2)
        );
    }

    #[test]
    fn test_remote_call_reduced() {
        let tree = Node::lambda(
            vec![Pattern::var("x")],
            Node::remote("String", "upcase", vec![Node::var("x")]),
        );
        assert_eq!(
            run(&EtaReductionPass::new(), tree),
            capture(Some("String"), "upcase", 1)
        );
    }

    #[test]
    fn test_reordered_or_extra_args_untouched() {
        let swapped = Node::lambda(
            vec![Pattern::var("a"), Pattern::var("b")],
            Node::call("f", vec![Node::var("b"), Node::var("a")]),
        );
        assert_eq!(run(&EtaReductionPass::new(), swapped.clone()), swapped);

        let extra = Node::lambda(
            vec![Pattern::var("a")],
            Node::call("f", vec![Node::var("a"), Node::int(1)]),
        );
        assert_eq!(run(&EtaReductionPass::new(), extra.clone()), extra);
    }

    #[test]
    fn test_repeated_param_untouched() {
        let tree = Node::lambda(
            vec![Pattern::var("a"), Pattern::var("a")],
            Node::call("f", vec![Node::var("a"), Node::var("a")]),
        );
        assert_eq!(run(&EtaReductionPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_destructuring_param_untouched() {
        let tree = Node::lambda(
            vec![Pattern::tagged("ok", Pattern::var("v"))],
            Node::call("f", vec![Node::var("v")]),
        );
        assert_eq!(run(&EtaReductionPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_idempotent() {
        assert_idempotent(
            &EtaReductionPass::new(),
            Node::call(
                "map",
                vec![
                    Node::var("xs"),
                    Node::lambda(
                        vec![Pattern::var("x")],
                        Node::call("f", vec![Node::var("x")]),
                    ),
                ],
            ),
        );
    }
}
