// =============================================================================
// Conditional Normalization Pass
// =============================================================================

use tracing::trace;

use crate::analysis::binders::bound_in_node;
use crate::ast::{transform, CaseClause, Literal, Node, NodeKind, Pattern, UnaryOp};
use crate::normalizer::{NormalizationPass, PassContext, TreeFeatures};

/// Brings conditionals into one canonical shape:
///
/// | input                                   | output                      |
/// |-----------------------------------------|-----------------------------|
/// | `if c, do: a, else: nil`                | `if c, do: a`               |
/// | `if !c, do: a`                          | `unless c, do: a`           |
/// | `if !c, do: a, else: b`                 | `if c, do: b, else: a`      |
/// | `unless c, do: a, else: b`              | `if c, do: b, else: a`      |
/// | `case c do true -> a; false -> b end`   | `if c, do: a, else: b`      |
/// | `case pure do _ -> a end`               | `a`                         |
///
/// The last row only applies when `a` binds nothing, since the clause body
/// is a closed scope and unwrapping it would leak its bindings.
pub struct ConditionalNormalizationPass;

impl ConditionalNormalizationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for ConditionalNormalizationPass {
    fn name(&self) -> &'static str {
        "conditional-normalization"
    }

    fn required_features(&self) -> TreeFeatures {
        TreeFeatures::HAS_CONDITIONALS
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        transform(tree, &mut |mut node| loop {
            match normalize_once(node) {
                Ok(next) => node = next,
                Err(done) => break done,
            }
        })
    }
}

/// Operand of `!c` or `not c`
fn negated(node: Node) -> Result<Node, Node> {
    match node.kind {
        NodeKind::Unary(UnaryOp::Bang | UnaryOp::Not, operand) => Ok(*operand),
        kind => Err(Node { kind, ..node }),
    }
}

fn is_negation(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Unary(UnaryOp::Bang | UnaryOp::Not, _))
}

fn boolean_pattern(pattern: &Pattern) -> Option<bool> {
    match pattern {
        Pattern::Literal(Literal::Boolean(b)) => Some(*b),
        Pattern::Literal(Literal::Atom(a)) if a == "true" => Some(true),
        Pattern::Literal(Literal::Atom(a)) if a == "false" => Some(false),
        _ => None,
    }
}

/// For a guardless two-clause boolean case: whether the `true` clause
/// comes first
fn boolean_case(clauses: &[CaseClause]) -> Option<bool> {
    let [first, second] = clauses else {
        return None;
    };
    if first.guard.is_some() || second.guard.is_some() {
        return None;
    }
    match (boolean_pattern(&first.pattern)?, boolean_pattern(&second.pattern)?) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Apply one rewrite. `Ok` carries a changed node, `Err` the untouched one.
fn normalize_once(node: Node) -> Result<Node, Node> {
    let Node { kind, meta, span } = node;
    let rebuilt = |kind| Node { kind, meta, span };
    match kind {
        NodeKind::If {
            condition,
            then_branch,
            else_branch: Some(else_branch),
        } if else_branch.is_nil() => {
            trace!("dropped else nil");
            Ok(rebuilt(NodeKind::If {
                condition,
                then_branch,
                else_branch: None,
            }))
        }
        NodeKind::Unless {
            condition,
            then_branch,
            else_branch: Some(else_branch),
        } if else_branch.is_nil() => Ok(rebuilt(NodeKind::Unless {
            condition,
            then_branch,
            else_branch: None,
        })),
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } if is_negation(&condition) => {
            let condition = match negated(*condition) {
                Ok(inner) => Box::new(inner),
                Err(original) => {
                    return Err(rebuilt(NodeKind::If {
                        condition: Box::new(original),
                        then_branch,
                        else_branch,
                    }))
                }
            };
            trace!("negated if rewritten");
            Ok(rebuilt(match else_branch {
                None => NodeKind::Unless {
                    condition,
                    then_branch,
                    else_branch: None,
                },
                Some(else_branch) => NodeKind::If {
                    condition,
                    then_branch: else_branch,
                    else_branch: Some(then_branch),
                },
            }))
        }
        NodeKind::Unless {
            condition,
            then_branch,
            else_branch: Some(else_branch),
        } => {
            trace!("unless with else rewritten");
            Ok(rebuilt(NodeKind::If {
                condition,
                then_branch: else_branch,
                else_branch: Some(then_branch),
            }))
        }
        NodeKind::Case { subject, clauses } => {
            let true_first = boolean_case(&clauses);
            let mut clauses = match (true_first, <[CaseClause; 2]>::try_from(clauses)) {
                (Some(true_first), Ok([first, second])) => {
                    trace!("boolean case rewritten to if");
                    let (on_true, on_false) = if true_first {
                        (first, second)
                    } else {
                        (second, first)
                    };
                    return Ok(rebuilt(NodeKind::If {
                        condition: subject,
                        then_branch: Box::new(on_true.body),
                        else_branch: Some(Box::new(on_false.body)),
                    }));
                }
                (_, Ok(pair)) => Vec::from(pair),
                (_, Err(clauses)) => clauses,
            };
            let single_wildcard = matches!(
                clauses.as_slice(),
                [clause] if clause.pattern.is_wildcard()
                    && clause.guard.is_none()
                    && bound_in_node(&clause.body).is_empty()
            );
            if single_wildcard && subject.is_pure() {
                if let Some(clause) = clauses.pop() {
                    trace!("single wildcard case unwrapped");
                    return Ok(clause.body);
                }
            }
            Err(rebuilt(NodeKind::Case { subject, clauses }))
        }
        kind => Err(rebuilt(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::passes::test_support::{assert_idempotent, run};
    use crate::ast::BinaryOp;

    fn not(node: Node) -> Node {
        Node::unary(UnaryOp::Bang, node)
    }

    fn a() -> Node {
        Node::call("a", vec![])
    }

    fn b() -> Node {
        Node::call("b", vec![])
    }

    #[test]
    fn test_else_nil_dropped() {
        let tree = Node::if_else(Node::var("c"), a(), Some(Node::nil()));
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), tree),
            Node::if_else(Node::var("c"), a(), None)
        );
    }

    #[test]
    fn test_negated_if_becomes_unless() {
        let tree = Node::if_else(not(Node::var("c")), a(), None);
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), tree),
            Node::unless(Node::var("c"), a(), None)
        );
    }

    #[test]
    fn test_negated_if_else_is_swapped() {
        let tree = Node::if_else(not(Node::var("c")), a(), Some(b()));
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), tree),
            Node::if_else(Node::var("c"), b(), Some(a()))
        );
    }

    #[test]
    fn test_unless_else_is_swapped() {
        let tree = Node::unless(Node::var("c"), a(), Some(b()));
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), tree),
            Node::if_else(Node::var("c"), b(), Some(a()))
        );
    }

    #[test]
    fn test_boolean_case_becomes_if() {
        let tree = Node::case(
            Node::var("flag"),
            vec![
                CaseClause::new(Pattern::Literal(Literal::Boolean(false)), b()),
                CaseClause::new(Pattern::Literal(Literal::Boolean(true)), a()),
            ],
        );
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), tree),
            Node::if_else(Node::var("flag"), a(), Some(b()))
        );
    }

    #[test]
    fn test_single_wildcard_case_over_pure_subject() {
        let tree = Node::case(Node::var("x"), vec![CaseClause::new(Pattern::Wildcard, a())]);
        assert_eq!(run(&ConditionalNormalizationPass::new(), tree), a());

        let effectful = Node::case(
            Node::call("fetch", vec![]),
            vec![CaseClause::new(Pattern::Wildcard, a())],
        );
        assert_eq!(
            run(&ConditionalNormalizationPass::new(), effectful.clone()),
            effectful
        );
    }

    #[test]
    fn test_single_wildcard_case_with_binding_body_kept() {
        let body = Node::block(vec![
            Node::assign("x", Node::int(2)),
            Node::binary(BinaryOp::Add, Node::var("x"), Node::var("x")),
        ]);
        let tree = Node::case(
            Node::var("xs"),
            vec![CaseClause::new(Pattern::Wildcard, body)],
        );
        assert_eq!(run(&ConditionalNormalizationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_guarded_boolean_case_untouched() {
        let mut guarded = CaseClause::new(Pattern::Literal(Literal::Boolean(true)), a());
        guarded.guard = Some(Node::var("g"));
        let tree = Node::case(
            Node::var("flag"),
            vec![
                guarded,
                CaseClause::new(Pattern::Literal(Literal::Boolean(false)), b()),
            ],
        );
        assert_eq!(run(&ConditionalNormalizationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_idempotent() {
        assert_idempotent(
            &ConditionalNormalizationPass::new(),
            Node::unless(not(Node::var("c")), a(), Some(Node::nil())),
        );
    }
}
