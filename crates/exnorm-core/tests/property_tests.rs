//! Property-based tests for the normalization pipeline
//!
//! These tests use proptest to check idempotence and the safety of the
//! scope-sensitive rewrites across a wide range of generated trees.

use std::sync::Arc;

use exnorm_core::ast::{BinaryOp, CaseClause, DefKind, Literal, Node, NodeKind, Pattern};
use exnorm_core::diagnostics::{CollectingDiagnosticHandler, DiagnosticHandler};
use exnorm_core::normalizer::passes::default_passes;
use exnorm_core::{Normalizer, NormalizerConfig};
use exnorm_test_helpers::eval::{Evaluator, Scoping, Value};
use exnorm_test_helpers::fixtures::{def_statements, discard, each};
use exnorm_test_helpers::normalize::{normalize, normalize_only};
use proptest::prelude::*;

/// Names that never occur inside any node or pattern type name, so a
/// substring check on the debug rendering is a sound "may mention" oracle.
const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn name_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(NAMES.to_vec())
}

// =============================================================================
// Binder hygiene safety
// =============================================================================

fn read_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        name_strategy().prop_map(Node::var),
        (-5i64..5).prop_map(Node::int),
        name_strategy().prop_map(|n| Node::string(format!("value: #{{{}}}", n))),
        name_strategy().prop_map(|n| Node::raw(format!("{}.field", n))),
        Just(Node::atom("ok")),
    ]
}

/// Bodies mixing direct reads, closures, interpolation and raw fragments.
/// Nested closures only bind `item`.
fn body_strategy() -> impl Strategy<Value = Node> {
    read_strategy().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Node::tuple),
            inner
                .clone()
                .prop_map(|body| Node::lambda(vec![Pattern::var("item")], body)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Node::call("f", vec![a, b])),
            (inner.clone(), inner.clone()).prop_map(|(c, t)| Node::if_else(c, t, None)),
            prop::collection::vec(inner, 1..4).prop_map(Node::block),
        ]
    })
}

fn clause_params(node: &Node) -> Vec<Pattern> {
    match &node.kind {
        NodeKind::Fn(clauses) => clauses[0].params.clone(),
        other => panic!("expected fn, got {:?}", other),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_unused_marker_only_on_unread_binders(
        params in prop::sample::subsequence(NAMES.to_vec(), 1..=4),
        body in body_strategy(),
    ) {
        let patterns: Vec<Pattern> = params.iter().map(|p| Pattern::var(*p)).collect();
        let tree = Node::lambda(patterns, body.clone());
        let out = normalize_only(tree, &["binder-hygiene"]).unwrap();
        let rendered = format!("{:?}", body);

        for (name, binder) in params.iter().zip(clause_params(&out)) {
            let mentioned = rendered.contains(name);
            let marked = binder == Pattern::var(format!("_{}", name));
            prop_assert!(
                !(marked && mentioned),
                "{} marked unused but may be read in {}",
                name,
                rendered
            );
            prop_assert!(
                marked || mentioned,
                "{} is never read but was not marked in {}",
                name,
                rendered
            );
        }
    }

    #[test]
    fn prop_hygiene_is_idempotent(
        params in prop::sample::subsequence(NAMES.to_vec(), 1..=4),
        body in body_strategy(),
    ) {
        let patterns: Vec<Pattern> = params.iter().map(|p| Pattern::var(*p)).collect();
        let once = normalize_only(Node::lambda(patterns, body), &["binder-hygiene"]).unwrap();
        let twice = normalize_only(once.clone(), &["binder-hygiene"]).unwrap();
        prop_assert_eq!(once, twice);
    }
}

// =============================================================================
// Alias chain collapse
// =============================================================================

fn arith_strategy() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![Just(Node::var("x")), (-20i64..20).prop_map(Node::int)];
    leaf.prop_recursive(3, 16, 2, |inner| {
        (
            inner.clone(),
            inner,
            prop::sample::select(vec![BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul]),
        )
            .prop_map(|(a, b, op)| Node::binary(op, a, b))
    })
}

fn tail_strategy() -> impl Strategy<Value = Node> {
    (-10i64..10).prop_flat_map(|k| {
        prop_oneof![
            Just(Node::binary(BinaryOp::Add, Node::var("a"), Node::int(k))),
            Just(Node::tuple(vec![
                Node::var("a"),
                Node::binary(BinaryOp::Mul, Node::var("a"), Node::int(k)),
            ])),
        ]
    })
}

fn with_param_x(stmts: Vec<Node>) -> Node {
    Node::def(DefKind::Def, "run", vec![Pattern::var("x")], Node::block(stmts))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_alias_chain_collapses_to_single_binding(
        expr in arith_strategy(),
        tail in tail_strategy(),
        x in -100i64..100,
    ) {
        let tree = with_param_x(vec![
            Node::assign("b", expr.clone()),
            Node::assign("a", Node::var("b")),
            tail.clone(),
        ]);
        let out = normalize_only(tree.clone(), &["alias-chain-collapse"]).unwrap();
        prop_assert_eq!(def_statements(&out), vec![Node::assign("a", expr), tail]);

        let before = Evaluator::new(Scoping::Strict).call_def(&tree, vec![Value::Int(x)]);
        let after = Evaluator::new(Scoping::Strict).call_def(&out, vec![Value::Int(x)]);
        prop_assert_eq!(before, after);
    }
}

// =============================================================================
// Idempotence
// =============================================================================

fn var_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["count", "total", "acc", "x", "_tmp"])
}

fn statement_strategy() -> impl Strategy<Value = Node> {
    let value = prop_oneof![
        (-3i64..3).prop_map(Node::int),
        var_strategy().prop_map(Node::var),
        var_strategy().prop_map(|v| Node::binary(BinaryOp::Add, Node::var(v), Node::int(1))),
        var_strategy().prop_map(|v| Node::string(format!("#{{{}}}", v))),
        Just(Node::call("compute", vec![])),
    ];
    let value = value.boxed();
    prop_oneof![
        (var_strategy(), value.clone()).prop_map(|(v, e)| Node::assign(v, e)),
        value.clone().prop_map(discard),
        value.clone(),
        var_strategy().prop_map(|v| Node::assign(v, Node::var(v))),
        (var_strategy(), var_strategy()).prop_map(|(c, v)| {
            Node::if_else(
                Node::var(c),
                Node::binary(BinaryOp::Add, Node::var(v), Node::int(1)),
                None,
            )
        }),
        (var_strategy(), value.clone()).prop_map(|(v, e)| {
            Node::if_else(Node::var("flag"), Node::assign(v, e), Some(Node::var(v)))
        }),
        var_strategy().prop_map(|v| {
            each(Node::assign(
                v,
                Node::binary(BinaryOp::Add, Node::var(v), Node::var("x")),
            ))
        }),
        (var_strategy(), value.clone()).prop_map(|(v, e)| {
            Node::case(
                Node::var("flag"),
                vec![CaseClause::new(
                    Pattern::Wildcard,
                    Node::block(vec![Node::assign(v, e), Node::var(v)]),
                )],
            )
        }),
        value.prop_map(|e| Node::call("log", vec![e])),
    ]
}

fn unit_strategy() -> impl Strategy<Value = Node> {
    prop::collection::vec(statement_strategy(), 1..8).prop_map(|stmts| {
        Node::def(
            DefKind::Def,
            "run",
            vec![Pattern::var("xs"), Pattern::var("flag")],
            Node::block(stmts),
        )
    })
}

/// Apply `pass` exactly once, without per-pass iteration
fn run_single_pass(name: &str, tree: Node) -> Node {
    let config = NormalizerConfig {
        fixpoint: false,
        max_pipeline_iterations: 1,
        ..NormalizerConfig::default()
    };
    let handler: Arc<dyn DiagnosticHandler> = Arc::new(CollectingDiagnosticHandler::new());
    let passes = default_passes()
        .into_iter()
        .filter(|p| p.name() == name)
        .collect();
    let normalizer = Normalizer::with_passes(config, handler, passes).unwrap();
    normalizer.normalize(tree).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_pass_is_idempotent(tree in unit_strategy()) {
        for pass in default_passes() {
            let once = run_single_pass(pass.name(), tree.clone());
            let twice = run_single_pass(pass.name(), once.clone());
            prop_assert_eq!(once, twice, "{} is not idempotent", pass.name());
        }
    }

    #[test]
    fn prop_pipeline_is_idempotent(tree in unit_strategy()) {
        let once = normalize(tree).unwrap();
        let twice = normalize(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }
}

// =============================================================================
// Clause scopes
// =============================================================================

/// A clause body that either rebinds `x` or only reads it. It never ends
/// with the rebinding, which would ask for hoisting.
fn clause_body_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        (-5i64..5).prop_map(|k| {
            Node::block(vec![
                Node::assign("x", Node::int(k)),
                Node::tuple(vec![Node::var("x")]),
            ])
        }),
        (-5i64..5).prop_map(|k| Node::tuple(vec![Node::var("x"), Node::int(k)])),
        Just(Node::call("log", vec![Node::var("x")])),
    ]
}

fn clause_case_strategy() -> impl Strategy<Value = Node> {
    let subject = prop_oneof![
        Just(Node::var("flag")),
        Just(Node::var("x")),
        Just(Node::int(7)),
    ];
    let single = (subject, clause_body_strategy()).prop_map(|(subject, body)| {
        Node::case(subject, vec![CaseClause::new(Pattern::Wildcard, body)])
    });
    let boolean = (clause_body_strategy(), clause_body_strategy()).prop_map(|(t, f)| {
        Node::case(
            Node::var("flag"),
            vec![
                CaseClause::new(Pattern::Literal(Literal::Boolean(true)), t),
                CaseClause::new(Pattern::Literal(Literal::Boolean(false)), f),
            ],
        )
    });
    prop_oneof![single, boolean]
}

/// `def run(flag)` binding `x`, then a few cases, then returning `x`
fn clause_scope_unit_strategy() -> impl Strategy<Value = Node> {
    (-5i64..5, prop::collection::vec(clause_case_strategy(), 1..4)).prop_map(|(init, cases)| {
        let mut stmts = vec![Node::assign("x", Node::int(init))];
        stmts.extend(cases);
        stmts.push(Node::var("x"));
        Node::def(DefKind::Def, "run", vec![Pattern::var("flag")], Node::block(stmts))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_clause_bindings_stay_in_their_clause(tree in clause_scope_unit_strategy()) {
        let out = normalize(tree.clone()).unwrap();
        for flag in [true, false] {
            let before = Evaluator::new(Scoping::Strict).call_def(&tree, vec![Value::Bool(flag)]);
            let after = Evaluator::new(Scoping::Strict).call_def(&out, vec![Value::Bool(flag)]);
            prop_assert_eq!(before, after, "{:?}", out);
        }
    }
}
