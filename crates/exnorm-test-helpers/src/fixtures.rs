//! Tree fixtures shared by the integration tests

use exnorm_core::ast::{BinaryOp, CaseClause, DefKind, Node, NodeKind, Pattern};

pub fn add(a: Node, b: Node) -> Node {
    Node::binary(BinaryOp::Add, a, b)
}

/// `acc ++ [element]`
pub fn append(acc: &str, element: Node) -> Node {
    Node::binary(BinaryOp::ListConcat, Node::var(acc), Node::list(vec![element]))
}

/// `_ = value`
pub fn discard(value: Node) -> Node {
    Node::matching(Pattern::Wildcard, value)
}

/// `def run(xs), do: <stmts>`
pub fn over_items(stmts: Vec<Node>) -> Node {
    Node::def(DefKind::Def, "run", vec![Pattern::var("xs")], Node::block(stmts))
}

/// `Enum.<function>(xs, init, fn x, acc -> body end)`
pub fn fold(function: &str, init: Node, body: Node) -> Node {
    Node::remote(
        "Enum",
        function,
        vec![
            Node::var("xs"),
            init,
            Node::lambda(vec![Pattern::var("x"), Pattern::var("acc")], body),
        ],
    )
}

/// `Enum.each(xs, fn x -> body end)`
pub fn each(body: Node) -> Node {
    Node::remote(
        "Enum",
        "each",
        vec![Node::var("xs"), Node::lambda(vec![Pattern::var("x")], body)],
    )
}

fn x_above(n: i64) -> Node {
    Node::binary(BinaryOp::Gt, Node::var("x"), Node::int(n))
}

// =============================================================================
// Concrete scenarios
// =============================================================================

/// `count + 1` as a bare statement inside a branch
pub fn bare_update_in_branch() -> Node {
    Node::def(
        DefKind::Def,
        "tick",
        vec![Pattern::var("flag")],
        Node::block(vec![
            Node::assign("count", Node::int(0)),
            Node::if_else(
                Node::var("flag"),
                add(Node::var("count"), Node::int(1)),
                None,
            ),
            Node::var("count"),
        ]),
    )
}

/// `_ = x; _ = x; x = compute()`
pub fn forward_discards() -> Node {
    Node::def(
        DefKind::Def,
        "load",
        vec![],
        Node::block(vec![
            discard(Node::var("x")),
            discard(Node::var("x")),
            Node::assign("x", Node::call("compute", vec![])),
            Node::call("use", vec![Node::var("x")]),
        ]),
    )
}

/// `{:ok, _value} -> use(value)`
pub fn misnamed_clause_binder() -> Node {
    Node::def(
        DefKind::Def,
        "handle",
        vec![],
        Node::case(
            Node::call("fetch", vec![]),
            vec![
                CaseClause::new(
                    Pattern::tagged("ok", Pattern::var("_value")),
                    Node::call("use", vec![Node::var("value")]),
                ),
                CaseClause::new(Pattern::Wildcard, Node::atom("error")),
            ],
        ),
    )
}

/// `acc = []`, a single-append `Enum.each` loop, then a read of `acc`
pub fn append_loop() -> Node {
    over_items(vec![
        Node::assign("acc", Node::list(vec![])),
        each(Node::assign(
            "acc",
            append("acc", Node::binary(BinaryOp::Mul, Node::var("x"), Node::int(2))),
        )),
        Node::var("acc"),
    ])
}

/// Trees exercising both the bare update and the discard rules at once
pub fn update_and_discards() -> Node {
    Node::def(
        DefKind::Def,
        "mixed",
        vec![Pattern::var("flag")],
        Node::block(vec![
            discard(Node::var("total")),
            Node::assign("total", Node::int(0)),
            Node::if_else(
                Node::var("flag"),
                add(Node::var("total"), Node::int(5)),
                Some(Node::block(vec![
                    discard(Node::var("x")),
                    Node::assign("x", Node::int(1)),
                    Node::call("log", vec![Node::var("x")]),
                ])),
            ),
            Node::var("total"),
        ]),
    )
}

// =============================================================================
// Fold fixtures
// =============================================================================

/// A fold-shaped tree whose result must survive normalization
pub struct FoldFixture {
    pub name: &'static str,
    /// `def run(xs)` returning the terminal accumulator
    pub def: Node,
}

impl FoldFixture {
    fn new(name: &'static str, stmts: Vec<Node>) -> Self {
        Self {
            name,
            def: over_items(stmts),
        }
    }
}

/// Folds that rebind their accumulator in ways the target scoping ignores
pub fn fold_fixtures() -> Vec<FoldFixture> {
    vec![
        FoldFixture::new(
            "each-sum",
            vec![
                Node::assign("total", Node::int(0)),
                each(Node::assign("total", add(Node::var("total"), Node::var("x")))),
                Node::var("total"),
            ],
        ),
        FoldFixture::new(
            "each-conditional-count",
            vec![
                Node::assign("n", Node::int(0)),
                each(Node::if_else(
                    x_above(2),
                    Node::assign("n", add(Node::var("n"), Node::int(1))),
                    None,
                )),
                Node::var("n"),
            ],
        ),
        FoldFixture::new(
            "each-append",
            vec![
                Node::assign("acc", Node::list(vec![])),
                each(Node::assign("acc", append("acc", add(Node::var("x"), Node::int(1))))),
                Node::var("acc"),
            ],
        ),
        FoldFixture::new(
            "each-append-over-accumulator",
            vec![
                Node::assign("acc", Node::list(vec![])),
                Node::remote(
                    "Enum",
                    "each",
                    vec![
                        Node::var("acc"),
                        Node::lambda(
                            vec![Pattern::var("x")],
                            Node::assign("acc", append("acc", Node::var("x"))),
                        ),
                    ],
                ),
                Node::var("acc"),
            ],
        ),
        FoldFixture::new(
            "reduce-branch-rebind",
            vec![fold(
                "reduce",
                Node::int(0),
                Node::block(vec![
                    Node::if_else(
                        x_above(2),
                        Node::block(vec![
                            Node::assign("acc", add(Node::var("acc"), Node::var("x"))),
                            Node::call("log", vec![Node::var("acc")]),
                        ]),
                        None,
                    ),
                    Node::var("acc"),
                ]),
            )],
        ),
        FoldFixture::new(
            "reduce-while-branch-rebind",
            vec![fold(
                "reduce_while",
                Node::int(0),
                Node::block(vec![
                    Node::if_else(
                        x_above(1),
                        Node::assign("acc", add(Node::var("acc"), Node::var("x"))),
                        Some(Node::assign("acc", add(Node::var("acc"), Node::int(100)))),
                    ),
                    Node::tagged("cont", Node::var("acc")),
                ]),
            )],
        ),
        FoldFixture::new(
            "reduce-while-halting",
            vec![fold(
                "reduce_while",
                Node::int(0),
                Node::block(vec![
                    Node::if_else(
                        x_above(3),
                        Node::assign("acc", add(Node::var("acc"), Node::var("x"))),
                        None,
                    ),
                    Node::if_else(
                        Node::binary(BinaryOp::Gt, Node::var("acc"), Node::int(40)),
                        Node::tagged("halt", Node::var("acc")),
                        Some(Node::tagged("cont", Node::var("acc"))),
                    ),
                ]),
            )],
        ),
        FoldFixture::new(
            "reduce-append",
            vec![fold(
                "reduce",
                Node::list(vec![]),
                append("acc", Node::binary(BinaryOp::Mul, Node::var("x"), Node::var("x"))),
            )],
        ),
    ]
}

/// Whether `node` still contains an `Enum.each` call
pub fn contains_each(node: &Node) -> bool {
    exnorm_core::ast::any_node(node, &mut |n| {
        matches!(n.as_remote_call(), Some(("Enum", "each", _)))
    })
}

/// Statements of a def body
pub fn def_statements(node: &Node) -> Vec<Node> {
    match &node.kind {
        NodeKind::Def(def) => def.body.statements().to_vec(),
        other => panic!("expected def, got {other:?}"),
    }
}
