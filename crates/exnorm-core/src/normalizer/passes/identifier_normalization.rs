// =============================================================================
// Identifier Normalization Pass
// =============================================================================

use indexmap::IndexSet;
use tracing::debug;

use crate::analysis::binders::{collect_bound, rename_all};
use crate::analysis::naming::{is_valid_variable_name, to_snake_case};
use crate::ast::{transform, walk, walk_patterns, MetaFlags, Node, NodeKind};
use crate::normalizer::passes::rewrite_module_bodies;
use crate::normalizer::{NormalizationPass, PassContext};

/// Rewrites camelCase and capitalized identifiers to snake_case.
///
/// Variables are renamed consistently across a whole `def` (parameters,
/// binders, reads, pins and interpolation segments). Private function names
/// are renamed consistently across a module together with their local calls
/// and captures; public ones keep their name. A name is left alone when the
/// snake_case form is already in use or when a binder owner carries
/// `KEEP_BINDER_NAMES`.
pub struct IdentifierNormalizationPass;

impl IdentifierNormalizationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for IdentifierNormalizationPass {
    fn name(&self) -> &'static str {
        "identifier-normalization"
    }

    fn run(&self, tree: Node, _ctx: &PassContext<'_>) -> Node {
        let tree = transform(tree, &mut |node| match node.kind {
            NodeKind::Def(_) => normalize_variables(node),
            _ => node,
        });
        rewrite_module_bodies(tree, &mut |_, stmts| normalize_function_names(stmts))
    }
}

/// `__MODULE__`, `__CALLER__` and friends
fn is_special_form(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn snake_candidate(name: &str) -> Option<String> {
    if is_special_form(name) || is_valid_variable_name(name) {
        return None;
    }
    let snake = to_snake_case(name);
    (snake != name && is_valid_variable_name(&snake)).then_some(snake)
}

fn normalize_variables(def: Node) -> Node {
    if def.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
        return def;
    }

    let mut names: IndexSet<String> = IndexSet::new();
    let mut protected: IndexSet<String> = IndexSet::new();
    walk_patterns(&def, &mut |p| names.extend(collect_bound(p)));
    walk(&def, &mut |n| {
        if let NodeKind::Var(name) = &n.kind {
            names.insert(name.clone());
        }
        if n.has_flag(MetaFlags::KEEP_BINDER_NAMES) {
            n.for_each_own_pattern(&mut |p| protected.extend(collect_bound(p)));
        }
    });

    let mut current = def;
    for name in names.iter().filter(|n| !protected.contains(*n)) {
        let Some(snake) = snake_candidate(name) else {
            continue;
        };
        match rename_all(&current, name, &snake) {
            Some(renamed) => {
                debug!(from = %name, to = %snake, "normalized variable name");
                current = renamed;
            }
            None => debug!(name = %name, "variable rename refused"),
        }
    }
    current
}

fn function_snake_name(name: &str) -> Option<String> {
    let (stem, suffix) = match name.strip_suffix(&['?', '!'][..]) {
        Some(stem) => (stem, &name[stem.len()..]),
        None => (name, ""),
    };
    snake_candidate(stem).map(|snake| format!("{}{}", snake, suffix))
}

fn normalize_function_names(stmts: Vec<Node>) -> Vec<Node> {
    let defined: IndexSet<String> = stmts
        .iter()
        .filter_map(|s| match &s.kind {
            NodeKind::Def(def) => Some(def.name.clone()),
            _ => None,
        })
        .collect();
    // Public names may be called from other modules, which this pass never sees.
    let pinned: IndexSet<&str> = stmts
        .iter()
        .filter_map(|s| match &s.kind {
            NodeKind::Def(def)
                if !def.kind.is_private() || s.has_flag(MetaFlags::KEEP_BINDER_NAMES) =>
            {
                Some(def.name.as_str())
            }
            _ => None,
        })
        .collect();

    let renames: Vec<(String, String)> = defined
        .iter()
        .filter(|name| !pinned.contains(name.as_str()))
        .filter_map(|name| {
            let snake = function_snake_name(name)?;
            (!defined.contains(&snake)).then(|| (name.clone(), snake))
        })
        .collect();
    if renames.is_empty() {
        return stmts;
    }
    for (from, to) in &renames {
        debug!(from = %from, to = %to, "normalized function name");
    }

    stmts
        .into_iter()
        .map(|stmt| {
            renames
                .iter()
                .fold(stmt, |stmt, (from, to)| rename_function(stmt, from, to))
        })
        .collect()
}

/// Rename definitions, local calls and local captures of `from`, without
/// entering nested modules.
fn rename_function(node: Node, from: &str, to: &str) -> Node {
    if matches!(node.kind, NodeKind::Module { .. }) {
        return node;
    }
    let node = node.map_children(&mut |child| rename_function(child, from, to));
    let Node { kind, meta, span } = node;
    let kind = match kind {
        NodeKind::Def(mut def) if def.name == from => {
            def.name = to.to_string();
            NodeKind::Def(def)
        }
        NodeKind::Call { name, args } if name == from => NodeKind::Call {
            name: to.to_string(),
            args,
        },
        NodeKind::Capture {
            module: None,
            function,
            arity,
        } if function == from => NodeKind::Capture {
            module: None,
            function: to.to_string(),
            arity,
        },
        other => other,
    };
    Node { kind, meta, span }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, DefKind, Pattern};
    use crate::normalizer::passes::test_support::{assert_idempotent, run};

    fn def_with(params: Vec<Pattern>, body: Node) -> Node {
        Node::def(DefKind::Def, "f", params, body)
    }

    #[test]
    fn test_camel_case_variables() {
        let tree = def_with(
            vec![Pattern::var("itemCount")],
            Node::block(vec![
                Node::assign(
                    "newTotal",
                    Node::binary(BinaryOp::Add, Node::var("itemCount"), Node::int(1)),
                ),
                Node::string("total: #{newTotal}"),
            ]),
        );
        let expected = def_with(
            vec![Pattern::var("item_count")],
            Node::block(vec![
                Node::assign(
                    "new_total",
                    Node::binary(BinaryOp::Add, Node::var("item_count"), Node::int(1)),
                ),
                Node::string("total: #{new_total}"),
            ]),
        );
        assert_eq!(run(&IdentifierNormalizationPass::new(), tree), expected);
    }

    #[test]
    fn test_collision_is_skipped() {
        let tree = def_with(
            vec![Pattern::var("myVar"), Pattern::var("my_var")],
            Node::binary(BinaryOp::Add, Node::var("myVar"), Node::var("my_var")),
        );
        assert_eq!(run(&IdentifierNormalizationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_keep_binder_names_is_respected() {
        let tree = def_with(vec![Pattern::var("Value")], Node::var("Value"))
            .with_flag(MetaFlags::KEEP_BINDER_NAMES);
        assert_eq!(run(&IdentifierNormalizationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_special_forms_untouched() {
        let tree = def_with(vec![], Node::var("__MODULE__"));
        assert_eq!(run(&IdentifierNormalizationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_function_names_and_calls() {
        let tree = Node::module(
            "App.Util",
            vec![
                Node::def(
                    DefKind::Def,
                    "fetchAll",
                    vec![],
                    Node::call("isValid?", vec![Node::int(1)]),
                ),
                Node::def(DefKind::Defp, "isValid?", vec![Pattern::var("x")], Node::var("x")),
            ],
        );
        let out = run(&IdentifierNormalizationPass::new(), tree);
        let expected = Node::module(
            "App.Util",
            vec![
                Node::def(
                    DefKind::Def,
                    "fetchAll",
                    vec![],
                    Node::call("is_valid?", vec![Node::int(1)]),
                ),
                Node::def(DefKind::Defp, "is_valid?", vec![Pattern::var("x")], Node::var("x")),
            ],
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_public_function_called_from_another_module_keeps_name() {
        let provider = Node::module(
            "App.A",
            vec![
                Node::def(DefKind::Def, "fetchAll", vec![], Node::list(vec![])),
                Node::def(DefKind::Defp, "loadRows", vec![], Node::call("fetchAll", vec![])),
            ],
        );
        let consumer = Node::module(
            "App.B",
            vec![Node::def(
                DefKind::Def,
                "run",
                vec![],
                Node::tuple(vec![
                    Node::remote("App.A", "fetchAll", vec![]),
                    Node::raw("&App.A.fetchAll/0"),
                ]),
            )],
        );
        let tree = Node::block(vec![provider, consumer.clone()]);
        let expected = Node::block(vec![
            Node::module(
                "App.A",
                vec![
                    Node::def(DefKind::Def, "fetchAll", vec![], Node::list(vec![])),
                    Node::def(DefKind::Defp, "load_rows", vec![], Node::call("fetchAll", vec![])),
                ],
            ),
            consumer,
        ]);
        assert_eq!(run(&IdentifierNormalizationPass::new(), tree), expected);
    }

    #[test]
    fn test_idempotent() {
        assert_idempotent(
            &IdentifierNormalizationPass::new(),
            def_with(vec![Pattern::var("someArg")], Node::var("someArg")),
        );
    }
}
