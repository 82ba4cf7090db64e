// =============================================================================
// Module Qualification Pass
// =============================================================================

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::ast::{MetaFlags, Node, NodeKind, Pattern};
use crate::config::NormalizerConfig;
use crate::normalizer::{NormalizationPass, PassContext};

/// Qualifies bare references to application modules (`Repo`,
/// `Endpoint`, ...) with the configured application root, following the
/// configured qualification rules. References the enclosing module aliases
/// are left alone. Rewritten references are flagged `QUALIFIED`.
///
/// Does nothing when no application module is configured.
pub struct ModuleQualificationPass;

impl ModuleQualificationPass {
    pub fn new() -> Self {
        Self
    }
}

impl NormalizationPass for ModuleQualificationPass {
    fn name(&self) -> &'static str {
        "module-qualification"
    }

    fn run(&self, tree: Node, ctx: &PassContext<'_>) -> Node {
        if ctx.config.app_module.is_none() {
            return tree;
        }
        let qualifier = Qualifier {
            config: ctx.config,
        };
        qualifier.rewrite(tree, &FxHashSet::default())
    }
}

/// Short name an alias directive makes available
fn alias_short_name(module: &str, as_name: Option<&str>) -> String {
    as_name
        .or_else(|| module.rsplit('.').next())
        .unwrap_or(module)
        .to_string()
}

fn module_aliases(body: &Node) -> impl Iterator<Item = String> + '_ {
    body.statements().iter().filter_map(|stmt| match &stmt.kind {
        NodeKind::Alias { module, as_name } => Some(alias_short_name(module, as_name.as_deref())),
        _ => None,
    })
}

struct Qualifier<'a> {
    config: &'a NormalizerConfig,
}

impl Qualifier<'_> {
    fn target(&self, name: &str, aliases: &FxHashSet<String>) -> Option<String> {
        if name.contains('.') || aliases.contains(name) {
            return None;
        }
        self.config.qualify(name)
    }

    fn rewrite(&self, node: Node, aliases: &FxHashSet<String>) -> Node {
        if let NodeKind::Module { body, .. } = &node.kind {
            let mut scoped = aliases.clone();
            scoped.extend(module_aliases(body));
            return node.map_children(&mut |child| self.rewrite(child, &scoped));
        }

        let node = node
            .map_children(&mut |child| self.rewrite(child, aliases))
            .map_own_patterns(&mut |p| {
                p.map(&mut |p| match p {
                    Pattern::Struct { module, fields } => {
                        let module = self.target(&module, aliases).unwrap_or(module);
                        Pattern::Struct { module, fields }
                    }
                    other => other,
                })
            });
        if node.has_flag(MetaFlags::QUALIFIED) {
            return node;
        }

        let qualified = match &node.kind {
            NodeKind::ModuleRef(name) => self
                .target(name, aliases)
                .map(NodeKind::ModuleRef),
            NodeKind::Struct { module, fields } => {
                self.target(module, aliases).map(|module| NodeKind::Struct {
                    module,
                    fields: fields.clone(),
                })
            }
            NodeKind::Capture {
                module: Some(module),
                function,
                arity,
            } => self.target(module, aliases).map(|module| NodeKind::Capture {
                module: Some(module),
                function: function.clone(),
                arity: *arity,
            }),
            _ => None,
        };
        match qualified {
            Some(kind) => {
                debug!(kind = ?kind, "qualified module reference");
                node.rebuild(kind).with_flag(MetaFlags::QUALIFIED)
            }
            None => node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DefKind;
    use crate::normalizer::passes::test_support::{assert_idempotent, run, run_with};

    fn config() -> NormalizerConfig {
        NormalizerConfig::for_app("TodoApp")
    }

    fn get_all(repo: &str) -> Node {
        Node::remote(repo, "all", vec![Node::var("query")])
    }

    #[test]
    fn test_bare_reference_qualified() {
        let tree = Node::module(
            "TodoApp.Todos",
            vec![Node::def(DefKind::Def, "list", vec![], get_all("Repo"))],
        );
        let out = run_with(&ModuleQualificationPass::new(), tree, &config());
        let expected_ref = Node::module_ref("TodoApp.Repo").with_flag(MetaFlags::QUALIFIED);
        let expected = Node::module(
            "TodoApp.Todos",
            vec![Node::def(
                DefKind::Def,
                "list",
                vec![],
                Node::new(NodeKind::RemoteCall {
                    module: Box::new(expected_ref),
                    function: "all".to_string(),
                    args: vec![Node::var("query")],
                }),
            )],
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_web_rule_and_struct() {
        let tree = Node::new(NodeKind::Struct {
            module: "Endpoint".to_string(),
            fields: vec![],
        });
        let out = run_with(&ModuleQualificationPass::new(), tree, &config());
        match &out.kind {
            NodeKind::Struct { module, .. } => assert_eq!(module, "TodoAppWeb.Endpoint"),
            other => panic!("expected struct, got {other:?}"),
        }
        assert!(out.has_flag(MetaFlags::QUALIFIED));
    }

    #[test]
    fn test_aliased_reference_untouched() {
        let tree = Node::module(
            "TodoApp.Todos",
            vec![
                Node::new(NodeKind::Alias {
                    module: "Other.Repo".to_string(),
                    as_name: None,
                }),
                Node::def(DefKind::Def, "list", vec![], get_all("Repo")),
            ],
        );
        let out = run_with(&ModuleQualificationPass::new(), tree.clone(), &config());
        assert_eq!(out, tree);
    }

    #[test]
    fn test_without_app_module_untouched() {
        let tree = get_all("Repo");
        assert_eq!(run(&ModuleQualificationPass::new(), tree.clone()), tree);
    }

    #[test]
    fn test_unknown_and_dotted_references_untouched() {
        let tree = Node::list(vec![get_all("Enum"), get_all("Ecto.Repo")]);
        let out = run_with(&ModuleQualificationPass::new(), tree.clone(), &config());
        assert_eq!(out, tree);
    }

    #[test]
    fn test_struct_pattern_qualified() {
        let tree = Node::matching(
            Pattern::Struct {
                module: "Presence".to_string(),
                fields: vec![],
            },
            Node::var("p"),
        );
        let out = run_with(&ModuleQualificationPass::new(), tree, &config());
        match &out.kind {
            NodeKind::Match(Pattern::Struct { module, .. }, _) => {
                assert_eq!(module, "TodoAppWeb.Presence")
            }
            other => panic!("expected struct pattern, got {other:?}"),
        }
    }

    #[test]
    fn test_idempotent() {
        let pass = ModuleQualificationPass::new();
        let once = run_with(&pass, get_all("Repo"), &config());
        let twice = run_with(&pass, once.clone(), &config());
        assert_eq!(once, twice);
        assert_idempotent(&pass, get_all("Repo"));
    }
}
