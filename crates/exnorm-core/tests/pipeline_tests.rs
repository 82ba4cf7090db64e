use std::io::Write;
use std::sync::Arc;

use exnorm_core::ast::{any_node, DefKind, MetaFlags, Node, NodeKind, Pattern};
use exnorm_core::diagnostics::{DiagnosticHandler, DiagnosticLevel};
use exnorm_core::{NormalizeError, Normalizer, NormalizerConfig};
use exnorm_test_helpers::fixtures::{append_loop, bare_update_in_branch, forward_discards};
use exnorm_test_helpers::mocks::MockDiagnosticHandler;
use exnorm_test_helpers::normalize::{normalize, normalize_reporting, normalize_with_config};
use indoc::indoc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("exnorm_core=trace"))
        .with_test_writer()
        .try_init();
}

/// A LiveView-style module lowered with the usual defects: bare module
/// references, a Logger call without `require`, a duplicated alias and a
/// call site that dropped a trailing optional argument.
fn lowered_module() -> Node {
    let alias = Node::new(NodeKind::Alias {
        module: "TodoApp.Todos".to_string(),
        as_name: None,
    });
    Node::module(
        "TodoAppWeb.TodoLive",
        vec![
            alias.clone(),
            alias,
            Node::def(
                DefKind::Def,
                "mount",
                vec![Pattern::var("socket")],
                Node::block(vec![
                    Node::remote("Logger", "info", vec![Node::string("mounted")]),
                    Node::new(NodeKind::RemoteCall {
                        module: Box::new(Node::module_ref("PubSub")),
                        function: "subscribe".to_string(),
                        args: vec![Node::string("todos")],
                    }),
                    Node::call("assign_todos", vec![Node::var("socket")]),
                ]),
            ),
            Node::def(
                DefKind::Defp,
                "assign_todos",
                vec![Pattern::var("socket"), Pattern::var("filter")],
                Node::tuple(vec![Node::var("socket"), Node::var("filter")]),
            ),
        ],
    )
}

fn module_statements(node: &Node) -> Vec<Node> {
    match &node.kind {
        NodeKind::Module { body, .. } => body.statements().to_vec(),
        other => panic!("expected module, got {:?}", other),
    }
}

// ============================================================================
// Whole-module pipeline
// ============================================================================

#[test]
fn test_module_pipeline_repairs_directives_and_calls() {
    init_tracing();
    let (out, report, diagnostics) =
        normalize_reporting(lowered_module(), NormalizerConfig::for_app("TodoApp")).unwrap();

    let stmts = module_statements(&out);
    let aliases = stmts
        .iter()
        .filter(|s| matches!(s.kind, NodeKind::Alias { .. }))
        .count();
    assert_eq!(aliases, 1);

    let requires_logger = stmts.iter().any(|s| {
        matches!(&s.kind, NodeKind::Require { module, .. } if module == "Logger")
    });
    assert!(requires_logger, "missing require Logger: {:?}", stmts);

    let qualified = any_node(&out, &mut |n| {
        matches!(&n.kind, NodeKind::ModuleRef(name) if name == "TodoApp.PubSub")
            && n.has_flag(MetaFlags::QUALIFIED)
    });
    assert!(qualified, "PubSub not qualified: {:?}", out);

    let shim = stmts.iter().any(|s| match &s.kind {
        NodeKind::Def(def) => def.name == "assign_todos" && def.arity() == 1,
        _ => false,
    });
    assert!(shim, "no assign_todos/1 shim: {:?}", stmts);

    assert!(report.changed_passes.contains(&"module-qualification"));
    assert!(report.changed_passes.contains(&"macro-require-hoisting"));
    assert!(report.changed_passes.contains(&"directive-deduplication"));
    assert!(report.changed_passes.contains(&"arity-shim-synthesis"));
    assert!(diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Info && d.message.contains("assign_todos/1")));
}

#[test]
fn test_module_pipeline_without_app_module_leaves_references() {
    let out = normalize(lowered_module()).unwrap();
    let bare = any_node(&out, &mut |n| {
        matches!(&n.kind, NodeKind::ModuleRef(name) if name == "PubSub")
    });
    assert!(bare);
}

#[test]
fn test_pipeline_is_idempotent_on_fixtures() {
    for tree in [
        lowered_module(),
        bare_update_in_branch(),
        forward_discards(),
        append_loop(),
    ] {
        let config = NormalizerConfig::for_app("TodoApp");
        let once = normalize_with_config(tree, config.clone()).unwrap();
        let twice = normalize_with_config(once.clone(), config).unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn test_second_run_reports_no_changes() {
    let config = NormalizerConfig::for_app("TodoApp");
    let (once, _, _) = normalize_reporting(lowered_module(), config.clone()).unwrap();
    let (_, report, diagnostics) = normalize_reporting(once, config).unwrap();
    assert!(report.changed_passes.is_empty(), "{:?}", report.changed_passes);
    assert_eq!(report.iterations, 1);
    assert!(diagnostics.is_empty());
}

#[test]
fn test_units_normalized_in_parallel_match_sequential() {
    let handler = MockDiagnosticHandler::new();
    let normalizer =
        Normalizer::new(NormalizerConfig::for_app("TodoApp"), handler.clone()).unwrap();
    let units = vec![lowered_module(), append_loop(), forward_discards()];

    let parallel: Vec<Node> = normalizer
        .normalize_units(units.clone())
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    let sequential: Vec<Node> = units
        .into_iter()
        .map(|u| normalizer.normalize(u).unwrap())
        .collect();
    assert_eq!(parallel, sequential);
    assert!(!handler.has_errors());
    let shims = handler
        .messages(DiagnosticLevel::Info)
        .into_iter()
        .filter(|m| m.contains("assign_todos/1"))
        .count();
    assert_eq!(shims, 2);
}

// ============================================================================
// Configuration files
// ============================================================================

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_drives_pipeline() {
    let file = write_config(indoc! {r#"
        {
          "appModule": "TodoApp",
          "disabledPasses": ["arity-shim-synthesis"],
          "maxPipelineIterations": 2
        }
    "#});
    let config = NormalizerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.app_module.as_deref(), Some("TodoApp"));
    assert_eq!(config.max_pipeline_iterations, 2);
    assert!(config.fixpoint);

    let handler: Arc<dyn DiagnosticHandler> = MockDiagnosticHandler::new();
    let normalizer = Normalizer::new(config, handler).unwrap();
    assert!(!normalizer.pass_names().contains(&"arity-shim-synthesis"));

    let out = normalizer.normalize(lowered_module()).unwrap();
    let shim = module_statements(&out).iter().any(|s| match &s.kind {
        NodeKind::Def(def) => def.name == "assign_todos" && def.arity() == 1,
        _ => false,
    });
    assert!(!shim);
}

#[test]
fn test_config_file_custom_rules() {
    let file = write_config(indoc! {r#"
        {
          "appModule": "Shop",
          "qualificationRules": [
            { "short": "Mailer", "target": "{app}.Mailer" }
          ],
          "macroModules": ["Logger", "Ecto.Query"]
        }
    "#});
    let config = NormalizerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.qualify("Mailer"), Some("Shop.Mailer".to_string()));
    assert_eq!(config.qualify("Repo"), None);
    assert!(config.is_macro_module("Ecto.Query"));
}

#[test]
fn test_config_file_with_unknown_pass_rejected() {
    let file = write_config(indoc! {r#"
        { "disabledPasses": ["no-such-pass"] }
    "#});
    let config = NormalizerConfig::from_file(file.path()).unwrap();
    let handler: Arc<dyn DiagnosticHandler> = MockDiagnosticHandler::new();
    let err = Normalizer::new(config, handler).unwrap_err();
    assert!(matches!(err, NormalizeError::UnknownPass(name) if name == "no-such-pass"));
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = NormalizerConfig::from_file(&dir.path().join("exnorm.json")).unwrap_err();
    assert!(matches!(err, NormalizeError::Io(_)));
}

#[test]
fn test_malformed_config_file_is_config_error() {
    let file = write_config("{ \"fixpoint\": \"yes\" }");
    let err = NormalizerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, NormalizeError::Config(_)));
}

// ============================================================================
// Driver behavior
// ============================================================================

#[test]
fn test_only_rejects_unknown_pass() {
    let handler: Arc<dyn DiagnosticHandler> = MockDiagnosticHandler::new();
    let err = Normalizer::only(NormalizerConfig::default(), handler, &["bogus"]).unwrap_err();
    assert!(err.to_string().contains("bogus"));
}

#[test]
fn test_only_keeps_catalog_order() {
    let handler: Arc<dyn DiagnosticHandler> = MockDiagnosticHandler::new();
    let normalizer = Normalizer::only(
        NormalizerConfig::default(),
        handler,
        &["binder-hygiene", "block-flattening", "underscore-promotion"],
    )
    .unwrap();
    assert_eq!(
        normalizer.pass_names(),
        vec!["block-flattening", "underscore-promotion", "binder-hygiene"]
    );
}

#[test]
fn test_pass_without_matching_features_is_skipped() {
    init_tracing();
    let (_, report, _) =
        normalize_reporting(Node::int(1), NormalizerConfig::for_app("TodoApp")).unwrap();
    assert!(report.changed_passes.is_empty());
    assert_eq!(report.iterations, 1);
}
