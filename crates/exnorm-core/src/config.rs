use crate::errors::NormalizeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A bare module reference that should be qualified with the application
/// root module. `target` may contain the `{app}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationRule {
    pub short: String,
    pub target: String,
}

impl QualificationRule {
    pub fn new(short: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            target: target.into(),
        }
    }

    /// Expand the target for a concrete application module name
    pub fn resolve(&self, app_module: &str) -> String {
        self.target.replace("{app}", app_module)
    }
}

/// Normalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizerConfig {
    /// Root module of the project being compiled (e.g. `TodoApp`)
    #[serde(default)]
    pub app_module: Option<String>,

    /// Bare module references qualified by `module-qualification`
    #[serde(default = "default_qualification_rules")]
    pub qualification_rules: Vec<QualificationRule>,

    /// Modules whose public functions are macros and need `require`
    #[serde(default = "default_macro_modules")]
    pub macro_modules: Vec<String>,

    /// Iterate every pass until it stops changing the tree (default: true)
    #[serde(default = "default_true")]
    pub fixpoint: bool,

    /// Upper bound for per-pass fixpoint iteration (default: 8)
    #[serde(default = "default_max_pass_iterations")]
    pub max_pass_iterations: usize,

    /// Upper bound for whole-pipeline reruns (default: 3)
    #[serde(default = "default_max_pipeline_iterations")]
    pub max_pipeline_iterations: usize,

    /// Passes to skip, by name
    #[serde(default)]
    pub disabled_passes: Vec<String>,

    /// Validate the tree structure after every pass (default: true)
    #[serde(default = "default_true")]
    pub validate_between_passes: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_pass_iterations() -> usize {
    8
}

fn default_max_pipeline_iterations() -> usize {
    3
}

fn default_macro_modules() -> Vec<String> {
    vec!["Logger".to_string()]
}

fn default_qualification_rules() -> Vec<QualificationRule> {
    vec![
        QualificationRule::new("Repo", "{app}.Repo"),
        QualificationRule::new("PubSub", "{app}.PubSub"),
        QualificationRule::new("Endpoint", "{app}Web.Endpoint"),
        QualificationRule::new("Router", "{app}Web.Router"),
        QualificationRule::new("Gettext", "{app}Web.Gettext"),
        QualificationRule::new("Presence", "{app}Web.Presence"),
    ]
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            app_module: None,
            qualification_rules: default_qualification_rules(),
            macro_modules: default_macro_modules(),
            fixpoint: true,
            max_pass_iterations: default_max_pass_iterations(),
            max_pipeline_iterations: default_max_pipeline_iterations(),
            disabled_passes: Vec::new(),
            validate_between_passes: true,
        }
    }
}

impl NormalizerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, NormalizeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self, NormalizeError> {
        serde_json::from_str(content).map_err(|e| NormalizeError::Config(e.to_string()))
    }

    /// Configuration for a project rooted at `app_module`
    pub fn for_app(app_module: impl Into<String>) -> Self {
        Self {
            app_module: Some(app_module.into()),
            ..Self::default()
        }
    }

    pub fn is_disabled(&self, pass: &str) -> bool {
        self.disabled_passes.iter().any(|p| p == pass)
    }

    pub fn is_macro_module(&self, module: &str) -> bool {
        self.macro_modules.iter().any(|m| m == module)
    }

    /// Fully qualified name for a bare module reference, if a rule applies
    /// and the application module is known.
    pub fn qualify(&self, short: &str) -> Option<String> {
        let app = self.app_module.as_deref()?;
        self.qualification_rules
            .iter()
            .find(|rule| rule.short == short)
            .map(|rule| rule.resolve(app))
    }
}
