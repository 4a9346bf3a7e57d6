//! Configuration validation.
//!
//! Checks TOML configuration against the known schema, flags unknown or
//! misspelled fields, and reports semantic problems (bad model refs,
//! colliding aliases, zero caps).

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
};

use crate::schema::{ParleyConfig, SandboxMode};

/// Directive names an alias can never take over.
pub const RESERVED_DIRECTIVE_NAMES: &[&str] = &[
    "help", "model", "models", "think", "thinking", "queue", "stop", "status", "usage",
];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "model-ref", "alias", "queue", "sandbox"
    pub category: &'static str,
    /// Dotted path, e.g. "messages.queue.cap"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    /// Dynamic keys whose values share one shape.
    Map(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Map, Struct};

    Struct(HashMap::from([
        ("state_dir", Leaf),
        (
            "agents",
            Struct(HashMap::from([
                ("default_id", Leaf),
                (
                    "defaults",
                    Struct(HashMap::from([
                        // string or { primary, fallbacks }
                        ("model", Leaf),
                        ("models", Map(Box::new(Struct(HashMap::from([("alias", Leaf)]))))),
                        ("thinking_default", Leaf),
                        ("timeout_secs", Leaf),
                        (
                            "sandbox",
                            Struct(HashMap::from([("mode", Leaf), ("workspace_root", Leaf)])),
                        ),
                    ])),
                ),
            ])),
        ),
        (
            "session",
            Struct(HashMap::from([
                ("scope", Leaf),
                ("dm_scope", Leaf),
                ("main_key", Leaf),
                ("store", Leaf),
            ])),
        ),
        (
            "messages",
            Struct(HashMap::from([(
                "queue",
                Struct(HashMap::from([
                    ("mode", Leaf),
                    ("debounce_ms", Leaf),
                    ("cap", Leaf),
                    ("drop", Leaf),
                    ("by_channel", Map(Box::new(Leaf))),
                ])),
            )])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered one if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(crate::loader::find_config_file);

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) if is_toml => validate_toml_str(&crate::env_subst::substitute_env(&content)),
        Ok(_) => match crate::loader::load_config(&actual_path) {
            Ok(config) => {
                let mut diagnostics = Vec::new();
                check_semantics(&config, &mut diagnostics);
                ValidationResult {
                    diagnostics,
                    config_path: None,
                }
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("failed to parse config file: {e}"),
                )],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the file system.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&toml_value, &build_schema_map(), "", &mut diagnostics);

    match toml::from_str::<ParleyConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (toml::Value::Table(table), KnownKeys::Struct(fields)) => {
            let known_keys: Vec<&str> = fields.keys().copied().collect();
            for (key, child_value) in table {
                let path = join_path(prefix, key);
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child_value, child_schema, &path, diagnostics);
                } else {
                    let message = match suggest(key, &known_keys, 3) {
                        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                        None => "unknown field".to_string(),
                    };
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        "unknown-field",
                        path,
                        message,
                    ));
                }
            }
        },
        (toml::Value::Table(table), KnownKeys::Map(value_schema)) => {
            for (key, child_value) in table {
                check_unknown_fields(child_value, value_schema, &join_path(prefix, key), diagnostics);
            }
        },
        _ => {},
    }
}

fn is_model_ref(raw: &str) -> bool {
    matches!(raw.split_once('/'), Some((provider, model)) if !provider.trim().is_empty() && !model.trim().is_empty())
}

/// Semantic checks on a successfully parsed config.
fn check_semantics(config: &ParleyConfig, diagnostics: &mut Vec<Diagnostic>) {
    let defaults = &config.agents.defaults;

    let primary = defaults.model.primary();
    if !is_model_ref(primary) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "model-ref",
            "agents.defaults.model",
            format!("\"{primary}\" is not a provider/model reference"),
        ));
    } else if !defaults.models.is_empty() && !defaults.models.contains_key(primary) {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "model-ref",
            "agents.defaults.model",
            format!("default model \"{primary}\" is not in agents.defaults.models"),
        ));
    }

    let mut seen_aliases = HashSet::new();
    for (model_ref, entry) in &defaults.models {
        let path = format!("agents.defaults.models.\"{model_ref}\"");
        if !is_model_ref(model_ref) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "model-ref",
                path.clone(),
                format!("\"{model_ref}\" is not a provider/model reference"),
            ));
        }
        let Some(alias) = entry.alias.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
            continue;
        };
        if RESERVED_DIRECTIVE_NAMES.contains(&alias.to_ascii_lowercase().as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "alias",
                format!("{path}.alias"),
                format!("alias \"{alias}\" matches a built-in directive and will never act as a shortcut"),
            ));
        }
        if !seen_aliases.insert(alias) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "alias",
                format!("{path}.alias"),
                format!("alias \"{alias}\" is used by more than one model"),
            ));
        }
    }

    if defaults.timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "queue",
            "agents.defaults.timeout_secs",
            "agent runs have no timeout",
        ));
    }

    if defaults.sandbox.mode == SandboxMode::Off {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "sandbox",
            "agents.defaults.sandbox.mode",
            "sandbox is off; agents will see host attachment paths",
        ));
    }

    if config.session.main_key.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "session",
            "session.main_key",
            "main_key must not be empty",
        ));
    }

    if config.messages.queue.cap == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "queue",
            "messages.queue.cap",
            "cap must be at least 1",
        ));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn messages(result: &ValidationResult) -> Vec<String> {
        result
            .diagnostics
            .iter()
            .map(|d| format!("{} {}: {}", d.severity, d.path, d.message))
            .collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("queue", "queue"), 0);
        assert_eq!(levenshtein("queu", "queue"), 1);
        assert_eq!(levenshtein("cap", "cat"), 1);
    }

    #[test]
    fn empty_config_is_valid() {
        let result = validate_toml_str("");
        assert!(!result.has_errors(), "{:?}", messages(&result));
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let result = validate_toml_str("[messages.queue]\ndebounce = 10\n");
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .unwrap();
        assert_eq!(diag.path, "messages.queue.debounce");
        assert!(diag.message.contains("debounce_ms"), "{}", diag.message);
    }

    #[test]
    fn dynamic_model_keys_are_not_unknown_fields() {
        let result = validate_toml_str(
            r#"
            [agents.defaults.models."openai/gpt-5.2"]
            alias = "gpt"
            [messages.queue.by_channel]
            telegram = "steer"
            "#,
        );
        assert!(!result.has_errors(), "{:?}", messages(&result));
    }

    #[test]
    fn invalid_enum_value_is_type_error() {
        let result = validate_toml_str("[messages.queue]\nmode = \"sideways\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn reserved_and_duplicate_aliases() {
        let result = validate_toml_str(
            r#"
            [agents.defaults.models."anthropic/claude-opus-4-5"]
            alias = " help "
            [agents.defaults.models."openai/gpt-5.2"]
            alias = "help"
            "#,
        );
        assert_eq!(
            result
                .diagnostics
                .iter()
                .filter(|d| d.category == "alias" && d.severity == Severity::Warning)
                .count(),
            2
        );
        assert!(result.has_errors());
    }

    #[test]
    fn zero_cap_and_bad_model_ref_are_errors() {
        let result = validate_toml_str(
            r#"
            [agents.defaults]
            model = "opus"
            [messages.queue]
            cap = 0
            "#,
        );
        assert_eq!(result.count(Severity::Error), 2, "{:?}", messages(&result));
    }

    #[test]
    fn sandbox_off_warned() {
        let result = validate_toml_str("[agents.defaults.sandbox]\nmode = \"off\"\n");
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn validate_reads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.json");
        std::fs::write(&path, r#"{"messages":{"queue":{"cap":0}}}"#).unwrap();
        let result = validate(Some(&path));
        assert!(result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
