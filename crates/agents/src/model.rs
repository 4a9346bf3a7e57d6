use std::fmt;

use serde::{Deserialize, Serialize};

/// Models that accept the `xhigh` thinking level.
pub const XHIGH_MODELS: &[&str] = &[
    "openai/gpt-5.2",
    "openai-codex/gpt-5.2-codex",
    "openai-codex/gpt-5.1-codex",
];

/// A `provider/model` pair. The model part may itself contain `/`
/// (`openrouter/anthropic/claude-opus-4-5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Split at the first `/`. Both halves must be non-empty after trimming
    /// and a ref never contains whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains(char::is_whitespace) {
            return None;
        }
        let (provider, model) = raw.split_once('/')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self::new(provider.to_ascii_lowercase(), model))
    }

    /// Model id without any vendor prefix: the part after the last `/`.
    pub fn bare_id(&self) -> &str {
        bare_model_id(&self.model)
    }

    /// Provider family used for usage lookups (`openrouter` for `openrouter/...`).
    pub fn provider_family(&self) -> &str {
        self.provider.split('/').next().unwrap_or(&self.provider)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Part of a model id after the last `/`.
pub fn bare_model_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

pub fn supports_xhigh(model: &ModelRef) -> bool {
    let key = model.to_string();
    XHIGH_MODELS.iter().any(|m| m.eq_ignore_ascii_case(&key))
}

/// `a, b or c` rendering of [`XHIGH_MODELS`].
pub fn xhigh_models_label() -> String {
    match XHIGH_MODELS.split_last() {
        Some((last, [])) => (*last).to_string(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
        None => String::new(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_at_first_slash() {
        let r = ModelRef::parse("openrouter/anthropic/claude-opus-4-5").unwrap();
        assert_eq!(r.provider, "openrouter");
        assert_eq!(r.model, "anthropic/claude-opus-4-5");
        assert_eq!(r.bare_id(), "claude-opus-4-5");
        assert_eq!(r.to_string(), "openrouter/anthropic/claude-opus-4-5");
    }

    #[test]
    fn rejects_incomplete_refs() {
        assert!(ModelRef::parse("opus").is_none());
        assert!(ModelRef::parse("/gpt").is_none());
        assert!(ModelRef::parse("openai/ ").is_none());
    }

    #[test]
    fn rejects_refs_with_whitespace() {
        assert!(ModelRef::parse("openai/gpt-5.2 and explain closures").is_none());
        assert!(ModelRef::parse("open ai/gpt-5.2").is_none());
        assert_eq!(
            ModelRef::parse("  openai/gpt-5.2 ").unwrap().to_string(),
            "openai/gpt-5.2"
        );
    }

    #[test]
    fn xhigh_allowlist() {
        assert!(supports_xhigh(&ModelRef::new("openai", "gpt-5.2")));
        assert!(supports_xhigh(&ModelRef::new("openai-codex", "gpt-5.1-codex")));
        assert!(!supports_xhigh(&ModelRef::new("openai", "gpt-4.1-mini")));
        assert!(!supports_xhigh(&ModelRef::new("anthropic", "claude-opus-4-5")));
        assert_eq!(
            xhigh_models_label(),
            "openai/gpt-5.2, openai-codex/gpt-5.2-codex or openai-codex/gpt-5.1-codex"
        );
    }
}
