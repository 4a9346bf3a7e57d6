//! Config schema types (agents, session scoping, message queueing).

use std::collections::{BTreeMap, HashMap};

use {
    parley_common::{DropPolicy, QueueMode, ThinkLevel},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_MODEL: &str = "anthropic/claude-opus-4-5";
pub const DEFAULT_AGENT_ID: &str = "main";
pub const DEFAULT_MAIN_KEY: &str = "main";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Root for session stores and sandboxes. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
    pub agents: AgentsConfig,
    pub session: SessionConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Agent used when the session key does not name one.
    pub default_id: String,
    pub defaults: AgentDefaults,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_id: DEFAULT_AGENT_ID.into(),
            defaults: AgentDefaults::default(),
        }
    }
}

/// Defaults applied to every agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    pub model: ModelSetting,
    /// Allowlist of `provider/model` refs. Empty means every catalog model is allowed.
    pub models: BTreeMap<String, ModelEntryConfig>,
    pub thinking_default: ThinkLevel,
    /// Maximum wall-clock seconds for an agent run (0 = no timeout). Default 600.
    pub timeout_secs: u64,
    pub sandbox: SandboxConfig,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: ModelSetting::default(),
            models: BTreeMap::new(),
            thinking_default: ThinkLevel::Off,
            timeout_secs: 600,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl AgentDefaults {
    /// Find the allowlisted model ref whose alias matches `raw`.
    ///
    /// Both sides are trimmed; the comparison is case-sensitive.
    #[must_use]
    pub fn resolve_alias(&self, raw: &str) -> Option<&str> {
        let needle = raw.trim();
        if needle.is_empty() {
            return None;
        }
        self.models.iter().find_map(|(model_ref, entry)| {
            entry
                .alias
                .as_deref()
                .filter(|alias| alias.trim() == needle)
                .map(|_| model_ref.as_str())
        })
    }

    /// Trimmed, non-empty aliases.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.models
            .values()
            .filter_map(|entry| entry.alias.as_deref())
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
    }
}

/// `model = "provider/model"` or `model = { primary = "provider/model" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSetting {
    Ref(String),
    Detailed {
        primary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fallbacks: Vec<String>,
    },
}

impl Default for ModelSetting {
    fn default() -> Self {
        Self::Ref(DEFAULT_MODEL.into())
    }
}

impl ModelSetting {
    #[must_use]
    pub fn primary(&self) -> &str {
        match self {
            Self::Ref(model) => model,
            Self::Detailed { primary, .. } => primary,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEntryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub mode: SandboxMode,
    /// Directory holding per-session workspaces. Defaults to `<state_dir>/sandboxes`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,
}

/// Which sessions get an isolated attachment workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// Attachments are referenced by their original path.
    Off,
    /// Every session except the agent's main session.
    NonMain,
    #[default]
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub scope: SessionScope,
    pub dm_scope: DmScope,
    pub main_key: String,
    /// Store file override; supports `{agentId}` and a leading `~`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scope: SessionScope::default(),
            dm_scope: DmScope::default(),
            main_key: DEFAULT_MAIN_KEY.into(),
            store: None,
        }
    }
}

/// How inbound messages map onto sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScope {
    /// Groups get their own session; direct chats follow [`DmScope`].
    #[default]
    PerSender,
    /// Everything shares the agent's main session.
    Main,
}

/// Session granularity for direct chats under [`SessionScope::PerSender`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DmScope {
    #[default]
    Main,
    PerPeer,
    PerChannelPeer,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub queue: QueueConfig,
}

/// Global queue defaults; sessions may override any field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub mode: QueueMode,
    pub debounce_ms: u64,
    pub cap: usize,
    pub drop: DropPolicy,
    /// Per-channel mode overrides (`telegram = "steer"`).
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub by_channel: HashMap<String, QueueMode>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::Collect,
            debounce_ms: 1000,
            cap: 20,
            drop: DropPolicy::Summarize,
            by_channel: HashMap::new(),
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn mode_for_channel(&self, channel: Option<&str>) -> QueueMode {
        channel
            .and_then(|c| self.by_channel.get(&c.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.mode)
    }
}
