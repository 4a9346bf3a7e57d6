use {
    parley_common::{DropPolicy, QueueMode, ThinkLevel},
    serde::{Deserialize, Serialize},
};

/// Persistent per-session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_override: Option<ThinkLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_override: Option<QueueOverride>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted_last_run: bool,
    /// Transcript file, absolute or relative to the sessions directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,
    /// Unix millis of the last mutation.
    #[serde(default)]
    pub updated_at: u64,
    /// Fields written by other tools; preserved on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionEntry {
    pub fn new(session_id: impl Into<String>, updated_at: u64) -> Self {
        Self {
            session_id: session_id.into(),
            model_override: None,
            provider_override: None,
            thinking_override: None,
            queue_override: None,
            aborted_last_run: false,
            session_file: None,
            updated_at,
            extra: serde_json::Map::new(),
        }
    }
}

/// Per-session queue settings; unset fields fall back to the global config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<QueueMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<DropPolicy>,
}

impl QueueOverride {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.debounce_ms.is_none() && self.cap.is_none() && self.drop.is_none()
    }

    /// Overlay the fields set in `other` on top of `self`.
    #[must_use]
    pub fn overlay(mut self, other: &Self) -> Self {
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.debounce_ms.is_some() {
            self.debounce_ms = other.debounce_ms;
        }
        if other.cap.is_some() {
            self.cap = other.cap;
        }
        if other.drop.is_some() {
            self.drop = other.drop;
        }
        self
    }
}

/// A partial update to a [`SessionEntry`].
///
/// For optional fields, `None` keeps the current value, `Some(None)` clears it
/// and `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub session_id: Option<String>,
    pub model_override: Option<Option<String>>,
    pub provider_override: Option<Option<String>>,
    pub thinking_override: Option<Option<ThinkLevel>>,
    pub queue_override: Option<Option<QueueOverride>>,
    pub aborted_last_run: Option<bool>,
    pub session_file: Option<Option<String>>,
}

impl SessionPatch {
    /// No field changes; merging it only refreshes `updatedAt`.
    pub fn touch() -> Self {
        Self::default()
    }

    pub fn model(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_override: Some(Some(provider.into())),
            model_override: Some(Some(model.into())),
            ..Self::default()
        }
    }

    pub fn thinking(level: ThinkLevel) -> Self {
        Self {
            thinking_override: Some(Some(level)),
            ..Self::default()
        }
    }

    /// Set the queue override; an empty override clears it.
    pub fn queue(queue: QueueOverride) -> Self {
        Self {
            queue_override: Some((!queue.is_empty()).then_some(queue)),
            ..Self::default()
        }
    }

    pub fn aborted(aborted: bool) -> Self {
        Self {
            aborted_last_run: Some(aborted),
            ..Self::default()
        }
    }

    /// Clear every override and the abort flag.
    pub fn reset_overrides() -> Self {
        Self {
            session_id: None,
            model_override: Some(None),
            provider_override: Some(None),
            thinking_override: Some(None),
            queue_override: Some(None),
            aborted_last_run: Some(false),
            session_file: None,
        }
    }

    pub(crate) fn apply(self, entry: &mut SessionEntry) {
        if let Some(session_id) = self.session_id {
            entry.session_id = session_id;
        }
        if let Some(model) = self.model_override {
            entry.model_override = model;
        }
        if let Some(provider) = self.provider_override {
            entry.provider_override = provider;
        }
        if let Some(thinking) = self.thinking_override {
            entry.thinking_override = thinking;
        }
        if let Some(queue) = self.queue_override {
            entry.queue_override = queue;
        }
        if let Some(aborted) = self.aborted_last_run {
            entry.aborted_last_run = aborted;
        }
        if let Some(file) = self.session_file {
            entry.session_file = file;
        }
    }
}
