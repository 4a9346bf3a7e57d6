use std::{path::PathBuf, time::Duration};

use {
    async_trait::async_trait,
    parley_common::{ReplyPayload, ThinkLevel},
};

/// Everything an agent run needs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub agent_id: String,
    pub session_id: String,
    pub session_key: String,
    pub prompt: String,
    pub provider: String,
    pub model: String,
    pub thinking: ThinkLevel,
    pub transcript_path: PathBuf,
    /// Sandbox workspace the run is confined to, when sandboxing applies.
    pub workspace_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub payloads: Vec<ReplyPayload>,
    pub meta: RunMeta,
}

impl RunResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payloads: vec![ReplyPayload::text(text)],
            meta: RunMeta::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunMeta {
    pub duration_ms: u64,
    /// The runner stopped early because it was asked to abort.
    pub aborted: bool,
}

/// The long-lived agent process behind each session.
///
/// `abort` and `queue_message` are best-effort and report whether they took
/// effect; `is_active` and `is_streaming` are cheap, non-blocking checks.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: RunRequest) -> anyhow::Result<RunResult>;

    async fn abort(&self, session_id: &str) -> bool;

    /// Inject a message into a run that is currently streaming.
    async fn queue_message(&self, session_id: &str, text: &str) -> bool;

    fn is_active(&self, session_id: &str) -> bool;

    fn is_streaming(&self, session_id: &str) -> bool;
}
