//! Hand-written collaborators shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    parley_agents::{
        AgentRunner, ModelCatalog, ModelCatalogEntry, ProviderUsage, RunRequest, RunResult,
        StaticCatalog, UsageProvider, UsageSummary, UsageWindow,
    },
    parley_auto_reply::{BlockReplySink, ReplyDispatcher},
    parley_common::{InboundContext, ReplyPayload, TenantContext},
    parley_config::ParleyConfig,
    parley_sessions::{SessionEntry, SessionKey, SessionStore, paths::resolve_store_path},
    tempfile::TempDir,
};

/// Agent runner that records every call.
pub struct MockRunner {
    pub runs: Mutex<Vec<RunRequest>>,
    pub aborted: Mutex<Vec<String>>,
    pub steered: Mutex<Vec<String>>,
    pub streaming: AtomicBool,
    pub active: AtomicBool,
    pub accept_steer: AtomicBool,
    pub delay: Duration,
    pub failure: Option<String>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
            steered: Mutex::new(Vec::new()),
            streaming: AtomicBool::new(false),
            active: AtomicBool::new(false),
            accept_steer: AtomicBool::new(false),
            delay: Duration::ZERO,
            failure: None,
        }
    }
}

impl MockRunner {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn last_run(&self) -> RunRequest {
        self.runs.lock().unwrap().last().cloned().unwrap()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    async fn run(&self, request: RunRequest) -> anyhow::Result<RunResult> {
        let prompt = request.prompt.clone();
        self.runs.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(RunResult::text(format!("echo: {prompt}"))),
        }
    }

    async fn abort(&self, session_id: &str) -> bool {
        self.aborted.lock().unwrap().push(session_id.to_string());
        true
    }

    async fn queue_message(&self, _session_id: &str, text: &str) -> bool {
        if !self.accept_steer.load(Ordering::SeqCst) {
            return false;
        }
        self.steered.lock().unwrap().push(text.to_string());
        true
    }

    fn is_active(&self, _session_id: &str) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn is_streaming(&self, _session_id: &str) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}

/// Usage provider that reports 80% left for whatever family it is asked about.
#[derive(Default)]
pub struct MockUsage {
    pub requests: Mutex<Vec<Vec<String>>>,
    pub fail: bool,
}

#[async_trait]
impl UsageProvider for MockUsage {
    async fn load(&self, providers: &[String]) -> anyhow::Result<UsageSummary> {
        self.requests.lock().unwrap().push(providers.to_vec());
        if self.fail {
            anyhow::bail!("usage endpoint unavailable");
        }
        Ok(UsageSummary {
            updated_at: 0,
            providers: providers
                .iter()
                .map(|p| ProviderUsage {
                    provider: p.clone(),
                    display_name: p.clone(),
                    windows: vec![UsageWindow {
                        label: "5h".into(),
                        used_percent: 20.0,
                    }],
                    error: None,
                })
                .collect(),
        })
    }
}

pub struct FailingCatalog;

#[async_trait]
impl ModelCatalog for FailingCatalog {
    async fn load(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        anyhow::bail!("catalog offline")
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub payloads: Mutex<Vec<ReplyPayload>>,
}

#[async_trait]
impl BlockReplySink for RecordingSink {
    async fn send(&self, payload: ReplyPayload) {
        self.payloads.lock().unwrap().push(payload);
    }
}

pub fn catalog_entries() -> Vec<ModelCatalogEntry> {
    vec![
        ModelCatalogEntry::new("anthropic", "claude-opus-4-5"),
        ModelCatalogEntry::new("openrouter", "anthropic/claude-opus-4-5"),
        ModelCatalogEntry::new("openai", "gpt-4.1-mini"),
        ModelCatalogEntry::new("openai", "gpt-5.2"),
        ModelCatalogEntry::new("openai-codex", "gpt-5.2"),
        ModelCatalogEntry::new("minimax", "MiniMax-M2.1"),
    ]
}

/// A dispatcher over a fresh state dir.
pub struct Harness {
    pub dir: TempDir,
    pub runner: Arc<MockRunner>,
    pub usage: Arc<MockUsage>,
    pub dispatcher: ReplyDispatcher,
}

impl Harness {
    pub fn new(config: ParleyConfig) -> Self {
        Self::with_runner(config, MockRunner::default())
    }

    pub fn with_runner(config: ParleyConfig, runner: MockRunner) -> Self {
        Self::build(
            config,
            runner,
            MockUsage::default(),
            Arc::new(StaticCatalog::new(catalog_entries())),
        )
    }

    pub fn build(
        config: ParleyConfig,
        runner: MockRunner,
        usage: MockUsage,
        catalog: Arc<dyn ModelCatalog>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(runner);
        let usage = Arc::new(usage);
        let dispatcher = ReplyDispatcher::new(
            config,
            dir.path().to_path_buf(),
            runner.clone(),
            catalog,
            usage.clone(),
        );
        Self {
            dir,
            runner,
            usage,
            dispatcher,
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Store of the default agent for the default tenant.
    pub fn store(&self) -> SessionStore {
        SessionStore::new(resolve_store_path(
            self.dispatcher.config().session.store.as_deref(),
            self.dir.path(),
            "main",
            &TenantContext::none(),
        ))
    }

    pub async fn entry(&self, key: &str) -> Option<SessionEntry> {
        self.store().get(&SessionKey::new(key)).await.unwrap()
    }

    /// Send `body` as a direct message and return the reply texts.
    pub async fn send(&self, body: &str) -> Vec<String> {
        self.send_ctx(&dm(body)).await
    }

    pub async fn send_ctx(&self, ctx: &InboundContext) -> Vec<String> {
        self.dispatcher
            .get_reply(ctx, &Default::default())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect()
    }
}

pub const MAIN_KEY: &str = "agent:main:main";

/// Direct message from a Telegram user; resolves to the main session.
pub fn dm(body: &str) -> InboundContext {
    let mut ctx = InboundContext::new(body, "telegram:111");
    ctx.provider = Some("telegram".into());
    ctx
}
