//! Inbound message → reply set.
//!
//! Flow: resolve session → parse directive → apply the directive against
//! the session store → stage media and hand any remaining text to the
//! session's lane, then turn the lane outcome into replies.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    parley_agents::{AgentRunner, ModelCatalog, RunRequest, UsageProvider},
    parley_common::{InboundContext, ReplyPayload},
    parley_config::ParleyConfig,
    parley_media::{MediaRef, SandboxManager, prepend_media_note, rewrite_media_paths},
    parley_routing::{ResolvedRoute, resolve_route},
    parley_sessions::{
        SessionPatch, SessionStore,
        paths::{resolve_store_path, resolve_transcript_path},
    },
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{auto_reply as auto_reply_metrics, counter, histogram};

use crate::{
    Result,
    commands::{self, DirectiveContext, effective_model, effective_thinking, render_status},
    directives::{Directive, ParsedMessage, parse_message},
    queue::{LaneManager, LaneOutcome, QueueSettings},
};

pub const ABORTED_NOTE: &str = "Note: The previous agent run was aborted by the user. Resume carefully or ask for clarification.";

/// Receives replies that are sent ahead of the primary reply set, such as
/// a `/status` embedded in a longer message.
#[async_trait]
pub trait BlockReplySink: Send + Sync {
    async fn send(&self, payload: ReplyPayload);
}

#[derive(Clone, Default)]
pub struct ReplyOptions {
    /// Without a sink, block replies are returned at the front of the reply set.
    pub block_reply: Option<Arc<dyn BlockReplySink>>,
}

pub struct ReplyDispatcher {
    config: ParleyConfig,
    state_dir: PathBuf,
    catalog: Arc<dyn ModelCatalog>,
    usage: Arc<dyn UsageProvider>,
    lanes: Arc<LaneManager>,
    sandbox: SandboxManager,
    stores: Mutex<HashMap<PathBuf, Arc<SessionStore>>>,
}

impl ReplyDispatcher {
    pub fn new(
        config: ParleyConfig,
        state_dir: PathBuf,
        runner: Arc<dyn AgentRunner>,
        catalog: Arc<dyn ModelCatalog>,
        usage: Arc<dyn UsageProvider>,
    ) -> Self {
        let sandbox = SandboxManager::from_config(&config, &state_dir);
        Self {
            config,
            state_dir,
            catalog,
            usage,
            lanes: Arc::new(LaneManager::new(runner)),
            sandbox,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    pub fn lanes(&self) -> &Arc<LaneManager> {
        &self.lanes
    }

    /// Store handle for the route's (tenant, agent), shared across calls so
    /// writes through it are serialized.
    pub fn store_for(&self, route: &ResolvedRoute) -> Arc<SessionStore> {
        let path = resolve_store_path(
            self.config.session.store.as_deref(),
            &self.state_dir,
            &route.agent_id,
            &route.tenant,
        );
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            stores
                .entry(path.clone())
                .or_insert_with(|| Arc::new(SessionStore::new(path))),
        )
    }

    /// Process one inbound message. Returns the primary reply set, which is
    /// empty when the message was queued into another run or dropped.
    pub async fn get_reply(
        &self,
        ctx: &InboundContext,
        opts: &ReplyOptions,
    ) -> Result<Vec<ReplyPayload>> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        #[cfg(feature = "metrics")]
        counter!(auto_reply_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

        let route = resolve_route(ctx, &self.config);
        let store = self.store_for(&route);
        let aliases: Vec<&str> = self.config.agents.defaults.aliases().collect();
        let parsed = parse_message(&ctx.body, &aliases);

        info!(
            session_key = %route.session_key,
            from = %ctx.from,
            channel = ctx.channel().unwrap_or("unknown"),
            directive = parsed.directive.as_ref().map(Directive::name),
            inline_status = parsed.inline_status,
            media = ctx.media.len(),
            "incoming message"
        );

        let replies = self.dispatch(ctx, opts, &route, &store, parsed).await;

        #[cfg(feature = "metrics")]
        histogram!(auto_reply_metrics::PROCESSING_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        replies
    }

    async fn dispatch(
        &self,
        ctx: &InboundContext,
        opts: &ReplyOptions,
        route: &ResolvedRoute,
        store: &SessionStore,
        parsed: ParsedMessage,
    ) -> Result<Vec<ReplyPayload>> {
        let mut replies = Vec::new();
        if let Some(directive) = parsed.directive {
            let cx = self.directive_context(ctx, route, store).await?;
            let text = commands::handle(directive, &cx).await?;
            replies.push(reply_to(ctx, ReplyPayload::text(text)));
        } else if parsed.inline_status {
            let cx = self.directive_context(ctx, route, store).await?;
            let status = reply_to(ctx, ReplyPayload::text(render_status(&cx).await));
            match &opts.block_reply {
                Some(sink) => sink.send(status).await,
                None => replies.push(status),
            }
        }

        if parsed.body.trim().is_empty() && ctx.media.is_empty() {
            debug!(session_key = %route.session_key, "nothing to send to the agent");
            return Ok(replies);
        }

        replies.extend(self.run_agent(ctx, route, store, &parsed.body).await?);
        Ok(replies)
    }

    async fn directive_context<'a>(
        &'a self,
        ctx: &'a InboundContext,
        route: &'a ResolvedRoute,
        store: &'a SessionStore,
    ) -> Result<DirectiveContext<'a>> {
        Ok(DirectiveContext {
            config: &self.config,
            store,
            route,
            entry: store.get(&route.session_key).await?,
            channel: ctx.channel(),
            catalog: self.catalog.as_ref(),
            usage: self.usage.as_ref(),
            lanes: self.lanes.as_ref(),
        })
    }

    async fn run_agent(
        &self,
        ctx: &InboundContext,
        route: &ResolvedRoute,
        store: &SessionStore,
        body: &str,
    ) -> Result<Vec<ReplyPayload>> {
        let key = &route.session_key;
        let entry = store.get_or_create(key).await?;
        let model = effective_model(&self.config, Some(&entry)).model;
        let settings = QueueSettings::resolve(
            &self.config.messages.queue,
            ctx.channel(),
            entry.queue_override.as_ref(),
        );

        let workspace_dir = if self.sandbox.applies_to(route.is_main) {
            Some(
                self.sandbox
                    .ensure_workspace(&route.tenant, key.as_str())
                    .await?,
            )
        } else {
            None
        };

        let mut prompt = body.trim().to_string();
        if !ctx.media.is_empty() {
            prompt = match &workspace_dir {
                Some(workspace) => {
                    let staged = self.sandbox.stage_inbound(workspace, &ctx.media).await?;
                    let refs: Vec<MediaRef> = staged.iter().map(MediaRef::from).collect();
                    rewrite_media_paths(&prepend_media_note(&prompt, &refs), &staged)
                },
                None => {
                    let refs: Vec<MediaRef> = ctx.media.iter().map(MediaRef::from).collect();
                    prepend_media_note(&prompt, &refs)
                },
            };
        }
        if entry.aborted_last_run {
            prompt = format!("{ABORTED_NOTE}\n\n{prompt}");
            // Cleared before the run starts so a /stop during it is kept.
            store.update(key, SessionPatch::aborted(false)).await?;
        }

        let timeout_secs = self.config.agents.defaults.timeout_secs;
        let request = RunRequest {
            agent_id: route.agent_id.clone(),
            session_id: entry.session_id.clone(),
            session_key: key.to_string(),
            prompt,
            provider: model.provider,
            model: model.model,
            thinking: effective_thinking(&self.config, Some(&entry)),
            transcript_path: resolve_transcript_path(store.path(), &entry),
            workspace_dir,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        };

        let outcome = self.lanes.submit(key.as_str(), request, settings).await;
        let replies = match outcome {
            LaneOutcome::Completed(result) => result
                .payloads
                .into_iter()
                .filter(|p| !p.text.trim().is_empty())
                .map(|p| reply_to(ctx, p))
                .collect(),
            LaneOutcome::Failed(error) => vec![reply_to(
                ctx,
                ReplyPayload::error(format!("⚠️ Agent failed before reply: {error}")),
            )],
            LaneOutcome::TimedOut(limit) => vec![reply_to(
                ctx,
                ReplyPayload::error(format!(
                    "⚠️ Agent run timed out after {}s.",
                    limit.as_secs()
                )),
            )],
            LaneOutcome::Dropped => {
                warn!(session_key = %key, "message dropped by queue cap");
                Vec::new()
            },
            outcome @ (LaneOutcome::Steered
            | LaneOutcome::Merged
            | LaneOutcome::Superseded
            | LaneOutcome::Aborted) => {
                debug!(session_key = %key, ?outcome, "no reply for this message");
                Vec::new()
            },
        };
        Ok(replies)
    }
}

fn reply_to(ctx: &InboundContext, mut payload: ReplyPayload) -> ReplyPayload {
    if payload.reply_to_id.is_none() {
        payload.reply_to_id = ctx.message_id.clone();
    }
    payload
}
