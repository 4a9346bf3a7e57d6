//! Directive handlers. Each returns the reply text; validation problems are
//! replies too, and only store failures surface as errors.

mod help;
mod model;
mod queue;
mod status;
mod think;

use {
    parley_agents::{ModelCatalog, ModelRef, UsageProvider},
    parley_common::ThinkLevel,
    parley_config::{ParleyConfig, schema::DEFAULT_MODEL},
    parley_routing::ResolvedRoute,
    parley_sessions::{SessionEntry, SessionPatch, SessionStore},
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use parley_metrics::{auto_reply as auto_reply_metrics, counter, labels};

use crate::{
    Result,
    directives::Directive,
    queue::{LaneManager, QueueSettings},
};

pub(crate) use status::render_status;

pub const ABORTED_REPLY: &str = "⚙️ Agent was aborted.";

/// Everything a directive may read or touch.
pub(crate) struct DirectiveContext<'a> {
    pub config: &'a ParleyConfig,
    pub store: &'a SessionStore,
    pub route: &'a ResolvedRoute,
    /// Current record of the target session; `None` when it does not exist yet.
    pub entry: Option<SessionEntry>,
    pub channel: Option<&'a str>,
    pub catalog: &'a dyn ModelCatalog,
    pub usage: &'a dyn UsageProvider,
    pub lanes: &'a LaneManager,
}

impl DirectiveContext<'_> {
    pub fn effective_model(&self) -> EffectiveModel {
        effective_model(self.config, self.entry.as_ref())
    }

    pub fn thinking(&self) -> ThinkLevel {
        effective_thinking(self.config, self.entry.as_ref())
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings::resolve(
            &self.config.messages.queue,
            self.channel,
            self.entry.as_ref().and_then(|e| e.queue_override.as_ref()),
        )
    }

    async fn patch(&self, patch: SessionPatch) -> Result<SessionEntry> {
        Ok(self.store.update(&self.route.session_key, patch).await?)
    }
}

/// Model a run would use, and whether that is the configured default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EffectiveModel {
    pub model: ModelRef,
    pub is_default: bool,
}

pub(crate) fn default_model(config: &ParleyConfig) -> ModelRef {
    ModelRef::parse(config.agents.defaults.model.primary())
        .or_else(|| ModelRef::parse(DEFAULT_MODEL))
        .unwrap_or_else(|| ModelRef::new("anthropic", "claude-opus-4-5"))
}

pub(crate) fn effective_model(config: &ParleyConfig, entry: Option<&SessionEntry>) -> EffectiveModel {
    let default = default_model(config);
    let Some(model) = entry.and_then(|e| e.model_override.as_deref()) else {
        return EffectiveModel {
            model: default,
            is_default: true,
        };
    };
    let provider = entry
        .and_then(|e| e.provider_override.as_deref())
        .unwrap_or(&default.provider);
    let model = ModelRef::new(provider, model);
    EffectiveModel {
        is_default: model == default,
        model,
    }
}

pub(crate) fn effective_thinking(config: &ParleyConfig, entry: Option<&SessionEntry>) -> ThinkLevel {
    entry
        .and_then(|e| e.thinking_override)
        .unwrap_or(config.agents.defaults.thinking_default)
}

/// Apply `directive` to the target session and produce the reply text.
pub(crate) async fn handle(directive: Directive, cx: &DirectiveContext<'_>) -> Result<String> {
    #[cfg(feature = "metrics")]
    counter!(auto_reply_metrics::DIRECTIVES_TOTAL, labels::DIRECTIVE => directive.name())
        .increment(1);

    info!(
        session_key = %cx.route.session_key,
        directive = directive.name(),
        "handling directive"
    );

    match directive {
        Directive::Help => Ok(help::render(cx.config)),
        Directive::Model(arg) => model::handle(arg, cx).await,
        Directive::Think(level) => think::handle(level.as_deref(), cx).await,
        Directive::Queue(tokens) => queue::handle(&tokens, cx).await,
        Directive::Stop => stop(cx).await,
        Directive::Status => Ok(render_status(cx).await),
    }
}

/// Count a rejected directive argument.
fn rejected(directive: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(auto_reply_metrics::DIRECTIVE_ERRORS_TOTAL, labels::DIRECTIVE => directive)
        .increment(1);
    debug!(directive, "directive rejected");
}

async fn stop(cx: &DirectiveContext<'_>) -> Result<String> {
    let session_id = cx.entry.as_ref().map(|e| e.session_id.as_str());
    let was_running = cx
        .lanes
        .abort(cx.route.session_key.as_str(), session_id)
        .await;
    // No entry means nothing ever ran here; there is no run to flag.
    if cx.entry.is_some() {
        cx.patch(SessionPatch::aborted(true)).await?;
    }
    info!(session_key = %cx.route.session_key, was_running, "session aborted");
    Ok(ABORTED_REPLY.to_string())
}
