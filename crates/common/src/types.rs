use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::TenantContext;

/// Kind of conversation a message arrived in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    Direct,
    Group,
    Channel,
}

/// How a command reached us: typed into the chat, or via a platform-native
/// command surface (slash-command menus and the like).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    #[default]
    Text,
    Native,
}

/// An attachment that arrived with an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMedia {
    /// Absolute path of the downloaded file on the gateway host.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Source URL or alternate reference the adapter may have put in the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Normalized inbound message context, as produced by a channel adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundContext {
    pub body: String,
    /// Sender identity, e.g. `telegram:111`, `+15551234567` or `group:whatsapp:demo`.
    pub from: String,
    pub to: Option<String>,
    /// Channel provider (`telegram`, `whatsapp`, ...).
    pub provider: Option<String>,
    pub surface: Option<String>,
    pub chat_type: ChatType,
    /// Explicit session key chosen by the adapter.
    pub session_key: Option<String>,
    pub command_source: CommandSource,
    pub command_authorized: bool,
    /// Session a native command should act on instead of the derived one.
    pub command_target_session_key: Option<String>,
    pub tenant_id: Option<String>,
    pub message_id: Option<String>,
    pub media: Vec<InboundMedia>,
}

impl InboundContext {
    #[must_use]
    pub fn new(body: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            from: from.into(),
            ..Self::default()
        }
    }

    /// Channel name used in session keys; falls back to the surface.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.provider
            .as_deref()
            .or(self.surface.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Target session of an authorized native command, if any.
    #[must_use]
    pub fn native_target(&self) -> Option<&str> {
        if self.command_source != CommandSource::Native || !self.command_authorized {
            return None;
        }
        self.command_target_session_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn tenant(&self) -> TenantContext {
        TenantContext::from_raw(self.tenant_id.as_deref())
    }
}

/// A single outgoing reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Set for replies that report a failure rather than agent output.
    #[serde(default)]
    pub is_error: bool,
}

impl ReplyPayload {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
            ..Self::default()
        }
    }
}
