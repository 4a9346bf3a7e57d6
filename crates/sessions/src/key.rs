use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_AGENT_ID: &str = "main";

/// Identifier of one logical conversation, e.g. `agent:main:telegram:group:123`.
///
/// Keys built by the resolver follow `agent:<agentId>:<rest>`; keys supplied
/// verbatim by channel adapters may use any shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// `agent:<agentId>:<mainKey>`
    pub fn main(agent_id: &str, main_key: &str) -> Self {
        Self(format!("agent:{}:{}", normalize_agent_id(agent_id), main_key.trim()))
    }

    /// `agent:<agentId>:<channel>:group:<id>`
    pub fn group(agent_id: &str, channel: &str, group_id: &str) -> Self {
        Self(format!(
            "agent:{}:{}:group:{}",
            normalize_agent_id(agent_id),
            channel.trim().to_ascii_lowercase(),
            group_id.trim()
        ))
    }

    /// `agent:<agentId>:direct:<peer>` or `agent:<agentId>:<channel>:direct:<peer>`
    pub fn direct(agent_id: &str, channel: Option<&str>, peer: &str) -> Self {
        let agent = normalize_agent_id(agent_id);
        let peer = peer.trim();
        match channel.map(str::trim).filter(|c| !c.is_empty()) {
            Some(channel) => Self(format!(
                "agent:{agent}:{}:direct:{peer}",
                channel.to_ascii_lowercase()
            )),
            None => Self(format!("agent:{agent}:direct:{peer}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Agent id encoded in an `agent:<id>:...` key.
    pub fn agent_id(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("agent:")?;
        let (id, _) = rest.split_once(':')?;
        (!id.is_empty()).then_some(id)
    }

    /// Agent id, or [`DEFAULT_AGENT_ID`] for keys that do not encode one.
    pub fn agent_id_or_default(&self) -> &str {
        self.agent_id().unwrap_or(DEFAULT_AGENT_ID)
    }

    /// Whether this is the agent's main session for the given main key.
    pub fn is_main(&self, main_key: &str) -> bool {
        self.agent_id()
            .and_then(|id| self.0.strip_prefix(&format!("agent:{id}:")))
            .is_some_and(|rest| rest == main_key.trim())
    }

    pub fn is_group(&self) -> bool {
        self.0.contains(":group:") || self.0.contains(":channel:")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Lowercase an agent id and replace characters outside `[a-z0-9_-]` with `-`.
pub fn normalize_agent_id(raw: &str) -> String {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if normalized.is_empty() {
        DEFAULT_AGENT_ID.to_string()
    } else {
        normalized
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_canonical_shapes() {
        assert_eq!(SessionKey::main("main", "main").as_str(), "agent:main:main");
        assert_eq!(
            SessionKey::group("main", "Telegram", "123").as_str(),
            "agent:main:telegram:group:123"
        );
        assert_eq!(
            SessionKey::direct("ops", None, "+1555").as_str(),
            "agent:ops:direct:+1555"
        );
        assert_eq!(
            SessionKey::direct("ops", Some("whatsapp"), "+1555").as_str(),
            "agent:ops:whatsapp:direct:+1555"
        );
    }

    #[test]
    fn parses_agent_id() {
        assert_eq!(SessionKey::new("agent:work:main").agent_id(), Some("work"));
        assert_eq!(SessionKey::new("telegram:slash:111").agent_id(), None);
        assert_eq!(
            SessionKey::new("telegram:slash:111").agent_id_or_default(),
            "main"
        );
        assert_eq!(SessionKey::new("agent::main").agent_id(), None);
    }

    #[test]
    fn detects_main_and_group() {
        let main = SessionKey::main("main", "main");
        assert!(main.is_main("main"));
        assert!(!main.is_group());

        let group = SessionKey::group("main", "telegram", "9");
        assert!(!group.is_main("main"));
        assert!(group.is_group());
    }

    #[test]
    fn normalizes_agent_ids() {
        assert_eq!(normalize_agent_id(" Work Bot "), "work-bot");
        assert_eq!(normalize_agent_id(""), "main");
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = SessionKey::new(" agent:main:main ");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"agent:main:main\"");
    }
}
