use {
    parley_common::{ChatType, InboundContext, TenantContext},
    parley_config::{DmScope, ParleyConfig, SessionScope},
    parley_sessions::{SessionKey, key::normalize_agent_id},
    tracing::debug,
};

/// Resolved route: which agent handles this message and the session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub agent_id: String,
    pub session_key: SessionKey,
    pub tenant: TenantContext,
    /// Whether the key is the agent's main session.
    pub is_main: bool,
}

/// Resolve the session for an inbound message.
///
/// Precedence:
/// 1. authorized native command target (`command_target_session_key`)
/// 2. explicit adapter-supplied `session_key`
/// 3. the configured scope function
pub fn resolve_route(ctx: &InboundContext, config: &ParleyConfig) -> ResolvedRoute {
    let default_agent = normalize_agent_id(&config.agents.default_id);
    let main_key = config.session.main_key.trim();

    let session_key = if let Some(target) = ctx.native_target() {
        debug!(target, "native command targets explicit session");
        SessionKey::new(target)
    } else if let Some(explicit) = ctx
        .session_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        SessionKey::new(explicit)
    } else {
        scoped_key(ctx, config, &default_agent)
    };

    let agent_id = session_key
        .agent_id()
        .map(str::to_string)
        .unwrap_or(default_agent);
    let is_main = session_key.is_main(main_key);

    ResolvedRoute {
        agent_id,
        session_key,
        tenant: ctx.tenant(),
        is_main,
    }
}

fn scoped_key(ctx: &InboundContext, config: &ParleyConfig, agent_id: &str) -> SessionKey {
    let main_key = config.session.main_key.as_str();
    if config.session.scope == SessionScope::Main {
        return SessionKey::main(agent_id, main_key);
    }

    if let Some((channel, group_id)) = group_target(ctx) {
        return SessionKey::group(agent_id, &channel, &group_id);
    }

    let peer = peer_id(ctx);
    match config.session.dm_scope {
        DmScope::Main => SessionKey::main(agent_id, main_key),
        _ if peer.is_empty() => SessionKey::main(agent_id, main_key),
        DmScope::PerPeer => SessionKey::direct(agent_id, None, &peer),
        DmScope::PerChannelPeer => {
            SessionKey::direct(agent_id, Some(ctx.channel().unwrap_or("unknown")), &peer)
        },
    }
}

fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// `(channel, group id)` when the message comes from a group or channel chat.
///
/// Recognized sender shapes: `group:<channel>:<id>`, `group:<id>`,
/// `<channel>:group:<id>`, `<channel>:channel:<id>`, or any sender when the
/// adapter marked the chat as group/channel.
fn group_target(ctx: &InboundContext) -> Option<(String, String)> {
    let from = ctx.from.trim();
    let provider = ctx.channel();
    let fallback_channel = provider.unwrap_or("unknown");

    if let Some(rest) = strip_prefix_ci(from, "group:") {
        if let Some((channel, id)) = rest.split_once(':')
            && !channel.is_empty()
            && !id.is_empty()
            && provider.is_none_or(|p| p.eq_ignore_ascii_case(channel))
        {
            return Some((channel.to_string(), id.to_string()));
        }
        return Some((fallback_channel.to_string(), rest.to_string()));
    }

    for marker in [":group:", ":channel:"] {
        if let Some((channel, id)) = from.split_once(marker)
            && !channel.is_empty()
            && !id.is_empty()
        {
            return Some((channel.to_string(), id.to_string()));
        }
    }

    if ctx.chat_type != ChatType::Direct {
        return Some((fallback_channel.to_string(), strip_channel(from, provider).to_string()));
    }
    None
}

fn strip_channel<'a>(from: &'a str, channel: Option<&str>) -> &'a str {
    channel
        .and_then(|c| strip_prefix_ci(from, &format!("{c}:")))
        .unwrap_or(from)
}

fn peer_id(ctx: &InboundContext) -> String {
    strip_channel(ctx.from.trim(), ctx.channel()).trim().to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        parley_common::CommandSource,
        rstest::rstest,
    };

    fn ctx(from: &str, provider: Option<&str>) -> InboundContext {
        let mut ctx = InboundContext::new("hello", from);
        ctx.provider = provider.map(str::to_string);
        ctx
    }

    #[test]
    fn direct_chats_collapse_to_main_key() {
        let route = resolve_route(&ctx("+1555", Some("whatsapp")), &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), "agent:main:main");
        assert_eq!(route.agent_id, "main");
        assert!(route.is_main);
    }

    #[rstest]
    #[case("group:whatsapp:demo", Some("whatsapp"), "agent:main:whatsapp:group:demo")]
    #[case("group:123", Some("telegram"), "agent:main:telegram:group:123")]
    #[case("telegram:group:123", None, "agent:main:telegram:group:123")]
    #[case("slack:channel:C01", Some("slack"), "agent:main:slack:group:C01")]
    fn group_senders_get_group_keys(
        #[case] from: &str,
        #[case] provider: Option<&str>,
        #[case] expected: &str,
    ) {
        let route = resolve_route(&ctx(from, provider), &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), expected);
        assert!(!route.is_main);
    }

    #[test]
    fn chat_type_marks_group() {
        let mut c = ctx("telegram:-100200", Some("telegram"));
        c.chat_type = ChatType::Group;
        let route = resolve_route(&c, &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), "agent:main:telegram:group:-100200");
    }

    #[test]
    fn main_scope_ignores_groups() {
        let mut config = ParleyConfig::default();
        config.session.scope = SessionScope::Main;
        config.session.main_key = "home".into();
        let route = resolve_route(&ctx("group:whatsapp:demo", Some("whatsapp")), &config);
        assert_eq!(route.session_key.as_str(), "agent:main:home");
        assert!(route.is_main);
    }

    #[test]
    fn dm_scopes() {
        let mut config = ParleyConfig::default();
        config.session.dm_scope = DmScope::PerPeer;
        let route = resolve_route(&ctx("telegram:111", Some("telegram")), &config);
        assert_eq!(route.session_key.as_str(), "agent:main:direct:111");

        config.session.dm_scope = DmScope::PerChannelPeer;
        let route = resolve_route(&ctx("telegram:111", Some("telegram")), &config);
        assert_eq!(route.session_key.as_str(), "agent:main:telegram:direct:111");
    }

    #[test]
    fn explicit_session_key_is_used_verbatim() {
        let mut c = ctx("telegram:111", Some("telegram"));
        c.session_key = Some("telegram:slash:111".into());
        let route = resolve_route(&c, &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), "telegram:slash:111");
        assert_eq!(route.agent_id, "main");
    }

    #[test]
    fn native_target_wins_over_explicit_key() {
        let mut c = ctx("telegram:111", Some("telegram"));
        c.session_key = Some("telegram:slash:111".into());
        c.command_source = CommandSource::Native;
        c.command_authorized = true;
        c.command_target_session_key = Some("agent:work:main".into());
        let route = resolve_route(&c, &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), "agent:work:main");
        assert_eq!(route.agent_id, "work");

        c.command_authorized = false;
        let route = resolve_route(&c, &ParleyConfig::default());
        assert_eq!(route.session_key.as_str(), "telegram:slash:111");
    }

    #[test]
    fn default_agent_comes_from_config() {
        let mut config = ParleyConfig::default();
        config.agents.default_id = "Ops".into();
        let route = resolve_route(&ctx("+1", None), &config);
        assert_eq!(route.session_key.as_str(), "agent:ops:main");
        assert_eq!(route.agent_id, "ops");
    }

    #[test]
    fn tenant_is_carried_on_route() {
        let mut c = ctx("+1", None);
        c.tenant_id = Some(" Acme ".into());
        let route = resolve_route(&c, &ParleyConfig::default());
        assert_eq!(route.tenant.id(), Some("acme"));
    }
}
