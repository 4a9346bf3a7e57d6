use std::path::{Path, PathBuf};

use {parley_common::TenantContext, parley_config::expand_home};

use crate::{entry::SessionEntry, key::normalize_agent_id};

pub const SESSIONS_FILE: &str = "sessions.json";

/// `<state>/[tenants/<tenant>/]agents/<agentId>/sessions`
pub fn sessions_dir(state_dir: &Path, agent_id: &str, tenant: &TenantContext) -> PathBuf {
    tenant
        .scope_dir(state_dir)
        .join("agents")
        .join(normalize_agent_id(agent_id))
        .join("sessions")
}

/// Resolve the store file for an agent.
///
/// A configured template (`{agentId}` and `~` expanded) applies to the default
/// tenant only; scoped tenants always use the state-dir layout.
pub fn resolve_store_path(
    template: Option<&str>,
    state_dir: &Path,
    agent_id: &str,
    tenant: &TenantContext,
) -> PathBuf {
    match template.map(str::trim).filter(|t| !t.is_empty()) {
        Some(template) if tenant.id().is_none() => {
            expand_home(&template.replace("{agentId}", &normalize_agent_id(agent_id)))
        },
        _ => sessions_dir(state_dir, agent_id, tenant).join(SESSIONS_FILE),
    }
}

/// Transcript file for a session: the entry's `sessionFile` when set
/// (relative paths resolve against the store's directory), else
/// `<sessionId>.jsonl` next to the store.
pub fn resolve_transcript_path(store_path: &Path, entry: &SessionEntry) -> PathBuf {
    let dir = store_path.parent().unwrap_or_else(|| Path::new("."));
    match entry
        .session_file
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
    {
        Some(file) => {
            let file = expand_home(file);
            if file.is_absolute() {
                file
            } else {
                dir.join(file)
            }
        },
        None => dir.join(format!("{}.jsonl", entry.session_id)),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let state = Path::new("/state");
        assert_eq!(
            resolve_store_path(None, state, "main", &TenantContext::none()),
            PathBuf::from("/state/agents/main/sessions/sessions.json")
        );
        assert_eq!(
            resolve_store_path(None, state, "Work", &TenantContext::from_raw(Some("Acme"))),
            PathBuf::from("/state/tenants/acme/agents/work/sessions/sessions.json")
        );
    }

    #[test]
    fn template_expands_agent_id() {
        let state = Path::new("/state");
        assert_eq!(
            resolve_store_path(
                Some("/data/{agentId}/store.json"),
                state,
                "ops",
                &TenantContext::none()
            ),
            PathBuf::from("/data/ops/store.json")
        );
        assert_eq!(
            resolve_store_path(
                Some("/data/{agentId}/store.json"),
                state,
                "ops",
                &TenantContext::from_raw(Some("acme"))
            ),
            PathBuf::from("/state/tenants/acme/agents/ops/sessions/sessions.json")
        );
    }

    #[test]
    fn transcript_path_honours_session_file() {
        let store = Path::new("/state/agents/main/sessions/sessions.json");
        let mut entry = SessionEntry::new("sess-1", 0);
        assert_eq!(
            resolve_transcript_path(store, &entry),
            PathBuf::from("/state/agents/main/sessions/sess-1.jsonl")
        );

        entry.session_file = Some("custom/t.jsonl".into());
        assert_eq!(
            resolve_transcript_path(store, &entry),
            PathBuf::from("/state/agents/main/sessions/custom/t.jsonl")
        );

        entry.session_file = Some("/abs/t.jsonl".into());
        assert_eq!(resolve_transcript_path(store, &entry), PathBuf::from("/abs/t.jsonl"));

        entry.session_file = Some("  ".into());
        assert_eq!(
            resolve_transcript_path(store, &entry),
            PathBuf::from("/state/agents/main/sessions/sess-1.jsonl")
        );
    }
}
