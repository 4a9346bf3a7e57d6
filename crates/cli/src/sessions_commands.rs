use std::path::{Path, PathBuf};

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    parley_common::TenantContext,
    parley_config::ParleyConfig,
    parley_sessions::{SessionKey, SessionPatch, SessionStore, paths::resolve_store_path},
};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List sessions for an agent, most recent first.
    List {
        /// Agent id (defaults to the configured default agent).
        #[arg(long)]
        agent: Option<String>,
    },
    /// Print one session entry as JSON.
    Show { key: String },
    /// Clear model, thinking and queue overrides on a session.
    Reset { key: String },
}

pub async fn handle_sessions(
    action: SessionAction,
    config: &ParleyConfig,
    state_dir: &Path,
    tenant: &TenantContext,
) -> Result<()> {
    match action {
        SessionAction::List { agent } => {
            let agent = agent.as_deref().unwrap_or(&config.agents.default_id);
            let store = SessionStore::new(store_path(config, state_dir, agent, tenant));
            let entries = store.list().await?;
            if entries.is_empty() {
                println!("No sessions in {}.", store.path().display());
                return Ok(());
            }
            println!("{:<48} {:<38} MODEL", "KEY", "SESSION ID");
            for (key, entry) in &entries {
                let model = match (&entry.provider_override, &entry.model_override) {
                    (Some(provider), Some(model)) => format!("{provider}/{model}"),
                    _ => "-".into(),
                };
                println!("{:<48} {:<38} {model}", key, entry.session_id);
            }
        },
        SessionAction::Show { key } => {
            let (store, key) = open(config, state_dir, tenant, &key);
            let Some(entry) = store.get(&key).await? else {
                bail!("no session {key} in {}", store.path().display());
            };
            println!("{}", serde_json::to_string_pretty(&entry)?);
        },
        SessionAction::Reset { key } => {
            let (store, key) = open(config, state_dir, tenant, &key);
            if store.get(&key).await?.is_none() {
                bail!("no session {key} in {}", store.path().display());
            }
            store.update(&key, SessionPatch::reset_overrides()).await?;
            println!("Reset overrides on {key}.");
        },
    }
    Ok(())
}

pub fn store_path(
    config: &ParleyConfig,
    state_dir: &Path,
    agent: &str,
    tenant: &TenantContext,
) -> PathBuf {
    resolve_store_path(config.session.store.as_deref(), state_dir, agent, tenant)
}

fn open(
    config: &ParleyConfig,
    state_dir: &Path,
    tenant: &TenantContext,
    raw: &str,
) -> (SessionStore, SessionKey) {
    let key = SessionKey::new(raw.trim());
    let agent = key.agent_id().unwrap_or(&config.agents.default_id).to_string();
    let store = SessionStore::new(store_path(config, state_dir, &agent, tenant));
    (store, key)
}
