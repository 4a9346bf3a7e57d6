use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::ParleyConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["parley.toml", "parley.yaml", "parley.yml", "parley.json"];

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "PARLEY_STATE_DIR";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ParleyConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./parley.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/parley/parley.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ParleyConfig::default()` if no config file is found or it fails to parse.
pub fn discover_and_load() -> ParleyConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ParleyConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/parley/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "parley").map(|d| d.config_dir().to_path_buf())
}

/// Resolve the state directory holding session stores and sandboxes.
///
/// Precedence: `state_dir` in config, `PARLEY_STATE_DIR`, the platform data
/// dir, then `./.parley`.
pub fn state_dir(config: &ParleyConfig) -> PathBuf {
    if let Some(dir) = config.state_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        return expand_home(dir);
    }
    if let Ok(dir) = std::env::var(STATE_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return expand_home(&dir);
    }
    directories::ProjectDirs::from("", "", "parley")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".parley"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let rest = if trimmed == "~" {
        Some("")
    } else {
        trimmed.strip_prefix("~/")
    };
    match (rest, directories::BaseDirs::new()) {
        (Some(rest), Some(base)) if rest.is_empty() => base.home_dir().to_path_buf(),
        (Some(rest), Some(base)) => base.home_dir().join(rest),
        _ => PathBuf::from(trimmed),
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ParleyConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::schema::{DmScope, SandboxMode, SessionScope},
        parley_common::QueueMode,
    };

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        std::fs::write(
            &path,
            r#"
            state_dir = "/srv/parley"
            [session]
            scope = "main"
            dm_scope = "per-channel-peer"
            [messages.queue]
            mode = "interrupt"
            cap = 3
            "#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.session.scope, SessionScope::Main);
        assert_eq!(cfg.session.dm_scope, DmScope::PerChannelPeer);
        assert_eq!(cfg.messages.queue.mode, QueueMode::Interrupt);
        assert_eq!(cfg.messages.queue.cap, 3);
        assert_eq!(state_dir(&cfg), PathBuf::from("/srv/parley"));
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("parley.yaml");
        std::fs::write(
            &yaml,
            "agents:\n  defaults:\n    sandbox:\n      mode: non-main\n",
        )
        .unwrap();
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.agents.defaults.sandbox.mode, SandboxMode::NonMain);

        let json = dir.path().join("parley.json");
        std::fs::write(
            &json,
            r#"{"agents":{"defaults":{"model":{"primary":"openai/gpt-5.2"}}}}"#,
        )
        .unwrap();
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.agents.defaults.model.primary(), "openai/gpt-5.2");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/x"), PathBuf::from("/var/lib/x"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
        if let Some(base) = directories::BaseDirs::new() {
            assert_eq!(expand_home("~/state"), base.home_dir().join("state"));
        }
    }
}
