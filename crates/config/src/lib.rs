//! Configuration loading, validation and env substitution.
//!
//! Config files: `parley.toml`, `parley.yaml`, `parley.yml` or `parley.json`,
//! searched in `./` then the user config directory (`~/.config/parley/`).
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, expand_home, find_config_file, load_config, state_dir},
    schema::{
        AgentDefaults, AgentsConfig, DmScope, MessagesConfig, ModelEntryConfig, ModelSetting,
        ParleyConfig, QueueConfig, SandboxConfig, SandboxMode, SessionConfig, SessionScope,
    },
    validate::{Diagnostic, RESERVED_DIRECTIVE_NAMES, Severity, ValidationResult},
};
