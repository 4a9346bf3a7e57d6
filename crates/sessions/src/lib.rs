//! Session records and their persistence.
//!
//! One JSON document per (tenant, agent), mapping a session key to its
//! [`SessionEntry`], at `<state>/[tenants/<tenant>/]agents/<agentId>/sessions/sessions.json`.
//! Writes go through a temp file and an atomic rename; readers treat a
//! missing or malformed file as an empty store.

pub mod entry;
pub mod error;
pub mod key;
pub mod paths;
pub mod store;

pub use {
    entry::{QueueOverride, SessionEntry, SessionPatch},
    error::{Error, Result},
    key::SessionKey,
    store::{SessionMap, SessionStore},
};
