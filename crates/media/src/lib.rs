//! Per-session sandbox workspaces: inbound attachments are copied into
//! `<workspace>/media/inbound/` and prompts reference them by relative path.

pub mod error;
pub mod sandbox;

pub use {
    error::{Error, Result},
    sandbox::{MediaRef, SandboxManager, StagedMedia, prepend_media_note, rewrite_media_paths},
};
