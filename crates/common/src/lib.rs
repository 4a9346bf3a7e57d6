//! Shared types, error definitions, and utilities used across all parley crates.

pub mod error;
pub mod queue;
pub mod tenant;
pub mod think;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    queue::{DropPolicy, QueueMode},
    tenant::TenantContext,
    think::ThinkLevel,
    types::{ChatType, CommandSource, InboundContext, InboundMedia, ReplyPayload},
};
