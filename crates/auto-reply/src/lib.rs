//! Inbound message processing: the glue between channel adapters and the
//! agent runner.
//!
//! Flow: inbound context → resolve session → parse directive → apply it
//! against the session store, or stage media and queue the prompt on the
//! session's lane → replies.

mod commands;
pub mod directives;
pub mod error;
pub mod queue;
pub mod reply;

pub use {
    commands::ABORTED_REPLY,
    directives::{Directive, ModelArg, ParsedMessage, parse_message},
    error::{Error, Result},
    queue::{LaneManager, LaneOutcome, QueueSettings},
    reply::{ABORTED_NOTE, BlockReplySink, ReplyDispatcher, ReplyOptions},
};
