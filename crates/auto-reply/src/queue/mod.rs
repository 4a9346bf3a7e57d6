//! Per-session run serialization.

pub mod lane;
pub mod settings;

pub use {
    lane::{LaneManager, LaneOutcome, LaneSnapshot, LaneStatus},
    settings::QueueSettings,
};
