//! Queueing vocabulary shared by config, the session store and the lane manager.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Behaviour when a message arrives while an agent run is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueMode {
    /// Inject into the running invocation.
    #[serde(rename = "steer")]
    Steer,
    /// Queue each message; replay them one-by-one after the current run.
    #[serde(rename = "followup", alias = "queue")]
    Followup,
    /// Buffer messages behind a debounce timer and run them as one merged prompt.
    #[default]
    #[serde(rename = "collect")]
    Collect,
    /// Steer when possible, otherwise keep a FIFO backlog.
    #[serde(
        rename = "steer+backlog",
        alias = "steer-backlog",
        alias = "steer_backlog"
    )]
    SteerBacklog,
    /// Abort the current run and start over with the new message.
    #[serde(rename = "interrupt")]
    Interrupt,
}

impl QueueMode {
    pub const ALL: [Self; 5] = [
        Self::Steer,
        Self::Followup,
        Self::Collect,
        Self::SteerBacklog,
        Self::Interrupt,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Steer => "steer",
            Self::Followup => "followup",
            Self::Collect => "collect",
            Self::SteerBacklog => "steer+backlog",
            Self::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for QueueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueMode {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "steer" => Ok(Self::Steer),
            "followup" | "follow-up" | "queue" => Ok(Self::Followup),
            "collect" => Ok(Self::Collect),
            "steer+backlog" | "steer-backlog" | "steer_backlog" => Ok(Self::SteerBacklog),
            "interrupt" => Ok(Self::Interrupt),
            _ => Err(Error::unrecognized("queue mode", raw)),
        }
    }
}

/// What to discard when a pending queue exceeds its cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPolicy {
    Old,
    New,
    #[default]
    Summarize,
}

impl DropPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DropPolicy {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "old" | "oldest" => Ok(Self::Old),
            "new" | "newest" => Ok(Self::New),
            "summarize" | "summary" => Ok(Self::Summarize),
            _ => Err(Error::unrecognized("drop policy", raw)),
        }
    }
}
