use std::{fmt, time::Duration};

use {
    parley_common::{DropPolicy, QueueMode},
    parley_config::QueueConfig,
    parley_sessions::QueueOverride,
};

/// Queue behaviour in effect for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub mode: QueueMode,
    pub debounce_ms: u64,
    pub cap: usize,
    pub drop: DropPolicy,
}

impl QueueSettings {
    /// Session override, then the per-channel mode, then the global defaults.
    pub fn resolve(
        config: &QueueConfig,
        channel: Option<&str>,
        session: Option<&QueueOverride>,
    ) -> Self {
        let base = Self {
            mode: config.mode_for_channel(channel),
            debounce_ms: config.debounce_ms,
            cap: config.cap.max(1),
            drop: config.drop,
        };
        match session {
            Some(o) => Self {
                mode: o.mode.unwrap_or(base.mode),
                debounce_ms: o.debounce_ms.unwrap_or(base.debounce_ms),
                cap: o.cap.unwrap_or(base.cap).max(1),
                drop: o.drop.unwrap_or(base.drop),
            },
            None => base,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl fmt::Display for QueueSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode={}, debounce={}ms, cap={}, drop={}",
            self.mode, self.debounce_ms, self.cap, self.drop
        )
    }
}

/// `1500`, `1500ms`, `2s`, `1m` (fractions allowed for `s`/`m`).
pub fn parse_duration_ms(raw: &str) -> Option<u64> {
    let raw = raw.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = raw.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = raw.strip_suffix('s') {
        (n, 1_000.0)
    } else if let Some(n) = raw.strip_suffix('m') {
        (n, 60_000.0)
    } else {
        (raw.as_str(), 1.0)
    };
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * scale).round() as u64)
}

/// Strictly positive integer.
pub fn parse_cap(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
