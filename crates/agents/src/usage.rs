use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub updated_at: u64,
    pub providers: Vec<ProviderUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub display_name: String,
    pub windows: Vec<UsageWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A quota window, e.g. the 5-hour or weekly limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub label: String,
    pub used_percent: f64,
}

/// Reports provider quota usage.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Load usage for the given provider families only.
    async fn load(&self, providers: &[String]) -> anyhow::Result<UsageSummary>;

    /// One-line rendering; empty when there is nothing to show.
    fn format(&self, summary: &UsageSummary) -> String {
        format_usage_line(summary)
    }

    /// Usage family for a provider id; `None` when usage is not tracked for it.
    fn family(&self, provider: &str) -> Option<String> {
        provider
            .split('/')
            .next()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
    }
}

/// `📊 Usage: Claude 80% left · Codex 12% left`, using the tightest window per provider.
pub fn format_usage_line(summary: &UsageSummary) -> String {
    let parts: Vec<String> = summary
        .providers
        .iter()
        .filter(|p| p.error.is_none())
        .filter_map(|p| {
            let used = p
                .windows
                .iter()
                .map(|w| w.used_percent)
                .fold(None, |acc: Option<f64>, u| Some(acc.map_or(u, |a| a.max(u))))?;
            let left = (100.0 - used).clamp(0.0, 100.0).round() as u32;
            let name = if p.display_name.is_empty() {
                &p.provider
            } else {
                &p.display_name
            };
            Some(format!("{name} {left}% left"))
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("📊 Usage: {}", parts.join(" · "))
    }
}

/// Usage reporting disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUsage;

#[async_trait]
impl UsageProvider for NoUsage {
    async fn load(&self, _providers: &[String]) -> anyhow::Result<UsageSummary> {
        Ok(UsageSummary::default())
    }
}
