use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

/// One model offered by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    /// Provider-specific id (`claude-opus-4-5`, `anthropic/claude-opus-4-5`).
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

impl ModelCatalogEntry {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            context_window: None,
        }
    }
}

/// Source of the models the gateway can route to.
///
/// An empty list means the catalog is unavailable; callers fall back to
/// configured models.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<ModelCatalogEntry>>;
}

/// Fixed, in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<ModelCatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<ModelCatalogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn load(&self) -> anyhow::Result<Vec<ModelCatalogEntry>> {
        Ok(self.entries.clone())
    }
}
