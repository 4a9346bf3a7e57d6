use std::path::{Path, PathBuf};

const MAX_TENANT_ID_LEN: usize = 64;

/// Tenant scope for a single inbound message.
///
/// Passed explicitly through every call that touches tenant-scoped storage.
/// An absent or invalid tenant id means the default (unscoped) tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<String>,
}

impl TenantContext {
    /// The default, unscoped tenant.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a context from a raw tenant id, normalizing it first.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        Self {
            tenant_id: raw.and_then(normalize_tenant_id),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// `base/tenants/<id>` for a scoped tenant, `base` otherwise.
    #[must_use]
    pub fn scope_dir(&self, base: &Path) -> PathBuf {
        match &self.tenant_id {
            Some(id) => base.join("tenants").join(id),
            None => base.to_path_buf(),
        }
    }
}

/// Trim, validate and lowercase a tenant id.
///
/// Valid ids start with an ASCII letter or digit, continue with letters,
/// digits, `_` or `-`, and are at most 64 characters long.
#[must_use]
pub fn normalize_tenant_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_TENANT_ID_LEN {
        return None;
    }
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphanumeric() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
