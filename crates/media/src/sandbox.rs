use std::{
    collections::HashSet,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use {
    parley_common::{InboundMedia, TenantContext},
    parley_config::{ParleyConfig, SandboxMode, expand_home},
    sha2::{Digest, Sha256},
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, media as media_metrics};

use crate::error::{Context, Error, Result};

/// Directory, relative to a workspace, that receives inbound attachments.
pub const INBOUND_DIR: &str = "media/inbound";

const MAX_SLUG_LEN: usize = 48;

/// An attachment copied into a session workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMedia {
    /// Host path the attachment was copied from.
    pub source: PathBuf,
    /// Alternate reference (URL) the adapter may have put in the message body.
    pub source_url: Option<String>,
    /// Path relative to the workspace, e.g. `media/inbound/photo.jpg`.
    pub relative: String,
    pub absolute: PathBuf,
    pub mime_type: Option<String>,
}

/// How an attachment is referred to in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub path: String,
    pub mime_type: Option<String>,
}

impl From<&StagedMedia> for MediaRef {
    fn from(staged: &StagedMedia) -> Self {
        Self {
            path: staged.relative.clone(),
            mime_type: staged.mime_type.clone(),
        }
    }
}

impl From<&InboundMedia> for MediaRef {
    fn from(media: &InboundMedia) -> Self {
        Self {
            path: media.path.display().to_string(),
            mime_type: media.mime_type.clone(),
        }
    }
}

/// Owns the tree of per-session sandbox workspaces.
#[derive(Debug, Clone)]
pub struct SandboxManager {
    root: PathBuf,
    mode: SandboxMode,
}

impl SandboxManager {
    pub fn new(root: PathBuf, mode: SandboxMode) -> Self {
        Self { root, mode }
    }

    /// Root from `agents.defaults.sandbox.workspace_root`, else `<state_dir>/sandboxes`.
    pub fn from_config(config: &ParleyConfig, state_dir: &Path) -> Self {
        let sandbox = &config.agents.defaults.sandbox;
        let root = sandbox
            .workspace_root
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(expand_home)
            .unwrap_or_else(|| state_dir.join("sandboxes"));
        Self::new(root, sandbox.mode)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a session gets a sandbox workspace.
    pub fn applies_to(&self, is_main_session: bool) -> bool {
        match self.mode {
            SandboxMode::Off => false,
            SandboxMode::NonMain => !is_main_session,
            SandboxMode::All => true,
        }
    }

    /// Deterministic workspace directory for a session.
    pub fn workspace_dir(&self, tenant: &TenantContext, session_key: &str) -> PathBuf {
        tenant.scope_dir(&self.root).join(workspace_slug(session_key))
    }

    /// Create the workspace (and its inbound media dir) if needed. Idempotent.
    pub async fn ensure_workspace(
        &self,
        tenant: &TenantContext,
        session_key: &str,
    ) -> Result<PathBuf> {
        let dir = self.workspace_dir(tenant, session_key);
        let inbound = dir.join(INBOUND_DIR);
        tokio::task::spawn_blocking(move || std::fs::create_dir_all(&inbound))
            .await
            .map_err(|e| Error::external("workspace task", e))?
            .with_context(|| format!("create workspace {}", dir.display()))?;
        debug!(session_key, workspace = %dir.display(), "workspace ready");
        Ok(dir)
    }

    /// Copy attachments into `<workspace>/media/inbound/`.
    ///
    /// Basenames that repeat within one call get `-1`, `-2`, ... suffixes.
    pub async fn stage_inbound(
        &self,
        workspace: &Path,
        media: &[InboundMedia],
    ) -> Result<Vec<StagedMedia>> {
        if media.is_empty() {
            return Ok(Vec::new());
        }
        let workspace = workspace.to_path_buf();
        let media = media.to_vec();
        let staged = tokio::task::spawn_blocking(move || stage_blocking(&workspace, &media))
            .await
            .map_err(|e| Error::external("staging task", e))??;

        #[cfg(feature = "metrics")]
        counter!(media_metrics::STAGED_TOTAL).increment(staged.len() as u64);
        info!(count = staged.len(), "staged inbound attachments");
        Ok(staged)
    }
}

fn stage_blocking(workspace: &Path, media: &[InboundMedia]) -> Result<Vec<StagedMedia>> {
    let inbound = workspace.join(INBOUND_DIR);
    std::fs::create_dir_all(&inbound)
        .with_context(|| format!("create {}", inbound.display()))?;

    let mut used = HashSet::new();
    let mut staged = Vec::with_capacity(media.len());
    for item in media {
        if !item.path.is_file() {
            return Err(Error::missing_source(&item.path));
        }
        let base = item
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("attachment");
        let name = unique_name(base, &mut used);
        let absolute = inbound.join(&name);
        std::fs::copy(&item.path, &absolute).with_context(|| {
            format!("copy {} to {}", item.path.display(), absolute.display())
        })?;
        staged.push(StagedMedia {
            source: item.path.clone(),
            source_url: item.url.clone().filter(|u| !u.trim().is_empty()),
            relative: format!("{INBOUND_DIR}/{name}"),
            absolute,
            mime_type: item.mime_type.clone(),
        });
    }
    Ok(staged)
}

fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        })
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or_else(|| base.to_string())
}

/// Filesystem-safe directory name: readable slug plus a short key hash.
pub fn workspace_slug(session_key: &str) -> String {
    let mut slug = String::with_capacity(MAX_SLUG_LEN);
    let mut last_dash = true;
    for c in session_key.trim().chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');

    let digest = Sha256::digest(session_key.as_bytes());
    let mut hash = String::with_capacity(8);
    for byte in &digest[..4] {
        let _ = write!(hash, "{byte:02x}");
    }

    if slug.is_empty() {
        format!("session-{hash}")
    } else {
        format!("{slug}-{hash}")
    }
}

/// Replace every host path (and alternate URL) of a staged attachment with
/// its workspace-relative path.
pub fn rewrite_media_paths(prompt: &str, staged: &[StagedMedia]) -> String {
    let mut replacements: Vec<(String, &str)> = Vec::new();
    for item in staged {
        replacements.push((item.source.display().to_string(), item.relative.as_str()));
        if let Some(url) = &item.source_url {
            replacements.push((url.clone(), item.relative.as_str()));
        }
    }
    // Longest first so a path never matches inside a longer one.
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = prompt.to_string();
    for (from, to) in replacements {
        if !from.is_empty() && from != to {
            out = out.replace(&from, to);
        }
    }
    out
}

/// Prefix `body` with a `[media attached: ...]` line per attachment.
pub fn prepend_media_note(body: &str, refs: &[MediaRef]) -> String {
    if refs.is_empty() {
        return body.to_string();
    }
    let total = refs.len();
    let mut out = String::new();
    for (i, media) in refs.iter().enumerate() {
        let label = if total == 1 {
            "[media attached: ".to_string()
        } else {
            format!("[media attached {}/{total}: ", i + 1)
        };
        out.push_str(&label);
        out.push_str(&media.path);
        if let Some(mime) = media.mime_type.as_deref().filter(|m| !m.is_empty()) {
            let _ = write!(out, " ({mime})");
        }
        out.push_str("]\n");
    }
    out.push_str(body);
    out
}
