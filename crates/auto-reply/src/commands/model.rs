use std::fmt::Write as _;

use {
    parley_agents::{ModelCatalogEntry, ModelRef},
    parley_config::ParleyConfig,
    parley_sessions::SessionPatch,
    tracing::warn,
};

use {
    super::{DirectiveContext, default_model, rejected},
    crate::{Result, directives::ModelArg},
};

/// One `/model` listing row: a bare model id and the providers offering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ModelRow {
    pub bare_id: String,
    pub options: Vec<ModelRef>,
}

impl ModelRow {
    /// The session's current provider when it offers this model, else the first.
    fn pick(&self, current_provider: Option<&str>) -> ModelRef {
        current_provider
            .and_then(|p| {
                self.options
                    .iter()
                    .find(|o| o.provider.eq_ignore_ascii_case(p))
            })
            .or_else(|| self.options.first())
            .cloned()
            .unwrap_or_else(|| ModelRef::new("", self.bare_id.clone()))
    }
}

fn same_ref(a: &ModelRef, b: &ModelRef) -> bool {
    a.provider.eq_ignore_ascii_case(&b.provider) && a.model.eq_ignore_ascii_case(&b.model)
}

/// Allowlisted `provider/model` keys from `agents.defaults.models`.
fn allowlist(config: &ParleyConfig) -> Vec<ModelRef> {
    config
        .agents
        .defaults
        .models
        .keys()
        .filter_map(|key| ModelRef::parse(key))
        .collect()
}

/// Merge catalog and allowlist, then group by bare id in first-seen order.
pub(super) fn build_rows(config: &ParleyConfig, catalog: &[ModelCatalogEntry]) -> Vec<ModelRow> {
    let allowed = allowlist(config);
    let mut refs: Vec<ModelRef> = catalog
        .iter()
        .filter(|e| !e.provider.trim().is_empty() && !e.id.trim().is_empty())
        .map(|e| ModelRef::new(e.provider.trim().to_ascii_lowercase(), e.id.trim()))
        .filter(|r| allowed.is_empty() || allowed.iter().any(|a| same_ref(a, r)))
        .collect();
    for entry in allowed {
        if !refs.iter().any(|r| same_ref(r, &entry)) {
            refs.push(entry);
        }
    }
    if refs.is_empty() {
        refs.push(default_model(config));
    }

    let mut rows: Vec<ModelRow> = Vec::new();
    for model in refs {
        let bare = model.bare_id().to_string();
        match rows.iter_mut().find(|row| row.bare_id == bare) {
            Some(row) => {
                if !row.options.iter().any(|o| same_ref(o, &model)) {
                    row.options.push(model);
                }
            },
            None => rows.push(ModelRow {
                bare_id: bare,
                options: vec![model],
            }),
        }
    }
    rows
}

pub(super) fn render_list(rows: &[ModelRow]) -> String {
    let mut out = String::from("Pick: /model <#> or /model <provider/model>");
    for (i, row) in rows.iter().enumerate() {
        let providers: Vec<&str> = row.options.iter().map(|o| o.provider.as_str()).collect();
        let _ = write!(out, "\n{}) {} — {}", i + 1, row.bare_id, providers.join(", "));
    }
    out.push_str("\nMore: /model status");
    out
}

async fn load_catalog(cx: &DirectiveContext<'_>) -> Vec<ModelCatalogEntry> {
    match cx.catalog.load().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "model catalog unavailable, using configured models");
            Vec::new()
        },
    }
}

pub(super) async fn handle(arg: ModelArg, cx: &DirectiveContext<'_>) -> Result<String> {
    let catalog = load_catalog(cx).await;
    let rows = build_rows(cx.config, &catalog);
    match arg {
        ModelArg::List => Ok(render_list(&rows)),
        ModelArg::Status => Ok(render_model_status(cx, &catalog, &rows)),
        ModelArg::Select(raw) => select(raw.trim(), &rows, cx).await,
    }
}

fn render_model_status(
    cx: &DirectiveContext<'_>,
    catalog: &[ModelCatalogEntry],
    rows: &[ModelRow],
) -> String {
    let effective = cx.effective_model();
    let marker = if effective.is_default {
        " (default)"
    } else {
        ""
    };
    let catalog_line = if catalog.is_empty() {
        "Catalog: unavailable, showing configured models".to_string()
    } else {
        format!(
            "Catalog: {} entries, {} models",
            catalog.len(),
            rows.len()
        )
    };
    format!(
        "Model: {}{marker}\nDefault: {}\nThinking: {}\n{catalog_line}",
        effective.model,
        default_model(cx.config),
        cx.thinking(),
    )
}

async fn select(raw: &str, rows: &[ModelRow], cx: &DirectiveContext<'_>) -> Result<String> {
    let current_provider = cx
        .entry
        .as_ref()
        .and_then(|e| e.provider_override.as_deref());

    if let Ok(index) = raw.parse::<usize>() {
        let Some(row) = index.checked_sub(1).and_then(|i| rows.get(i)) else {
            rejected("model");
            return Ok(format!("Invalid model selection \"{raw}\". Use /model to list."));
        };
        return apply(cx, row.pick(current_provider)).await;
    }

    if let Some(target) = cx.config.agents.defaults.resolve_alias(raw)
        && let Some(model) = ModelRef::parse(target)
    {
        return apply(cx, model).await;
    }

    if raw.contains('/') {
        let Some(model) = ModelRef::parse(raw) else {
            rejected("model");
            return Ok(format!(
                "Invalid model \"{raw}\". Use /model <provider/model>."
            ));
        };
        let allowed = allowlist(cx.config);
        if !allowed.is_empty() && !allowed.iter().any(|a| same_ref(a, &model)) {
            rejected("model");
            return Ok(format!("Model \"{model}\" is not allowed. Use /model to list."));
        }
        return apply(cx, model).await;
    }

    if let Some(row) = rows.iter().find(|row| row.bare_id.eq_ignore_ascii_case(raw)) {
        return apply(cx, row.pick(current_provider)).await;
    }

    rejected("model");
    Ok(format!("Unrecognized model \"{raw}\". Use /model to list."))
}

async fn apply(cx: &DirectiveContext<'_>, model: ModelRef) -> Result<String> {
    cx.patch(SessionPatch::model(&model.provider, &model.model))
        .await?;
    Ok(format!("Model set to {model}."))
}
