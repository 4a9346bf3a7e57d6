use {
    parley_agents::{supports_xhigh, xhigh_models_label},
    parley_common::ThinkLevel,
    parley_sessions::SessionPatch,
};

use {
    super::{DirectiveContext, rejected},
    crate::Result,
};

fn level_list(levels: &[ThinkLevel]) -> String {
    levels
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(super) async fn handle(raw: Option<&str>, cx: &DirectiveContext<'_>) -> Result<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(format!(
            "Current thinking level: {}.\nOptions: {}.",
            cx.thinking(),
            level_list(&ThinkLevel::STANDARD)
        ));
    };

    let Ok(level) = raw.parse::<ThinkLevel>() else {
        rejected("think");
        let mut all = ThinkLevel::STANDARD.to_vec();
        all.push(ThinkLevel::XHigh);
        return Ok(format!(
            "Unrecognized thinking level \"{raw}\". Valid levels: {}.",
            level_list(&all)
        ));
    };

    if level == ThinkLevel::XHigh && !supports_xhigh(&cx.effective_model().model) {
        rejected("think");
        return Ok(format!(
            "Thinking level \"xhigh\" is only supported for {}.",
            xhigh_models_label()
        ));
    }

    cx.patch(SessionPatch::thinking(level)).await?;
    Ok(format!("Thinking level set to {level}."))
}
