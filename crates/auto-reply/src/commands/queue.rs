use {
    parley_common::{DropPolicy, QueueMode},
    parley_sessions::{QueueOverride, SessionPatch},
};

use {
    super::{DirectiveContext, rejected},
    crate::{
        Result,
        queue::{
            QueueSettings,
            settings::{parse_cap, parse_duration_ms},
        },
    },
};

const OPTIONS_LINE: &str = "Options: modes steer, followup, collect, steer+backlog, interrupt; debounce:<ms|s|m>, cap:<n>, drop:old|new|summarize.";

fn valid_modes() -> String {
    QueueMode::ALL
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse every token; all problems are reported together.
fn parse_tokens(tokens: &[String]) -> Result<QueueOverride, Vec<String>> {
    let mut parsed = QueueOverride::default();
    let mut errors = Vec::new();

    for token in tokens {
        let Some((key, value)) = token.split_once([':', '=']) else {
            match token.parse::<QueueMode>() {
                Ok(mode) => parsed.mode = Some(mode),
                Err(_) => errors.push(format!(
                    "Unrecognized queue mode \"{token}\". Valid modes: {}.",
                    valid_modes()
                )),
            }
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "debounce" | "debounce_ms" | "wait" => match parse_duration_ms(value) {
                Some(ms) => parsed.debounce_ms = Some(ms),
                None => errors.push(format!(
                    "Invalid debounce \"{value}\". Use ms/s/m (e.g. debounce:1500ms, debounce:2s)."
                )),
            },
            "cap" | "limit" => match parse_cap(value) {
                Some(cap) => parsed.cap = Some(cap),
                None => errors.push(format!(
                    "Invalid cap \"{value}\". Use a positive integer (e.g. cap:10)."
                )),
            },
            "drop" => match value.parse::<DropPolicy>() {
                Ok(policy) => parsed.drop = Some(policy),
                Err(_) => errors.push(format!(
                    "Invalid drop policy \"{value}\". Use drop:old, drop:new, or drop:summarize."
                )),
            },
            "mode" => match value.parse::<QueueMode>() {
                Ok(mode) => parsed.mode = Some(mode),
                Err(_) => errors.push(format!(
                    "Unrecognized queue mode \"{value}\". Valid modes: {}.",
                    valid_modes()
                )),
            },
            _ => errors.push(format!("Unrecognized queue option \"{token}\".")),
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

pub(super) async fn handle(tokens: &[String], cx: &DirectiveContext<'_>) -> Result<String> {
    if tokens.is_empty() {
        return Ok(format!(
            "Current queue settings: {}.\n{OPTIONS_LINE}",
            cx.queue_settings()
        ));
    }

    if let [only] = tokens
        && matches!(only.to_ascii_lowercase().as_str(), "reset" | "default" | "clear")
    {
        cx.patch(SessionPatch::queue(QueueOverride::default())).await?;
        let settings = QueueSettings::resolve(&cx.config.messages.queue, cx.channel, None);
        return Ok(format!("Queue settings reset to defaults: {settings}."));
    }

    let update = match parse_tokens(tokens) {
        Ok(update) => update,
        Err(errors) => {
            rejected("queue");
            return Ok(errors.join(" "));
        },
    };

    let current = cx
        .entry
        .as_ref()
        .and_then(|e| e.queue_override.clone())
        .unwrap_or_default();
    let merged = current.overlay(&update);
    let entry = cx.patch(SessionPatch::queue(merged)).await?;
    let settings = QueueSettings::resolve(
        &cx.config.messages.queue,
        cx.channel,
        entry.queue_override.as_ref(),
    );
    Ok(format!("Queue settings updated: {settings}."))
}
