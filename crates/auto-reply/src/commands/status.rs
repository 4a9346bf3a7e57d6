use tracing::warn;

use {
    super::DirectiveContext,
    crate::queue::{LaneSnapshot, LaneStatus},
};

fn lane_line(snapshot: LaneSnapshot, runner_active: bool) -> Option<String> {
    match snapshot.status {
        LaneStatus::Idle if runner_active => Some("Run: active".to_string()),
        LaneStatus::Idle => None,
        LaneStatus::Running if snapshot.pending == 0 => Some("Run: active".to_string()),
        LaneStatus::Running => Some(format!("Run: active, {} queued", snapshot.pending)),
        LaneStatus::Queued => Some(format!("Run: waiting, {} queued", snapshot.pending)),
    }
}

/// The `/status` reply. Usage is looked up only for the provider family of
/// the effective model; a failing lookup drops the usage line.
pub(crate) async fn render_status(cx: &DirectiveContext<'_>) -> String {
    let effective = cx.effective_model();
    let mut lines = vec![
        "⚙️ Status".to_string(),
        format!(
            "Model: {}{}",
            effective.model,
            if effective.is_default {
                " (default)"
            } else {
                ""
            }
        ),
        format!("Thinking: {}", cx.thinking()),
        format!("Queue: {}", cx.queue_settings()),
        format!("Session: {}", cx.route.session_key),
    ];
    let runner_active = cx
        .entry
        .as_ref()
        .is_some_and(|e| cx.lanes.runner_active(&e.session_id));
    let snapshot = cx.lanes.snapshot(cx.route.session_key.as_str());
    if let Some(line) = lane_line(snapshot, runner_active) {
        lines.push(line);
    }

    if let Some(family) = cx.usage.family(&effective.model.provider) {
        match cx.usage.load(std::slice::from_ref(&family)).await {
            Ok(summary) => {
                let usage = cx.usage.format(&summary);
                if !usage.is_empty() {
                    lines.push(usage);
                }
            },
            Err(e) => warn!(provider = %family, error = %e, "usage lookup failed"),
        }
    }

    lines.join("\n")
}
