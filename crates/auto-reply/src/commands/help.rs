use parley_config::{ParleyConfig, RESERVED_DIRECTIVE_NAMES};

const HELP_TEXT: &str = "ℹ️ Help
/help - show this message
/model [list|status|<#>|<provider/model>|<alias>] - list or switch models
/think [off|minimal|low|medium|high|xhigh] - show or set the thinking level
/queue [<mode>|reset] [debounce:<ms|s|m>] [cap:<n>] [drop:old|new|summarize] - queue settings
/stop - abort the current run
/status - model, queue and usage for this session";

pub(super) fn render(config: &ParleyConfig) -> String {
    let aliases: Vec<String> = config
        .agents
        .defaults
        .aliases()
        .filter(|alias| !RESERVED_DIRECTIVE_NAMES.contains(&alias.to_ascii_lowercase().as_str()))
        .map(|alias| format!("/{alias}"))
        .collect();
    if aliases.is_empty() {
        HELP_TEXT.to_string()
    } else {
        format!("{HELP_TEXT}\nModel shortcuts: {}", aliases.join(", "))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, parley_config::ModelEntryConfig};

    #[test]
    fn lists_non_reserved_aliases() {
        let mut config = ParleyConfig::default();
        for (model, alias) in [("anthropic/claude-opus-4-5", "opus"), ("openai/gpt-5.2", "status")] {
            config.agents.defaults.models.insert(model.into(), ModelEntryConfig {
                alias: Some(alias.into()),
            });
        }
        let text = render(&config);
        assert!(text.starts_with("ℹ️ Help"));
        assert!(text.ends_with("Model shortcuts: /opus"));
    }
}
