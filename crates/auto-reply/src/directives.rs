//! Slash-directive recognition.
//!
//! Parsing is pure: it classifies the text and splits off what should reach
//! the agent. Applying a directive happens in [`crate::commands`].

use std::{fmt, sync::LazyLock};

use {parley_common::QueueMode, parley_config::RESERVED_DIRECTIVE_NAMES, regex::Regex};

/// Channel envelopes such as `[Dec 5 10:00] ` or `[Telegram Ada 2026-01-02 09:15] `.
static TIMESTAMP_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\[[^\]\n]*\d{1,2}:\d{2}[^\]\n]*\]\s*").ok());

/// `/status` or `/usage` somewhere inside a longer message.
static INLINE_STATUS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)/(?:status|usage)(?:@[A-Za-z0-9_]+)?(?:$|[\s.,!?;:])").ok()
});

/// Bare words that stop the current run when sent on their own.
const ABORT_TRIGGERS: &[&str] = &["stop", "abort", "esc", "exit", "interrupt", "wait"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Help,
    Model(ModelArg),
    /// `None` shows the current level.
    Think(Option<String>),
    /// Raw option tokens; validated when applied.
    Queue(Vec<String>),
    Stop,
    Status,
}

impl Directive {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Model(_) => "model",
            Self::Think(_) => "think",
            Self::Queue(_) => "queue",
            Self::Stop => "stop",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(ModelArg::List) => f.write_str("/model list"),
            Self::Model(ModelArg::Status) => f.write_str("/model status"),
            Self::Model(ModelArg::Select(raw)) => write!(f, "/model {raw}"),
            Self::Think(Some(level)) => write!(f, "/think {level}"),
            Self::Queue(tokens) if !tokens.is_empty() => write!(f, "/queue {}", tokens.join(" ")),
            other => write!(f, "/{}", other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelArg {
    List,
    Status,
    /// Index, `provider/model`, alias or bare model id.
    Select(String),
}

/// Result of classifying one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Set when the message starts with a directive. Text after the
    /// directive's own arguments is left in `body` for the agent.
    pub directive: Option<Directive>,
    /// A status request was embedded in content and has been stripped from `body`.
    pub inline_status: bool,
    /// Text to forward to the agent.
    pub body: String,
}

impl ParsedMessage {
    fn directive(directive: Directive) -> Self {
        Self {
            directive: Some(directive),
            ..Self::default()
        }
    }

    fn content(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }
}

/// Remove a leading channel timestamp envelope, if any.
pub fn strip_timestamp_prefix(text: &str) -> &str {
    match TIMESTAMP_PREFIX.as_ref().and_then(|re| re.find(text)) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// `stop`, `Abort!`, `[Dec 5 10:00] wait` and friends.
pub fn is_abort_trigger(text: &str) -> bool {
    let word = strip_timestamp_prefix(text)
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_ascii_lowercase();
    ABORT_TRIGGERS.contains(&word.as_str())
}

/// Classify `text`. `aliases` are the configured model aliases (trimmed).
pub fn parse_message(text: &str, aliases: &[&str]) -> ParsedMessage {
    let stripped = strip_timestamp_prefix(text).trim();

    if is_abort_trigger(stripped) {
        return ParsedMessage::directive(Directive::Stop);
    }

    if let Some(command) = stripped.strip_prefix('/') {
        if let Some(parsed) = parse_command(command, aliases) {
            return parsed;
        }
        return ParsedMessage::content(text.trim());
    }

    if let Some(body) = strip_inline_status(text) {
        return ParsedMessage {
            directive: None,
            inline_status: true,
            body,
        };
    }

    ParsedMessage::content(text.trim())
}

fn parse_command(command: &str, aliases: &[&str]) -> Option<ParsedMessage> {
    let (head, rest) = split_token(command);
    // `/think:high` is shorthand for `/think high`.
    let (head, inline_arg) = match head.split_once(':') {
        Some((name, arg)) => (name, arg.trim()),
        None => (head, ""),
    };
    // Telegram appends the bot username: `/status@parley_bot`.
    let raw_name = head.split('@').next().unwrap_or(head);
    if raw_name.is_empty() {
        return None;
    }
    let args = match (inline_arg.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => inline_arg.to_string(),
        (false, false) => format!("{inline_arg} {rest}"),
    };

    let (directive, body) = match raw_name.to_ascii_lowercase().as_str() {
        "help" => (Directive::Help, args.as_str()),
        "model" | "models" => {
            let (first, tail) = split_token(&args);
            let arg = match first {
                "" => ModelArg::List,
                a if a.eq_ignore_ascii_case("list") => ModelArg::List,
                a if a.eq_ignore_ascii_case("status") => ModelArg::Status,
                a => ModelArg::Select(a.to_string()),
            };
            (Directive::Model(arg), tail)
        },
        "think" | "thinking" => {
            let (first, tail) = split_token(&args);
            let level = (!first.is_empty()).then(|| first.to_string());
            (Directive::Think(level), tail)
        },
        "queue" => {
            let (tokens, tail) = split_queue_tokens(&args);
            (Directive::Queue(tokens), tail)
        },
        "stop" => (Directive::Stop, args.as_str()),
        "status" | "usage" => {
            if args.is_empty() {
                (Directive::Status, "")
            } else {
                return Some(ParsedMessage {
                    directive: None,
                    inline_status: true,
                    body: args,
                });
            }
        },
        name if !RESERVED_DIRECTIVE_NAMES.contains(&name)
            && args.is_empty()
            && aliases.iter().any(|alias| alias.trim() == raw_name) =>
        {
            (Directive::Model(ModelArg::Select(raw_name.to_string())), "")
        },
        _ => return None,
    };
    Some(ParsedMessage {
        directive: Some(directive),
        inline_status: false,
        body: body.trim().to_string(),
    })
}

/// First whitespace-delimited token and the trimmed remainder.
fn split_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}

/// Leading `/queue` arguments. The first token always belongs to the
/// directive; later ones only while they look like queue options.
fn split_queue_tokens(args: &str) -> (Vec<String>, &str) {
    let mut tokens = Vec::new();
    let mut remaining = args.trim();
    loop {
        let (token, tail) = split_token(remaining);
        if token.is_empty() || (!tokens.is_empty() && !is_queue_option(token)) {
            break;
        }
        tokens.push(token.to_string());
        remaining = tail;
    }
    (tokens, remaining)
}

fn is_queue_option(token: &str) -> bool {
    token.contains([':', '='])
        || token.parse::<QueueMode>().is_ok()
        || matches!(token.to_ascii_lowercase().as_str(), "reset" | "default" | "clear")
}

/// Remove the first embedded `/status` or `/usage` token.
fn strip_inline_status(text: &str) -> Option<String> {
    let m = INLINE_STATUS.as_ref()?.find(text)?;
    let before = text[..m.start()].trim_end();
    let after = text[m.end()..].trim_start();
    let body = match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{before} {after}"),
        (false, true) => before.to_string(),
        (true, _) => after.to_string(),
    };
    Some(body)
}
