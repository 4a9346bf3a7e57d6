mod config_commands;
mod sessions_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand, ValueEnum},
    parley_auto_reply::parse_message,
    parley_common::{ChatType, InboundContext, TenantContext},
    parley_config::ParleyConfig,
    parley_routing::resolve_route,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::{config_commands::ConfigAction, sessions_commands::SessionAction};

#[derive(Parser)]
#[command(name = "parley", about = "Parley: chat directives and per-session run queues")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./parley.toml and ~/.config/parley/).
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// State directory holding session stores and sandboxes.
    #[arg(long, global = true, env = "PARLEY_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Tenant whose stores to operate on.
    #[arg(long, global = true)]
    tenant: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Session store management.
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show which session and store an inbound message would land in.
    Resolve {
        /// Sender identity, e.g. `telegram:111` or `group:whatsapp:demo`.
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: Option<String>,
        /// Channel provider (`telegram`, `whatsapp`, ...).
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, value_enum, default_value_t = ChatKind::Direct)]
        chat_type: ChatKind,
        /// Explicit session key, as an adapter would pass it.
        #[arg(long)]
        session_key: Option<String>,
    },
    /// Parse a message and print the directive it carries, if any.
    Parse {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChatKind {
    Direct,
    Group,
    Channel,
}

impl From<ChatKind> for ChatType {
    fn from(kind: ChatKind) -> Self {
        match kind {
            ChatKind::Direct => Self::Direct,
            ChatKind::Group => Self::Group,
            ChatKind::Channel => Self::Channel,
        }
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ParleyConfig> {
    let mut config = match cli.config {
        Some(ref path) => parley_config::load_config(path)?,
        None => parley_config::discover_and_load(),
    };
    if let Some(ref dir) = cli.state_dir {
        config.state_dir = Some(dir.display().to_string());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli)?;
    let state_dir = parley_config::state_dir(&config);
    let tenant = TenantContext::from_raw(cli.tenant.as_deref());
    debug!(state_dir = %state_dir.display(), tenant = ?tenant.id(), "parley starting");

    match cli.command {
        Commands::Sessions { action } => {
            sessions_commands::handle_sessions(action, &config, &state_dir, &tenant).await
        },
        Commands::Resolve {
            from,
            to,
            channel,
            chat_type,
            session_key,
        } => {
            let mut ctx = InboundContext::new("", from);
            ctx.to = to;
            ctx.provider = channel;
            ctx.chat_type = chat_type.into();
            ctx.session_key = session_key;
            ctx.tenant_id = cli.tenant.clone();
            let route = resolve_route(&ctx, &config);
            let store =
                sessions_commands::store_path(&config, &state_dir, &route.agent_id, &route.tenant);
            println!("agent:   {}", route.agent_id);
            println!("session: {}", route.session_key);
            println!("main:    {}", route.is_main);
            println!("store:   {}", store.display());
            Ok(())
        },
        Commands::Parse { text } => {
            let text = text.join(" ");
            let aliases: Vec<&str> = config.agents.defaults.aliases().collect();
            let parsed = parse_message(&text, &aliases);
            match &parsed.directive {
                Some(directive) => println!("directive: {directive}"),
                None if parsed.inline_status => println!("inline:    /status"),
                None => {},
            }
            if !parsed.body.is_empty() || parsed.directive.is_none() {
                println!("content:   {}", parsed.body);
            }
            Ok(())
        },
        Commands::Config { action } => {
            config_commands::handle_config(action, cli.config.as_deref(), &config)
        },
    }
}
