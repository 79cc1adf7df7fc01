mod config_commands;
mod context_commands;
mod demo;
mod run_commands;
mod store;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "parley", about = "Parley, a message routing agent with conversation state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of discovering `parley.{toml,yaml,yml,json}`.
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route newline-delimited JSON messages through the demo agent.
    Run(run_commands::RunArgs),
    /// Inspect or clear stored conversation state.
    Context {
        #[command(subcommand)]
        action: context_commands::ContextAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Logs go to stderr; stdout carries outbound messages.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "parley starting");

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => {
            let config = parley_config::load_or_discover(config_path)?;
            run_commands::handle_run(args, &config).await
        },
        Commands::Context { action } => {
            let config = parley_config::load_or_discover(config_path)?;
            context_commands::handle_context(action, &config).await
        },
        Commands::Config { action } => config_commands::handle_config(action, config_path),
    }
}
