//! siteshift CLI — the main entry point.
//!
//! Commands:
//! - `decide`         — Run one personalization decision from JSON files
//! - `history show`   — Print the stored visit history
//! - `history clear`  — Forget the visitor identity and history
//! - `cache clear`    — Drop every cached AI decision
//! - `config init`    — Print a starter config file

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "siteshift",
    about = "siteshift — traffic-aware content personalization",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.siteshift/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide which content to show for a visit
    Decide {
        /// JSON file holding the visit context
        #[arg(long)]
        context: PathBuf,

        /// JSON file holding the template catalog
        #[arg(long)]
        templates: PathBuf,

        /// Skip the model even if AI is enabled in config
        #[arg(long)]
        no_ai: bool,

        /// Override the configured AI mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Inspect or reset the visit history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage the decision cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print the history with current recency weights
    Show,
    /// Delete the history; the next visit gets a new identity
    Clear,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every cached decision
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a default config.toml
    Init,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Select,
    Generate,
}

impl From<ModeArg> for siteshift_core::Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Select => Self::Select,
            ModeArg::Generate => Self::Generate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Decide {
            context,
            templates,
            no_ai,
            mode,
        } => {
            commands::decide::run(config_path, &context, &templates, no_ai, mode.map(Into::into)).await?
        }
        Commands::History { action } => match action {
            HistoryAction::Show => commands::history::show(config_path).await?,
            HistoryAction::Clear => commands::history::clear(config_path).await?,
        },
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cache::clear(config_path).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_cmd::init(),
        },
    }

    Ok(())
}
