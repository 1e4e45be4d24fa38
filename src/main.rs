//! CA Sentinel - Telegram contract-address monitor
//!
//! Watches group chatter and scheduled polls for token contract
//! addresses, filters them against per-task thresholds and pushes
//! passing tokens to configured chats.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use ca_sentinel::cli::commands;
use ca_sentinel::config::Config;

/// CA Sentinel - Telegram contract-address monitor
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sentinel
    Start {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check one contract address and print the result
    Check {
        /// Contract address
        ca: String,

        /// Chain id (guessed from the address format when omitted)
        #[arg(long)]
        chain: Option<String>,
    },

    /// List configured scheduled tasks
    Tasks,

    /// Show current configuration (secrets masked)
    Config,

    /// Select the task admin commands default to
    Select {
        /// Task id (created if absent)
        task: String,
    },

    /// Show or change a task's filter thresholds
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },

    /// Enable a task's group-message listening
    Enable {
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },

    /// Disable a task's group-message listening
    Disable {
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },

    /// Set a scheduled task's daily time window (reference clock UTC+8)
    Window {
        /// Window open, "HH:MM"
        #[arg(long)]
        start: Option<String>,
        /// Window close, "HH:MM"
        #[arg(long)]
        end: Option<String>,
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },

    /// Add a chat to scan for contract addresses
    Listen {
        /// Numeric chat id
        chat_id: i64,
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },

    /// Add a push target (chat id or @botname)
    Push {
        /// Target chat id or @botname
        target: String,
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },
}

#[derive(Subcommand)]
enum FilterAction {
    /// Show configured thresholds
    Show {
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },

    /// Set one field's range. Ratio fields take 1-100 percents.
    /// Omitting both bounds clears the field.
    Set {
        /// Field name, e.g. market_cap_usd, holder_count, top10_ratio
        field: String,
        /// Lower bound
        #[arg(long)]
        min: Option<f64>,
        /// Upper bound
        #[arg(long)]
        max: Option<f64>,
        /// Task id (defaults to the selected task)
        #[arg(long)]
        task: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ca_sentinel=info".parse().expect("valid directive"))
                .add_directive("sentinel=info".parse().expect("valid directive")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Check { ca, chain } => commands::check(&config, &ca, chain.as_deref()).await,
        Commands::Tasks => commands::tasks(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Select { task } => commands::select_task(&config, &task).await,
        Commands::Filter { action } => match action {
            FilterAction::Show { task } => commands::filter_show(&config, task.as_deref()).await,
            FilterAction::Set {
                field,
                min,
                max,
                task,
            } => commands::filter_set(&config, task.as_deref(), &field, min, max).await,
        },
        Commands::Enable { task } => commands::set_enabled(&config, task.as_deref(), true).await,
        Commands::Disable { task } => {
            commands::set_enabled(&config, task.as_deref(), false).await
        }
        Commands::Window { start, end, task } => {
            commands::set_window(&config, task.as_deref(), start, end).await
        }
        Commands::Listen { chat_id, task } => {
            commands::add_listen(&config, task.as_deref(), chat_id).await
        }
        Commands::Push { target, task } => {
            commands::add_push(&config, task.as_deref(), target).await
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
