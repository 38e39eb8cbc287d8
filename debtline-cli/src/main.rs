//! Debtline CLI - track every debt in one place

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use debtline_core::OperationResult;

mod commands;
mod output;

use commands::{accounts, connect, connections, logs, summary, sync, user};

/// Debtline - liabilities from every provider in your terminal
#[derive(Parser)]
#[command(name = "debtline", version, about, long_about = None)]
struct Cli {
    /// User the command acts for
    #[arg(long, global = true, env = "DEBTLINE_USER")]
    user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start connecting a provider (plaid, method, demo, manual)
    Connect {
        /// Provider source
        source: String,
        /// Data mode (live, test, demo)
        #[arg(long)]
        mode: Option<String>,
        /// Where a redirect flow should send the user back to
        #[arg(long)]
        return_url: Option<String>,
    },

    /// Exchange a public token from the provider widget for a connection
    Exchange {
        /// Provider source
        source: String,
        /// Public token returned by the widget
        token: String,
        /// Data mode (live, test, demo)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Sync accounts from every active connection
    Sync {
        /// Refresh a single account instead
        #[arg(long)]
        account: Option<String>,
    },

    /// Disconnect a provider connection
    Disconnect {
        /// Provider source
        source: String,
        /// Connection ID
        connection_id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// List provider connections
    Connections,

    /// List and manage accounts
    Accounts {
        #[command(subcommand)]
        command: Option<accounts::AccountsCommands>,
    },

    /// Show debt totals
    Summary,

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: Option<logs::LogsCommands>,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                let failure: OperationResult<()> = OperationResult::fail(format!("{:#}", e));
                println!("{}", serde_json::to_string_pretty(&failure).unwrap_or_default());
            } else {
                output::error(&format!("{:#}", e));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let user = cli.user.as_deref();
    let json = cli.json;

    match cli.command {
        Commands::Connect { source, mode, return_url } => {
            connect::run_connect(user, &source, mode.as_deref(), return_url, json)
        }
        Commands::Exchange { source, token, mode } => {
            connect::run_exchange(user, &source, &token, mode.as_deref(), json)
        }
        Commands::Sync { account } => sync::run(user, account.as_deref(), json),
        Commands::Disconnect { source, connection_id, force } => {
            connect::run_disconnect(user, &source, &connection_id, force, json)
        }
        Commands::Connections => connections::run(user, json),
        Commands::Accounts { command } => accounts::run(user, command, json),
        Commands::Summary => summary::run(user, json),
        Commands::Logs { command } => logs::run(command, json),
        Commands::User { command } => user::run(command, json),
    }
}
