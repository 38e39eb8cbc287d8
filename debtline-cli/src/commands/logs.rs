//! Logs command - view and manage the event log

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use debtline_core::services::logging::now_ms;
use debtline_core::services::{LogFilter, LoggingService, Surface};

use super::{get_data_dir, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Only entries for this provider
        #[arg(long)]
        provider: Option<String>,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Show log statistics and database path
    Stats,
}

fn open_log() -> Result<LoggingService> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, Surface::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: Option<LogsCommands>, json: bool) -> Result<()> {
    let command = command.unwrap_or(LogsCommands::List {
        limit: 50,
        errors: false,
        provider: None,
    });
    let service = open_log()?;

    match command {
        LogsCommands::List { limit, errors, provider } => {
            let entries = service.query(&LogFilter {
                limit,
                errors_only: errors,
                provider: provider.map(|p| p.to_lowercase()),
            })?;

            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Event", "Provider", "Command", "Error"]);
            for entry in entries {
                let error = entry
                    .error_message
                    .map(|e| e.red().to_string())
                    .unwrap_or_default();
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.event,
                    entry.provider.unwrap_or_default(),
                    entry.command.unwrap_or_default(),
                    error,
                ]);
            }
            println!("{}", table);
        }
        LogsCommands::Clear { older_than_days, force } => {
            let cutoff_ms = now_ms() - (older_than_days as i64 * 24 * 60 * 60 * 1000);

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            let deleted = service.delete_before(cutoff_ms)?;
            if json {
                return print_json(&serde_json::json!({ "deleted": deleted }));
            }
            output::success(&format!("Deleted {} log entries", deleted));
        }
        LogsCommands::Stats => {
            let stats = service.stats()?;
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                return print_json(&serde_json::json!({
                    "stats": stats,
                    "databasePath": db_path.to_string_lossy(),
                    "databaseSizeBytes": size_bytes,
                }));
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", stats.total);
            println!("  Errors: {}", stats.errors);
            if let Some(oldest) = stats.oldest {
                println!("  Oldest: {}", format_timestamp(oldest));
            }
            println!("  Database: {}", db_path.display());
            println!("  Size: {}", output::format_size(size_bytes));

            if !stats.failures_by_provider.is_empty() {
                println!();
                let mut table = output::create_table();
                table.set_header(vec!["Provider", "Failures"]);
                for row in &stats.failures_by_provider {
                    table.add_row(vec![row.provider.clone(), row.failures.to_string()]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
