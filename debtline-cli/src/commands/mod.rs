//! CLI command implementations

pub mod accounts;
pub mod connect;
pub mod connections;
pub mod logs;
pub mod summary;
pub mod sync;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use debtline_core::services::{LogEvent, Surface};
use debtline_core::DebtlineContext;

/// Get the debtline directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("DEBTLINE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".debtline"))
        .ok_or_else(|| anyhow!("Could not find home directory; set DEBTLINE_DIR"))
}

/// Open the context, creating the data directory on first use
pub fn get_context() -> Result<DebtlineContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create debtline directory: {:?}", data_dir))?;

    DebtlineContext::new(&data_dir, Surface::Cli).context("Failed to initialize debtline context")
}

/// The user every command acts for: `--user` / `DEBTLINE_USER`, then the
/// configured default
pub fn resolve_user(ctx: &DebtlineContext, user: Option<&str>) -> Result<String> {
    let user = user
        .map(str::to_string)
        .or_else(|| ctx.config.default_user.clone())
        .filter(|u| !u.trim().is_empty());
    match user {
        Some(u) => Ok(u),
        None => bail!("No user selected. Pass --user or set DEBTLINE_USER."),
    }
}

/// Record a command run in the event log, ignoring failures
pub fn log_command(ctx: &DebtlineContext, command: &str) {
    if let Some(logger) = &ctx.logging {
        let _ = logger.log(LogEvent::new("command_executed").with_command(command));
    }
}

/// Print a value as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
