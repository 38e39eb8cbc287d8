//! Sync command - refresh accounts from every connected provider

use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use super::{get_context, log_command, print_json, resolve_user};

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn run(user: Option<&str>, account: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "sync");
    let owner = resolve_user(&ctx, user)?;

    if let Some(account) = account {
        let account_id = Uuid::parse_str(account).context("Invalid account id")?;
        let synced = ctx.provider_manager.sync_one_account(&owner, account_id)?;

        if json {
            return print_json(&serde_json::json!({ "success": synced }));
        }
        if !synced {
            bail!("Account {} not found or could not be synced", account_id);
        }
        println!("{} {}", "Synced:".green(), account_id);
        return Ok(());
    }

    let progress = (!json).then(|| spinner("Syncing connections..."));
    let result = ctx.provider_manager.sync_all_for_user(&owner);
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    let summary = result?;

    if json {
        return print_json(&summary);
    }

    println!("{} {} account(s) updated", "Synced:".green(), summary.synced);
    if summary.failed > 0 {
        println!(
            "{} {} connection(s) failed; run 'debtline logs list --errors' for details",
            "Warning:".yellow(),
            summary.failed
        );
    }

    let connections = ctx.provider_manager.list_connections(&owner)?;
    if connections.iter().all(|c| !c.active) {
        println!(
            "{}",
            "No active connections. Use 'debtline connect <source>' to add one.".yellow()
        );
    }

    Ok(())
}
