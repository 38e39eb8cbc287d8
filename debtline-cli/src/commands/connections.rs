//! Connections command - list provider connections

use anyhow::Result;
use colored::Colorize;

use super::{get_context, log_command, print_json, resolve_user};
use crate::output;

pub fn run(user: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "connections");
    let owner = resolve_user(&ctx, user)?;
    let connections = ctx.provider_manager.list_connections(&owner)?;

    if json {
        return print_json(&connections);
    }

    if connections.is_empty() {
        println!("{}", "No connections. Use 'debtline connect <source>' to add one.".yellow());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Provider", "Institution", "Mode", "Status", "Last sync"]);

    for connection in connections {
        let status = if connection.active {
            "active".green().to_string()
        } else {
            "disconnected".dimmed().to_string()
        };
        table.add_row(vec![
            connection.id.to_string(),
            connection.provider.to_string(),
            connection.institution_label,
            connection.mode.to_string(),
            status,
            connection
                .last_synced_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}
