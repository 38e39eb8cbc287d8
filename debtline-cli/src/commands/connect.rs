//! Connect, exchange and disconnect commands

use std::str::FromStr;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use uuid::Uuid;

use debtline_core::ports::ConnectOptions;
use debtline_core::{AccountSource, DataMode};

use super::{get_context, log_command, print_json, resolve_user};
use crate::output;

fn parse_source(source: &str) -> Result<AccountSource> {
    AccountSource::from_str(source).with_context(|| {
        let names: Vec<_> = AccountSource::ALL.iter().map(|s| s.as_str()).collect();
        format!("Valid sources: {}", names.join(", "))
    })
}

fn parse_mode(mode: Option<&str>) -> Result<DataMode> {
    mode.map(DataMode::from_str)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(Into::into)
}

pub fn run_connect(
    user: Option<&str>,
    source: &str,
    mode: Option<&str>,
    return_url: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "connect");
    let owner = resolve_user(&ctx, user)?;
    let source = parse_source(source)?;

    let options = ConnectOptions {
        owner_user_id: owner,
        mode: parse_mode(mode)?,
        return_url,
        webhook_url: None,
    };
    let result = ctx.provider_manager.connect(source, &options)?;

    if json {
        return print_json(&result);
    }

    if !result.success {
        output::error(&format!(
            "Could not start {} connection: {}",
            source,
            result.error.as_deref().unwrap_or("unknown error")
        ));
        return Ok(());
    }

    if let Some(token) = &result.embed_token {
        println!("{} {}", "Link token:".bold(), token);
        println!(
            "{}",
            format!(
                "Complete the flow in the {} widget, then run 'debtline exchange {} <public-token>'",
                source, source
            )
            .dimmed()
        );
    } else if let Some(url) = &result.redirect_url {
        println!("{} {}", "Continue at:".bold(), url);
    } else {
        output::success(&format!("Connected {}", source));
        if let Some(reference) = &result.connection_ref {
            println!("  Connection: {}", reference.dimmed());
        }
    }

    Ok(())
}

pub fn run_exchange(
    user: Option<&str>,
    source: &str,
    public_token: &str,
    mode: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "exchange");
    let owner = resolve_user(&ctx, user)?;
    let source = parse_source(source)?;

    let outcome = ctx
        .provider_manager
        .exchange_token(&owner, source, public_token, parse_mode(mode)?)?;

    if json {
        return print_json(&outcome);
    }

    output::success(&format!("Connected {}", source));
    println!("  Connection: {}", outcome.connection_id);
    println!("  Accounts imported: {}", outcome.accounts_count);
    Ok(())
}

pub fn run_disconnect(
    user: Option<&str>,
    source: &str,
    connection_id: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "disconnect");
    let owner = resolve_user(&ctx, user)?;
    let source = parse_source(source)?;
    let connection_id = Uuid::parse_str(connection_id).context("Invalid connection id")?;

    // Confirm unless --force
    if !force && !json {
        println!("\n{}", format!("This will disconnect the {} connection.", source).yellow());
        println!("{}\n", "Already synced accounts stay in the database.".dimmed());

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    let disconnected = ctx.provider_manager.disconnect(&owner, source, connection_id)?;

    if json {
        return print_json(&serde_json::json!({ "success": disconnected }));
    }

    if disconnected {
        output::success(&format!("Disconnected {}", connection_id));
    } else {
        output::warning("Connection not found or already disconnected");
    }
    Ok(())
}
