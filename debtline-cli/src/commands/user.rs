//! User command - register or remove an owner

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use debtline_core::User;

use super::{get_context, log_command, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user (idempotent)
    Create {
        /// User ID
        id: String,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
        /// Make this the default user for future commands
        #[arg(long)]
        default: bool,
    },
    /// Delete a user with all their accounts and connections
    Delete {
        /// User ID
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub fn run(command: UserCommands, json: bool) -> Result<()> {
    let mut ctx = get_context()?;
    log_command(&ctx, "user");

    match command {
        UserCommands::Create { id, email, default } => {
            let user = User::new(id, email);
            ctx.store().upsert_user(&user)?;

            if default {
                ctx.config.default_user = Some(user.id.clone());
                ctx.config.save(&super::get_data_dir()?)?;
            }

            if json {
                return print_json(&user);
            }
            output::success(&format!("User '{}' ready", user.id));
        }
        UserCommands::Delete { id, force } => {
            if !force && !json {
                println!(
                    "\n{}",
                    format!("This deletes '{}' and every account and connection they own.", id).yellow()
                );
                if !Confirm::new()
                    .with_prompt("Are you sure?")
                    .default(false)
                    .interact()?
                {
                    println!("{}\n", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            let deleted = ctx.store().delete_user(&id)?;
            if json {
                return print_json(&serde_json::json!({ "success": deleted }));
            }
            if deleted {
                output::success(&format!("User '{}' deleted", id));
            } else {
                output::warning(&format!("User '{}' was not registered; owned data removed", id));
            }
        }
    }

    Ok(())
}
