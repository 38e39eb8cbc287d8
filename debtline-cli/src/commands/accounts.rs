//! Accounts command - list, hide and manage manual accounts

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use rust_decimal::Decimal;
use uuid::Uuid;

use debtline_core::services::ManualAccountInput;
use debtline_core::AccountCategory;

use super::{get_context, log_command, print_json, resolve_user};
use crate::output;

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// List accounts
    List {
        /// Include hidden accounts
        #[arg(long)]
        all: bool,
    },
    /// Hide an account from the dashboard (it keeps syncing)
    Hide {
        /// Account ID
        id: String,
    },
    /// Show a hidden account again
    Unhide {
        /// Account ID
        id: String,
    },
    /// Add a manual account
    Add {
        /// Account label
        label: String,
        /// Category (credit_card, auto_loan, student_loan, mortgage, personal_loan, heloc)
        #[arg(long, default_value = "personal_loan")]
        category: String,
        /// Current balance owed
        #[arg(long)]
        balance: String,
        /// Interest rate in percent
        #[arg(long)]
        rate: Option<String>,
        /// Minimum monthly payment
        #[arg(long)]
        minimum_payment: Option<String>,
        /// Next payment due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Lender name
        #[arg(long)]
        institution: Option<String>,
    },
    /// Remove a manual account
    Remove {
        /// Account ID
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid account id '{}'", id))
}

fn parse_amount(value: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim().trim_start_matches('$').replace(',', "").as_str())
        .with_context(|| format!("Invalid {} '{}'", what, value))
}

fn parse_optional_amount(value: Option<&str>, what: &str) -> Result<Option<Decimal>> {
    value.map(|v| parse_amount(v, what)).transpose()
}

pub fn run(user: Option<&str>, command: Option<AccountsCommands>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "accounts");
    let owner = resolve_user(&ctx, user)?;
    let service = &ctx.account_service;

    match command.unwrap_or(AccountsCommands::List { all: false }) {
        AccountsCommands::List { all } => {
            let accounts = if all {
                service.list_all(&owner)?
            } else {
                service.list_visible(&owner)?
            };

            if json {
                return print_json(&accounts);
            }

            if accounts.is_empty() {
                println!("{}", "No accounts. Connect a provider or add one with 'debtline accounts add'.".yellow());
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Account", "Source", "Category", "Balance", "APR", "Due"]);
            for account in accounts {
                let label = if account.hidden {
                    format!("{} (hidden)", account.account_label).dimmed().to_string()
                } else {
                    account.account_label.clone()
                };
                table.add_row(vec![
                    account.id.to_string(),
                    label,
                    account.source.to_string(),
                    account.account_category.to_string(),
                    output::format_money(account.current_balance),
                    format!("{}%", account.interest_rate),
                    account
                        .next_payment_due_date
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        AccountsCommands::Hide { id } => {
            service.hide(&owner, parse_id(&id)?)?;
            if json {
                return print_json(&serde_json::json!({ "success": true }));
            }
            output::success("Account hidden");
        }
        AccountsCommands::Unhide { id } => {
            service.unhide(&owner, parse_id(&id)?)?;
            if json {
                return print_json(&serde_json::json!({ "success": true }));
            }
            output::success("Account visible again");
        }
        AccountsCommands::Add {
            label,
            category,
            balance,
            rate,
            minimum_payment,
            due,
            institution,
        } => {
            let category = AccountCategory::from_str(&category)?;
            let mut input = ManualAccountInput::new(label, category, parse_amount(&balance, "balance")?);
            input.interest_rate = parse_optional_amount(rate.as_deref(), "rate")?;
            input.minimum_payment = parse_optional_amount(minimum_payment.as_deref(), "minimum payment")?;
            input.next_payment_due_date = due
                .as_deref()
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
                .transpose()
                .context("Invalid due date, expected YYYY-MM-DD")?;
            input.institution_name = institution;

            let account = service.create_manual(&owner, &input)?;
            if json {
                return print_json(&account);
            }
            output::success(&format!("Added {}", account.account_label));
            println!("  ID: {}", account.id);
        }
        AccountsCommands::Remove { id, force } => {
            let id = parse_id(&id)?;

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt("Remove this manual account?")
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".dimmed());
                return Ok(());
            }

            service.delete_manual(&owner, id)?;
            if json {
                return print_json(&serde_json::json!({ "success": true }));
            }
            output::success("Account removed");
        }
    }

    Ok(())
}
