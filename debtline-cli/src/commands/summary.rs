//! Summary command - totals across visible accounts

use anyhow::Result;
use colored::Colorize;

use super::{get_context, log_command, print_json, resolve_user};
use crate::output;

pub fn run(user: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "summary");
    let owner = resolve_user(&ctx, user)?;
    let summary = ctx.summary_service.summarize(&owner)?;

    if json {
        return print_json(&summary);
    }

    println!("{}", "Debt Summary".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Accounts".to_string(), summary.account_count.to_string()]);
    table.add_row(vec!["Total debt".to_string(), output::format_money(summary.total_debt)]);
    table.add_row(vec![
        "Weighted APR".to_string(),
        format!("{}%", summary.weighted_interest_rate),
    ]);
    table.add_row(vec![
        "Minimum payments".to_string(),
        output::format_money(summary.total_minimum_payment),
    ]);
    println!("{}", table);

    if !summary.by_category.is_empty() {
        println!();
        let mut categories = output::create_table();
        categories.set_header(vec!["Category", "Accounts", "Balance"]);
        for total in &summary.by_category {
            categories.add_row(vec![
                total.category.to_string(),
                total.count.to_string(),
                output::format_money(total.balance),
            ]);
        }
        println!("{}", categories);
    }

    if let Some(next) = &summary.next_due {
        println!();
        let amount = next
            .minimum_payment
            .map(|m| format!(" ({})", output::format_money(m)))
            .unwrap_or_default();
        println!(
            "{} {} on {}{}",
            "Next payment:".bold(),
            next.account_label,
            next.due_date,
            amount
        );
    }

    Ok(())
}
