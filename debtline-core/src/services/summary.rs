//! Summary service - debt totals for the dashboard header

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{AccountCategory, AccountRecord};
use crate::ports::LiabilityStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: AccountCategory,
    pub balance: Decimal,
    pub count: usize,
}

/// The soonest upcoming payment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDue {
    pub account_id: Uuid,
    pub account_label: String,
    pub due_date: NaiveDate,
    pub minimum_payment: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtSummary {
    pub total_debt: Decimal,
    /// Balance-weighted APR in percent, 0 when there is no debt
    pub weighted_interest_rate: Decimal,
    pub total_minimum_payment: Decimal,
    pub account_count: usize,
    pub by_category: Vec<CategoryTotal>,
    pub next_due: Option<NextDue>,
}

pub struct SummaryService {
    store: Arc<dyn LiabilityStore>,
}

impl SummaryService {
    pub fn new(store: Arc<dyn LiabilityStore>) -> Self {
        Self { store }
    }

    /// Summarize the user's visible accounts as of today
    pub fn summarize(&self, owner_user_id: &str) -> Result<DebtSummary> {
        let accounts = self.store.list_accounts(owner_user_id)?;
        Ok(summarize_accounts(&accounts, Local::now().date_naive()))
    }
}

/// Hidden accounts are skipped. `next_due` only considers dates on or
/// after `today`.
pub fn summarize_accounts(accounts: &[AccountRecord], today: NaiveDate) -> DebtSummary {
    let visible: Vec<&AccountRecord> = accounts.iter().filter(|a| !a.hidden).collect();

    let total_debt: Decimal = visible.iter().map(|a| a.current_balance).sum();
    let weighted: Decimal = visible
        .iter()
        .map(|a| a.current_balance * a.interest_rate)
        .sum();
    let weighted_interest_rate = if total_debt.is_zero() {
        Decimal::ZERO
    } else {
        (weighted / total_debt).round_dp(2)
    };
    let total_minimum_payment: Decimal = visible.iter().filter_map(|a| a.minimum_payment).sum();

    let mut categories: BTreeMap<AccountCategory, CategoryTotal> = BTreeMap::new();
    for account in &visible {
        let entry = categories
            .entry(account.account_category)
            .or_insert_with(|| CategoryTotal {
                category: account.account_category,
                balance: Decimal::ZERO,
                count: 0,
            });
        entry.balance += account.current_balance;
        entry.count += 1;
    }

    let next_due = visible
        .iter()
        .filter_map(|a| a.next_payment_due_date.filter(|d| *d >= today).map(|d| (d, *a)))
        .min_by_key(|(d, _)| *d)
        .map(|(due_date, a)| NextDue {
            account_id: a.id,
            account_label: a.account_label.clone(),
            due_date,
            minimum_payment: a.minimum_payment,
        });

    DebtSummary {
        total_debt,
        weighted_interest_rate,
        total_minimum_payment,
        account_count: visible.len(),
        by_category: categories.into_values().collect(),
        next_due,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountSource;

    fn account(label: &str, category: AccountCategory, balance: i64, rate: i64) -> AccountRecord {
        let mut a = AccountRecord::new("user-1", AccountSource::Manual, label);
        a.account_category = category;
        a.current_balance = Decimal::new(balance, 0);
        a.interest_rate = Decimal::new(rate, 0);
        a
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize_accounts(&[], day(2024, 1, 1));
        assert_eq!(summary.total_debt, Decimal::ZERO);
        assert_eq!(summary.weighted_interest_rate, Decimal::ZERO);
        assert_eq!(summary.account_count, 0);
        assert!(summary.next_due.is_none());
    }

    #[test]
    fn test_weighted_rate() {
        let accounts = vec![
            account("Card", AccountCategory::CreditCard, 1000, 20),
            account("Car", AccountCategory::AutoLoan, 3000, 4),
        ];
        let summary = summarize_accounts(&accounts, day(2024, 1, 1));

        assert_eq!(summary.total_debt, Decimal::new(4000, 0));
        // (1000*20 + 3000*4) / 4000 = 8
        assert_eq!(summary.weighted_interest_rate, Decimal::new(8, 0));
        assert_eq!(summary.by_category.len(), 2);
    }

    #[test]
    fn test_hidden_accounts_excluded() {
        let mut hidden = account("Old card", AccountCategory::CreditCard, 500, 25);
        hidden.hidden = true;
        let accounts = vec![hidden, account("Car", AccountCategory::AutoLoan, 3000, 4)];

        let summary = summarize_accounts(&accounts, day(2024, 1, 1));
        assert_eq!(summary.account_count, 1);
        assert_eq!(summary.total_debt, Decimal::new(3000, 0));
    }

    #[test]
    fn test_next_due_skips_past_dates() {
        let mut past = account("Card", AccountCategory::CreditCard, 100, 20);
        past.next_payment_due_date = Some(day(2023, 12, 1));
        let mut soon = account("Car", AccountCategory::AutoLoan, 100, 4);
        soon.next_payment_due_date = Some(day(2024, 1, 15));
        soon.minimum_payment = Some(Decimal::new(250, 0));
        let mut later = account("Mortgage", AccountCategory::Mortgage, 100, 6);
        later.next_payment_due_date = Some(day(2024, 2, 1));
        later.minimum_payment = Some(Decimal::new(1500, 0));

        let summary = summarize_accounts(&[past, soon.clone(), later], day(2024, 1, 1));
        let next = summary.next_due.unwrap();
        assert_eq!(next.account_id, soon.id);
        assert_eq!(next.due_date, day(2024, 1, 15));
        assert_eq!(summary.total_minimum_payment, Decimal::new(1750, 0));
    }
}
