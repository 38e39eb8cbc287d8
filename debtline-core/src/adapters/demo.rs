//! Demo data provider
//!
//! Six liability accounts at "Demo Bank", one per category. Balances drift
//! a little from day to day so repeated syncs look alive, but the same day
//! always produces the same numbers.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    normalize_balance, normalize_rate, AccountCategory, AccountRecord, AccountSource,
    ConnectionRecord, DataMode, DEMO_INSTITUTION,
};
use crate::ports::{ConnectOptions, ConnectResult, LiabilityProvider, SessionGrant};

struct DemoAccount {
    label: &'static str,
    account_type: &'static str,
    subtype: &'static str,
    /// As an aggregator would report it; credit lines come back negative
    balance_cents: i64,
    rate_bps: i64,
    minimum_payment_cents: i64,
    credit_limit_cents: Option<i64>,
    due_day: u32,
}

const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        label: "Demo Rewards Card",
        account_type: "credit",
        subtype: "credit card",
        balance_cents: -284_763,
        rate_bps: 2_449,
        minimum_payment_cents: 8_500,
        credit_limit_cents: Some(1_200_000),
        due_day: 12,
    },
    DemoAccount {
        label: "Demo Auto Loan",
        account_type: "loan",
        subtype: "auto",
        balance_cents: 1_845_020,
        rate_bps: 649,
        minimum_payment_cents: 41_233,
        credit_limit_cents: None,
        due_day: 5,
    },
    DemoAccount {
        label: "Demo Student Loan",
        account_type: "loan",
        subtype: "student",
        balance_cents: 2_731_577,
        rate_bps: 499,
        minimum_payment_cents: 28_914,
        credit_limit_cents: None,
        due_day: 20,
    },
    DemoAccount {
        label: "Demo Home Mortgage",
        account_type: "loan",
        subtype: "mortgage",
        balance_cents: 31_250_000,
        rate_bps: 675,
        minimum_payment_cents: 214_710,
        credit_limit_cents: None,
        due_day: 1,
    },
    DemoAccount {
        label: "Demo Personal Loan",
        account_type: "loan",
        subtype: "personal",
        balance_cents: 612_040,
        rate_bps: 1_199,
        minimum_payment_cents: 19_800,
        credit_limit_cents: None,
        due_day: 25,
    },
    DemoAccount {
        label: "Demo Home Equity Line",
        account_type: "loan",
        subtype: "home equity",
        balance_cents: -2_500_000,
        rate_bps: 899,
        minimum_payment_cents: 18_750,
        credit_limit_cents: Some(7_500_000),
        due_day: 15,
    },
];

/// Stable per-day jitter in [-200, 200] basis points
fn daily_jitter_bps(label: &str, day: NaiveDate) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(day.format("%Y-%m-%d").to_string().as_bytes());
    let digest = hasher.finalize();
    let n = u16::from_be_bytes([digest[0], digest[1]]) as i64;
    n % 401 - 200
}

fn next_due_date(day: NaiveDate, due_day: u32) -> Option<NaiveDate> {
    let this_month = NaiveDate::from_ymd_opt(day.year(), day.month(), due_day)?;
    if this_month > day {
        return Some(this_month);
    }
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, due_day)
}

fn last_payment_date(day: NaiveDate, due_day: u32) -> Option<NaiveDate> {
    let this_month = NaiveDate::from_ymd_opt(day.year(), day.month(), due_day)?;
    if this_month <= day {
        return Some(this_month);
    }
    let (year, month) = if day.month() == 1 {
        (day.year() - 1, 12)
    } else {
        (day.year(), day.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, due_day)
}

/// Generate the demo accounts as they look on `day`
pub fn generate_demo_accounts(owner_user_id: &str, day: NaiveDate) -> Vec<AccountRecord> {
    DEMO_ACCOUNTS
        .iter()
        .map(|demo| {
            let jitter = daily_jitter_bps(demo.label, day);
            let raw = Decimal::new(demo.balance_cents, 2);
            let balance = (raw + raw * Decimal::new(jitter, 4)).round_dp(2);
            let rate = Some(Decimal::new(demo.rate_bps, 2));

            let mut record = AccountRecord::new(owner_user_id, AccountSource::Demo, demo.label);
            record.institution_name = DEMO_INSTITUTION.to_string();
            record.account_category =
                AccountCategory::from_provider_strings(Some(demo.account_type), Some(demo.subtype));
            record.current_balance = normalize_balance(balance);
            record.interest_rate = normalize_rate(rate);
            record.interest_rate_reported = true;
            record.minimum_payment = Some(Decimal::new(demo.minimum_payment_cents, 2));
            record.credit_limit = demo.credit_limit_cents.map(|c| Decimal::new(c, 2));
            record.last_payment_date = last_payment_date(day, demo.due_day);
            record.next_payment_due_date = next_due_date(day, demo.due_day);
            record
        })
        .collect()
}

/// Demo data provider
pub struct DemoProvider;

impl DemoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LiabilityProvider for DemoProvider {
    fn source(&self) -> AccountSource {
        AccountSource::Demo
    }

    fn is_available(&self) -> bool {
        true
    }

    fn initiate_connection(&self, _options: &ConnectOptions) -> ConnectResult {
        ConnectResult::immediate(format!("demo-{}", Uuid::new_v4()))
    }

    fn exchange_token(&self, _owner_user_id: &str, public_token: &str, _mode: DataMode) -> Result<SessionGrant> {
        let session_ref = if public_token.trim().is_empty() {
            format!("demo-{}", Uuid::new_v4())
        } else {
            public_token.trim().to_string()
        };
        Ok(SessionGrant {
            session_ref,
            item_ref: None,
            institution_label: DEMO_INSTITUTION.to_string(),
        })
    }

    fn terminate_connection(&self, connection: &ConnectionRecord) -> bool {
        connection.active
    }

    fn list_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        Ok(generate_demo_accounts(
            &connection.owner_user_id,
            Utc::now().date_naive(),
        ))
    }

    /// Demo accounts have no external id; the label is what identifies them
    fn sync_one_account(
        &self,
        connection: &ConnectionRecord,
        account_label: &str,
    ) -> Result<AccountRecord> {
        let wanted = account_label.trim();
        self.list_accounts(connection)?
            .into_iter()
            .find(|a| a.account_label == wanted)
            .ok_or_else(|| Error::AccountNotFound(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    #[test]
    fn test_one_account_per_category() {
        let accounts = generate_demo_accounts("user-1", day());
        let categories: HashSet<_> = accounts.iter().map(|a| a.account_category).collect();
        assert_eq!(accounts.len(), 6);
        assert_eq!(categories.len(), 6);
        assert!(accounts.iter().all(|a| a.institution_name == DEMO_INSTITUTION));
        assert!(accounts.iter().all(|a| a.owner_user_id == "user-1"));
    }

    #[test]
    fn test_balances_are_normalized() {
        let accounts = generate_demo_accounts("user-1", day());
        assert!(accounts.iter().all(|a| a.current_balance > Decimal::ZERO));
        assert!(accounts.iter().all(|a| a.validate().is_ok()));
    }

    #[test]
    fn test_same_day_is_deterministic() {
        let a = generate_demo_accounts("user-1", day());
        let b = generate_demo_accounts("user-2", day());
        let balances_a: Vec<_> = a.iter().map(|x| x.current_balance).collect();
        let balances_b: Vec<_> = b.iter().map(|x| x.current_balance).collect();
        assert_eq!(balances_a, balances_b);
    }

    #[test]
    fn test_jitter_bounded() {
        for offset in 0..60 {
            let d = day() + chrono::Duration::days(offset);
            let j = daily_jitter_bps("Demo Rewards Card", d);
            assert!((-200..=200).contains(&j));
        }
    }

    #[test]
    fn test_due_dates_roll_over_year() {
        let dec = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        assert_eq!(next_due_date(dec, 5), NaiveDate::from_ymd_opt(2026, 1, 5));
        let jan = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(last_payment_date(jan, 20), NaiveDate::from_ymd_opt(2024, 12, 20));
    }

    #[test]
    fn test_sync_one_by_label() {
        let provider = DemoProvider::new();
        let conn = ConnectionRecord::ephemeral_demo("user-1");

        let account = provider.sync_one_account(&conn, "Demo Auto Loan").unwrap();
        assert_eq!(account.account_category, AccountCategory::AutoLoan);
        assert!(account.provider_account_id.is_none());

        assert!(matches!(
            provider.sync_one_account(&conn, "No Such Loan"),
            Err(Error::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_terminate_reflects_active_flag() {
        let provider = DemoProvider::new();
        let mut conn = ConnectionRecord::ephemeral_demo("user-1");
        assert!(provider.terminate_connection(&conn));
        conn.active = false;
        assert!(!provider.terminate_connection(&conn));
    }
}
