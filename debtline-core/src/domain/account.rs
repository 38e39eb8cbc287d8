//! Account record domain model
//!
//! One liability account, independent of the provider it came from.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::Error;

/// Where an account's data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSource {
    Plaid,
    Method,
    Demo,
    Manual,
}

impl AccountSource {
    pub const ALL: [AccountSource; 4] = [Self::Plaid, Self::Method, Self::Demo, Self::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaid => "plaid",
            Self::Method => "method",
            Self::Demo => "demo",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for AccountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plaid" => Ok(Self::Plaid),
            "method" => Ok(Self::Method),
            "demo" => Ok(Self::Demo),
            "manual" => Ok(Self::Manual),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Kind of liability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    CreditCard,
    AutoLoan,
    StudentLoan,
    Mortgage,
    PersonalLoan,
    Heloc,
}

struct CategoryRule {
    pattern: &'static str,
    category: AccountCategory,
}

/// Ordered: the first rule that matches wins. "heloc" has to come before
/// "credit" because Plaid reports HELOCs as `loan` / `line of credit`.
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule { pattern: r"\bheloc\b|home equity|line of credit", category: AccountCategory::Heloc },
    CategoryRule { pattern: r"credit[ _-]?card|\bcredit\b", category: AccountCategory::CreditCard },
    CategoryRule { pattern: r"\bauto\b|\bvehicle\b|\bcar\b|auto[ _-]?loan", category: AccountCategory::AutoLoan },
    CategoryRule { pattern: r"student", category: AccountCategory::StudentLoan },
    CategoryRule { pattern: r"mortgage|home[ _-]?loan", category: AccountCategory::Mortgage },
    CategoryRule { pattern: r"personal", category: AccountCategory::PersonalLoan },
];

fn compiled_rules() -> &'static [(Regex, AccountCategory)] {
    static RULES: OnceLock<Vec<(Regex, AccountCategory)>> = OnceLock::new();
    RULES.get_or_init(|| {
        CATEGORY_RULES
            .iter()
            .filter_map(|rule| Regex::new(rule.pattern).ok().map(|re| (re, rule.category)))
            .collect()
    })
}

impl AccountCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::AutoLoan => "auto_loan",
            Self::StudentLoan => "student_loan",
            Self::Mortgage => "mortgage",
            Self::PersonalLoan => "personal_loan",
            Self::Heloc => "heloc",
        }
    }

    /// Translate a provider's type/subtype vocabulary into a category.
    ///
    /// Keyword matching runs over the lowercased `"{type} {subtype}"`.
    /// When nothing matches the account is a `PersonalLoan`; unknown
    /// vocabularies are never an error.
    pub fn from_provider_strings(account_type: Option<&str>, subtype: Option<&str>) -> Self {
        // Subtype is more specific than type, so it is checked on its own first
        // ("loan" + "student" must not be swallowed by a generic type rule).
        let subtype = subtype.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        let account_type = account_type.map(|s| s.trim().to_lowercase()).unwrap_or_default();

        for haystack in [subtype.as_str(), account_type.as_str()] {
            if haystack.is_empty() {
                continue;
            }
            if let Some((_, category)) = compiled_rules().iter().find(|(re, _)| re.is_match(haystack)) {
                return *category;
            }
        }

        Self::PersonalLoan
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "auto_loan" => Ok(Self::AutoLoan),
            "student_loan" => Ok(Self::StudentLoan),
            "mortgage" => Ok(Self::Mortgage),
            "personal_loan" => Ok(Self::PersonalLoan),
            "heloc" => Ok(Self::Heloc),
            other => Err(Error::validation(format!("unknown account category '{}'", other))),
        }
    }
}

/// The key used to match fetched data against stored accounts.
///
/// Set when a record is created and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReconciliationKey {
    Plaid(String),
    Method(String),
    /// Demo data has no stable external id; the label is the key
    Demo(String),
    /// Manual accounts are only ever addressed by their own row id
    Manual(Uuid),
}

/// A liability account owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: Uuid,
    pub owner_user_id: String,
    pub source: AccountSource,
    /// Unique within `source`, not globally
    pub provider_account_id: Option<String>,
    pub institution_name: String,
    pub account_label: String,
    pub account_category: AccountCategory,
    /// Absolute value, never negative
    pub current_balance: Decimal,
    /// Percent, 0 when the provider cannot supply it
    pub interest_rate: Decimal,
    /// False when `interest_rate` is the 0 default rather than a reported value
    #[serde(skip, default)]
    pub interest_rate_reported: bool,
    pub minimum_payment: Option<Decimal>,
    pub credit_limit: Option<Decimal>,
    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_due_date: Option<NaiveDate>,
    pub last_synced_at: DateTime<Utc>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Create a new record with zero balance and rate
    pub fn new(
        owner_user_id: impl Into<String>,
        source: AccountSource,
        account_label: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.into(),
            source,
            provider_account_id: None,
            institution_name: String::new(),
            account_label: account_label.into(),
            account_category: AccountCategory::PersonalLoan,
            current_balance: Decimal::ZERO,
            interest_rate: Decimal::ZERO,
            interest_rate_reported: false,
            minimum_payment: None,
            credit_limit: None,
            last_payment_date: None,
            next_payment_due_date: None,
            last_synced_at: now,
            hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reconciliation_key(&self) -> ReconciliationKey {
        match self.source {
            AccountSource::Plaid => {
                ReconciliationKey::Plaid(self.provider_account_id.clone().unwrap_or_default())
            }
            AccountSource::Method => {
                ReconciliationKey::Method(self.provider_account_id.clone().unwrap_or_default())
            }
            AccountSource::Demo => ReconciliationKey::Demo(self.account_label.trim().to_string()),
            AccountSource::Manual => ReconciliationKey::Manual(self.id),
        }
    }

    /// Merge freshly fetched data into this stored record.
    ///
    /// Only sync-owned fields move. Optional fields the fetch did not supply
    /// keep their stored value; id, owner, key, hidden flag and creation time
    /// never change.
    pub fn merge_fetched(&mut self, fetched: &AccountRecord) {
        self.current_balance = fetched.current_balance;
        if fetched.interest_rate_reported {
            self.interest_rate = fetched.interest_rate;
            self.interest_rate_reported = true;
        }
        if fetched.minimum_payment.is_some() {
            self.minimum_payment = fetched.minimum_payment;
        }
        if fetched.credit_limit.is_some() {
            self.credit_limit = fetched.credit_limit;
        }
        if fetched.last_payment_date.is_some() {
            self.last_payment_date = fetched.last_payment_date;
        }
        if fetched.next_payment_due_date.is_some() {
            self.next_payment_due_date = fetched.next_payment_due_date;
        }
        self.last_synced_at = fetched.last_synced_at;
        self.updated_at = Utc::now();
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.owner_user_id.trim().is_empty() {
            return Err("account owner cannot be empty");
        }
        if self.account_label.trim().is_empty() {
            return Err("account label cannot be empty");
        }
        if self.current_balance.is_sign_negative() && !self.current_balance.is_zero() {
            return Err("balance must be normalized to a non-negative value");
        }
        if self.interest_rate.is_sign_negative() && !self.interest_rate.is_zero() {
            return Err("interest rate cannot be negative");
        }
        match self.source {
            AccountSource::Plaid | AccountSource::Method
                if self.provider_account_id.as_deref().map_or(true, str::is_empty) =>
            {
                Err("aggregator accounts require a provider account id")
            }
            AccountSource::Manual if self.provider_account_id.is_some() => {
                Err("manual accounts cannot carry a provider account id")
            }
            _ => Ok(()),
        }
    }
}

/// Providers may report owed balances as negative numbers
pub fn normalize_balance(balance: Decimal) -> Decimal {
    balance.abs()
}

/// Missing or negative rates become 0
pub fn normalize_rate(rate: Option<Decimal>) -> Decimal {
    match rate {
        Some(r) if r > Decimal::ZERO => r,
        _ => Decimal::ZERO,
    }
}
