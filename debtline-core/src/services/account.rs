//! Account service - dashboard views and manual account entry

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{normalize_balance, normalize_rate, AccountCategory, AccountRecord, AccountSource};
use crate::ports::LiabilityStore;

/// User-entered fields of a manual account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAccountInput {
    pub account_label: String,
    #[serde(default)]
    pub institution_name: Option<String>,
    pub account_category: AccountCategory,
    pub current_balance: Decimal,
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub minimum_payment: Option<Decimal>,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
    #[serde(default)]
    pub last_payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_payment_due_date: Option<NaiveDate>,
}

impl ManualAccountInput {
    pub fn new(label: impl Into<String>, category: AccountCategory, balance: Decimal) -> Self {
        Self {
            account_label: label.into(),
            institution_name: None,
            account_category: category,
            current_balance: balance,
            interest_rate: None,
            minimum_payment: None,
            credit_limit: None,
            last_payment_date: None,
            next_payment_due_date: None,
        }
    }

    fn apply_to(&self, account: &mut AccountRecord) {
        account.account_label = self.account_label.trim().to_string();
        account.institution_name = self.institution_name.clone().unwrap_or_default();
        account.account_category = self.account_category;
        account.current_balance = normalize_balance(self.current_balance);
        account.interest_rate = normalize_rate(self.interest_rate);
        account.interest_rate_reported = true;
        account.minimum_payment = self.minimum_payment.map(normalize_balance);
        account.credit_limit = self.credit_limit.map(normalize_balance);
        account.last_payment_date = self.last_payment_date;
        account.next_payment_due_date = self.next_payment_due_date;
        account.updated_at = Utc::now();
    }
}

pub struct AccountService {
    store: Arc<dyn LiabilityStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LiabilityStore>) -> Self {
        Self { store }
    }

    /// Accounts shown on the dashboard (hidden ones filtered out)
    pub fn list_visible(&self, owner_user_id: &str) -> Result<Vec<AccountRecord>> {
        Ok(self
            .list_all(owner_user_id)?
            .into_iter()
            .filter(|a| !a.hidden)
            .collect())
    }

    pub fn list_all(&self, owner_user_id: &str) -> Result<Vec<AccountRecord>> {
        self.store.list_accounts(owner_user_id)
    }

    /// Hide an account. It keeps syncing in the background.
    pub fn hide(&self, owner_user_id: &str, id: Uuid) -> Result<()> {
        self.set_hidden(owner_user_id, id, true)
    }

    pub fn unhide(&self, owner_user_id: &str, id: Uuid) -> Result<()> {
        self.set_hidden(owner_user_id, id, false)
    }

    fn set_hidden(&self, owner_user_id: &str, id: Uuid, hidden: bool) -> Result<()> {
        if self.store.set_account_hidden(owner_user_id, id, hidden)? {
            Ok(())
        } else {
            Err(Error::AccountNotFound(id.to_string()))
        }
    }

    pub fn create_manual(&self, owner_user_id: &str, input: &ManualAccountInput) -> Result<AccountRecord> {
        let mut account = AccountRecord::new(owner_user_id, AccountSource::Manual, "");
        input.apply_to(&mut account);
        account.validate().map_err(Error::validation)?;
        self.store.upsert_account(&account)
    }

    pub fn update_manual(
        &self,
        owner_user_id: &str,
        id: Uuid,
        input: &ManualAccountInput,
    ) -> Result<AccountRecord> {
        let mut account = self.manual_account(owner_user_id, id)?;
        input.apply_to(&mut account);
        account.last_synced_at = account.updated_at;
        account.validate().map_err(Error::validation)?;
        self.store.upsert_account(&account)
    }

    /// Only manual accounts can be deleted; synced ones come back on the
    /// next sync and are hidden instead.
    pub fn delete_manual(&self, owner_user_id: &str, id: Uuid) -> Result<()> {
        self.manual_account(owner_user_id, id)?;
        if self.store.delete_account(owner_user_id, id)? {
            Ok(())
        } else {
            Err(Error::AccountNotFound(id.to_string()))
        }
    }

    fn manual_account(&self, owner_user_id: &str, id: Uuid) -> Result<AccountRecord> {
        let account = self
            .store
            .get_account(owner_user_id, id)?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;
        if account.source != AccountSource::Manual {
            return Err(Error::validation(format!(
                "account {} is synced from {} and cannot be edited",
                id, account.source
            )));
        }
        Ok(account)
    }
}
