//! Reconciliation of fetched account data against stored records
//!
//! Planning is pure: it only decides which fetched records become new rows
//! and which stored rows get merged. Applying the plan is a sequence of
//! upserts. Stored rows that a fetch did not mention are never touched, so
//! a partial fetch cannot delete anything. A fetched record storage would
//! reject is skipped on its own; the rest of the batch still lands.

use std::collections::HashMap;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountRecord, ReconciliationKey};
use crate::ports::LiabilityStore;

/// What a batch of fetched records does to storage
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Records with no stored counterpart, ids freshly assigned
    pub inserts: Vec<AccountRecord>,
    /// Stored records with fetched data merged in
    pub updates: Vec<AccountRecord>,
}

impl ReconcilePlan {
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

enum Slot {
    Insert(usize),
    Update(usize),
}

/// Match `fetched` against `existing` by reconciliation key.
///
/// When two fetched records share a key the later one wins, both for
/// stored matches and for new rows within the batch. Manual records are
/// never produced by a fetch and are ignored if they show up.
pub fn plan_reconciliation(existing: &[AccountRecord], fetched: Vec<AccountRecord>) -> ReconcilePlan {
    let stored: HashMap<ReconciliationKey, &AccountRecord> = existing
        .iter()
        .map(|a| (a.reconciliation_key(), a))
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut slots: HashMap<ReconciliationKey, Slot> = HashMap::new();

    for record in fetched {
        let key = record.reconciliation_key();
        if matches!(key, ReconciliationKey::Manual(_)) {
            continue;
        }

        match slots.get(&key) {
            Some(Slot::Update(i)) => {
                // Later record for an already matched row: re-merge from the stored base
                let mut merged = (*stored[&key]).clone();
                merged.merge_fetched(&record);
                plan.updates[*i] = merged;
            }
            Some(Slot::Insert(i)) => {
                let id = plan.inserts[*i].id;
                plan.inserts[*i] = AccountRecord { id, ..record };
            }
            None => match stored.get(&key) {
                Some(current) => {
                    let mut merged = (*current).clone();
                    merged.merge_fetched(&record);
                    slots.insert(key, Slot::Update(plan.updates.len()));
                    plan.updates.push(merged);
                }
                None => {
                    slots.insert(key, Slot::Insert(plan.inserts.len()));
                    plan.inserts.push(record);
                }
            },
        }
    }

    plan
}

/// Keep the owner's fetched records that pass validation
pub fn retain_valid(owner_user_id: &str, fetched: Vec<AccountRecord>) -> Vec<AccountRecord> {
    fetched
        .into_iter()
        .filter(|r| r.owner_user_id == owner_user_id)
        .filter(|r| match r.validate() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(
                    "Skipping fetched {} account {:?}: {}",
                    r.source,
                    r.provider_account_id.as_deref().unwrap_or(&r.account_label),
                    reason
                );
                false
            }
        })
        .collect()
}

/// Persist a plan. Returns the number of records written.
///
/// A record the store rejects as invalid is skipped; storage failures
/// propagate.
pub fn apply(store: &dyn LiabilityStore, plan: &ReconcilePlan) -> Result<usize> {
    let mut written = 0;
    for record in plan.updates.iter().chain(plan.inserts.iter()) {
        match store.upsert_account(record) {
            Ok(_) => written += 1,
            Err(Error::Validation(reason)) => {
                tracing::warn!("Skipping account {}: {}", record.id, reason);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Load the owner's stored accounts, plan, and apply
pub fn reconcile(
    store: &dyn LiabilityStore,
    owner_user_id: &str,
    fetched: Vec<AccountRecord>,
) -> Result<usize> {
    let existing = store.list_accounts(owner_user_id)?;
    let plan = plan_reconciliation(&existing, retain_valid(owner_user_id, fetched));
    apply(store, &plan)
}
