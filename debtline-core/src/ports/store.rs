//! Persistence gateway port
//!
//! CRUD over account and connection records. Every query is scoped by
//! owner, so one user's writes can never touch another user's rows.

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{AccountRecord, AccountSource, ConnectionRecord, User};

pub trait LiabilityStore: Send + Sync {
    // === Users ===

    fn upsert_user(&self, user: &User) -> Result<()>;

    /// Delete a user and everything they own
    fn delete_user(&self, user_id: &str) -> Result<bool>;

    // === Accounts ===

    /// All of the user's accounts, hidden ones included
    fn list_accounts(&self, owner_user_id: &str) -> Result<Vec<AccountRecord>>;

    fn get_account(&self, owner_user_id: &str, id: Uuid) -> Result<Option<AccountRecord>>;

    /// Insert or update by id
    fn upsert_account(&self, account: &AccountRecord) -> Result<AccountRecord>;

    fn set_account_hidden(&self, owner_user_id: &str, id: Uuid, hidden: bool) -> Result<bool>;

    fn delete_account(&self, owner_user_id: &str, id: Uuid) -> Result<bool>;

    // === Connections ===

    fn list_active_connections(
        &self,
        owner_user_id: &str,
        provider: Option<AccountSource>,
    ) -> Result<Vec<ConnectionRecord>>;

    /// All connections including inactive ones
    fn list_connections(&self, owner_user_id: &str) -> Result<Vec<ConnectionRecord>>;

    fn get_connection(&self, owner_user_id: &str, id: Uuid) -> Result<Option<ConnectionRecord>>;

    /// Active connections of any user matching a provider-side item id.
    /// Only used for webhook routing, where the owner is not known up front.
    fn find_connections_by_item_ref(
        &self,
        provider: AccountSource,
        item_ref: &str,
    ) -> Result<Vec<ConnectionRecord>>;

    fn upsert_connection(&self, connection: &ConnectionRecord) -> Result<ConnectionRecord>;

    /// Soft delete. Returns false when the connection is unknown or already inactive.
    fn deactivate_connection(&self, id: Uuid, owner_user_id: &str) -> Result<bool>;
}
