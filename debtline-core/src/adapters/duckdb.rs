//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountCategory, AccountRecord, AccountSource, ConnectionRecord, DataMode, User};
use crate::ports::LiabilityStore;
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const ACCOUNT_COLUMNS: &str = "account_id, owner_user_id, source, provider_account_id,
    institution_name, account_label, account_category,
    current_balance::VARCHAR, interest_rate::VARCHAR,
    minimum_payment::VARCHAR, credit_limit::VARCHAR,
    last_payment_date::VARCHAR, next_payment_due_date::VARCHAR,
    last_synced_at, hidden, created_at, updated_at";

const CONNECTION_COLUMNS: &str = "connection_id, owner_user_id, provider, session_ref, item_ref,
    institution_label, data_mode, is_active, last_synced_at, created_at, updated_at";

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file.
    ///
    /// Retries with exponential backoff on file locking errors, which show
    /// up when several processes open the database at the same moment.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(Error::persistence(err_msg));
                }
            }
        }

        Err(Error::persistence(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("Failed to open database after {} retries", MAX_RETRIES)),
        ))
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading off: cached extensions in ~/.duckdb/extensions
        // can fail code signing checks on macOS
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Run pending migrations
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        MigrationService::new(&conn)
            .run_pending()
            .map_err(|e| Error::persistence(format!("migration failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence(format!("Lock poisoned: {}", e)))
    }

    fn query_accounts(&self, sql: &str, args: &[&dyn duckdb::ToSql]) -> Result<Vec<AccountRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, row_to_account)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }

    fn query_connections(
        &self,
        sql: &str,
        args: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<ConnectionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, row_to_connection)?;

        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?);
        }
        Ok(connections)
    }
}

impl LiabilityStore for DuckDbRepository {
    // === Users ===

    fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_users (user_id, email, created_at) VALUES (?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, sys_users.email)",
            params![user.id, user.email, user.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Accounts and connections go first; nothing references users by FK
    /// but the order keeps a crash from leaving an owner-less user row.
    fn delete_user(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sys_accounts WHERE owner_user_id = ?", params![user_id])?;
        conn.execute("DELETE FROM sys_connections WHERE owner_user_id = ?", params![user_id])?;
        let rows = conn.execute("DELETE FROM sys_users WHERE user_id = ?", params![user_id])?;
        Ok(rows > 0)
    }

    // === Accounts ===

    fn list_accounts(&self, owner_user_id: &str) -> Result<Vec<AccountRecord>> {
        let sql = format!(
            "SELECT {} FROM sys_accounts WHERE owner_user_id = ? ORDER BY created_at, account_id",
            ACCOUNT_COLUMNS
        );
        self.query_accounts(&sql, &[&owner_user_id])
    }

    fn get_account(&self, owner_user_id: &str, id: Uuid) -> Result<Option<AccountRecord>> {
        let sql = format!(
            "SELECT {} FROM sys_accounts WHERE owner_user_id = ? AND account_id = ?",
            ACCOUNT_COLUMNS
        );
        let id = id.to_string();
        Ok(self.query_accounts(&sql, &[&owner_user_id, &id])?.into_iter().next())
    }

    fn upsert_account(&self, account: &AccountRecord) -> Result<AccountRecord> {
        account.validate().map_err(Error::validation)?;

        let conn = self.conn()?;
        if !owned_or_absent(&conn, "sys_accounts", "account_id", &account.id, &account.owner_user_id)? {
            return Err(Error::AccountNotFound(account.id.to_string()));
        }
        // Ownership, source, key and creation time are fixed at insert;
        // the ON CONFLICT branch only moves mutable columns.
        conn.execute(
            "INSERT INTO sys_accounts (account_id, owner_user_id, source, provider_account_id,
                                       institution_name, account_label, account_category,
                                       current_balance, interest_rate, minimum_payment, credit_limit,
                                       last_payment_date, next_payment_due_date,
                                       last_synced_at, hidden, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?,
                     CAST(? AS DECIMAL(18, 2)), CAST(? AS DECIMAL(9, 4)),
                     CAST(? AS DECIMAL(18, 2)), CAST(? AS DECIMAL(18, 2)),
                     CAST(? AS DATE), CAST(? AS DATE), ?, ?, ?, ?)
             ON CONFLICT (account_id) DO UPDATE SET
                institution_name = EXCLUDED.institution_name,
                account_label = EXCLUDED.account_label,
                account_category = EXCLUDED.account_category,
                current_balance = EXCLUDED.current_balance,
                interest_rate = EXCLUDED.interest_rate,
                minimum_payment = EXCLUDED.minimum_payment,
                credit_limit = EXCLUDED.credit_limit,
                last_payment_date = EXCLUDED.last_payment_date,
                next_payment_due_date = EXCLUDED.next_payment_due_date,
                last_synced_at = EXCLUDED.last_synced_at,
                hidden = EXCLUDED.hidden,
                updated_at = EXCLUDED.updated_at",
            params![
                account.id.to_string(),
                account.owner_user_id,
                account.source.as_str(),
                account.provider_account_id,
                account.institution_name,
                account.account_label,
                account.account_category.as_str(),
                account.current_balance.to_string(),
                account.interest_rate.to_string(),
                account.minimum_payment.map(|d| d.to_string()),
                account.credit_limit.map(|d| d.to_string()),
                account.last_payment_date.map(|d| d.to_string()),
                account.next_payment_due_date.map(|d| d.to_string()),
                account.last_synced_at.to_rfc3339(),
                account.hidden,
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(account.clone())
    }

    fn set_account_hidden(&self, owner_user_id: &str, id: Uuid, hidden: bool) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE sys_accounts SET hidden = ?, updated_at = ?
             WHERE owner_user_id = ? AND account_id = ?",
            params![hidden, Utc::now().to_rfc3339(), owner_user_id, id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn delete_account(&self, owner_user_id: &str, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM sys_accounts WHERE owner_user_id = ? AND account_id = ?",
            params![owner_user_id, id.to_string()],
        )?;
        Ok(rows > 0)
    }

    // === Connections ===

    fn list_active_connections(
        &self,
        owner_user_id: &str,
        provider: Option<AccountSource>,
    ) -> Result<Vec<ConnectionRecord>> {
        match provider {
            Some(p) => {
                let sql = format!(
                    "SELECT {} FROM sys_connections
                     WHERE owner_user_id = ? AND provider = ? AND is_active
                     ORDER BY created_at, connection_id",
                    CONNECTION_COLUMNS
                );
                self.query_connections(&sql, &[&owner_user_id, &p.as_str()])
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM sys_connections
                     WHERE owner_user_id = ? AND is_active
                     ORDER BY created_at, connection_id",
                    CONNECTION_COLUMNS
                );
                self.query_connections(&sql, &[&owner_user_id])
            }
        }
    }

    fn list_connections(&self, owner_user_id: &str) -> Result<Vec<ConnectionRecord>> {
        let sql = format!(
            "SELECT {} FROM sys_connections WHERE owner_user_id = ? ORDER BY created_at, connection_id",
            CONNECTION_COLUMNS
        );
        self.query_connections(&sql, &[&owner_user_id])
    }

    fn get_connection(&self, owner_user_id: &str, id: Uuid) -> Result<Option<ConnectionRecord>> {
        let sql = format!(
            "SELECT {} FROM sys_connections WHERE owner_user_id = ? AND connection_id = ?",
            CONNECTION_COLUMNS
        );
        let id = id.to_string();
        Ok(self.query_connections(&sql, &[&owner_user_id, &id])?.into_iter().next())
    }

    fn find_connections_by_item_ref(
        &self,
        provider: AccountSource,
        item_ref: &str,
    ) -> Result<Vec<ConnectionRecord>> {
        let sql = format!(
            "SELECT {} FROM sys_connections
             WHERE provider = ? AND item_ref = ? AND is_active
             ORDER BY created_at, connection_id",
            CONNECTION_COLUMNS
        );
        self.query_connections(&sql, &[&provider.as_str(), &item_ref])
    }

    fn upsert_connection(&self, connection: &ConnectionRecord) -> Result<ConnectionRecord> {
        if connection.ephemeral {
            return Err(Error::validation("ephemeral connections are never persisted"));
        }

        let conn = self.conn()?;
        if !owned_or_absent(&conn, "sys_connections", "connection_id", &connection.id, &connection.owner_user_id)? {
            return Err(Error::ConnectionNotFound(connection.id.to_string()));
        }
        conn.execute(
            "INSERT INTO sys_connections (connection_id, owner_user_id, provider, session_ref, item_ref,
                                          institution_label, data_mode, is_active, last_synced_at,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (connection_id) DO UPDATE SET
                session_ref = EXCLUDED.session_ref,
                item_ref = COALESCE(EXCLUDED.item_ref, sys_connections.item_ref),
                institution_label = EXCLUDED.institution_label,
                is_active = EXCLUDED.is_active,
                last_synced_at = COALESCE(EXCLUDED.last_synced_at, sys_connections.last_synced_at),
                updated_at = EXCLUDED.updated_at",
            params![
                connection.id.to_string(),
                connection.owner_user_id,
                connection.provider.as_str(),
                connection.session_ref,
                connection.item_ref,
                connection.institution_label,
                connection.mode.as_str(),
                connection.active,
                connection.last_synced_at.map(|t| t.to_rfc3339()),
                connection.created_at.to_rfc3339(),
                connection.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(connection.clone())
    }

    fn deactivate_connection(&self, id: Uuid, owner_user_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE sys_connections SET is_active = FALSE, updated_at = ?
             WHERE connection_id = ? AND owner_user_id = ? AND is_active",
            params![Utc::now().to_rfc3339(), id.to_string(), owner_user_id],
        )?;
        Ok(rows > 0)
    }
}

/// True when no row has this id, or the existing row belongs to `owner`
fn owned_or_absent(
    conn: &Connection,
    table: &str,
    id_column: &str,
    id: &Uuid,
    owner_user_id: &str,
) -> Result<bool> {
    let sql = format!("SELECT owner_user_id FROM {} WHERE {} = ?", table, id_column);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id.to_string()])?;
    match rows.next()? {
        Some(row) => {
            let existing: String = row.get(0)?;
            Ok(existing == owner_user_id)
        }
        None => Ok(true),
    }
}

// Row mapping

fn conversion_error(idx: usize, msg: String) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(
        idx,
        duckdb::types::Type::Text,
        Box::new(Error::persistence(msg)),
    )
}

fn parse_uuid(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, format!("bad uuid '{}': {}", s, e)))
}

fn parse_decimal(row: &Row, idx: usize) -> duckdb::Result<Option<Decimal>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        Decimal::from_str(s.trim())
            .map_err(|e| conversion_error(idx, format!("bad decimal '{}': {}", s, e)))
    })
    .transpose()
}

fn parse_date(row: &Row, idx: usize) -> duckdb::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| conversion_error(idx, format!("bad date '{}': {}", s, e)))
    })
    .transpose()
}

fn parse_timestamp(row: &Row, idx: usize) -> duckdb::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", s, e)))
    })
    .transpose()
}

fn parse_enum<T: FromStr>(row: &Row, idx: usize) -> duckdb::Result<T> {
    let s: String = row.get(idx)?;
    T::from_str(&s).map_err(|_| conversion_error(idx, format!("unexpected value '{}'", s)))
}

fn row_to_account(row: &Row) -> duckdb::Result<AccountRecord> {
    // Column order follows ACCOUNT_COLUMNS
    let now = Utc::now();
    let interest_rate = parse_decimal(row, 8)?.unwrap_or_default();
    Ok(AccountRecord {
        id: parse_uuid(row, 0)?,
        owner_user_id: row.get(1)?,
        source: parse_enum::<AccountSource>(row, 2)?,
        provider_account_id: row.get(3)?,
        institution_name: row.get(4)?,
        account_label: row.get(5)?,
        account_category: parse_enum::<AccountCategory>(row, 6)?,
        current_balance: parse_decimal(row, 7)?.unwrap_or_default(),
        interest_rate,
        // A stored rate is whatever the last sync (or the user) settled on
        interest_rate_reported: true,
        minimum_payment: parse_decimal(row, 9)?,
        credit_limit: parse_decimal(row, 10)?,
        last_payment_date: parse_date(row, 11)?,
        next_payment_due_date: parse_date(row, 12)?,
        last_synced_at: parse_timestamp(row, 13)?.unwrap_or(now),
        hidden: row.get(14)?,
        created_at: parse_timestamp(row, 15)?.unwrap_or(now),
        updated_at: parse_timestamp(row, 16)?.unwrap_or(now),
    })
}

fn row_to_connection(row: &Row) -> duckdb::Result<ConnectionRecord> {
    // Column order follows CONNECTION_COLUMNS
    let now = Utc::now();
    Ok(ConnectionRecord {
        id: parse_uuid(row, 0)?,
        owner_user_id: row.get(1)?,
        provider: parse_enum::<AccountSource>(row, 2)?,
        session_ref: row.get(3)?,
        item_ref: row.get(4)?,
        institution_label: row.get(5)?,
        mode: parse_enum::<DataMode>(row, 6)?,
        active: row.get(7)?,
        last_synced_at: parse_timestamp(row, 8)?,
        created_at: parse_timestamp(row, 9)?.unwrap_or(now),
        updated_at: parse_timestamp(row, 10)?.unwrap_or(now),
        ephemeral: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_repo(temp_dir: &TempDir) -> DuckDbRepository {
        let repo = DuckDbRepository::new(&temp_dir.path().join("test.duckdb")).unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn credit_card(owner: &str, provider_id: &str) -> AccountRecord {
        let mut account = AccountRecord::new(owner, AccountSource::Plaid, "Sapphire");
        account.provider_account_id = Some(provider_id.to_string());
        account.institution_name = "Chase".to_string();
        account.account_category = AccountCategory::CreditCard;
        account.current_balance = Decimal::new(10050, 2);
        account.interest_rate = Decimal::new(1999, 2);
        account.credit_limit = Some(Decimal::new(5000, 0));
        account.next_payment_due_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        account
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error("IO Error: database is locked"));
        assert!(is_retryable_error("The process cannot access the file"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_account_round_trip_preserves_decimals_and_dates() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        let account = credit_card("user-1", "plaid-acc-1");
        repo.upsert_account(&account).unwrap();

        let stored = repo.get_account("user-1", account.id).unwrap().unwrap();
        assert_eq!(stored.current_balance, Decimal::new(10050, 2));
        assert_eq!(stored.interest_rate, Decimal::new(1999, 2));
        assert_eq!(stored.credit_limit, Some(Decimal::new(5000, 0)));
        assert_eq!(stored.minimum_payment, None);
        assert_eq!(stored.next_payment_due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(stored.account_category, AccountCategory::CreditCard);
        assert_eq!(stored.source, AccountSource::Plaid);
    }

    #[test]
    fn test_queries_are_scoped_by_owner() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        let account = credit_card("alice", "acc-1");
        repo.upsert_account(&account).unwrap();

        assert!(repo.list_accounts("bob").unwrap().is_empty());
        assert!(repo.get_account("bob", account.id).unwrap().is_none());
        assert!(!repo.set_account_hidden("bob", account.id, true).unwrap());
        assert!(!repo.delete_account("bob", account.id).unwrap());

        // Another user cannot overwrite the row by reusing its id
        let mut hijack = account.clone();
        hijack.owner_user_id = "bob".to_string();
        hijack.current_balance = Decimal::ZERO;
        assert!(repo.upsert_account(&hijack).is_err());
        let stored = repo.get_account("alice", account.id).unwrap().unwrap();
        assert_eq!(stored.current_balance, Decimal::new(10050, 2));
    }

    #[test]
    fn test_deactivate_connection_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        let conn = ConnectionRecord::new("alice", AccountSource::Plaid, "access-1", "Chase");
        repo.upsert_connection(&conn).unwrap();

        assert!(repo.deactivate_connection(conn.id, "alice").unwrap());
        assert!(!repo.deactivate_connection(conn.id, "alice").unwrap());
        assert!(repo.list_active_connections("alice", None).unwrap().is_empty());

        // Soft delete: the row is still there
        let all = repo.list_connections("alice").unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
    }

    #[test]
    fn test_list_active_connections_filters_provider() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        repo.upsert_connection(&ConnectionRecord::new("alice", AccountSource::Plaid, "a", "Chase"))
            .unwrap();
        repo.upsert_connection(&ConnectionRecord::new("alice", AccountSource::Plaid, "b", "Citi"))
            .unwrap();
        repo.upsert_connection(&ConnectionRecord::new("alice", AccountSource::Method, "c", "Method"))
            .unwrap();

        assert_eq!(repo.list_active_connections("alice", None).unwrap().len(), 3);
        assert_eq!(
            repo.list_active_connections("alice", Some(AccountSource::Plaid)).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_find_connections_by_item_ref() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        let mut conn = ConnectionRecord::new("alice", AccountSource::Plaid, "access", "Chase");
        conn.item_ref = Some("item-42".to_string());
        repo.upsert_connection(&conn).unwrap();

        let found = repo.find_connections_by_item_ref(AccountSource::Plaid, "item-42").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, conn.id);
        assert!(repo
            .find_connections_by_item_ref(AccountSource::Method, "item-42")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ephemeral_connections_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);
        assert!(repo.upsert_connection(&ConnectionRecord::ephemeral_demo("alice")).is_err());
    }

    #[test]
    fn test_delete_user_cascades() {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_repo(&temp_dir);

        repo.upsert_user(&User::new("alice", None)).unwrap();
        repo.upsert_account(&credit_card("alice", "acc-1")).unwrap();
        repo.upsert_connection(&ConnectionRecord::new("alice", AccountSource::Plaid, "a", "Chase"))
            .unwrap();
        repo.upsert_account(&credit_card("bob", "acc-1")).unwrap();

        assert!(repo.delete_user("alice").unwrap());
        assert!(repo.list_accounts("alice").unwrap().is_empty());
        assert!(repo.list_connections("alice").unwrap().is_empty());
        assert_eq!(repo.list_accounts("bob").unwrap().len(), 1);
    }
}
