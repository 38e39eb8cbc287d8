//! Event log - provider lifecycle and command events in logs.duckdb
//!
//! The log sits next to the main database in its own file so a locked or
//! damaged log never blocks syncing. Events carry a name, the provider and
//! command involved, and error text. Balances, account labels, tokens and
//! session references never go here.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp in the high bits, a wrapping sequence in the low 16
fn next_id() -> u64 {
    ((now_ms() as u64) << 16) | (SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF)
}

/// Current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which front end produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Cli,
    Api,
}

impl Surface {
    fn as_str(&self) -> &'static str {
        match self {
            Surface::Cli => "cli",
            Surface::Api => "api",
        }
    }
}

/// An event to record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            provider: None,
            command: None,
            error_message: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A stored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub surface: String,
    pub app_version: String,
    pub event: String,
    pub provider: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
}

impl LogEntry {
    fn from_row(row: &Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            surface: row.get(2)?,
            app_version: row.get(3)?,
            event: row.get(4)?,
            provider: row.get(5)?,
            command: row.get(6)?,
            error_message: row.get(7)?,
        })
    }
}

/// Which entries `LoggingService::query` returns, newest first
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub limit: usize,
    pub errors_only: bool,
    pub provider: Option<String>,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            errors_only: false,
            provider: None,
        }
    }
}

/// Per-provider failure tally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailures {
    pub provider: String,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub total: u64,
    pub errors: u64,
    pub failures_by_provider: Vec<ProviderFailures>,
    pub oldest: Option<i64>,
}

pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    surface: Surface,
    app_version: String,
}

impl LoggingService {
    /// Open or create logs.duckdb in the data directory and migrate it
    pub fn new(data_dir: &Path, surface: Surface, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            surface,
            app_version: app_version.into(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        self.lock()?.execute(
            "INSERT INTO sys_logs (id, timestamp, surface, app_version, event, provider, command, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                next_id(),
                now_ms(),
                self.surface.as_str(),
                &self.app_version,
                &event.event,
                &event.provider,
                &event.command,
                &event.error_message,
            ],
        )?;
        Ok(())
    }

    pub fn query(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, surface, app_version, event, provider, command, error_message
             FROM sys_logs WHERE 1 = 1",
        );
        if filter.errors_only {
            sql.push_str(" AND error_message IS NOT NULL");
        }
        if filter.provider.is_some() {
            sql.push_str(" AND provider = ?");
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");

        let limit = filter.limit as i64;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = match &filter.provider {
            Some(provider) => stmt.query_map(duckdb::params![provider, limit], LogEntry::from_row)?,
            None => stmt.query_map(duckdb::params![limit], LogEntry::from_row)?,
        };
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let conn = self.lock()?;
        let (total, errors, oldest): (u64, u64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), COUNT(error_message), MIN(timestamp) FROM sys_logs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT provider, COUNT(*) FROM sys_logs
             WHERE error_message IS NOT NULL AND provider IS NOT NULL
             GROUP BY provider ORDER BY COUNT(*) DESC, provider",
        )?;
        let failures_by_provider = stmt
            .query_map([], |row| {
                Ok(ProviderFailures {
                    provider: row.get(0)?,
                    failures: row.get(1)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(LogStats {
            total,
            errors,
            failures_by_provider,
            oldest,
        })
    }

    /// Delete entries older than the given unix ms timestamp
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let deleted = self
            .lock()?
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
