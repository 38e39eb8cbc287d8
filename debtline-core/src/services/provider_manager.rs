//! Provider manager - connects users to providers and keeps their stored
//! accounts in step with what the providers report
//!
//! All provider I/O happens here, outside of any storage lock: the store
//! is only touched before a provider call (to read connections) and after
//! it returns (to write the reconciled records).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountSource, ConnectionRecord, ConnectionView, DataMode, DEMO_INSTITUTION};
use crate::ports::{ConnectOptions, ConnectResult, LiabilityProvider, LiabilityStore, WebhookEvent};
use crate::services::reconcile;
use crate::services::{LogEvent, LoggingService, ProviderRegistry};

/// Result of exchanging a public token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    pub connection_id: Uuid,
    pub accounts_count: usize,
}

/// Result of a user-wide sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Account records written
    pub synced: usize,
    /// Connections whose sync failed
    pub failed: usize,
}

/// Result of handling a webhook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub received: bool,
    /// Connections re-synced because of this webhook
    pub refreshed: usize,
    pub reauth_required: bool,
}

/// Only a storage failure stops a batch; everything else is counted
fn aborts_batch(error: &Error) -> bool {
    matches!(error, Error::Persistence(_) | Error::Io(_))
}

pub struct ProviderManager {
    store: Arc<dyn LiabilityStore>,
    registry: ProviderRegistry,
    logger: Option<Arc<LoggingService>>,
}

impl ProviderManager {
    pub fn new(store: Arc<dyn LiabilityStore>, registry: ProviderRegistry) -> Self {
        Self {
            store,
            registry,
            logger: None,
        }
    }

    /// Record lifecycle events in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn record(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::debug!("event log write failed: {}", e);
            }
        }
    }

    fn available_provider(&self, source: AccountSource) -> Result<&Arc<dyn LiabilityProvider>> {
        let provider = self.registry.get(source)?;
        if !provider.is_available() {
            return Err(Error::NotConfigured(source.to_string()));
        }
        Ok(provider)
    }

    // === Connecting ===

    /// Start a connection flow.
    ///
    /// Demo connections complete immediately: the row is persisted (reusing
    /// an existing active one) and its accounts are fetched right away.
    pub fn connect(&self, source: AccountSource, options: &ConnectOptions) -> Result<ConnectResult> {
        let provider = self.available_provider(source)?;
        let mut result = provider.initiate_connection(options);

        if !result.success {
            self.record(
                LogEvent::new("connect_failed")
                    .with_provider(source.as_str())
                    .with_error(result.error.clone().unwrap_or_default()),
            );
            return Ok(result);
        }
        self.record(LogEvent::new("connect_started").with_provider(source.as_str()));

        if source == AccountSource::Demo {
            let existing = self
                .store
                .list_active_connections(&options.owner_user_id, Some(AccountSource::Demo))?
                .into_iter()
                .next();
            let connection = match existing {
                Some(conn) => conn,
                None => {
                    let session_ref = result
                        .connection_ref
                        .clone()
                        .unwrap_or_else(|| format!("demo-{}", Uuid::new_v4()));
                    let mut conn = ConnectionRecord::new(
                        &options.owner_user_id,
                        AccountSource::Demo,
                        session_ref,
                        DEMO_INSTITUTION,
                    );
                    conn.mode = DataMode::Demo;
                    self.store.upsert_connection(&conn)?
                }
            };
            self.sync_connection_record(provider.as_ref(), connection.clone())?;
            result.connection_ref = Some(connection.id.to_string());
        }

        Ok(result)
    }

    /// Exchange a public token for a session, persist the connection and
    /// run the first fetch.
    ///
    /// A failing first fetch leaves the connection in place with zero
    /// accounts; the next sync picks them up.
    pub fn exchange_token(
        &self,
        owner_user_id: &str,
        source: AccountSource,
        public_token: &str,
        mode: DataMode,
    ) -> Result<ExchangeOutcome> {
        let provider = self.available_provider(source)?;
        let grant = provider.exchange_token(owner_user_id, public_token, mode)?;

        let mut connection =
            ConnectionRecord::new(owner_user_id, source, grant.session_ref, grant.institution_label);
        connection.item_ref = grant.item_ref;
        connection.mode = if source == AccountSource::Demo { DataMode::Demo } else { mode };
        let connection = self.store.upsert_connection(&connection)?;

        self.record(LogEvent::new("connect_completed").with_provider(source.as_str()));

        let accounts_count = match self.sync_connection_record(provider.as_ref(), connection.clone()) {
            Ok(count) => count,
            Err(e) if aborts_batch(&e) => return Err(e),
            Err(e) => {
                tracing::warn!("Initial fetch failed for connection {}: {}", connection.id, e);
                self.record(
                    LogEvent::new("sync_failed")
                        .with_provider(source.as_str())
                        .with_error(e.to_string()),
                );
                0
            }
        };

        Ok(ExchangeOutcome {
            connection_id: connection.id,
            accounts_count,
        })
    }

    // === Syncing ===

    /// Fetch, reconcile and stamp one connection. Returns records written.
    fn sync_connection_record(
        &self,
        provider: &dyn LiabilityProvider,
        mut connection: ConnectionRecord,
    ) -> Result<usize> {
        let fetched = provider.sync_all_accounts(&connection)?;
        let written = reconcile::reconcile(self.store.as_ref(), &connection.owner_user_id, fetched)?;

        if !connection.ephemeral {
            let now = Utc::now();
            connection.last_synced_at = Some(now);
            connection.updated_at = now;
            self.store.upsert_connection(&connection)?;
        }
        Ok(written)
    }

    /// Sync every active connection the user has.
    ///
    /// A connection that fails (upstream error, timeout, bad payload) adds
    /// to `failed` and the rest continue. Only a storage failure aborts.
    pub fn sync_all_for_user(&self, owner_user_id: &str) -> Result<SyncSummary> {
        let connections = self.store.list_active_connections(owner_user_id, None)?;
        let mut summary = SyncSummary::default();

        for connection in connections {
            let source = connection.provider;
            let connection_id = connection.id;
            let outcome = self
                .registry
                .get(source)
                .and_then(|provider| self.sync_connection_record(provider.as_ref(), connection));

            match outcome {
                Ok(written) => summary.synced += written,
                Err(e) if aborts_batch(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!("Sync failed for {} connection {}: {}", source, connection_id, e);
                    self.record(
                        LogEvent::new("sync_failed")
                            .with_provider(source.as_str())
                            .with_error(e.to_string()),
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sync for user finished: {} records written, {} connections failed",
            summary.synced,
            summary.failed
        );
        self.record(LogEvent::new("sync_completed"));
        Ok(summary)
    }

    /// Sync a single connection by id
    pub fn sync_connection(&self, owner_user_id: &str, connection_id: Uuid) -> Result<usize> {
        let connection = self
            .store
            .get_connection(owner_user_id, connection_id)?
            .filter(|c| c.active)
            .ok_or_else(|| Error::ConnectionNotFound(connection_id.to_string()))?;

        let provider = self.registry.get(connection.provider)?;
        let source = connection.provider;
        let written = self.sync_connection_record(provider.as_ref(), connection)?;
        self.record(LogEvent::new("sync_completed").with_provider(source.as_str()));
        Ok(written)
    }

    /// Refresh one stored account from whichever connection owns it.
    ///
    /// Aggregator accounts ask each active connection of their provider in
    /// turn; the first one that knows the id answers. Demo accounts use the
    /// user's demo connection, or a throwaway one when there is none.
    /// Manual accounts cannot be refreshed. Anything unresolved is `false`.
    pub fn sync_one_account(&self, owner_user_id: &str, account_id: Uuid) -> Result<bool> {
        let Some(stored) = self.store.get_account(owner_user_id, account_id)? else {
            return Ok(false);
        };
        let Ok(provider) = self.registry.get(stored.source) else {
            return Ok(false);
        };

        let fetched = match stored.source {
            AccountSource::Manual => None,
            AccountSource::Demo => {
                let connection = self
                    .store
                    .list_active_connections(owner_user_id, Some(AccountSource::Demo))?
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| ConnectionRecord::ephemeral_demo(owner_user_id));
                match provider.sync_one_account(&connection, &stored.account_label) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!("Demo account refresh failed: {}", e);
                        None
                    }
                }
            }
            AccountSource::Plaid | AccountSource::Method => {
                let Some(provider_account_id) = stored.provider_account_id.as_deref() else {
                    return Ok(false);
                };
                let connections = self
                    .store
                    .list_active_connections(owner_user_id, Some(stored.source))?;

                let mut found = None;
                for connection in &connections {
                    match provider.sync_one_account(connection, provider_account_id) {
                        Ok(record) => {
                            found = Some(record);
                            break;
                        }
                        Err(Error::AccountNotFound(_)) => continue,
                        Err(e) => {
                            tracing::warn!(
                                "Account refresh via connection {} failed: {}",
                                connection.id,
                                e
                            );
                        }
                    }
                }
                found
            }
        };

        let Some(fetched) = fetched else {
            return Ok(false);
        };

        let mut merged = stored;
        merged.merge_fetched(&fetched);
        self.store.upsert_account(&merged)?;
        Ok(true)
    }

    // === Disconnecting ===

    /// Revoke and deactivate a connection.
    ///
    /// `false` when the connection is unknown, belongs to another provider,
    /// or is already inactive. A provider that refuses to revoke does not
    /// stop the local deactivation.
    pub fn disconnect(
        &self,
        owner_user_id: &str,
        source: AccountSource,
        connection_id: Uuid,
    ) -> Result<bool> {
        let provider = self.registry.get(source)?;
        let Some(connection) = self.store.get_connection(owner_user_id, connection_id)? else {
            return Ok(false);
        };
        if connection.provider != source || !connection.active {
            return Ok(false);
        }

        if !provider.terminate_connection(&connection) {
            tracing::warn!(
                "{} did not confirm revocation of connection {}",
                source,
                connection_id
            );
        }

        let deactivated = self.store.deactivate_connection(connection_id, owner_user_id)?;
        if deactivated {
            self.record(LogEvent::new("disconnect").with_provider(source.as_str()));
        }
        Ok(deactivated)
    }

    // === Webhooks ===

    /// Decode a provider push and re-sync the connections it names.
    ///
    /// The payload is trusted as-is; verifying its signature is up to the
    /// caller.
    pub fn handle_webhook(&self, source: AccountSource, payload: &JsonValue) -> Result<WebhookOutcome> {
        let provider = self.registry.get(source)?;
        let event = provider.decode_webhook(payload)?;
        self.record(LogEvent::new("webhook_received").with_provider(source.as_str()));

        let mut outcome = WebhookOutcome {
            received: true,
            ..Default::default()
        };

        match event {
            None => {}
            Some(WebhookEvent::ReauthRequired { item_ref }) => {
                let affected = self.store.find_connections_by_item_ref(source, &item_ref)?;
                tracing::warn!(
                    "{} requires re-authentication for {} connection(s)",
                    source,
                    affected.len()
                );
                self.record(LogEvent::new("reauth_required").with_provider(source.as_str()));
                outcome.reauth_required = !affected.is_empty();
            }
            Some(WebhookEvent::Refresh { item_ref }) => {
                for connection in self.store.find_connections_by_item_ref(source, &item_ref)? {
                    let connection_id = connection.id;
                    match self.sync_connection_record(provider.as_ref(), connection) {
                        Ok(_) => outcome.refreshed += 1,
                        Err(e) if aborts_batch(&e) => return Err(e),
                        Err(e) => {
                            tracing::warn!("Webhook refresh of {} failed: {}", connection_id, e);
                            self.record(
                                LogEvent::new("sync_failed")
                                    .with_provider(source.as_str())
                                    .with_error(e.to_string()),
                            );
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Client-safe list of the user's connections
    pub fn list_connections(&self, owner_user_id: &str) -> Result<Vec<ConnectionView>> {
        Ok(self
            .store
            .list_connections(owner_user_id)?
            .iter()
            .map(ConnectionRecord::view)
            .collect())
    }
}
