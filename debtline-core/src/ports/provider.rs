//! Liability provider port
//!
//! Defines the capability set every account-data source implements
//! (Plaid, Method, demo data, manual entry). The provider manager drives
//! these without knowing which concrete source it is talking to.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountRecord, AccountSource, ConnectionRecord, DataMode};

/// Options for starting a connection flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub owner_user_id: String,
    pub mode: DataMode,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Outcome of starting a connection flow.
///
/// Token-based providers fill `embed_token`, redirect flows fill
/// `redirect_url`, immediate providers (demo, manual) only `connection_ref`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn immediate(connection_ref: impl Into<String>) -> Self {
        Self {
            success: true,
            connection_ref: Some(connection_ref.into()),
            ..Default::default()
        }
    }
}

/// Permanent session obtained by exchanging a public token
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub session_ref: String,
    pub item_ref: Option<String>,
    pub institution_label: String,
}

/// A push notification from a provider, after decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// New data is available for the connection identified by `item_ref`
    Refresh { item_ref: String },
    /// The user has to go through the connect flow again
    ReauthRequired { item_ref: String },
}

/// Account-data source capability set
pub trait LiabilityProvider: Send + Sync {
    /// Static identity of this provider
    fn source(&self) -> AccountSource;

    /// Whether the credentials this provider needs are present
    fn is_available(&self) -> bool;

    /// Begin a connection. Failures are reported in the result, never as Err.
    fn initiate_connection(&self, options: &ConnectOptions) -> ConnectResult;

    /// Exchange a short-lived public token for a permanent session
    fn exchange_token(&self, owner_user_id: &str, public_token: &str, mode: DataMode)
        -> Result<SessionGrant>;

    /// Revoke the session. Returns false if the connection was already
    /// inactive or the provider refused; never errors.
    fn terminate_connection(&self, connection: &ConnectionRecord) -> bool;

    /// Fetch every liability account on the connection, without persisting
    fn list_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>>;

    /// Refresh a single account. `AccountNotFound` when the id is unknown here.
    fn sync_one_account(
        &self,
        connection: &ConnectionRecord,
        provider_account_id: &str,
    ) -> Result<AccountRecord>;

    /// Refresh every account on the connection. One account failing is
    /// dropped from the batch (or served stale); only an unreachable
    /// connection is an Err.
    fn sync_all_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        self.list_accounts(connection)
    }

    /// Decode a webhook payload. `Ok(None)` for events that need no action.
    fn decode_webhook(&self, _payload: &JsonValue) -> Result<Option<WebhookEvent>> {
        Ok(None)
    }
}

/// Look up one account in a freshly listed batch
pub(crate) fn find_in_batch(
    accounts: Vec<AccountRecord>,
    provider_account_id: &str,
) -> Result<AccountRecord> {
    accounts
        .into_iter()
        .find(|a| a.provider_account_id.as_deref() == Some(provider_account_id))
        .ok_or_else(|| Error::AccountNotFound(provider_account_id.to_string()))
}
