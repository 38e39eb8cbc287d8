//! Method Financial API client
//!
//! Method identifies a consumer as an entity and discovers their
//! liabilities from credit data. The Connect element returns the entity id,
//! which doubles as the session reference. Amounts are integer cents.
//!
//! API Documentation: https://docs.methodfi.com/reference

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::wire::{decode_body, deserialize_optional_decimal, from_cents, map_request_error, parse_date};
use crate::config::MethodSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    normalize_balance, normalize_rate, AccountCategory, AccountRecord, AccountSource,
    ConnectionRecord, DataMode,
};
use crate::ports::{ConnectOptions, ConnectResult, LiabilityProvider, SessionGrant, WebhookEvent};

const PROVIDER: &str = "Method";

pub const METHOD_DEV_URL: &str = "https://dev.methodfi.com";
pub const METHOD_SANDBOX_URL: &str = "https://sandbox.methodfi.com";
pub const METHOD_PRODUCTION_URL: &str = "https://production.methodfi.com";

const DEFAULT_INSTITUTION: &str = "Method";

pub fn environment_url(environment: Option<&str>) -> &'static str {
    match environment.map(|e| e.trim().to_lowercase()).as_deref() {
        Some("production") | Some("live") => METHOD_PRODUCTION_URL,
        Some("sandbox") => METHOD_SANDBOX_URL,
        _ => METHOD_DEV_URL,
    }
}

// =============================================================================
// Wire models
// =============================================================================

/// Every Method response is wrapped in `{ success, data, message }`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MethodEntity {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ElementToken {
    element_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodAccount {
    pub id: String,
    #[serde(default)]
    pub holder_id: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub liability: Option<MethodLiability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodLiability {
    #[serde(rename = "type", default)]
    pub liability_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fi_name: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    /// Per-type detail objects (`credit_card`, `auto_loan`, ...) keyed by type
    #[serde(flatten)]
    pub details: serde_json::Map<String, JsonValue>,
}

/// Shared shape of the per-type liability detail objects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiabilityDetail {
    #[serde(default)]
    pub balance: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub interest_rate_percentage: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub interest_rate_percentage_max: Option<Decimal>,
    #[serde(default)]
    pub next_payment_minimum_amount: Option<i64>,
    #[serde(default)]
    pub credit_limit: Option<i64>,
    #[serde(default)]
    pub last_payment_date: Option<String>,
    #[serde(default)]
    pub next_payment_due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    holder_id: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
}

// =============================================================================
// Method HTTP Client
// =============================================================================

#[derive(Debug)]
pub struct MethodClient {
    client: Client,
    api_key: String,
    base_url: String,
    pinned: bool,
    timeout_secs: u64,
}

impl MethodClient {
    pub fn new(settings: &MethodSettings, timeout_secs: u64) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("method api key missing".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let (base_url, pinned) = match settings.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => (url.trim_end_matches('/').to_string(), true),
            _ => (environment_url(settings.environment.as_deref()).to_string(), false),
        };

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url,
            pinned,
            timeout_secs,
        })
    }

    fn url(&self, mode: DataMode, path: &str) -> String {
        let base = if mode == DataMode::Test && !self.pinned {
            METHOD_SANDBOX_URL
        } else {
            &self.base_url
        };
        format!("{}{}", base, path)
    }

    /// Send and unwrap the data envelope. `Ok(None)` on 404.
    fn call<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| map_request_error(PROVIDER, e, self.timeout_secs))?;

        match response.status().as_u16() {
            200..=299 => {
                let envelope: Envelope<T> = decode_body(PROVIDER, what, response)?;
                Ok(Some(envelope.data))
            }
            404 => Ok(None),
            401 | 403 => Err(Error::upstream(
                "Method authentication failed. Your API key may be invalid or revoked.",
            )),
            429 => Err(Error::upstream("Method rate limit exceeded. Please try again shortly.")),
            status => {
                let message = response
                    .text()
                    .ok()
                    .and_then(|body| serde_json::from_str::<ErrorEnvelope>(&body).ok())
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                Err(Error::upstream(format!("Method {} failed: {}", what, message)))
            }
        }
    }

    fn expect<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.call(request, what)?
            .ok_or_else(|| Error::upstream(format!("Method {} not found", what)))
    }

    pub fn create_entity(&self, options: &ConnectOptions) -> Result<String> {
        let body = json!({
            "type": "individual",
            "individual": {},
            "metadata": { "user_id": options.owner_user_id },
        });
        let entity: MethodEntity = self.expect(
            self.client.post(self.url(options.mode, "/entities")).json(&body),
            "entity create",
        )?;
        Ok(entity.id)
    }

    pub fn create_connect_token(&self, mode: DataMode, entity_id: &str) -> Result<String> {
        let body = json!({
            "entity_id": entity_id,
            "type": "connect",
            "connect": { "products": ["balance", "update"] },
        });
        let token: ElementToken = self.expect(
            self.client.post(self.url(mode, "/elements/token")).json(&body),
            "element token",
        )?;
        Ok(token.element_token)
    }

    /// `None` when the entity does not exist
    pub fn get_entity_status(&self, mode: DataMode, entity_id: &str) -> Result<Option<String>> {
        let entity: Option<MethodEntity> = self.call(
            self.client.get(self.url(mode, &format!("/entities/{}", entity_id))),
            "entity",
        )?;
        Ok(entity.map(|e| e.status.unwrap_or_else(|| "active".to_string())))
    }

    pub fn list_liabilities(&self, mode: DataMode, entity_id: &str) -> Result<Vec<MethodAccount>> {
        self.expect(
            self.client
                .get(self.url(mode, "/accounts"))
                .query(&[("holder_id", entity_id), ("type", "liability")]),
            "accounts",
        )
    }

    pub fn get_account(&self, mode: DataMode, account_id: &str) -> Result<Option<MethodAccount>> {
        self.call(
            self.client.get(self.url(mode, &format!("/accounts/{}", account_id))),
            "account",
        )
    }

    /// Ask Method to pull fresh data for an account
    pub fn request_update(&self, mode: DataMode, account_id: &str) -> Result<()> {
        let _: Option<JsonValue> = self.call(
            self.client
                .post(self.url(mode, &format!("/accounts/{}/updates", account_id)))
                .json(&json!({})),
            "account update",
        )?;
        Ok(())
    }

    pub fn disconnect_account(&self, mode: DataMode, account_id: &str) -> Result<()> {
        let _: Option<JsonValue> = self.call(
            self.client
                .post(self.url(mode, &format!("/accounts/{}/disconnect", account_id)))
                .json(&json!({})),
            "account disconnect",
        )?;
        Ok(())
    }
}

// =============================================================================
// Decoding into account records
// =============================================================================

/// An account without a holder is taken to belong to the connection
fn held_by(account: &MethodAccount, connection: &ConnectionRecord) -> bool {
    account
        .holder_id
        .as_deref()
        .map_or(true, |holder| holder == connection.session_ref)
}

fn is_connected(account: &MethodAccount) -> bool {
    !matches!(
        account.status.as_deref(),
        Some("disconnected") | Some("closed")
    )
}

/// Decode one Method account. `Ok(None)` for accounts that are not
/// liabilities or no longer connected.
pub fn decode_account(connection: &ConnectionRecord, account: &MethodAccount) -> Result<Option<AccountRecord>> {
    if !is_connected(account) {
        return Ok(None);
    }
    if account.account_type.as_deref().is_some_and(|t| t != "liability") {
        return Ok(None);
    }
    let Some(liability) = &account.liability else {
        return Ok(None);
    };

    let liability_type = liability.liability_type.clone().unwrap_or_default();
    let detail: LiabilityDetail = match liability.details.get(&liability_type) {
        Some(value @ JsonValue::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| Error::decode(format!("Method {} detail: {}", liability_type, e)))?,
        _ => LiabilityDetail::default(),
    };

    let label = liability
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .map(|n| match &liability.mask {
            Some(mask) => format!("{} ({})", n, mask),
            None => n,
        })
        .unwrap_or_else(|| account.id.clone());

    let rate = detail
        .interest_rate_percentage
        .or(detail.interest_rate_percentage_max);

    let mut record = AccountRecord::new(&connection.owner_user_id, AccountSource::Method, label);
    record.provider_account_id = Some(account.id.clone());
    record.institution_name = liability
        .fi_name
        .clone()
        .unwrap_or_else(|| connection.institution_label.clone());
    record.account_category = AccountCategory::from_provider_strings(Some(&liability_type), None);
    record.current_balance = normalize_balance(from_cents(detail.balance).unwrap_or_default());
    record.interest_rate = normalize_rate(rate);
    record.interest_rate_reported = rate.is_some();
    record.minimum_payment = from_cents(detail.next_payment_minimum_amount).map(normalize_balance);
    record.credit_limit = from_cents(detail.credit_limit);
    record.last_payment_date = parse_date(detail.last_payment_date.as_deref());
    record.next_payment_due_date = parse_date(detail.next_payment_due_date.as_deref());
    Ok(Some(record))
}

/// Decode a listing; a malformed account is dropped, not fatal
pub fn decode_accounts(connection: &ConnectionRecord, accounts: &[MethodAccount]) -> Vec<AccountRecord> {
    accounts
        .iter()
        .filter_map(|a| match decode_account(connection, a) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping Method account {}: {}", a.id, e);
                None
            }
        })
        .collect()
}

/// Map a Method webhook onto an event, keyed by entity
pub fn decode_webhook_payload(payload: &JsonValue) -> Result<Option<WebhookEvent>> {
    let hook: WebhookPayload = serde_json::from_value(payload.clone())
        .map_err(|e| Error::decode(format!("Method webhook: {}", e)))?;

    if !(hook.event_type.starts_with("account.") || hook.event_type.starts_with("update.")) {
        return Ok(None);
    }

    let from_path = hook.path.as_deref().and_then(|p| {
        let mut segments = p.split('/').filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some("entities"), Some(id)) => Some(id.to_string()),
            _ => None,
        }
    });

    match hook.holder_id.or(hook.entity_id).or(from_path) {
        Some(entity) => Ok(Some(WebhookEvent::Refresh { item_ref: entity })),
        None => {
            tracing::warn!("Method webhook {} carries no entity id", hook.event_type);
            Ok(None)
        }
    }
}

// =============================================================================
// MethodProvider - implements LiabilityProvider
// =============================================================================

pub struct MethodProvider {
    client: Option<MethodClient>,
}

impl MethodProvider {
    pub fn new(settings: &MethodSettings, timeout_secs: u64) -> Self {
        let client = match MethodClient::new(settings, timeout_secs) {
            Ok(client) => Some(client),
            Err(Error::NotConfigured(_)) => None,
            Err(e) => {
                tracing::warn!("Method client unavailable: {}", e);
                None
            }
        };
        Self { client }
    }

    fn client(&self) -> Result<&MethodClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("method".to_string()))
    }

    /// Trigger a refresh (best effort) and read the account back
    fn refresh_account(
        &self,
        connection: &ConnectionRecord,
        account_id: &str,
    ) -> Result<Option<MethodAccount>> {
        let client = self.client()?;
        if let Err(e) = client.request_update(connection.mode, account_id) {
            tracing::warn!("Method update request failed for {}: {}", account_id, e);
        }
        client.get_account(connection.mode, account_id)
    }
}

impl LiabilityProvider for MethodProvider {
    fn source(&self) -> AccountSource {
        AccountSource::Method
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn initiate_connection(&self, options: &ConnectOptions) -> ConnectResult {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return ConnectResult::failed(e.to_string()),
        };
        let entity_id = match client.create_entity(options) {
            Ok(id) => id,
            Err(e) => return ConnectResult::failed(e.to_string()),
        };
        match client.create_connect_token(options.mode, &entity_id) {
            Ok(token) => ConnectResult {
                success: true,
                connection_ref: Some(entity_id),
                embed_token: Some(token),
                ..Default::default()
            },
            Err(e) => ConnectResult::failed(e.to_string()),
        }
    }

    fn exchange_token(&self, _owner_user_id: &str, public_token: &str, mode: DataMode) -> Result<SessionGrant> {
        let client = self.client()?;
        let entity_id = public_token.trim();
        if entity_id.is_empty() {
            return Err(Error::validation("Method entity id is required"));
        }

        match client.get_entity_status(mode, entity_id)? {
            Some(status) if status == "disabled" => Err(Error::upstream(format!(
                "Method entity {} is disabled",
                entity_id
            ))),
            Some(_) => Ok(SessionGrant {
                session_ref: entity_id.to_string(),
                item_ref: Some(entity_id.to_string()),
                institution_label: DEFAULT_INSTITUTION.to_string(),
            }),
            None => Err(Error::upstream(format!("Method entity {} not found", entity_id))),
        }
    }

    fn terminate_connection(&self, connection: &ConnectionRecord) -> bool {
        if !connection.active {
            return false;
        }
        let Ok(client) = self.client() else {
            return false;
        };
        let accounts = match client.list_liabilities(connection.mode, &connection.session_ref) {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!("Method entity unreachable on disconnect {}: {}", connection.id, e);
                return false;
            }
        };
        for account in accounts.iter().filter(|a| is_connected(a)) {
            if let Err(e) = client.disconnect_account(connection.mode, &account.id) {
                tracing::warn!("Method account {} disconnect failed: {}", account.id, e);
            }
        }
        true
    }

    fn list_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        let accounts = self
            .client()?
            .list_liabilities(connection.mode, &connection.session_ref)?;
        Ok(decode_accounts(connection, &accounts))
    }

    /// Ownership is checked on a plain read before any update is
    /// requested, so another entity's account is never refreshed.
    fn sync_one_account(
        &self,
        connection: &ConnectionRecord,
        provider_account_id: &str,
    ) -> Result<AccountRecord> {
        let not_found = || Error::AccountNotFound(provider_account_id.to_string());

        let current = self
            .client()?
            .get_account(connection.mode, provider_account_id)?
            .ok_or_else(not_found)?;
        if !held_by(&current, connection) {
            return Err(not_found());
        }

        let account = match self.refresh_account(connection, provider_account_id) {
            Ok(Some(fresh)) => fresh,
            Ok(None) => return Err(not_found()),
            Err(e) => {
                tracing::warn!("Method refresh failed for {}, using last read: {}", provider_account_id, e);
                current
            }
        };
        decode_account(connection, &account)?.ok_or_else(not_found)
    }

    fn sync_all_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        let client = self.client()?;
        let listed = client.list_liabilities(connection.mode, &connection.session_ref)?;

        let mut records = Vec::new();
        for account in listed.iter().filter(|a| is_connected(a) && held_by(a, connection)) {
            let fresh = match self.refresh_account(connection, &account.id) {
                Ok(Some(fresh)) => fresh,
                Ok(None) => account.clone(),
                Err(e) => {
                    tracing::warn!("Method refresh failed for {}, using listed data: {}", account.id, e);
                    account.clone()
                }
            };
            match decode_account(connection, &fresh) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping Method account {}: {}", account.id, e),
            }
        }
        Ok(records)
    }

    fn decode_webhook(&self, payload: &JsonValue) -> Result<Option<WebhookEvent>> {
        decode_webhook_payload(payload)
    }
}

// =============================================================================
// Tests
// =============================================================================
