//! Plaid API client
//!
//! Liability data through Plaid Link: a link token starts the flow, the
//! public token it yields is exchanged for an access token, and
//! `/accounts/get` + `/liabilities/get` supply balances, APRs and payment
//! schedules for credit and loan accounts.
//!
//! API Documentation: https://plaid.com/docs/api/products/liabilities/

use std::time::Duration;

use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::wire::{decode_body, deserialize_optional_decimal, map_request_error, parse_date};
use crate::config::PlaidSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    normalize_balance, normalize_rate, AccountCategory, AccountRecord, AccountSource,
    ConnectionRecord, DataMode,
};
use crate::ports::{
    find_in_batch, ConnectOptions, ConnectResult, LiabilityProvider, SessionGrant, WebhookEvent,
};

const PROVIDER: &str = "Plaid";

pub const PLAID_SANDBOX_URL: &str = "https://sandbox.plaid.com";
pub const PLAID_DEVELOPMENT_URL: &str = "https://development.plaid.com";
pub const PLAID_PRODUCTION_URL: &str = "https://production.plaid.com";

/// Institution label when Plaid cannot tell us the bank's name
const FALLBACK_INSTITUTION: &str = "Plaid";

/// Resolve an environment name to its API host
pub fn environment_url(environment: Option<&str>) -> &'static str {
    match environment.map(|e| e.trim().to_lowercase()).as_deref() {
        Some("production") | Some("live") => PLAID_PRODUCTION_URL,
        Some("development") => PLAID_DEVELOPMENT_URL,
        _ => PLAID_SANDBOX_URL,
    }
}

// =============================================================================
// Wire models
// =============================================================================

#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkTokenResponse {
    link_token: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Debug, Deserialize)]
struct ItemGetResponse {
    item: PlaidItem,
}

#[derive(Debug, Deserialize)]
struct PlaidItem {
    #[serde(default)]
    institution_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstitutionResponse {
    institution: PlaidInstitution,
}

#[derive(Debug, Deserialize)]
struct PlaidInstitution {
    name: String,
}

/// `/accounts/get` body. Entries are decoded one at a time by
/// `into_accounts`; malformed ones are skipped.
#[derive(Debug, Deserialize)]
pub struct AccountsGetResponse {
    #[serde(default)]
    pub accounts: Vec<JsonValue>,
}

impl AccountsGetResponse {
    pub fn into_accounts(self) -> Vec<PlaidAccount> {
        self.accounts
            .into_iter()
            .filter_map(|raw| {
                let id = raw
                    .get("account_id")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("<no id>")
                    .to_string();
                match serde_json::from_value::<PlaidAccount>(raw) {
                    Ok(account) => Some(account),
                    Err(e) => {
                        tracing::warn!("Skipping malformed Plaid account {}: {}", id, e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub balances: PlaidBalances,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaidBalances {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub current: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub limit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct LiabilitiesGetResponse {
    pub liabilities: PlaidLiabilities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaidLiabilities {
    #[serde(default)]
    pub credit: Option<Vec<CreditLiability>>,
    #[serde(default)]
    pub student: Option<Vec<StudentLiability>>,
    #[serde(default)]
    pub mortgage: Option<Vec<MortgageLiability>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub aprs: Vec<PlaidApr>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub last_payment_date: Option<String>,
    #[serde(default)]
    pub next_payment_due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaidApr {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub apr_percentage: Option<Decimal>,
    #[serde(default)]
    pub apr_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub interest_rate_percentage: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub minimum_payment_amount: Option<Decimal>,
    #[serde(default)]
    pub last_payment_date: Option<String>,
    #[serde(default)]
    pub next_payment_due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MortgageLiability {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub interest_rate: Option<MortgageRate>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub next_monthly_payment: Option<Decimal>,
    #[serde(default)]
    pub last_payment_date: Option<String>,
    #[serde(default)]
    pub next_payment_due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MortgageRate {
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    webhook_type: String,
    #[serde(default)]
    webhook_code: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    error: Option<PlaidErrorBody>,
}

// =============================================================================
// Plaid HTTP Client
// =============================================================================

/// Plaid API client
#[derive(Debug)]
pub struct PlaidClient {
    client: Client,
    client_id: String,
    secret: String,
    base_url: String,
    /// Set when `base_url` was overridden; every mode then goes there
    pinned: bool,
    timeout_secs: u64,
}

impl PlaidClient {
    pub fn new(settings: &PlaidSettings, timeout_secs: u64) -> Result<Self> {
        let client_id = settings
            .client_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("plaid client id missing".to_string()))?;
        let secret = settings
            .secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("plaid secret missing".to_string()))?;

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
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            base_url,
            pinned,
            timeout_secs,
        })
    }

    fn base_for(&self, mode: DataMode) -> &str {
        if mode == DataMode::Test && !self.pinned {
            PLAID_SANDBOX_URL
        } else {
            &self.base_url
        }
    }

    /// POST a JSON body with credentials merged in
    fn post<T: DeserializeOwned>(&self, mode: DataMode, path: &str, mut body: JsonValue) -> Result<T> {
        body["client_id"] = json!(self.client_id);
        body["secret"] = json!(self.secret);

        let url = format!("{}{}", self.base_for(mode), path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| map_request_error(PROVIDER, e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), response));
        }

        decode_body(PROVIDER, path, response)
    }

    pub fn create_link_token(&self, options: &ConnectOptions) -> Result<String> {
        let mut body = json!({
            "client_name": "Debtline",
            "user": { "client_user_id": options.owner_user_id },
            "products": ["liabilities"],
            "country_codes": ["US"],
            "language": "en",
        });
        if let Some(webhook) = &options.webhook_url {
            body["webhook"] = json!(webhook);
        }
        if let Some(redirect) = &options.return_url {
            body["redirect_uri"] = json!(redirect);
        }

        let resp: LinkTokenResponse = self.post(options.mode, "/link/token/create", body)?;
        Ok(resp.link_token)
    }

    /// Returns (access_token, item_id)
    pub fn exchange_public_token(&self, mode: DataMode, public_token: &str) -> Result<(String, String)> {
        let resp: ExchangeResponse = self.post(
            mode,
            "/item/public_token/exchange",
            json!({ "public_token": public_token }),
        )?;
        Ok((resp.access_token, resp.item_id))
    }

    pub fn institution_name(&self, mode: DataMode, access_token: &str) -> Result<Option<String>> {
        let item: ItemGetResponse =
            self.post(mode, "/item/get", json!({ "access_token": access_token }))?;
        let Some(institution_id) = item.item.institution_id else {
            return Ok(None);
        };

        let resp: InstitutionResponse = self.post(
            mode,
            "/institutions/get_by_id",
            json!({ "institution_id": institution_id, "country_codes": ["US"] }),
        )?;
        Ok(Some(resp.institution.name))
    }

    pub fn get_accounts(&self, mode: DataMode, access_token: &str) -> Result<Vec<PlaidAccount>> {
        let resp: AccountsGetResponse =
            self.post(mode, "/accounts/get", json!({ "access_token": access_token }))?;
        Ok(resp.into_accounts())
    }

    pub fn get_liabilities(&self, mode: DataMode, access_token: &str) -> Result<PlaidLiabilities> {
        let resp: LiabilitiesGetResponse =
            self.post(mode, "/liabilities/get", json!({ "access_token": access_token }))?;
        Ok(resp.liabilities)
    }

    pub fn remove_item(&self, mode: DataMode, access_token: &str) -> Result<()> {
        let _: JsonValue = self.post(mode, "/item/remove", json!({ "access_token": access_token }))?;
        Ok(())
    }
}

/// Plaid reports failures as `{error_type, error_code, error_message}`
fn error_from_response(status: u16, response: reqwest::blocking::Response) -> Error {
    let body = response.text().unwrap_or_default();
    match serde_json::from_str::<PlaidErrorBody>(&body) {
        Ok(err) => Error::upstream(format!(
            "Plaid {} ({}): {}",
            err.error_code.as_deref().unwrap_or("ERROR"),
            err.error_type.as_deref().unwrap_or("UNKNOWN"),
            err.error_message.as_deref().unwrap_or("no message"),
        )),
        Err(_) => Error::upstream(format!("Plaid API error: HTTP {}", status)),
    }
}

// =============================================================================
// Decoding into account records
// =============================================================================

/// Account types that carry debt; depository and investment accounts are dropped
fn is_liability_type(account_type: &str) -> bool {
    matches!(account_type.to_lowercase().as_str(), "credit" | "loan")
}

/// Purchase APR first, then whatever APR is listed first
fn preferred_apr(aprs: &[PlaidApr]) -> Option<Decimal> {
    aprs.iter()
        .find(|a| a.apr_type.as_deref() == Some("purchase_apr"))
        .or_else(|| aprs.first())
        .and_then(|a| a.apr_percentage)
}

/// Fields read from whichever liability detail matches an account
#[derive(Debug, Default)]
struct LiabilityDetail {
    rate: Option<Decimal>,
    minimum_payment: Option<Decimal>,
    last_payment_date: Option<String>,
    next_payment_due_date: Option<String>,
}

fn liability_detail(liabilities: &PlaidLiabilities, account_id: &str) -> LiabilityDetail {
    let matches = |id: &Option<String>| id.as_deref() == Some(account_id);

    if let Some(credit) = liabilities.credit.iter().flatten().find(|c| matches(&c.account_id)) {
        return LiabilityDetail {
            rate: preferred_apr(&credit.aprs),
            minimum_payment: credit.minimum_payment_amount,
            last_payment_date: credit.last_payment_date.clone(),
            next_payment_due_date: credit.next_payment_due_date.clone(),
        };
    }
    if let Some(student) = liabilities.student.iter().flatten().find(|s| matches(&s.account_id)) {
        return LiabilityDetail {
            rate: student.interest_rate_percentage,
            minimum_payment: student.minimum_payment_amount,
            last_payment_date: student.last_payment_date.clone(),
            next_payment_due_date: student.next_payment_due_date.clone(),
        };
    }
    if let Some(mortgage) = liabilities.mortgage.iter().flatten().find(|m| matches(&m.account_id)) {
        return LiabilityDetail {
            rate: mortgage.interest_rate.as_ref().and_then(|r| r.percentage),
            minimum_payment: mortgage.next_monthly_payment,
            last_payment_date: mortgage.last_payment_date.clone(),
            next_payment_due_date: mortgage.next_payment_due_date.clone(),
        };
    }
    LiabilityDetail::default()
}

/// Turn a Plaid accounts/liabilities pair into account records.
///
/// `liabilities` is `None` when `/liabilities/get` failed; accounts are
/// still returned, just without rates or payment details.
pub fn decode_accounts(
    connection: &ConnectionRecord,
    accounts: &[PlaidAccount],
    liabilities: Option<&PlaidLiabilities>,
) -> Vec<AccountRecord> {
    accounts
        .iter()
        .filter(|a| is_liability_type(&a.account_type))
        .map(|a| {
            let detail = liabilities
                .map(|l| liability_detail(l, &a.account_id))
                .unwrap_or_default();

            let label = if a.name.trim().is_empty() {
                a.official_name.clone().unwrap_or_else(|| a.account_id.clone())
            } else {
                a.name.clone()
            };

            let mut record = AccountRecord::new(&connection.owner_user_id, AccountSource::Plaid, label);
            record.provider_account_id = Some(a.account_id.clone());
            record.institution_name = connection.institution_label.clone();
            record.account_category =
                AccountCategory::from_provider_strings(Some(&a.account_type), a.subtype.as_deref());
            record.current_balance = normalize_balance(a.balances.current.unwrap_or_default());
            record.interest_rate = normalize_rate(detail.rate);
            record.interest_rate_reported = detail.rate.is_some();
            record.minimum_payment = detail.minimum_payment.map(normalize_balance);
            record.credit_limit = a.balances.limit;
            record.last_payment_date = parse_date(detail.last_payment_date.as_deref());
            record.next_payment_due_date = parse_date(detail.next_payment_due_date.as_deref());
            record
        })
        .collect()
}

/// Map a Plaid webhook payload onto an event
pub fn decode_webhook_payload(payload: &JsonValue) -> Result<Option<WebhookEvent>> {
    let hook: WebhookPayload = serde_json::from_value(payload.clone())
        .map_err(|e| Error::decode(format!("Plaid webhook: {}", e)))?;

    let code = hook.webhook_code.as_deref().unwrap_or_default();
    let refresh = matches!(hook.webhook_type.as_str(), "LIABILITIES" | "TRANSACTIONS")
        || code == "DEFAULT_UPDATE";
    let login_required = hook.webhook_type == "ITEM"
        && (code == "PENDING_EXPIRATION"
            || (code == "ERROR"
                && hook.error.as_ref().and_then(|e| e.error_code.as_deref())
                    == Some("ITEM_LOGIN_REQUIRED")));

    if !refresh && !login_required {
        return Ok(None);
    }

    let item_ref = hook
        .item_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::decode("Plaid webhook without item_id"))?;

    Ok(Some(if refresh {
        WebhookEvent::Refresh { item_ref }
    } else {
        WebhookEvent::ReauthRequired { item_ref }
    }))
}

// =============================================================================
// PlaidProvider - implements LiabilityProvider
// =============================================================================

pub struct PlaidProvider {
    client: Option<PlaidClient>,
}

impl PlaidProvider {
    /// Build from settings. Missing credentials leave the provider
    /// registered but unavailable.
    pub fn new(settings: &PlaidSettings, timeout_secs: u64) -> Self {
        let client = match PlaidClient::new(settings, timeout_secs) {
            Ok(client) => Some(client),
            Err(Error::NotConfigured(_)) => None,
            Err(e) => {
                tracing::warn!("Plaid client unavailable: {}", e);
                None
            }
        };
        Self { client }
    }

    fn client(&self) -> Result<&PlaidClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("plaid".to_string()))
    }
}

impl LiabilityProvider for PlaidProvider {
    fn source(&self) -> AccountSource {
        AccountSource::Plaid
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn initiate_connection(&self, options: &ConnectOptions) -> ConnectResult {
        let client = match self.client() {
            Ok(c) => c,
            Err(e) => return ConnectResult::failed(e.to_string()),
        };
        match client.create_link_token(options) {
            Ok(link_token) => ConnectResult {
                success: true,
                embed_token: Some(link_token),
                ..Default::default()
            },
            Err(e) => ConnectResult::failed(e.to_string()),
        }
    }

    fn exchange_token(&self, _owner_user_id: &str, public_token: &str, mode: DataMode) -> Result<SessionGrant> {
        let client = self.client()?;
        let (access_token, item_id) = client.exchange_public_token(mode, public_token)?;

        let institution_label = match client.institution_name(mode, &access_token) {
            Ok(Some(name)) => name,
            Ok(None) => FALLBACK_INSTITUTION.to_string(),
            Err(e) => {
                tracing::warn!("Plaid institution lookup failed: {}", e);
                FALLBACK_INSTITUTION.to_string()
            }
        };

        Ok(SessionGrant {
            session_ref: access_token,
            item_ref: Some(item_id),
            institution_label,
        })
    }

    fn terminate_connection(&self, connection: &ConnectionRecord) -> bool {
        if !connection.active {
            return false;
        }
        let Ok(client) = self.client() else {
            return false;
        };
        match client.remove_item(connection.mode, &connection.session_ref) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Plaid item removal failed for {}: {}", connection.id, e);
                false
            }
        }
    }

    fn list_accounts(&self, connection: &ConnectionRecord) -> Result<Vec<AccountRecord>> {
        let client = self.client()?;
        let accounts = client.get_accounts(connection.mode, &connection.session_ref)?;

        let liabilities = match client.get_liabilities(connection.mode, &connection.session_ref) {
            Ok(l) => Some(l),
            Err(e) => {
                tracing::warn!("Plaid liabilities unavailable for {}: {}", connection.id, e);
                None
            }
        };

        Ok(decode_accounts(connection, &accounts, liabilities.as_ref()))
    }

    fn sync_one_account(
        &self,
        connection: &ConnectionRecord,
        provider_account_id: &str,
    ) -> Result<AccountRecord> {
        find_in_batch(self.list_accounts(connection)?, provider_account_id)
    }

    fn decode_webhook(&self, payload: &JsonValue) -> Result<Option<WebhookEvent>> {
        decode_webhook_payload(payload)
    }
}

// =============================================================================
// Tests
// =============================================================================
