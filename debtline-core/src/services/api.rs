//! HTTP surface - request/response shapes and route handlers
//!
//! Handlers are transport-agnostic: each one takes the already-authenticated
//! owner and a parsed JSON body and returns a status plus JSON body. A web
//! framework only has to extract those and write the response. Webhook
//! signature verification belongs to that outer layer as well.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountSource, DataMode};
use crate::ports::ConnectOptions;
use crate::DebtlineContext;

/// Status code and JSON body of a handled request
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl ApiResponse {
    pub fn ok(body: JsonValue) -> Self {
        Self { status: 200, body }
    }

    /// `{success: false, error}`. Internal failures get a generic message.
    pub fn from_error(error: &Error) -> Self {
        let status = error.http_status();
        let message = match status {
            500 => "Internal server error".to_string(),
            502 => "Upstream provider request failed".to_string(),
            _ => error.to_string(),
        };
        if status >= 500 {
            tracing::warn!("Request failed: {}", error);
        }
        Self {
            status,
            body: json!({ "success": false, "error": message }),
        }
    }

    fn not_found(message: &str) -> Self {
        Self {
            status: 404,
            body: json!({ "success": false, "error": message }),
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: 401,
            body: json!({ "success": false, "error": "Unauthorized" }),
        }
    }

    fn success() -> Self {
        Self::ok(json!({ "success": true }))
    }
}

fn respond<T: Serialize>(result: Result<T>) -> ApiResponse {
    match result.and_then(|value| serde_json::to_value(value).map_err(Error::from)) {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => ApiResponse::from_error(&e),
    }
}

// === Request bodies ===

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    #[serde(default)]
    pub data_mode: Option<DataMode>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTokenRequest {
    pub public_token: String,
    #[serde(default)]
    pub data_mode: Option<DataMode>,
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &JsonValue) -> Result<T> {
    // An absent body reads as an empty object
    let body = if body.is_null() { json!({}) } else { body.clone() };
    serde_json::from_value(body).map_err(|e| Error::validation(format!("invalid request body: {}", e)))
}

fn parse_source(raw: &str) -> Result<AccountSource> {
    AccountSource::from_str(raw)
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::validation(format!("invalid id '{}'", raw)))
}

// === Handlers ===

/// `POST /providers/{source}/connect`
pub fn connect(ctx: &DebtlineContext, owner_user_id: &str, source: &str, body: &JsonValue) -> ApiResponse {
    respond(parse_source(source).and_then(|source| {
        let request: ConnectRequest = parse_body(body)?;
        let options = ConnectOptions {
            owner_user_id: owner_user_id.to_string(),
            mode: request.data_mode.unwrap_or_default(),
            return_url: request.return_url,
            webhook_url: request.webhook_url,
        };
        ctx.provider_manager.connect(source, &options)
    }))
}

/// `POST /providers/{source}/exchange-token`
pub fn exchange_token(
    ctx: &DebtlineContext,
    owner_user_id: &str,
    source: &str,
    body: &JsonValue,
) -> ApiResponse {
    respond(parse_source(source).and_then(|source| {
        let request: ExchangeTokenRequest = parse_body(body)?;
        if request.public_token.trim().is_empty() {
            return Err(Error::validation("publicToken is required"));
        }
        ctx.provider_manager.exchange_token(
            owner_user_id,
            source,
            &request.public_token,
            request.data_mode.unwrap_or_default(),
        )
    }))
}

/// `POST /providers/sync`
pub fn sync_all(ctx: &DebtlineContext, owner_user_id: &str) -> ApiResponse {
    respond(ctx.provider_manager.sync_all_for_user(owner_user_id))
}

/// `POST /providers/sync/{accountId}`
pub fn sync_account(ctx: &DebtlineContext, owner_user_id: &str, account_id: &str) -> ApiResponse {
    let result = parse_id(account_id)
        .and_then(|id| ctx.provider_manager.sync_one_account(owner_user_id, id));
    match result {
        Ok(true) => ApiResponse::success(),
        Ok(false) => ApiResponse::not_found("Account not found or could not be synced"),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// `DELETE /providers/{source}/{connectionId}`
pub fn disconnect(
    ctx: &DebtlineContext,
    owner_user_id: &str,
    source: &str,
    connection_id: &str,
) -> ApiResponse {
    let result = parse_source(source).and_then(|source| {
        let id = parse_id(connection_id)?;
        ctx.provider_manager.disconnect(owner_user_id, source, id)
    });
    match result {
        Ok(true) => ApiResponse::success(),
        Ok(false) => ApiResponse::not_found("Connection not found"),
        Err(e) => ApiResponse::from_error(&e),
    }
}

/// `POST /providers/{source}/webhook`
pub fn webhook(ctx: &DebtlineContext, source: &str, body: &JsonValue) -> ApiResponse {
    respond(parse_source(source).and_then(|source| ctx.provider_manager.handle_webhook(source, body)))
}

/// `GET /providers/connections`
pub fn list_connections(ctx: &DebtlineContext, owner_user_id: &str) -> ApiResponse {
    respond(ctx.provider_manager.list_connections(owner_user_id))
}

/// `GET /accounts`
pub fn list_accounts(ctx: &DebtlineContext, owner_user_id: &str) -> ApiResponse {
    respond(ctx.account_service.list_visible(owner_user_id))
}

/// `GET /accounts/summary`
pub fn summary(ctx: &DebtlineContext, owner_user_id: &str) -> ApiResponse {
    respond(ctx.summary_service.summarize(owner_user_id))
}

/// Dispatch a request to its handler.
///
/// `owner_user_id` is whatever the authentication layer resolved; `None`
/// means unauthenticated, which only the webhook route accepts.
pub fn route(
    ctx: &DebtlineContext,
    method: &str,
    path: &str,
    owner_user_id: Option<&str>,
    body: &JsonValue,
) -> ApiResponse {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let method = method.to_ascii_uppercase();

    if let ("POST", ["providers", source, "webhook"]) = (method.as_str(), segments.as_slice()) {
        return webhook(ctx, source, body);
    }

    let Some(owner) = owner_user_id else {
        return ApiResponse::unauthorized();
    };

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["providers", "sync"]) => sync_all(ctx, owner),
        ("POST", ["providers", "sync", account_id]) => sync_account(ctx, owner, account_id),
        ("GET", ["providers", "connections"]) => list_connections(ctx, owner),
        ("POST", ["providers", source, "connect"]) => connect(ctx, owner, source, body),
        ("POST", ["providers", source, "exchange-token"]) => exchange_token(ctx, owner, source, body),
        ("DELETE", ["providers", source, connection_id]) => disconnect(ctx, owner, source, connection_id),
        ("GET", ["accounts"]) => list_accounts(ctx, owner),
        ("GET", ["accounts", "summary"]) => summary(ctx, owner),
        _ => ApiResponse::not_found("Route not found"),
    }
}
