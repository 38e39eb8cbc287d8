//! Serde helpers shared by the HTTP provider clients

use chrono::NaiveDate;
use reqwest::blocking::Response;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use crate::domain::result::Error;

/// Deserialize an id that can be number or string
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    match value {
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => Ok(s),
        _ => Err(D::Error::custom("expected number or string for id")),
    }
}

/// Deserialize an optional amount that can be number, string or null.
///
/// Goes through the textual form of the number so 19.99 stays exactly 19.99.
pub(crate) fn deserialize_optional_decimal<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => parse_decimal_text(&n.to_string())
            .map(Some)
            .map_err(D::Error::custom),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => parse_decimal_text(&s).map(Some).map_err(D::Error::custom),
        Some(_) => Err(D::Error::custom("expected number or string for amount")),
    }
}

fn parse_decimal_text(s: &str) -> std::result::Result<Decimal, String> {
    let s = s.trim();
    s.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| format!("invalid decimal '{}': {}", s, e))
}

/// Lenient ISO date: a bad or missing date is treated as absent
pub(crate) fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// Cents to currency units
pub(crate) fn from_cents(cents: Option<i64>) -> Option<Decimal> {
    cents.map(|c| Decimal::new(c, 2))
}

/// Map request errors to user-friendly messages
pub(crate) fn map_request_error(provider: &str, error: reqwest::Error, timeout_secs: u64) -> Error {
    if error.is_timeout() {
        Error::upstream(format!(
            "{} request timed out after {} seconds",
            provider, timeout_secs
        ))
    } else if error.is_connect() {
        Error::upstream(format!("Unable to connect to {} servers", provider))
    } else {
        Error::upstream(format!("{} request failed: {}", provider, error))
    }
}

/// Decode a JSON body, reporting shape mismatches as decode errors
pub(crate) fn decode_body<T: serde::de::DeserializeOwned>(
    provider: &str,
    what: &str,
    response: Response,
) -> crate::domain::result::Result<T> {
    let text = response
        .text()
        .map_err(|e| Error::upstream(format!("{} {} body unreadable: {}", provider, what, e)))?;
    serde_json::from_str(&text)
        .map_err(|e| Error::decode(format!("{} {} response: {}", provider, what, e)))
}
