//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// Provider credentials are missing
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// A provider call failed (network, timeout, upstream error status)
    #[error("Upstream sync failure: {0}")]
    UpstreamSync(String),

    /// A provider payload did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamSync(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// HTTP status used when this error reaches the route boundary
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConfigured(_) | Self::UnknownProvider(_) | Self::Validation(_) => 400,
            Self::ConnectionNotFound(_) | Self::AccountNotFound(_) => 404,
            Self::UpstreamSync(_) | Self::Decode(_) => 502,
            Self::Persistence(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => 500,
        }
    }

    /// Whether the failure is local to one provider call and can be
    /// folded into a sync count instead of failing the request
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamSync(_)
                | Self::Decode(_)
                | Self::AccountNotFound(_)
                | Self::ConnectionNotFound(_)
                | Self::NotConfigured(_)
        )
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON callers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}
