//! Connection record domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountSource;
use super::result::Error;

/// Institution label used for demo connections
pub const DEMO_INSTITUTION: &str = "Demo Bank";

/// Which environment a connection talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Live,
    Test,
    Demo,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" | "production" => Ok(Self::Live),
            "test" | "sandbox" => Ok(Self::Test),
            "demo" => Ok(Self::Demo),
            other => Err(Error::validation(format!("unknown data mode '{}'", other))),
        }
    }
}

/// A user's authorized session with one provider/institution.
///
/// Never hard-deleted: disconnecting flips `active` off so the row stays
/// available for audit and re-sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub id: Uuid,
    pub owner_user_id: String,
    pub provider: AccountSource,
    /// Access token / entity id. Must never leave the server.
    pub session_ref: String,
    /// Provider-side item or entity id, used to route webhooks
    pub item_ref: Option<String>,
    pub institution_label: String,
    pub mode: DataMode,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Synthesized for a single resolution, never written to storage
    pub ephemeral: bool,
}

impl ConnectionRecord {
    pub fn new(
        owner_user_id: impl Into<String>,
        provider: AccountSource,
        session_ref: impl Into<String>,
        institution_label: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.into(),
            provider,
            session_ref: session_ref.into(),
            item_ref: None,
            institution_label: institution_label.into(),
            mode: DataMode::Live,
            active: true,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
            ephemeral: false,
        }
    }

    /// A throwaway demo connection used when a demo account has to be
    /// resolved but no demo connection row exists
    pub fn ephemeral_demo(owner_user_id: impl Into<String>) -> Self {
        let mut conn = Self::new(
            owner_user_id,
            AccountSource::Demo,
            format!("demo-{}", Uuid::new_v4()),
            DEMO_INSTITUTION,
        );
        conn.mode = DataMode::Demo;
        conn.ephemeral = true;
        conn
    }

    /// Client-safe projection
    pub fn view(&self) -> ConnectionView {
        ConnectionView {
            id: self.id,
            provider: self.provider,
            institution_label: self.institution_label.clone(),
            mode: self.mode,
            active: self.active,
            last_synced_at: self.last_synced_at,
            created_at: self.created_at,
        }
    }
}

/// What a client is allowed to see of a connection (no session reference)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub id: Uuid,
    pub provider: AccountSource,
    pub institution_label: String,
    pub mode: DataMode,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
