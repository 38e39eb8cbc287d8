//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of accounts and connections. Authentication lives elsewhere;
/// this only anchors ownership and cascading deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let user = User::new("user-123", Some("test@example.com".to_string()));
        assert_eq!(user.id, "user-123");
        assert_eq!(user.email.as_deref(), Some("test@example.com"));
    }
}
