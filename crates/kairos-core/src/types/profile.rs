//! User profile: identity flags and account age.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity data owned by the account service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Whether the onboarding discovery conversation was completed.
    #[serde(default)]
    pub discovery_completed: bool,
    /// Passed through to the snapshot untouched.
    #[serde(default)]
    pub identity: serde_json::Value,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at,
            discovery_completed: false,
            identity: serde_json::Value::Null,
        }
    }

    pub fn with_discovery_completed(mut self, completed: bool) -> Self {
        self.discovery_completed = completed;
        self
    }

    pub fn with_identity(mut self, identity: serde_json::Value) -> Self {
        self.identity = identity;
        self
    }

    /// Whole days since account creation, never negative.
    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }
}
