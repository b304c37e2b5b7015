//! Storage collaborator traits: event log, facts store and profile store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::KairosResult;
use crate::types::{Event, EventKind, FactsDocument, UserProfile};

/// Read side of the append-only event log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Events of `user_id` at or after `since`, newest first.
    ///
    /// When `kinds` is given, only events of those kinds are returned.
    async fn fetch_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        kinds: Option<&[EventKind]>,
    ) -> KairosResult<Vec<Event>>;
}

/// Per-user facts document with deep-merge writes.
#[async_trait]
pub trait FactsStore: Send + Sync {
    /// The user's document; an empty document (version 0) if none exists.
    async fn get_facts(&self, user_id: &str) -> KairosResult<FactsDocument>;

    /// Deep-merge `patch` into the user's document atomically and return the
    /// merged result.
    async fn merge_facts(
        &self,
        user_id: &str,
        patch: serde_json::Value,
    ) -> KairosResult<FactsDocument>;
}

/// Account profile lookup.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> KairosResult<Option<UserProfile>>;
}
