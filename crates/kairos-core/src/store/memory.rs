//! In-memory backends for tests and embedding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::KairosResult;
use crate::traits::{EventLog, FactsStore, MemoryService, ProfileStore};
use crate::types::{Event, EventKind, FactsDocument, MemoryEntry, UserProfile};

/// Event log kept in a vector.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, event: Event) {
        self.events.write().await.push(event);
    }

    pub async fn extend(&self, events: impl IntoIterator<Item = Event>) {
        self.events.write().await.extend(events);
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn fetch_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        kinds: Option<&[EventKind]>,
    ) -> KairosResult<Vec<Event>> {
        let events = self.events.read().await;
        let mut matching: Vec<Event> = events
            .iter()
            .filter(|e| e.user_id == user_id && e.timestamp >= since)
            .filter(|e| kinds.map_or(true, |k| k.contains(&e.kind)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }
}

/// Facts documents keyed by user id.
#[derive(Default)]
pub struct InMemoryFactsStore {
    docs: RwLock<HashMap<String, FactsDocument>>,
}

impl InMemoryFactsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactsStore for InMemoryFactsStore {
    async fn get_facts(&self, user_id: &str) -> KairosResult<FactsDocument> {
        Ok(self
            .docs
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| FactsDocument::empty(user_id)))
    }

    async fn merge_facts(
        &self,
        user_id: &str,
        patch: serde_json::Value,
    ) -> KairosResult<FactsDocument> {
        let mut docs = self.docs.write().await;
        let doc = docs
            .entry(user_id.to_string())
            .or_insert_with(|| FactsDocument::empty(user_id));
        doc.merge(patch, Utc::now());
        Ok(doc.clone())
    }
}

/// Profiles keyed by user id.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> KairosResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}

/// Memory service over plain per-user lists.
#[derive(Default)]
pub struct InMemoryMemoryService {
    entries: RwLock<HashMap<String, Vec<MemoryEntry>>>,
}

impl InMemoryMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user_id: &str, entry: MemoryEntry) {
        self.entries
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(entry);
    }
}

#[async_trait]
impl MemoryService for InMemoryMemoryService {
    async fn query_recent_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> KairosResult<Vec<MemoryEntry>> {
        let entries = self.entries.read().await;
        let mut recent: Vec<MemoryEntry> = entries.get(user_id).cloned().unwrap_or_default();
        // Undated entries sort last.
        recent.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        recent.truncate(limit);
        Ok(recent)
    }
}
