//! SQLite backend implementing every storage collaborator.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{KairosError, KairosResult};
use crate::traits::{EventLog, FactsStore, MemoryService, ProfileStore};
use crate::types::{Event, EventKind, FactsDocument, MemoryEntry, MemoryMetadata, UserProfile};

/// Event log, facts, profiles and memories in one SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> KairosResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KairosError::database(format!("Invalid timestamp '{}': {}", raw, e)))
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> KairosResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> KairosResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> KairosResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| KairosError::Internal("SQLite connection mutex poisoned".to_string()))
    }

    fn init_schema(&self) -> KairosResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                type TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_user_time ON events(user_id, timestamp);

            CREATE TABLE IF NOT EXISTS user_facts (
                user_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                discovery_completed INTEGER NOT NULL DEFAULT 0,
                identity TEXT NOT NULL DEFAULT 'null'
            );

            CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                text TEXT NOT NULL,
                importance INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_memories_user_time ON memories(user_id, timestamp);
        "#,
        )?;
        Ok(())
    }

    /// Append an event. Re-inserting an existing id is ignored.
    pub fn append_event(&self, event: &Event) -> KairosResult<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO events (id, user_id, type, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.user_id,
                event.kind.as_str(),
                serde_json::to_string(&event.payload)?,
                ts(event.timestamp),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Insert or replace a profile.
    pub fn upsert_profile(&self, profile: &UserProfile) -> KairosResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (user_id, created_at, discovery_completed, identity)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                created_at = excluded.created_at,
                discovery_completed = excluded.discovery_completed,
                identity = excluded.identity",
            params![
                profile.user_id,
                ts(profile.created_at),
                profile.discovery_completed,
                serde_json::to_string(&profile.identity)?,
            ],
        )?;
        Ok(())
    }

    /// Record a memory for `user_id`.
    pub fn add_memory(&self, user_id: &str, entry: &MemoryEntry) -> KairosResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO memories (user_id, text, importance, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                entry.text,
                entry.metadata.importance,
                entry.metadata.timestamp.map(ts),
            ],
        )?;
        Ok(())
    }

    fn load_facts(conn: &Connection, user_id: &str) -> KairosResult<FactsDocument> {
        let row: Option<(String, i64, Option<String>)> = conn
            .query_row(
                "SELECT data, version, updated_at FROM user_facts WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((data, version, updated_at)) = row else {
            return Ok(FactsDocument::empty(user_id));
        };
        let data: Map<String, Value> = serde_json::from_str(&data)?;
        Ok(FactsDocument {
            user_id: user_id.to_string(),
            version: version.max(0) as u64,
            data,
            updated_at: updated_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[async_trait]
impl EventLog for SqliteStore {
    async fn fetch_events(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        kinds: Option<&[EventKind]>,
    ) -> KairosResult<Vec<Event>> {
        let mut sql = String::from(
            "SELECT id, user_id, type, payload, timestamp FROM events
             WHERE user_id = ?1 AND timestamp >= ?2",
        );
        let mut args: Vec<String> = vec![user_id.to_string(), ts(since)];
        if let Some(kinds) = kinds {
            if kinds.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> =
                (0..kinds.len()).map(|i| format!("?{}", i + 3)).collect();
            sql.push_str(&format!(" AND type IN ({})", placeholders.join(", ")));
            args.extend(kinds.iter().map(|k| k.as_str().to_string()));
        }
        sql.push_str(" ORDER BY timestamp DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let events = rows
            .into_iter()
            .map(|(id, user_id, kind, payload, timestamp)| {
                Ok(Event {
                    id,
                    user_id,
                    kind: EventKind::parse(&kind),
                    // A corrupt payload reads as null, like a missing one.
                    payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
                    timestamp: parse_ts(&timestamp)?,
                })
            })
            .collect::<KairosResult<Vec<_>>>()?;

        debug!(user_id = %user_id, count = events.len(), "Fetched events");
        Ok(events)
    }
}

#[async_trait]
impl FactsStore for SqliteStore {
    async fn get_facts(&self, user_id: &str) -> KairosResult<FactsDocument> {
        let conn = self.conn()?;
        Self::load_facts(&conn, user_id)
    }

    async fn merge_facts(&self, user_id: &str, patch: Value) -> KairosResult<FactsDocument> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut doc = Self::load_facts(&tx, user_id)?;
        doc.merge(patch, Utc::now());
        tx.execute(
            "INSERT INTO user_facts (user_id, data, version, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                data = excluded.data,
                version = excluded.version,
                updated_at = excluded.updated_at",
            params![
                user_id,
                serde_json::to_string(&doc.data)?,
                doc.version as i64,
                doc.updated_at.map(ts),
            ],
        )?;
        tx.commit()?;

        debug!(user_id = %user_id, version = doc.version, "Merged facts");
        Ok(doc)
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, user_id: &str) -> KairosResult<Option<UserProfile>> {
        let conn = self.conn()?;
        let row: Option<(String, bool, String)> = conn
            .query_row(
                "SELECT created_at, discovery_completed, identity FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(created_at, discovery_completed, identity)| {
            Ok(UserProfile {
                user_id: user_id.to_string(),
                created_at: parse_ts(&created_at)?,
                discovery_completed,
                identity: serde_json::from_str(&identity)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl MemoryService for SqliteStore {
    async fn query_recent_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> KairosResult<Vec<MemoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT text, importance, timestamp FROM memories
             WHERE user_id = ?1
             ORDER BY timestamp IS NULL, timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(text, importance, timestamp)| {
                Ok(MemoryEntry {
                    text,
                    metadata: MemoryMetadata {
                        importance: importance.clamp(0, u8::MAX as i64) as u8,
                        timestamp: timestamp.as_deref().map(parse_ts).transpose()?,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_round_trip_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let old = Event::new("u1", EventKind::HabitTick, json!({"completed": true}), now - Duration::days(2));
        let new = Event::new("u1", EventKind::Debrief, json!({"text": "hi"}), now);
        assert!(store.append_event(&old).unwrap());
        assert!(store.append_event(&new).unwrap());
        assert!(!store.append_event(&new).unwrap());

        let events = store
            .fetch_events("u1", now - Duration::days(30), None)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, new.id);
        assert_eq!(events[1].payload, json!({"completed": true}));

        let debriefs = store
            .fetch_events("u1", now - Duration::days(30), Some(&[EventKind::Debrief]))
            .await
            .unwrap();
        assert_eq!(debriefs.len(), 1);

        let recent = store
            .fetch_events("u1", now - Duration::days(1), None)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_facts_deep_merge_persists_version() {
        let store = SqliteStore::in_memory().unwrap();
        let empty = store.get_facts("u1").await.unwrap();
        assert_eq!(empty.version, 0);
        assert!(empty.is_empty());

        store
            .merge_facts("u1", json!({"identity": {"name": "Sam"}, "tags": [1, 2]}))
            .await
            .unwrap();
        store
            .merge_facts("u1", json!({"identity": {"goal": "run"}, "tags": [3]}))
            .await
            .unwrap();

        let doc = store.get_facts("u1").await.unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.get("identity"), Some(&json!({"name": "Sam", "goal": "run"})));
        assert_eq!(doc.get("tags"), Some(&json!([3])));
        assert!(doc.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_profiles() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_profile("u1").await.unwrap().is_none());

        let profile = UserProfile::new("u1", Utc::now() - Duration::days(20))
            .with_discovery_completed(true)
            .with_identity(json!({"name": "Sam"}));
        store.upsert_profile(&profile).unwrap();

        let loaded = store.get_profile("u1").await.unwrap().unwrap();
        assert!(loaded.discovery_completed);
        assert_eq!(loaded.identity, json!({"name": "Sam"}));
        assert_eq!(loaded.account_age_days(Utc::now()), 20);
    }

    #[tokio::test]
    async fn test_memories_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        store
            .add_memory("u1", &MemoryEntry::new("older", 2, now - Duration::hours(1)))
            .unwrap();
        store
            .add_memory("u1", &MemoryEntry::new("newer", 5, now))
            .unwrap();

        let recent = store.query_recent_memories("u1", 20).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "newer");
        assert_eq!(recent[0].metadata.importance, 5);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("kairos.db");
        let store = SqliteStore::open(&path).unwrap();
        store
            .merge_facts("u1", json!({"a": 1}))
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_facts("u1").await.unwrap().version, 1);
    }
}
