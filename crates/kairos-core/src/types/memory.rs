//! Entries returned by the vector memory service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to a memory entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMetadata {
    /// 1-5, higher is more important.
    pub importance: u8,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A free-text memory indexed by the vector memory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub text: String,
    #[serde(default)]
    pub metadata: MemoryMetadata,
}

impl MemoryEntry {
    pub fn new(text: impl Into<String>, importance: u8, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            metadata: MemoryMetadata {
                importance,
                timestamp: Some(timestamp),
            },
        }
    }
}
