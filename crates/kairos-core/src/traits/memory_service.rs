//! Vector memory service trait.

use async_trait::async_trait;

use crate::error::KairosResult;
use crate::types::MemoryEntry;

/// External vector-indexed memory of free-text user statements.
///
/// Implementations may fail freely; the semantic thread builder treats any
/// error as "no memories".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Up to `limit` most recent memories of `user_id`, newest first.
    async fn query_recent_memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> KairosResult<Vec<MemoryEntry>>;
}
