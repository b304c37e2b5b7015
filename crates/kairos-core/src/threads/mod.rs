//! Semantic threads mined from the vector memory service.
//!
//! The memory service is best-effort: any error or an empty result yields
//! empty threads.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::lexicon;
use crate::text::truncate_chars;
use crate::traits::MemoryService;
use crate::types::{MemoryEntry, SemanticThreads};

pub const HIGHLIGHT_MIN_IMPORTANCE: u8 = 4;
pub const HIGHLIGHT_CHARS: usize = 100;
pub const HIGHLIGHT_LIMIT: usize = 5;
/// Distinct memories a phrase must appear in to count as recurring.
pub const RECURRING_MIN_ENTRIES: usize = 2;
pub const RECURRING_LIMIT: usize = 5;
pub const CONTRADICTION_CHARS: usize = 80;
pub const CONTRADICTION_LIMIT: usize = 3;

/// Builds [`SemanticThreads`] from recent memories.
pub struct SemanticThreadBuilder {
    memory: Arc<dyn MemoryService>,
    limit: usize,
}

impl SemanticThreadBuilder {
    pub fn new(memory: Arc<dyn MemoryService>) -> Self {
        Self { memory, limit: 20 }
    }

    /// Number of recent memories requested per build.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Query recent memories of `user_id` and mine them. Never fails.
    pub async fn build(&self, user_id: &str) -> SemanticThreads {
        let entries = match self.memory.query_recent_memories(user_id, self.limit).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Memory service unavailable, using empty threads");
                return SemanticThreads::default();
            }
        };

        let threads = threads_from_entries(&entries);
        debug!(
            user_id = %user_id,
            memories = entries.len(),
            highlights = threads.recent_highlights.len(),
            excuses = threads.recurring_excuses.len(),
            time_wasters = threads.time_wasters.len(),
            contradictions = threads.emotional_contradictions.len(),
            "Built semantic threads"
        );
        threads
    }
}

/// Mine threads from already-fetched memories, newest first.
pub fn threads_from_entries(entries: &[MemoryEntry]) -> SemanticThreads {
    if entries.is_empty() {
        return SemanticThreads::default();
    }

    SemanticThreads {
        recent_highlights: recent_highlights(entries),
        recurring_excuses: recurring_phrases(entries, lexicon::excuses_in),
        time_wasters: recurring_phrases(entries, lexicon::distractions_in),
        emotional_contradictions: emotional_contradictions(entries),
    }
}

fn recent_highlights(entries: &[MemoryEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| e.metadata.importance >= HIGHLIGHT_MIN_IMPORTANCE)
        .map(|e| truncate_chars(&e.text, HIGHLIGHT_CHARS))
        .take(HIGHLIGHT_LIMIT)
        .collect()
}

/// Phrases found in at least two distinct entries, most frequent first.
///
/// Ties keep lexicon table order.
fn recurring_phrases(
    entries: &[MemoryEntry],
    matcher: fn(&str) -> Vec<&'static str>,
) -> Vec<String> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for entry in entries {
        for phrase in matcher(&entry.text) {
            match counts.iter_mut().find(|(p, _)| *p == phrase) {
                Some((_, n)) => *n += 1,
                None => counts.push((phrase, 1)),
            }
        }
    }

    let table_order = |phrase: &str| {
        lexicon::EXCUSE_PHRASES
            .iter()
            .chain(lexicon::DISTRACTION_PHRASES)
            .position(|p| *p == phrase)
            .unwrap_or(usize::MAX)
    };

    counts.retain(|(_, n)| *n >= RECURRING_MIN_ENTRIES);
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(table_order(a.0).cmp(&table_order(b.0))));
    counts
        .into_iter()
        .take(RECURRING_LIMIT)
        .map(|(p, _)| p.to_string())
        .collect()
}

fn emotional_contradictions(entries: &[MemoryEntry]) -> Vec<String> {
    entries
        .iter()
        .filter(|e| lexicon::has_desire_marker(&e.text) && lexicon::has_negation_marker(&e.text))
        .map(|e| truncate_chars(&e.text, CONTRADICTION_CHARS))
        .take(CONTRADICTION_LIMIT)
        .collect()
}
