//! Storage backends for the collaborator traits.

mod memory;
mod sqlite;

pub use memory::{InMemoryEventLog, InMemoryFactsStore, InMemoryMemoryService, InMemoryProfileStore};
pub use sqlite::SqliteStore;
