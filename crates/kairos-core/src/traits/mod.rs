//! Collaborator traits for kairos providers and stores.

mod llm;
mod memory_service;
mod stores;
mod theme_extractor;

pub use llm::*;
pub use memory_service::*;
pub use stores::*;
pub use theme_extractor::*;
