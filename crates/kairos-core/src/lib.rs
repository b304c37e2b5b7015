//! kairos-core - Behavioral-consciousness engine.
//!
//! Derives a bounded, versioned snapshot of a user's behavioral phase,
//! habit patterns and reflective depth from an append-only event log and a
//! per-user facts document.
//!
//! # Example
//!
//! ```ignore
//! use kairos_core::{Collaborators, ConsciousnessEngine, EngineConfig, SqliteStore};
//!
//! let store = Arc::new(SqliteStore::open("kairos.db")?);
//! let engine = ConsciousnessEngine::new(
//!     EngineConfig::default(),
//!     Collaborators {
//!         event_log: store.clone(),
//!         facts: store.clone(),
//!         profiles: store.clone(),
//!         memory: store,
//!         theme_extractor: None,
//!     },
//! )?;
//!
//! let snapshot = engine.build_snapshot("user1").await?;
//! let outcome = engine.evaluate_and_commit_transition("user1").await?;
//! ```

pub mod composer;
pub mod config;
pub mod error;
pub mod lexicon;
pub mod patterns;
pub mod phase;
pub mod reflection;
pub mod store;
pub mod text;
pub mod threads;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use composer::{Collaborators, ConsciousnessEngine, TransitionOutcome};
pub use config::{EngineConfig, LlmProvider, LlmProviderConfig, PhaseThresholds, MAX_WINDOW_DAYS};
pub use error::{ErrorCode, KairosError, KairosResult};
pub use patterns::PatternExtractor;
pub use phase::{determine_phase, should_transition, AiPhase, PhaseSignals};
pub use reflection::{LlmThemeExtractor, ReflectionAnalysis, ReflectionAnalyzer, ThemesSource};
pub use store::{
    InMemoryEventLog, InMemoryFactsStore, InMemoryMemoryService, InMemoryProfileStore,
    SqliteStore,
};
pub use threads::SemanticThreadBuilder;
pub use traits::{
    EventLog, FactsStore, GenerationOptions, Llm, LlmConfig, LlmResponse, MemoryService,
    NoopThemeExtractor, ProfileStore, ResponseFormat, ThemeExtractor, TokenUsage,
};
pub use types::{
    BehaviorPatterns, ConsciousnessSnapshot, EmotionalArc, Event, EventKind, EventPayload,
    FactsDocument, MemoryEntry, Message, MessageRole, NextEvolution, OsPhase, Protocol,
    ReflectionHistory, SemanticThreads, TimeWindow, UserProfile, VoiceIntensity,
};
