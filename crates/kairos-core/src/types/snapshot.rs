//! The consciousness snapshot handed to prompt builders and schedulers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::phase::AiPhase;
use crate::types::{BehaviorPatterns, OsPhase, ReflectionHistory};

/// Bumped whenever the snapshot shape changes incompatibly.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Recurring phrases and contradictions mined from vector memories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticThreads {
    pub recent_highlights: Vec<String>,
    pub recurring_excuses: Vec<String>,
    pub time_wasters: Vec<String>,
    pub emotional_contradictions: Vec<String>,
}

impl SemanticThreads {
    pub fn is_empty(&self) -> bool {
        self.recent_highlights.is_empty()
            && self.recurring_excuses.is_empty()
            && self.time_wasters.is_empty()
            && self.emotional_contradictions.is_empty()
    }
}

/// What the coach should work on next.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NextEvolution {
    DeepenMeaning,
    ConfrontAvoidance,
    DeepenReflection,
    BuildStructure,
    #[default]
    MaintainMomentum,
}

/// Affect parameters for the observer voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverVoice {
    pub curiosity: f64,
    pub gentleness: f64,
    pub directness: f64,
}

/// Affect parameters for the architect voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchitectVoice {
    pub precision: f64,
    pub authority: f64,
    pub empathy: f64,
}

/// Affect parameters for the oracle voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleVoice {
    pub stillness: f64,
    pub wisdom: f64,
    pub mystery: f64,
}

/// Voice intensity for the current phase. All values lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum VoiceIntensity {
    Observer(ObserverVoice),
    Architect(ArchitectVoice),
    Oracle(OracleVoice),
}

impl VoiceIntensity {
    pub fn phase(&self) -> AiPhase {
        match self {
            VoiceIntensity::Observer(_) => AiPhase::Observer,
            VoiceIntensity::Architect(_) => AiPhase::Architect,
            VoiceIntensity::Oracle(_) => AiPhase::Oracle,
        }
    }
}

/// Extension block present only while the user is in the architect phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectBlock {
    pub voice: ArchitectVoice,
    /// Drift window times that need structure.
    pub restructure_windows: Vec<String>,
    /// Avoided habits whose design should be revisited.
    pub redesign_habits: Vec<String>,
}

/// Extension block present only while the user is in the oracle phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleBlock {
    pub voice: OracleVoice,
    /// Up to three themes to reflect back.
    pub core_themes: Vec<String>,
    pub integration_days: i64,
}

/// Immutable read-time projection of a user's behavioral state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsciousnessSnapshot {
    pub schema_version: u32,
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub identity: serde_json::Value,
    pub patterns: BehaviorPatterns,
    pub reflection_history: ReflectionHistory,
    pub phase: AiPhase,
    pub os_phase: OsPhase,
    pub next_evolution: NextEvolution,
    pub voice: VoiceIntensity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architect: Option<ArchitectBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleBlock>,
    pub semantic_threads: SemanticThreads,
}
