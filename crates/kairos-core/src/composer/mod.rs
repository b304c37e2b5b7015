//! Consciousness composer: the engine's two public entry points.
//!
//! - [`ConsciousnessEngine::build_snapshot`] is read-only and safe to call
//!   concurrently for any user.
//! - [`ConsciousnessEngine::evaluate_and_commit_transition`] is the single
//!   writer of phase bookkeeping. Commits for one user are serialized.

mod evolution;
mod voice;

pub use evolution::next_evolution;
pub use voice::{
    architect_voice, observer_voice, oracle_voice, voice_intensity, OBSERVER_FULL_THEMES,
    ORACLE_FULL_DAYS,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::KairosResult;
use crate::patterns::PatternExtractor;
use crate::phase::{determine_phase, should_transition, AiPhase, PhaseSignals};
use crate::reflection::{ReflectionAnalysis, ReflectionAnalyzer, ThemesSource};
use crate::threads::SemanticThreadBuilder;
use crate::traits::{EventLog, FactsStore, MemoryService, ProfileStore, ThemeExtractor};
use crate::types::{
    ArchitectBlock, BehaviorPatterns, ConsciousnessSnapshot, FactsDocument, FactsPatch,
    OracleBlock, OsPhase, UserProfile, SNAPSHOT_SCHEMA_VERSION,
};

/// Themes carried into the oracle block.
pub const ORACLE_CORE_THEMES: usize = 3;

/// External collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub event_log: Arc<dyn EventLog>,
    pub facts: Arc<dyn FactsStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub memory: Arc<dyn MemoryService>,
    /// `None` when no LLM is configured.
    pub theme_extractor: Option<Arc<dyn ThemeExtractor>>,
}

/// Result of [`ConsciousnessEngine::evaluate_and_commit_transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub transitioned: bool,
    /// Phase before evaluation.
    pub from: AiPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<AiPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl TransitionOutcome {
    fn stayed(from: AiPhase) -> Self {
        Self {
            transitioned: false,
            from,
            to: None,
            at: None,
        }
    }
}

/// How much of `os_phase` the facts document records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseRecord {
    Absent,
    /// Recorded without a readable `startedAt`.
    MissingStart,
    Complete,
}

/// Everything both entry points derive before they diverge.
struct UserState {
    facts: FactsDocument,
    profile: Option<UserProfile>,
    patterns: BehaviorPatterns,
    reflection: ReflectionAnalysis,
    os_phase: OsPhase,
    phase_record: PhaseRecord,
    signals: PhaseSignals,
}

/// The behavioral-consciousness engine.
pub struct ConsciousnessEngine {
    event_log: Arc<dyn EventLog>,
    facts: Arc<dyn FactsStore>,
    profiles: Arc<dyn ProfileStore>,
    patterns: PatternExtractor,
    reflection: ReflectionAnalyzer,
    threads: SemanticThreadBuilder,
    config: EngineConfig,
    commit_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConsciousnessEngine {
    /// Create an engine over `collaborators`. Fails on an invalid config.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> KairosResult<Self> {
        config.validate()?;
        Ok(Self {
            event_log: collaborators.event_log,
            facts: collaborators.facts,
            profiles: collaborators.profiles,
            patterns: PatternExtractor::from_config(&config),
            reflection: ReflectionAnalyzer::from_config(collaborators.theme_extractor, &config),
            threads: SemanticThreadBuilder::new(collaborators.memory).with_limit(config.memory_limit),
            config,
            commit_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the read-only snapshot for `user_id` as of now.
    pub async fn build_snapshot(&self, user_id: &str) -> KairosResult<ConsciousnessSnapshot> {
        self.build_snapshot_at(user_id, Utc::now()).await
    }

    /// Build the snapshot as of `now`. Never writes.
    pub async fn build_snapshot_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> KairosResult<ConsciousnessSnapshot> {
        let (state, semantic_threads) =
            tokio::join!(self.load_state(user_id, now), self.threads.build(user_id));
        let state = state?;

        let thresholds = &self.config.phase;
        let phase = determine_phase(state.os_phase.current_phase, &state.signals, thresholds);
        let days_in_current = if phase == state.os_phase.current_phase {
            state.os_phase.days_in_phase
        } else {
            0
        };

        let themes = &state.reflection.themes;
        let voice = voice_intensity(
            phase,
            themes.len(),
            state.patterns.consistency_score,
            days_in_current,
        );
        let next_evolution = next_evolution(
            &state.patterns,
            themes.len(),
            state.reflection.depth_score,
        );

        let architect = (phase == AiPhase::Architect).then(|| ArchitectBlock {
            voice: architect_voice(state.patterns.consistency_score),
            restructure_windows: state
                .patterns
                .drift_windows
                .iter()
                .map(|w| w.time.clone())
                .collect(),
            redesign_habits: state.patterns.avoidance_triggers.clone(),
        });
        let oracle = (phase == AiPhase::Oracle).then(|| OracleBlock {
            voice: oracle_voice(days_in_current),
            core_themes: themes.iter().take(ORACLE_CORE_THEMES).cloned().collect(),
            integration_days: days_in_current,
        });

        let identity = state
            .profile
            .as_ref()
            .map(|p| p.identity.clone())
            .filter(|v| !v.is_null())
            .or_else(|| state.facts.identity().cloned())
            .unwrap_or(serde_json::Value::Null);

        debug!(
            user_id = %user_id,
            phase = %phase,
            recorded_phase = %state.os_phase.current_phase,
            next_evolution = %next_evolution,
            "Built consciousness snapshot"
        );

        Ok(ConsciousnessSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            user_id: user_id.to_string(),
            generated_at: now,
            identity,
            reflection_history: state.reflection.to_history(state.patterns.emotional_arc),
            patterns: state.patterns,
            phase,
            os_phase: state.os_phase,
            next_evolution,
            voice,
            architect,
            oracle,
            semantic_threads,
        })
    }

    /// Evaluate the committed transition rule for `user_id` and persist.
    pub async fn evaluate_and_commit_transition(
        &self,
        user_id: &str,
    ) -> KairosResult<TransitionOutcome> {
        self.evaluate_and_commit_transition_at(user_id, Utc::now()).await
    }

    /// Evaluate and commit as of `now`.
    ///
    /// Always stores fresh `behaviorPatterns` and `reflectionHistory`; stored
    /// themes are kept when the theme call degraded. The phase is advanced
    /// only if the stored phase still equals the phase the decision was made
    /// from, so a repeated call cannot append the same transition twice.
    pub async fn evaluate_and_commit_transition_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> KairosResult<TransitionOutcome> {
        let lock = self.commit_lock(user_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.commit_locked(user_id, now).await
        };
        self.release_commit_lock(user_id, lock).await;
        outcome
    }

    async fn commit_locked(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> KairosResult<TransitionOutcome> {
        let state = self.load_state(user_id, now).await?;
        let from = state.os_phase.current_phase;
        let target = should_transition(from, &state.signals, &self.config.phase);

        let history = state.reflection.to_history(state.patterns.emotional_arc);
        let mut patch = FactsPatch::new().behavior_patterns(&state.patterns.clone().analyzed_at(now));
        // A degraded theme call says nothing about the themes already stored.
        patch = if state.reflection.themes_source == ThemesSource::Degraded {
            patch.reflection_scores(&history)
        } else {
            patch.reflection_history(&history)
        };

        let mut outcome = TransitionOutcome::stayed(from);
        if let Some(to) = target {
            // Another writer may have moved the phase since it was read.
            let stored = self
                .facts
                .get_facts(user_id)
                .await?
                .os_phase(now)
                .map(|p| p.current_phase)
                .unwrap_or(AiPhase::Observer);

            if stored == from {
                patch = patch.os_phase(&state.os_phase.advanced(to, now));
                outcome = TransitionOutcome {
                    transitioned: true,
                    from,
                    to: Some(to),
                    at: Some(now),
                };
            } else {
                debug!(user_id = %user_id, from = %from, stored = %stored, "Phase changed concurrently, skipping transition");
            }
        } else {
            patch = match state.phase_record {
                PhaseRecord::Absent => patch.os_phase(&state.os_phase),
                PhaseRecord::MissingStart => patch.os_phase_started_at(state.os_phase.started_at),
                PhaseRecord::Complete => patch,
            };
        }

        let doc = self.facts.merge_facts(user_id, patch.into_value()).await?;

        if outcome.transitioned {
            info!(
                user_id = %user_id,
                from = %from,
                to = %outcome.to.unwrap_or(from),
                facts_version = doc.version,
                "Committed phase transition"
            );
        } else {
            debug!(user_id = %user_id, phase = %from, facts_version = doc.version, "No phase transition");
        }
        Ok(outcome)
    }

    async fn commit_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.commit_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Drop `lock` and forget the user's entry once no other commit holds it.
    async fn release_commit_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.commit_locks.lock().await;
        drop(lock);
        if locks
            .get(user_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(user_id);
        }
    }

    /// Users with a commit in flight or waiting.
    pub async fn pending_commits(&self) -> usize {
        self.commit_locks.lock().await.len()
    }

    async fn load_state(&self, user_id: &str, now: DateTime<Utc>) -> KairosResult<UserState> {
        let since = self.patterns.window_start(now);
        let (facts, profile, mut events) = tokio::try_join!(
            self.facts.get_facts(user_id),
            self.profiles.get_profile(user_id),
            self.event_log.fetch_events(user_id, since, None),
        )?;
        events.retain(|e| e.timestamp <= now);

        let patterns = self.patterns.extract(&events, now);
        let reflection = self.reflection.analyze(&events).await;

        let fallback_start = profile.as_ref().map(|p| p.created_at).unwrap_or(now);
        let phase_record = if !facts.has_os_phase() {
            PhaseRecord::Absent
        } else if facts.os_phase_started_at().is_none() {
            PhaseRecord::MissingStart
        } else {
            PhaseRecord::Complete
        };
        let os_phase = facts
            .os_phase(fallback_start)
            .unwrap_or_else(|| OsPhase::initial(fallback_start))
            .refreshed(now);

        let signals = signals_for(&profile, &os_phase, &patterns, &reflection, &self.config, now);
        debug!(
            user_id = %user_id,
            events = events.len(),
            facts_version = facts.version,
            has_profile = profile.is_some(),
            "Loaded user state"
        );

        Ok(UserState {
            facts,
            profile,
            patterns,
            reflection,
            os_phase,
            phase_record,
            signals,
        })
    }
}

fn signals_for(
    profile: &Option<UserProfile>,
    os_phase: &OsPhase,
    patterns: &BehaviorPatterns,
    reflection: &ReflectionAnalysis,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> PhaseSignals {
    PhaseSignals {
        discovery_completed: profile.as_ref().is_some_and(|p| p.discovery_completed),
        account_age_days: profile.as_ref().map_or(0, |p| p.account_age_days(now)),
        days_in_phase: os_phase.days_in_phase,
        depth_score: reflection.depth_score,
        consistency_score: patterns.consistency_score,
        theme_count: reflection.gate_theme_count(config.lexical_theme_fallback),
    }
}
