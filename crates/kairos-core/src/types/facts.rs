//! Per-user facts document with deep-merge semantics.
//!
//! The facts document is a JSON object that accumulates long-lived derived
//! facts. It is only ever changed through [`deep_merge`]: nested objects merge
//! key by key, every other value (arrays included) replaces what was there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::phase::AiPhase;
use crate::types::{BehaviorPatterns, EmotionalArc};

/// Key of the behavior pattern summary.
pub const FACT_BEHAVIOR_PATTERNS: &str = "behaviorPatterns";
/// Key of the reflection summary.
pub const FACT_REFLECTION_HISTORY: &str = "reflectionHistory";
/// Key of the phase bookkeeping, written only by the transition commit.
pub const FACT_OS_PHASE: &str = "os_phase";
/// Key of the identity pass-through.
pub const FACT_IDENTITY: &str = "identity";

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; any other patch value overwrites. A non-object
/// base is replaced wholesale when the patch is an object.
pub fn deep_merge(base: &mut Value, patch: Value) {
    let Value::Object(patch_map) = patch else {
        *base = patch;
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Value::Object(base_map) = base else {
        return;
    };

    for (key, patch_value) in patch_map {
        let recurse = patch_value.is_object()
            && base_map.get(&key).map(Value::is_object).unwrap_or(false);
        if recurse {
            if let Some(existing) = base_map.get_mut(&key) {
                deep_merge(existing, patch_value);
            }
        } else {
            base_map.insert(key, patch_value);
        }
    }
}

/// Summary of the user's reflective writing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectionHistory {
    pub themes: Vec<String>,
    pub emotional_arc: EmotionalArc,
    /// 0-10.
    pub depth_score: u32,
}

/// One committed phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: AiPhase,
    pub to: AiPhase,
    pub at: DateTime<Utc>,
}

/// Phase bookkeeping stored under `os_phase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsPhase {
    pub current_phase: AiPhase,
    pub started_at: DateTime<Utc>,
    /// Recomputed from `started_at` on every read.
    #[serde(default)]
    pub days_in_phase: i64,
    #[serde(default)]
    pub phase_transitions: Vec<PhaseTransition>,
}

impl OsPhase {
    /// Initial bookkeeping: observer since `started_at`, no history.
    pub fn initial(started_at: DateTime<Utc>) -> Self {
        Self {
            current_phase: AiPhase::Observer,
            started_at,
            days_in_phase: 0,
            phase_transitions: Vec::new(),
        }
    }

    /// Copy with `days_in_phase` recomputed against `now`.
    pub fn refreshed(mut self, now: DateTime<Utc>) -> Self {
        self.days_in_phase = (now - self.started_at).num_days().max(0);
        self
    }

    /// Copy advanced to `to`, with the transition appended and the clock reset.
    pub fn advanced(&self, to: AiPhase, at: DateTime<Utc>) -> Self {
        let mut phase_transitions = self.phase_transitions.clone();
        phase_transitions.push(PhaseTransition {
            from: self.current_phase,
            to,
            at,
        });
        Self {
            current_phase: to,
            started_at: at,
            days_in_phase: 0,
            phase_transitions,
        }
    }
}

/// A user's facts document together with its merge version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactsDocument {
    pub user_id: String,
    /// Incremented on every merge; 0 means the document was never written.
    pub version: u64,
    pub data: Map<String, Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FactsDocument {
    /// The document of a user nobody has written facts for yet.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            version: 0,
            data: Map::new(),
            updated_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Apply a patch with [`deep_merge`] and bump the version.
    pub fn merge(&mut self, patch: Value, at: DateTime<Utc>) {
        let mut root = Value::Object(std::mem::take(&mut self.data));
        deep_merge(&mut root, patch);
        self.data = match root {
            Value::Object(map) => map,
            // A non-object patch cannot replace the root; keep an empty object.
            _ => Map::new(),
        };
        self.version += 1;
        self.updated_at = Some(at);
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.data.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, key, error = %e, "Ignoring malformed facts entry");
                None
            }
        }
    }

    pub fn behavior_patterns(&self) -> Option<BehaviorPatterns> {
        self.typed(FACT_BEHAVIOR_PATTERNS)
    }

    pub fn reflection_history(&self) -> Option<ReflectionHistory> {
        self.typed(FACT_REFLECTION_HISTORY)
    }

    /// Phase bookkeeping as recorded, read field by field.
    ///
    /// `None` only when nothing is stored under `os_phase`. A missing or
    /// malformed `currentPhase` reads as observer, a missing `startedAt` as
    /// `fallback_started_at`, and missing history as empty.
    pub fn os_phase(&self, fallback_started_at: DateTime<Utc>) -> Option<OsPhase> {
        self.stored_os_phase()?;
        Some(OsPhase {
            current_phase: self.os_phase_field("currentPhase").unwrap_or_default(),
            started_at: self
                .os_phase_started_at()
                .unwrap_or(fallback_started_at),
            days_in_phase: 0,
            phase_transitions: self.os_phase_field("phaseTransitions").unwrap_or_default(),
        })
    }

    /// Whether anything is recorded under `os_phase`.
    pub fn has_os_phase(&self) -> bool {
        self.stored_os_phase().is_some()
    }

    /// The recorded `startedAt`, if present and readable.
    pub fn os_phase_started_at(&self) -> Option<DateTime<Utc>> {
        self.os_phase_field("startedAt")
    }

    fn stored_os_phase(&self) -> Option<&Value> {
        self.data.get(FACT_OS_PHASE).filter(|v| !v.is_null())
    }

    fn os_phase_field<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        let value = self.stored_os_phase()?.get(field)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, field, error = %e, "Ignoring malformed os_phase field");
                None
            }
        }
    }

    pub fn identity(&self) -> Option<&Value> {
        self.data.get(FACT_IDENTITY).filter(|v| !v.is_null())
    }
}

/// Builder for a facts merge patch.
#[derive(Debug, Default)]
pub struct FactsPatch {
    map: Map<String, Value>,
}

impl FactsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn behavior_patterns(mut self, patterns: &BehaviorPatterns) -> Self {
        self.insert(FACT_BEHAVIOR_PATTERNS, patterns);
        self
    }

    pub fn reflection_history(mut self, history: &ReflectionHistory) -> Self {
        self.insert(FACT_REFLECTION_HISTORY, history);
        self
    }

    /// `reflectionHistory` without `themes`, so stored themes stay in place.
    pub fn reflection_scores(mut self, history: &ReflectionHistory) -> Self {
        self.insert(FACT_REFLECTION_HISTORY, history);
        if let Some(Value::Object(summary)) = self.map.get_mut(FACT_REFLECTION_HISTORY) {
            summary.remove("themes");
        }
        self
    }

    pub fn os_phase(mut self, os_phase: &OsPhase) -> Self {
        self.insert(FACT_OS_PHASE, os_phase);
        self
    }

    /// Fill in `os_phase.startedAt` without touching the other fields.
    pub fn os_phase_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.insert(FACT_OS_PHASE, &serde_json::json!({ "startedAt": started_at }));
        self
    }

    fn insert<T: Serialize>(&mut self, key: &str, value: &T) {
        // These types serialize infallibly (no maps with non-string keys).
        if let Ok(v) = serde_json::to_value(value) {
            self.map.insert(key.to_string(), v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_deep_merge_recurses_into_objects() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 1});
        deep_merge(&mut base, json!({"a": {"y": 3, "z": 4}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": 1}));
    }

    #[test]
    fn test_deep_merge_overwrites_scalars_and_arrays() {
        let mut base = json!({"list": [1, 2, 3], "n": {"deep": true}});
        deep_merge(&mut base, json!({"list": [9], "n": 5}));
        assert_eq!(base, json!({"list": [9], "n": 5}));
    }

    #[test]
    fn test_document_merge_bumps_version() {
        let mut doc = FactsDocument::empty("u1");
        assert_eq!(doc.version, 0);
        doc.merge(json!({"identity": {"name": "Sam"}}), Utc::now());
        doc.merge(json!({"identity": {"pronouns": "they/them"}}), Utc::now());
        assert_eq!(doc.version, 2);
        assert_eq!(
            doc.identity(),
            Some(&json!({"name": "Sam", "pronouns": "they/them"}))
        );
    }

    #[test]
    fn test_malformed_typed_view_is_ignored() {
        let mut doc = FactsDocument::empty("u1");
        doc.merge(json!({"reflectionHistory": {"themes": "sleep"}}), Utc::now());
        assert!(doc.reflection_history().is_none());
    }

    #[test]
    fn test_os_phase_absent() {
        let doc = FactsDocument::empty("u1");
        assert!(!doc.has_os_phase());
        assert!(doc.os_phase(Utc::now()).is_none());
    }

    #[test]
    fn test_partial_os_phase_keeps_recorded_phase() {
        let fallback = Utc::now() - Duration::days(3);
        let mut doc = FactsDocument::empty("u1");
        doc.merge(json!({"os_phase": {"currentPhase": "architect"}}), Utc::now());

        assert!(doc.has_os_phase());
        assert!(doc.os_phase_started_at().is_none());
        let os_phase = doc.os_phase(fallback).unwrap();
        assert_eq!(os_phase.current_phase, AiPhase::Architect);
        assert_eq!(os_phase.started_at, fallback);
        assert!(os_phase.phase_transitions.is_empty());
    }

    #[test]
    fn test_unknown_phase_reads_as_observer() {
        let start = Utc::now() - Duration::days(10);
        let mut doc = FactsDocument::empty("u1");
        doc.merge(
            json!({"os_phase": {"currentPhase": "wizard", "startedAt": start}}),
            Utc::now(),
        );
        let os_phase = doc.os_phase(Utc::now()).unwrap();
        assert_eq!(os_phase.current_phase, AiPhase::Observer);
        assert_eq!(os_phase.started_at, start);
    }

    #[test]
    fn test_started_at_patch_leaves_phase_alone() {
        let start = Utc::now() - Duration::days(5);
        let mut doc = FactsDocument::empty("u1");
        doc.merge(json!({"os_phase": {"currentPhase": "oracle"}}), Utc::now());
        doc.merge(
            FactsPatch::new().os_phase_started_at(start).into_value(),
            Utc::now(),
        );
        assert_eq!(doc.os_phase_started_at(), Some(start));
        assert_eq!(doc.os_phase(Utc::now()).unwrap().current_phase, AiPhase::Oracle);
    }

    #[test]
    fn test_os_phase_advance_and_refresh() {
        let start = Utc::now() - Duration::days(40);
        let phase = OsPhase::initial(start).refreshed(Utc::now());
        assert_eq!(phase.days_in_phase, 40);

        let now = Utc::now();
        let next = phase.advanced(AiPhase::Architect, now);
        assert_eq!(next.current_phase, AiPhase::Architect);
        assert_eq!(next.days_in_phase, 0);
        assert_eq!(next.started_at, now);
        assert_eq!(next.phase_transitions.len(), 1);
        assert_eq!(next.phase_transitions[0].from, AiPhase::Observer);
    }

    #[test]
    fn test_reflection_scores_keep_stored_themes() {
        let mut doc = FactsDocument::empty("u1");
        doc.merge(
            json!({"reflectionHistory": {"themes": ["sleep", "work"], "depthScore": 2}}),
            Utc::now(),
        );
        let history = ReflectionHistory {
            depth_score: 6,
            ..Default::default()
        };
        doc.merge(
            FactsPatch::new().reflection_scores(&history).into_value(),
            Utc::now(),
        );

        let stored = doc.reflection_history().unwrap();
        assert_eq!(stored.themes, vec!["sleep", "work"]);
        assert_eq!(stored.depth_score, 6);
    }

    #[test]
    fn test_patch_builder_keys() {
        let history = ReflectionHistory {
            themes: vec!["sleep".into()],
            ..Default::default()
        };
        let patch = FactsPatch::new().reflection_history(&history).into_value();
        assert_eq!(patch["reflectionHistory"]["themes"], json!(["sleep"]));
        assert_eq!(patch["reflectionHistory"]["emotionalArc"], "flat");
    }
}
