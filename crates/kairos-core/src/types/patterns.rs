//! Behavioral pattern values derived from the event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// An hour-of-day bucket with a low completion rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// `"<hour>:00"`.
    pub time: String,
    pub description: String,
    /// Number of habit ticks observed in this hour.
    pub frequency: usize,
}

/// A phrase the user used when describing how they got back on track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub text: String,
    pub worked_count: u32,
    pub last_used: DateTime<Utc>,
}

/// Direction of sentiment across recent reflective messages.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmotionalArc {
    Ascending,
    #[default]
    Flat,
    Descending,
}

/// Everything the pattern extractor derives from one event window.
///
/// Serialized with the camelCase keys used under `behaviorPatterns` in the
/// facts document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorPatterns {
    pub drift_windows: Vec<TimeWindow>,
    /// 0-100.
    pub consistency_score: u32,
    /// Habit ids with repeated misses.
    pub avoidance_triggers: Vec<String>,
    pub return_protocols: Vec<Protocol>,
    pub emotional_arc: EmotionalArc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analyzed: Option<DateTime<Utc>>,
}

impl BehaviorPatterns {
    /// Same patterns stamped with an analysis time.
    pub fn analyzed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_analyzed = Some(at);
        self
    }
}
