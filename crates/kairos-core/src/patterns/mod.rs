//! Pattern extraction over a window of events.
//!
//! Pure and infallible: malformed payloads read as absent fields.

mod habits;
mod reflective;

pub use habits::{
    avoidance_triggers, consistency_score, drift_windows, AVOIDANCE_MIN_MISSES, DRIFT_MAX_RATE,
    DRIFT_MIN_TICKS, DRIFT_WINDOW_LIMIT,
};
pub use reflective::{
    emotional_arc, return_protocols, ARC_MIN_MESSAGES, PROTOCOL_LIMIT, PROTOCOL_TEXT_CHARS,
    RECENT_REFLECTIVE_LIMIT,
};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::types::{BehaviorPatterns, Event};

/// Derives [`BehaviorPatterns`] from raw events.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    window_days: i64,
    tz_offset_minutes: i32,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PatternExtractor {
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days,
            tz_offset_minutes: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.window_days).with_timezone_offset(config.timezone_offset_minutes)
    }

    /// Offset applied before bucketing ticks by hour of day.
    pub fn with_timezone_offset(mut self, minutes: i32) -> Self {
        self.tz_offset_minutes = minutes;
        self
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    /// Start of the analysis window ending at `now`.
    ///
    /// Saturates at the earliest representable time instead of overflowing.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Extract patterns from the events inside the window ending at `now`.
    ///
    /// Events may arrive in any order; they are sorted newest-first before
    /// the recency-based detectors run. `last_analyzed` is left unset.
    pub fn extract(&self, events: &[Event], now: DateTime<Utc>) -> BehaviorPatterns {
        let since = self.window_start(now);
        let mut window: Vec<&Event> = events
            .iter()
            .filter(|e| e.timestamp >= since && e.timestamp <= now)
            .collect();
        window.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let patterns = BehaviorPatterns {
            drift_windows: drift_windows(&window, self.tz_offset_minutes),
            consistency_score: consistency_score(&window),
            avoidance_triggers: avoidance_triggers(&window),
            return_protocols: return_protocols(&window),
            emotional_arc: emotional_arc(&window),
            last_analyzed: None,
        };

        debug!(
            events = window.len(),
            drift_windows = patterns.drift_windows.len(),
            consistency = patterns.consistency_score,
            avoidance = patterns.avoidance_triggers.len(),
            arc = %patterns.emotional_arc,
            "Extracted behavior patterns"
        );
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionalArc, EventKind};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_huge_window_saturates() {
        let extractor = PatternExtractor::new(1_000_000_000_000);
        assert_eq!(extractor.window_start(now()), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            PatternExtractor::new(i64::MAX / 2).window_start(now()),
            DateTime::<Utc>::MIN_UTC
        );
        assert_eq!(
            PatternExtractor::new(30).window_start(now()),
            now() - Duration::days(30)
        );
    }

    #[test]
    fn test_empty_input_yields_defaults() {
        let patterns = PatternExtractor::default().extract(&[], now());
        assert_eq!(patterns, BehaviorPatterns::default());
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let old = Event::new(
            "u1",
            EventKind::HabitTick,
            json!({"completed": true}),
            now() - Duration::days(31),
        );
        let recent = Event::new(
            "u1",
            EventKind::HabitTick,
            json!({"completed": false}),
            now() - Duration::days(1),
        );
        let patterns = PatternExtractor::new(30).extract(&[old, recent], now());
        assert_eq!(patterns.consistency_score, 0);
    }

    #[test]
    fn test_unsorted_input_is_treated_newest_first() {
        // Oldest five are positive, newest ten are neutral: only the newest
        // ten are read, so the arc is flat.
        let mut events: Vec<Event> = (0..5)
            .map(|i| {
                Event::new(
                    "u1",
                    EventKind::ReflectionAnswer,
                    json!({"text": "great progress"}),
                    now() - Duration::hours(100 + i),
                )
            })
            .collect();
        events.extend((0..10).map(|i| {
            Event::new(
                "u1",
                EventKind::ReflectionAnswer,
                json!({"text": "ok"}),
                now() - Duration::hours(i),
            )
        }));
        events.reverse();

        let patterns = PatternExtractor::default().extract(&events, now());
        assert_eq!(patterns.emotional_arc, EmotionalArc::Flat);
    }

    #[test]
    fn test_malformed_payloads_do_not_panic() {
        let events = vec![
            Event::new("u1", EventKind::HabitTick, json!("garbage"), now()),
            Event::new("u1", EventKind::HabitAction, json!([1, 2]), now()),
            Event::new("u1", EventKind::Debrief, json!({"text": 42}), now()),
        ];
        let patterns = PatternExtractor::default().extract(&events, now());
        assert_eq!(patterns.consistency_score, 0);
        assert!(patterns.return_protocols.is_empty());
    }
}
