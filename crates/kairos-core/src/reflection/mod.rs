//! Reflection analysis: delegated theme extraction plus a local depth score.
//!
//! Theme extraction never fails the caller. Timeouts and extractor errors
//! are logged and read as "no themes", with the lexicon-based theme count
//! reported alongside so the phase gate has something to fall back on.

mod llm_themes;

pub use llm_themes::{
    clean_response, parse_themes, LlmThemeExtractor, MAX_THEMES, THEME_EXTRACTION_PROMPT,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::KairosError;
use crate::lexicon;
use crate::traits::ThemeExtractor;
use crate::types::{EmotionalArc, Event, EventPayload, ReflectionHistory};

/// Each depth sub-score is capped at this value.
pub const DEPTH_COMPONENT_CAP: f64 = 5.0;
/// Distinct texts a lexicon theme needs to count as recurring.
pub const LEXICAL_THEME_MIN_TEXTS: usize = 2;

/// Where the reported themes came from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThemesSource {
    /// The extractor answered in time.
    Ai,
    /// Too few reflective events to ask.
    #[default]
    Skipped,
    /// No extractor, an extractor error, or a timeout.
    Degraded,
}

/// Output of [`ReflectionAnalyzer::analyze`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionAnalysis {
    pub themes: Vec<String>,
    /// 0-10.
    pub depth_score: u32,
    pub themes_source: ThemesSource,
    /// Lexicon themes found in at least two distinct texts.
    pub lexical_theme_count: usize,
}

impl ReflectionAnalysis {
    /// Theme count the observer gate should use.
    pub fn gate_theme_count(&self, lexical_fallback: bool) -> usize {
        if lexical_fallback && self.themes_source == ThemesSource::Degraded {
            self.lexical_theme_count.max(self.themes.len())
        } else {
            self.themes.len()
        }
    }

    /// The persisted `reflectionHistory` view.
    pub fn to_history(&self, emotional_arc: EmotionalArc) -> ReflectionHistory {
        ReflectionHistory {
            themes: self.themes.clone(),
            emotional_arc,
            depth_score: self.depth_score,
        }
    }
}

/// `round(min(avg_len / 100, 5) + min(count / 10, 5))`, 0 for no texts.
pub fn depth_score(texts: &[&str]) -> u32 {
    if texts.is_empty() {
        return 0;
    }
    let count = texts.len() as f64;
    let total_chars: usize = texts.iter().map(|t| t.chars().count()).sum();
    let avg_len = total_chars as f64 / count;

    let length_part = (avg_len / 100.0).min(DEPTH_COMPONENT_CAP);
    let frequency_part = (count / 10.0).min(DEPTH_COMPONENT_CAP);
    (length_part + frequency_part).round() as u32
}

/// Lexicon themes that occur in at least [`LEXICAL_THEME_MIN_TEXTS`] texts.
pub fn lexical_theme_count(texts: &[&str]) -> usize {
    let mut seen_in: HashMap<&'static str, usize> = HashMap::new();
    for text in texts {
        let themes: BTreeSet<&'static str> = lexicon::themes_in(text).into_iter().collect();
        for theme in themes {
            *seen_in.entry(theme).or_default() += 1;
        }
    }
    seen_in
        .values()
        .filter(|n| **n >= LEXICAL_THEME_MIN_TEXTS)
        .count()
}

/// Combines a pluggable [`ThemeExtractor`] with the local depth heuristic.
pub struct ReflectionAnalyzer {
    extractor: Option<Arc<dyn ThemeExtractor>>,
    timeout: Duration,
    min_theme_events: usize,
    text_limit: usize,
}

impl ReflectionAnalyzer {
    pub fn new(extractor: Option<Arc<dyn ThemeExtractor>>, timeout: Duration) -> Self {
        Self {
            extractor,
            timeout,
            min_theme_events: 3,
            text_limit: 20,
        }
    }

    pub fn from_config(extractor: Option<Arc<dyn ThemeExtractor>>, config: &EngineConfig) -> Self {
        Self {
            extractor,
            timeout: Duration::from_millis(config.theme_timeout_ms),
            min_theme_events: config.min_theme_events,
            text_limit: config.theme_text_limit,
        }
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    /// Analyze the reflective events among `events`.
    pub async fn analyze(&self, events: &[Event]) -> ReflectionAnalysis {
        let mut reflective: Vec<&Event> = events.iter().filter(|e| e.kind.is_reflective()).collect();
        reflective.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let texts: Vec<&str> = reflective
            .iter()
            .copied()
            .filter_map(|e| match e.payload() {
                EventPayload::Text { text } => Some(text),
                _ => None,
            })
            .filter(|t| !t.trim().is_empty())
            .collect();

        let depth = depth_score(&texts);
        let lexical = lexical_theme_count(&texts);
        let (themes, source) = if texts.len() < self.min_theme_events {
            (Vec::new(), ThemesSource::Skipped)
        } else {
            self.extract_themes(&texts).await
        };

        debug!(
            texts = texts.len(),
            depth_score = depth,
            themes = themes.len(),
            themes_source = %source,
            lexical_themes = lexical,
            "Analyzed reflections"
        );

        ReflectionAnalysis {
            themes,
            depth_score: depth,
            themes_source: source,
            lexical_theme_count: lexical,
        }
    }

    /// `texts` is newest-first; the block sent out reads oldest to newest.
    async fn extract_themes(&self, texts: &[&str]) -> (Vec<String>, ThemesSource) {
        let Some(extractor) = self.extractor.as_ref() else {
            debug!("No theme extractor configured, skipping themes");
            return (Vec::new(), ThemesSource::Degraded);
        };

        let mut recent: Vec<&str> = texts.iter().take(self.text_limit).copied().collect();
        recent.reverse();
        let block = recent.join("\n---\n");

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, extractor.extract_themes(&block)).await {
            Ok(Ok(themes)) => {
                let themes = themes
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                (themes, ThemesSource::Ai)
            }
            Ok(Err(e)) => {
                warn!(error = %e, code = e.code().as_str(), "Theme extraction failed, continuing without themes");
                (Vec::new(), ThemesSource::Degraded)
            }
            Err(_) => {
                let err = KairosError::timeout("theme extraction", started.elapsed().as_millis() as u64);
                warn!(error = %err, "Theme extraction timed out, continuing without themes");
                (Vec::new(), ThemesSource::Degraded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockThemeExtractor, NoopThemeExtractor};
    use crate::types::EventKind;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    fn reflections(texts: &[&str]) -> Vec<Event> {
        let now = Utc::now();
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Event::new(
                    "u1",
                    EventKind::ReflectionAnswer,
                    json!({ "text": t }),
                    now - ChronoDuration::minutes(i as i64),
                )
            })
            .collect()
    }

    fn analyzer(extractor: impl ThemeExtractor + 'static) -> ReflectionAnalyzer {
        ReflectionAnalyzer::new(Some(Arc::new(extractor)), Duration::from_millis(200))
    }

    struct SlowExtractor;

    #[async_trait]
    impl ThemeExtractor for SlowExtractor {
        async fn extract_themes(&self, _text_block: &str) -> crate::KairosResult<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec!["too late".to_string()])
        }
    }

    #[test]
    fn test_depth_score_formula() {
        assert_eq!(depth_score(&[]), 0);

        let text = "x".repeat(250);
        let texts: Vec<&str> = vec![text.as_str(); 10];
        // 2.5 + 1.0
        assert_eq!(depth_score(&texts), 4);

        let long = "x".repeat(2000);
        let texts: Vec<&str> = vec![long.as_str(); 80];
        assert_eq!(depth_score(&texts), 10);
    }

    #[test]
    fn test_lexical_theme_count_needs_two_texts() {
        let texts = ["slept badly again", "work deadline", "sleep is a mess", "my boss"];
        assert_eq!(lexical_theme_count(&texts), 2);
        assert_eq!(lexical_theme_count(&["sleep sleep sleep"]), 0);
    }

    #[tokio::test]
    async fn test_few_events_skip_extractor() {
        let mut mock = MockThemeExtractor::new();
        mock.expect_extract_themes().never();

        let analysis = analyzer(mock).analyze(&reflections(&["one", "two"])).await;
        assert!(analysis.themes.is_empty());
        assert_eq!(analysis.themes_source, ThemesSource::Skipped);
    }

    #[tokio::test]
    async fn test_themes_from_extractor() {
        let mut mock = MockThemeExtractor::new();
        mock.expect_extract_themes()
            .times(1)
            .withf(|block: &str| block.starts_with("third") && block.ends_with("first"))
            .returning(|_| Ok(vec!["sleep".to_string(), " work ".to_string()]));

        let analysis = analyzer(mock)
            .analyze(&reflections(&["first", "second", "third"]))
            .await;
        assert_eq!(analysis.themes, vec!["sleep", "work"]);
        assert_eq!(analysis.themes_source, ThemesSource::Ai);
    }

    #[tokio::test]
    async fn test_extractor_error_degrades_to_empty() {
        let mut mock = MockThemeExtractor::new();
        mock.expect_extract_themes()
            .returning(|_| Err(KairosError::llm("service unavailable")));

        let events = reflections(&["sleep was bad", "slept late again", "tired and sleepy"]);
        let analysis = analyzer(mock).analyze(&events).await;
        assert!(analysis.themes.is_empty());
        assert_eq!(analysis.themes_source, ThemesSource::Degraded);
        assert_eq!(analysis.lexical_theme_count, 1);
        assert_eq!(analysis.gate_theme_count(true), 1);
        assert_eq!(analysis.gate_theme_count(false), 0);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let analyzer = ReflectionAnalyzer::new(Some(Arc::new(SlowExtractor)), Duration::from_millis(20));
        let analysis = analyzer.analyze(&reflections(&["a", "b", "c"])).await;
        assert!(analysis.themes.is_empty());
        assert_eq!(analysis.themes_source, ThemesSource::Degraded);
    }

    #[tokio::test]
    async fn test_missing_extractor_is_degraded() {
        let analyzer = ReflectionAnalyzer::new(None, Duration::from_millis(20));
        assert!(!analyzer.has_extractor());
        let analysis = analyzer.analyze(&reflections(&["a", "b", "c"])).await;
        assert_eq!(analysis.themes_source, ThemesSource::Degraded);
    }

    #[tokio::test]
    async fn test_noop_extractor_counts_as_answered() {
        let analysis = analyzer(NoopThemeExtractor)
            .analyze(&reflections(&["a", "b", "c"]))
            .await;
        assert!(analysis.themes.is_empty());
        assert_eq!(analysis.themes_source, ThemesSource::Ai);
    }

    #[tokio::test]
    async fn test_non_reflective_and_empty_texts_ignored() {
        let mut events = reflections(&["   ", "real text"]);
        events.push(Event::new(
            "u1",
            EventKind::HabitTick,
            json!({"text": "not a reflection"}),
            Utc::now(),
        ));
        let analysis = ReflectionAnalyzer::new(None, Duration::from_millis(20))
            .analyze(&events)
            .await;
        assert_eq!(analysis.themes_source, ThemesSource::Skipped);
        // one text of 9 chars: 0.09 + 0.1
        assert_eq!(analysis.depth_score, 0);
    }
}
