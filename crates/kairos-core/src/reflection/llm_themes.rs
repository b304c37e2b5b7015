//! LLM-backed theme extraction.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{KairosError, KairosResult};
use crate::traits::{GenerationOptions, Llm, ResponseFormat, ThemeExtractor};
use crate::types::Message;

/// Themes kept from one LLM response.
pub const MAX_THEMES: usize = 5;

pub const THEME_EXTRACTION_PROMPT: &str = r#"You read a person's recent journal reflections and chat messages with their habit coach.
Identify the recurring life themes they keep returning to (for example: "sleep", "work stress", "family time", "self-discipline").

Rules:
- Return at most 5 themes, most prominent first.
- Each theme is 1-3 lowercase words.
- Only include themes that appear more than once or carry clear emotional weight.
- If nothing recurs, return an empty list.

Respond with JSON only, in this exact shape:
{"themes": ["theme one", "theme two"]}"#;

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("code block pattern is valid")
});
static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think tag pattern is valid"));

/// Strip `<think>` sections and unwrap a fenced code block if present.
pub fn clean_response(content: &str) -> String {
    let without_thinking = THINK_RE.replace_all(content, "");
    let trimmed = without_thinking.trim();
    CODE_BLOCK_RE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct ThemesResponse {
    #[serde(default)]
    themes: Vec<String>,
}

/// Parse a `{"themes": [...]}` response.
///
/// Themes are trimmed, de-duplicated case-insensitively and capped at
/// [`MAX_THEMES`]. An empty response is an empty list.
pub fn parse_themes(response: &str) -> KairosResult<Vec<String>> {
    let cleaned = clean_response(response);
    if cleaned.is_empty() {
        return Ok(vec![]);
    }

    let parsed: ThemesResponse = serde_json::from_str(&cleaned)
        .map_err(|e| KairosError::parse(format!("Failed to parse themes JSON: {}", e)))?;

    let mut seen = HashSet::new();
    Ok(parsed
        .themes
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .take(MAX_THEMES)
        .collect())
}

/// Theme extractor that asks an LLM for a JSON theme list.
pub struct LlmThemeExtractor {
    llm: Arc<dyn Llm>,
}

impl LlmThemeExtractor {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}

#[async_trait]
impl ThemeExtractor for LlmThemeExtractor {
    async fn extract_themes(&self, text_block: &str) -> KairosResult<Vec<String>> {
        let messages = vec![
            Message::system(THEME_EXTRACTION_PROMPT),
            Message::user(format!("Reflections:\n{}", text_block)),
        ];
        let options = GenerationOptions {
            response_format: self
                .llm
                .supports_json_mode()
                .then_some(ResponseFormat::Json),
            ..Default::default()
        };

        let response = self.llm.generate(&messages, Some(options)).await?;
        let content = response.content.ok_or_else(|| {
            KairosError::llm_invalid_response("Theme extraction returned no content")
        })?;
        parse_themes(&content)
    }
}
