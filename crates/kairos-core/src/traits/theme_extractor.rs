//! Theme extraction strategy.

use async_trait::async_trait;

use crate::error::KairosResult;

/// Extracts recurring themes from a block of reflective text.
///
/// The reflection analyzer bounds every call with a timeout and turns any
/// error into an empty theme list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThemeExtractor: Send + Sync {
    async fn extract_themes(&self, text_block: &str) -> KairosResult<Vec<String>>;
}

/// Extractor used when no LLM is configured. Always returns no themes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopThemeExtractor;

#[async_trait]
impl ThemeExtractor for NoopThemeExtractor {
    async fn extract_themes(&self, _text_block: &str) -> KairosResult<Vec<String>> {
        Ok(Vec::new())
    }
}
