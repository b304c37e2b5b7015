//! Factory for creating LLM providers and theme extractors.

use std::sync::Arc;

use kairos_core::config::{LlmProvider, LlmProviderConfig};
use kairos_core::error::{KairosError, KairosResult};
use kairos_core::reflection::LlmThemeExtractor;
use kairos_core::traits::{Llm, LlmConfig, ThemeExtractor};

use crate::anthropic::AnthropicLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> KairosResult<Arc<dyn Llm>> {
        match provider {
            LlmProvider::OpenAI => {
                let llm = OpenAIProvider::new(config)?;
                Ok(Arc::new(llm))
            }
            LlmProvider::Anthropic => {
                let llm = AnthropicLlm::new(config)?;
                Ok(Arc::new(llm))
            }
            LlmProvider::None => Err(KairosError::UnsupportedProvider {
                provider: "none".to_string(),
            }),
        }
    }

    /// Theme extractor for the configured provider, `None` when disabled.
    pub fn theme_extractor(
        config: &LlmProviderConfig,
    ) -> KairosResult<Option<Arc<dyn ThemeExtractor>>> {
        if config.provider == LlmProvider::None {
            return Ok(None);
        }
        let llm = Self::create(config.provider, config.config.clone())?;
        Ok(Some(Arc::new(LlmThemeExtractor::new(llm))))
    }
}
