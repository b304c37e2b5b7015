//! kairos-llm - LLM provider implementations for kairos.
//!
//! The engine only needs an LLM for theme extraction. This crate provides
//! the concrete providers behind the core [`Llm`] trait and a factory that
//! wraps them into a theme extractor.
//!
//! # Supported Providers
//!
//! - **Anthropic** - Claude 3.5 Haiku by default
//! - **OpenAI** - any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Example
//!
//! ```ignore
//! use kairos_llm::LlmFactory;
//!
//! let config = kairos_core::EngineConfig::from_env()?;
//! let extractor = LlmFactory::theme_extractor(&config.llm)?;
//! ```

mod anthropic;
mod factory;
mod openai;

pub use anthropic::{AnthropicLlm, DEFAULT_ANTHROPIC_MODEL};
pub use factory::LlmFactory;
pub use openai::{OpenAIProvider, DEFAULT_OPENAI_MODEL};

// Re-export core types for convenience
pub use kairos_core::config::{LlmProvider, LlmProviderConfig};
pub use kairos_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
