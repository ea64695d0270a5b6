//! LLM integration.
//!
//! The sales pipeline only sees the [`SentimentService`] and
//! [`SequenceService`] traits. The `Llm*Service` types implement them over
//! any [`LlmProvider`]. Gemini is reached through rig-core, bridged by
//! [`RigAdapter`].

pub mod json;
pub mod provider;
mod rig_adapter;
pub mod sentiment;
pub mod sequence;

pub use provider::*;
pub use rig_adapter::RigAdapter;
pub use sentiment::{
    LlmSentimentService, Sentiment, SentimentReport, SentimentService, parse_sentiment_response,
};
pub use sequence::{
    LlmSequenceService, RenderedStep, SequenceService, SequenceStep, parse_sequence_response,
};

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, LlmError};

/// Default model for per-reply sentiment analysis (fast).
pub const DEFAULT_SENTIMENT_MODEL: &str = "gemini-2.5-flash";

/// Default model for sequence copywriting.
pub const DEFAULT_SEQUENCE_MODEL: &str = "gemini-2.5-pro";

/// Configuration for creating LLM providers.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub sentiment_model: String,
    pub sequence_model: String,
}

impl LlmConfig {
    /// Read `GEMINI_API_KEY` (required), `OUTREACH_SENTIMENT_MODEL` and
    /// `OUTREACH_SEQUENCE_MODEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".into()))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            sentiment_model: std::env::var("OUTREACH_SENTIMENT_MODEL")
                .unwrap_or_else(|_| DEFAULT_SENTIMENT_MODEL.to_string()),
            sequence_model: std::env::var("OUTREACH_SEQUENCE_MODEL")
                .unwrap_or_else(|_| DEFAULT_SEQUENCE_MODEL.to_string()),
        })
    }

    /// Build the sentiment/draft service.
    pub fn sentiment_service(&self) -> Result<Arc<dyn SentimentService>, LlmError> {
        let provider = create_gemini_provider(&self.api_key, &self.sentiment_model)?;
        Ok(Arc::new(LlmSentimentService::new(provider)))
    }

    /// Build the sequence generation service.
    pub fn sequence_service(&self) -> Result<Arc<dyn SequenceService>, LlmError> {
        let provider = create_gemini_provider(&self.api_key, &self.sequence_model)?;
        Ok(Arc::new(LlmSequenceService::new(provider)))
    }
}

/// Create a Gemini-backed provider for `model`.
pub fn create_gemini_provider(
    api_key: &SecretString,
    model: &str,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;

    let client: gemini::Client = gemini::Client::new(api_key.expose_secret()).map_err(|e| {
        LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        }
    })?;

    let completion_model = client.completion_model(model);
    tracing::info!("Using Gemini (model: {})", model);
    Ok(Arc::new(RigAdapter::new(completion_model, model, "gemini")))
}
