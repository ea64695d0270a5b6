//! Error types for the outreach core.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
///
/// Raised before any work starts; never silently degraded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error(
        "Insufficient domain diversity: warmup requires at least 2 distinct sender domains, found {found}"
    )]
    InsufficientDomainDiversity { found: usize },
}

/// LLM provider errors (sentiment/draft and sequence generation).
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Send-primitive errors. A failed dispatch is never recorded as sent.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport failed for {account}: {reason}")]
    Transport { account: String, reason: String },

    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from the external account/lead/draft registries.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Store backend failed: {0}")]
    Backend(String),
}

/// Spintax markup diagnostics. Spinning itself stays lenient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unmatched '{{' at byte {0}")]
    UnclosedGroup(usize),

    #[error("Unmatched '}}' at byte {0}")]
    StrayClose(usize),
}

/// Sales reply pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
