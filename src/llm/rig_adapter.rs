//! Bridge from rig's `CompletionModel` to our [`LlmProvider`] trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel};
use serde_json::json;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider: provider.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = user_prompt(&request);
        let mut builder = self.model.completion_request(prompt);
        if let Some(system) = request.system_prompt() {
            builder = builder.preamble(system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if request.json_output {
            builder = builder.additional_params(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            }));
        }

        let response = self
            .model
            .completion(builder.build())
            .await
            .map_err(|e| classify_error(&self.provider, &e.to_string()))?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.clone(),
                reason: "response carried no text".into(),
            });
        }

        debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: saturate(response.usage.input_tokens),
            output_tokens: saturate(response.usage.output_tokens),
        })
    }
}

/// User turns joined into one prompt.
fn user_prompt(request: &CompletionRequest) -> String {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Map a rig error message onto our error kinds.
///
/// rig surfaces provider HTTP failures as text, so status codes and the
/// provider's error reasons are matched there.
pub(crate) fn classify_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("resource_exhausted") || lower.contains("rate limit") {
        return LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        };
    }
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("permission_denied")
        || lower.contains("unauthenticated")
        || lower.contains("api key not valid")
    {
        return LlmError::AuthFailed {
            provider: provider.to_string(),
        };
    }
    if lower.contains("json") || lower.contains("response error") {
        return LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: message.to_string(),
        };
    }
    LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[test]
    fn rate_limits_are_recognised() {
        let err = classify_error("gemini", "ProviderError: 429 RESOURCE_EXHAUSTED quota");
        assert!(matches!(err, LlmError::RateLimited { retry_after: None, .. }));
    }

    #[test]
    fn auth_failures_are_recognised() {
        let err = classify_error("gemini", "ProviderError: API key not valid. Please pass a valid API key.");
        assert!(matches!(err, LlmError::AuthFailed { ref provider } if provider == "gemini"));
    }

    #[test]
    fn malformed_bodies_are_invalid_responses() {
        let err = classify_error("gemini", "JsonError: expected value at line 1 column 1");
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn other_failures_are_request_failures() {
        let err = classify_error("gemini", "HttpError: connection reset");
        assert!(matches!(err, LlmError::RequestFailed { ref reason, .. } if reason.contains("connection reset")));
    }

    #[test]
    fn user_turns_are_joined_without_system_text() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("rules"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(user_prompt(&request), "first\n\nsecond");
    }
}
