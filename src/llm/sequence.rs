//! Cold-email sequence generation from a business pitch.
//!
//! Steps come back with spintax markup; they are rendered per lead with
//! [`SequenceStep::render`]. Malformed markup is logged and kept as-is.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::json::extract_json_array;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::random::RandomSource;
use crate::spintax::{self, MergeFields};

const SEQUENCE_TEMPERATURE: f32 = 0.8;

const SEQUENCE_MAX_TOKENS: u32 = 4096;

/// One email in an outreach sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub step: u32,
    pub subject: String,
    pub body: String,
}

/// A concrete email rendered from a step for one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    pub step: u32,
    pub subject: String,
    pub body: String,
}

impl SequenceStep {
    /// Spin and fill the step for one recipient.
    pub fn render(&self, fields: &MergeFields, rng: &dyn RandomSource) -> RenderedStep {
        RenderedStep {
            step: self.step,
            subject: spintax::render(&self.subject, fields, rng),
            body: spintax::render(&self.body, fields, rng),
        }
    }
}

/// Sequence generation service.
#[async_trait]
pub trait SequenceService: Send + Sync {
    async fn generate_sequence(&self, pitch: &str) -> Result<Vec<SequenceStep>, LlmError>;
}

/// [`SequenceService`] backed by an [`LlmProvider`].
pub struct LlmSequenceService {
    llm: Arc<dyn LlmProvider>,
}

impl LlmSequenceService {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SequenceService for LlmSequenceService {
    async fn generate_sequence(&self, pitch: &str) -> Result<Vec<SequenceStep>, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(format!("Pitch: {pitch}")),
        ])
        .with_temperature(SEQUENCE_TEMPERATURE)
        .with_max_tokens(SEQUENCE_MAX_TOKENS)
        .with_json_output();

        let response = self.llm.complete(request).await?;
        let steps = parse_sequence_response(&response.content)?;
        info!(
            model = self.llm.model_name(),
            steps = steps.len(),
            "Generated outreach sequence"
        );
        Ok(steps)
    }
}

fn build_system_prompt() -> String {
    "You write 3-step cold email sequences.\n\
     Step 1: hook and value proposition. Step 2: a short bump 3 days later. Step 3: a polite break-up 7 days later.\n\
     Every subject and body must use spintax such as {Hi|Hello} for variation.\n\
     Use {{firstName}} and {{company}} for recipient details.\n\
     Respond with ONLY a JSON array: [{\"step\": 1, \"subject\": \"...\", \"body\": \"...\"}]"
        .to_string()
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    step: Option<u32>,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

/// Parse a model answer into ordered steps.
///
/// Missing step numbers are filled from position; steps with an empty body
/// are dropped.
pub fn parse_sequence_response(raw: &str) -> Result<Vec<SequenceStep>, LlmError> {
    let json = extract_json_array(raw);
    let parsed: Vec<RawStep> = serde_json::from_str(&json)?;

    let mut steps: Vec<SequenceStep> = parsed
        .into_iter()
        .enumerate()
        .filter(|(_, s)| !s.body.trim().is_empty())
        .map(|(i, s)| SequenceStep {
            step: s.step.unwrap_or(i as u32 + 1),
            subject: s.subject,
            body: s.body,
        })
        .collect();
    steps.sort_by_key(|s| s.step);

    for step in &steps {
        for (field, text) in [("subject", &step.subject), ("body", &step.body)] {
            if let Err(e) = spintax::check_balanced(text) {
                warn!(step = step.step, field, error = %e, "Sequence step has malformed spintax");
            }
        }
    }

    if steps.is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: "sequence".into(),
            reason: "no usable steps in response".into(),
        });
    }
    Ok(steps)
}
