//! Lead-reply sentiment analysis and draft generation.
//!
//! The model's answer is untrusted: markdown-wrapped JSON is unwrapped,
//! unknown labels become `NeedsHuman`, scores are clamped. Anything that
//! cannot be parsed at all is an `LlmError`, which the sales pipeline turns
//! into [`SentimentReport::needs_human`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::json::extract_json_object;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Temperature for classification (near-deterministic).
const SENTIMENT_TEMPERATURE: f32 = 0.2;

const SENTIMENT_MAX_TOKENS: u32 = 1024;

/// Reply bodies are truncated before they reach the model.
const MAX_REPLY_CHARS: usize = 4000;

/// Score used when the model gives none or cannot be reached.
pub const NEUTRAL_SCORE: u8 = 50;

/// Intent behind a lead's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    /// Out-of-office auto reply.
    Ooo,
    Unsubscribe,
    NeedsHuman,
}

impl Sentiment {
    /// Parse a model label leniently; anything unrecognised needs a human.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "positive" | "interested" => Self::Positive,
            "neutral" => Self::Neutral,
            "negative" => Self::Negative,
            "ooo" | "outofoffice" => Self::Ooo,
            "unsubscribe" | "optout" => Self::Unsubscribe,
            _ => Self::NeedsHuman,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
            Self::Ooo => "OOO",
            Self::Unsubscribe => "Unsubscribe",
            Self::NeedsHuman => "Needs Human",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Sentiment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Structured result of analysing a lead reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentReport {
    pub sentiment: Sentiment,
    /// 0-100, where 100 is highly enthusiastic.
    pub score: u8,
    pub draft: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl SentimentReport {
    /// Safe default when the service fails: route to a human, no draft.
    pub fn needs_human() -> Self {
        Self {
            sentiment: Sentiment::NeedsHuman,
            score: NEUTRAL_SCORE,
            draft: None,
            key_points: Vec::new(),
        }
    }
}

/// Sentiment/draft service consumed by the sales pipeline.
#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn analyze(&self, reply_text: &str) -> Result<SentimentReport, LlmError>;
}

/// [`SentimentService`] backed by an [`LlmProvider`].
pub struct LlmSentimentService {
    llm: Arc<dyn LlmProvider>,
}

impl LlmSentimentService {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SentimentService for LlmSentimentService {
    async fn analyze(&self, reply_text: &str) -> Result<SentimentReport, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(reply_text)),
        ])
        .with_temperature(SENTIMENT_TEMPERATURE)
        .with_max_tokens(SENTIMENT_MAX_TOKENS)
        .with_json_output();

        let response = self.llm.complete(request).await?;
        let report = parse_sentiment_response(&response.content).map_err(|e| {
            warn!(
                model = self.llm.model_name(),
                raw_response = %response.content,
                error = %e,
                "Unparseable sentiment response"
            );
            e
        })?;

        debug!(
            sentiment = %report.sentiment,
            score = report.score,
            has_draft = report.draft.is_some(),
            "Sentiment analysed"
        );
        Ok(report)
    }
}

fn build_system_prompt() -> String {
    "You read replies to cold outreach emails.\n\
     Categorize the reply as one of: \"Positive\", \"Negative\", \"OOO\", \"Unsubscribe\", \"Needs Human\".\n\
     Give a score from 0 to 100 (100 = highly enthusiastic).\n\
     Write a short, professional, non-salesy draft reply that acknowledges their point and proposes a 15 minute call.\n\
     Respond with ONLY a JSON object:\n\
     {\"sentiment\": \"...\", \"score\": 0, \"draft\": \"...\", \"keyPoints\": [\"...\"]}"
        .to_string()
}

fn build_user_prompt(reply_text: &str) -> String {
    let preview: String = reply_text.chars().take(MAX_REPLY_CHARS).collect();
    format!("Lead reply:\n{preview}")
}

/// Raw model output; every field optional so partial answers still parse.
#[derive(Debug, Deserialize)]
struct RawSentiment {
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    draft: Option<String>,
    #[serde(default, alias = "key_points", rename = "keyPoints")]
    key_points: Vec<String>,
}

/// Parse a model answer into a [`SentimentReport`].
pub fn parse_sentiment_response(raw: &str) -> Result<SentimentReport, LlmError> {
    let json = extract_json_object(raw);
    let parsed: RawSentiment = serde_json::from_str(&json)?;

    let score = parsed
        .score
        .filter(|s| s.is_finite())
        .map(|s| s.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(NEUTRAL_SCORE);
    let draft = parsed.draft.filter(|d| !d.trim().is_empty());

    Ok(SentimentReport {
        sentiment: Sentiment::from_label(&parsed.sentiment),
        score,
        draft,
        key_points: parsed.key_points,
    })
}
