//! Registry traits the pipeline reads from and writes to.
//!
//! Accounts, leads and drafts are owned by the surrounding service; the core
//! only sees these async seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{Account, CampaignRef};
use crate::error::StoreError;
use crate::llm::{Sentiment, SentimentReport};

/// Lifecycle state of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Active,
    /// Hard bounce; never mail again.
    Bounced,
    Unsubscribed,
    /// Replied negatively; drop from sequences.
    Inactive,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Bounced => "bounced",
            Self::Unsubscribed => "unsubscribed",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a reply draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Waiting for a human to approve, edit or discard.
    Drafted,
    /// Automatic handling failed; a human has to act.
    NeedsAttention,
    /// Queued for an autopilot send after the thinking delay.
    Scheduled,
    /// Went out on autopilot.
    Sent,
    /// A scheduled send that was withdrawn before it fired.
    Cancelled,
}

/// A reply draft surfaced for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub id: Uuid,
    pub thread_id: String,
    pub lead_id: String,
    pub campaign_id: String,
    pub sentiment: Sentiment,
    pub score: u8,
    pub draft: Option<String>,
    pub key_points: Vec<String>,
    pub status: DraftStatus,
    /// Why the draft needs attention, if it does.
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftRecord {
    /// A fresh `Drafted` record for a thread.
    pub fn new(
        thread_id: impl Into<String>,
        lead_id: impl Into<String>,
        campaign_id: impl Into<String>,
        report: &SentimentReport,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            lead_id: lead_id.into(),
            campaign_id: campaign_id.into(),
            sentiment: report.sentiment,
            score: report.score,
            draft: report.draft.clone(),
            key_points: report.key_points.clone(),
            status: DraftStatus::Drafted,
            note: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the draft as queued for an autopilot send.
    pub fn scheduled(mut self) -> Self {
        self.status = DraftStatus::Scheduled;
        self
    }

    /// Mark the draft as needing attention, with a reason.
    pub fn needing_attention(mut self, note: impl Into<String>) -> Self {
        self.status = DraftStatus::NeedsAttention;
        self.note = Some(note.into());
        self
    }

    /// Move to `status`, keeping the id.
    pub fn with_status(mut self, status: DraftStatus) -> Self {
        self.status = status;
        self
    }
}

/// Sender accounts and campaigns.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Current state of every account, in registry order.
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    async fn campaign(&self, id: &str) -> Result<Option<CampaignRef>, StoreError>;

    /// Count one successful send against the account's daily quota.
    async fn record_send(&self, account_id: &str) -> Result<(), StoreError>;
}

/// Lead lifecycle updates.
#[async_trait]
pub trait LeadRegistry: Send + Sync {
    async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), StoreError>;

    async fn status(&self, lead_id: &str) -> Result<Option<LeadStatus>, StoreError>;
}

/// Persistence for reply drafts awaiting review.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Insert or replace by id.
    async fn save(&self, record: DraftRecord) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<DraftRecord>, StoreError>;

    /// All drafts for a thread, oldest first.
    async fn for_thread(&self, thread_id: &str) -> Result<Vec<DraftRecord>, StoreError>;
}
