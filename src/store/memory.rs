//! In-memory registries for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::traits::{AccountRegistry, DraftRecord, DraftStore, LeadRegistry, LeadStatus};
use crate::accounts::{Account, CampaignRef};
use crate::error::StoreError;

/// Accounts and campaigns held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<Vec<Account>>,
    campaigns: RwLock<HashMap<String, CampaignRef>>,
}

impl InMemoryAccounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
            campaigns: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_campaign(&self, campaign: CampaignRef) {
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), campaign);
    }

    /// Zero every `sent_today` counter (day boundary).
    pub async fn reset_daily_counts(&self) {
        for account in self.accounts.write().await.iter_mut() {
            account.sent_today = 0;
        }
    }
}

#[async_trait]
impl AccountRegistry for InMemoryAccounts {
    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.read().await.clone())
    }

    async fn campaign(&self, id: &str) -> Result<Option<CampaignRef>, StoreError> {
        Ok(self.campaigns.read().await.get(id).cloned())
    }

    async fn record_send(&self, account_id: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account".into(),
                id: account_id.to_string(),
            })?;
        account.sent_today = account.sent_today.saturating_add(1);
        debug!(account = %account.email, sent_today = account.sent_today, "Recorded send");
        Ok(())
    }
}

/// Lead statuses held in memory. Unknown leads are created on first update.
#[derive(Debug, Default)]
pub struct InMemoryLeads {
    statuses: RwLock<HashMap<String, LeadStatus>>,
}

impl InMemoryLeads {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadRegistry for InMemoryLeads {
    async fn set_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), StoreError> {
        self.statuses
            .write()
            .await
            .insert(lead_id.to_string(), status);
        Ok(())
    }

    async fn status(&self, lead_id: &str) -> Result<Option<LeadStatus>, StoreError> {
        Ok(self.statuses.read().await.get(lead_id).copied())
    }
}

/// Drafts held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDrafts {
    drafts: RwLock<Vec<DraftRecord>>,
}

impl InMemoryDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<DraftRecord> {
        self.drafts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }
}

#[async_trait]
impl DraftStore for InMemoryDrafts {
    async fn save(&self, record: DraftRecord) -> Result<(), StoreError> {
        let mut drafts = self.drafts.write().await;
        match drafts.iter_mut().find(|d| d.id == record.id) {
            Some(existing) => *existing = record,
            None => drafts.push(record),
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DraftRecord>, StoreError> {
        Ok(self.drafts.read().await.iter().find(|d| d.id == id).cloned())
    }

    async fn for_thread(&self, thread_id: &str) -> Result<Vec<DraftRecord>, StoreError> {
        Ok(self
            .drafts
            .read()
            .await
            .iter()
            .filter(|d| d.thread_id == thread_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::SentimentReport;
    use crate::store::DraftStatus;

    #[tokio::test]
    async fn record_send_increments_quota() {
        let registry = InMemoryAccounts::new(vec![Account::new("a1", "ana@alpha.io", "Ana", 2)]);
        registry.record_send("a1").await.unwrap();
        registry.record_send("a1").await.unwrap();
        let accounts = registry.accounts().await.unwrap();
        assert_eq!(accounts[0].sent_today, 2);
        assert!(!accounts[0].has_capacity());

        registry.reset_daily_counts().await;
        assert_eq!(registry.accounts().await.unwrap()[0].sent_today, 0);
    }

    #[tokio::test]
    async fn record_send_unknown_account_errors() {
        let registry = InMemoryAccounts::default();
        let err = registry.record_send("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "ghost"));
    }

    #[tokio::test]
    async fn campaigns_lookup() {
        let registry = InMemoryAccounts::default();
        registry.add_campaign(CampaignRef::new("c1", &["a1"])).await;
        assert!(registry.campaign("c1").await.unwrap().is_some());
        assert!(registry.campaign("c2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lead_status_roundtrip() {
        let leads = InMemoryLeads::new();
        assert_eq!(leads.status("l1").await.unwrap(), None);
        leads.set_status("l1", LeadStatus::Bounced).await.unwrap();
        assert_eq!(leads.status("l1").await.unwrap(), Some(LeadStatus::Bounced));
    }

    #[tokio::test]
    async fn save_replaces_by_id() {
        let drafts = InMemoryDrafts::new();
        let record = DraftRecord::new("t1", "l1", "c1", &SentimentReport::needs_human());
        let id = record.id;
        drafts.save(record.clone()).await.unwrap();
        drafts
            .save(record.needing_attention("no sender"))
            .await
            .unwrap();

        assert_eq!(drafts.len().await, 1);
        let stored = drafts.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, DraftStatus::NeedsAttention);
        assert_eq!(stored.note.as_deref(), Some("no sender"));
        assert_eq!(drafts.for_thread("t1").await.unwrap().len(), 1);
        assert!(drafts.for_thread("t2").await.unwrap().is_empty());
    }
}
