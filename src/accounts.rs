//! Sender account and campaign reference types.

use serde::{Deserialize, Serialize};

/// A sender identity with its daily quota state.
///
/// `sent_today` is owned by the external registry and reset at the day
/// boundary; the selection functions in this crate only read it.
///
/// Domains are stored lower-cased. A record without a `domain` (or with an
/// empty one) takes it from the email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AccountRecord")]
pub struct Account {
    pub id: String,
    pub email: String,
    pub domain: String,
    pub first_name: String,
    pub sent_today: u32,
    pub daily_limit: u32,
}

impl Account {
    /// Build an account, deriving the domain from the email address.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        daily_limit: u32,
    ) -> Self {
        let email = email.into();
        let domain = domain_of(&email);
        Self {
            id: id.into(),
            email,
            domain,
            first_name: first_name.into(),
            sent_today: 0,
            daily_limit,
        }
    }

    /// Override the derived domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = normalize_domain(&domain.into());
        self
    }

    /// Domain used for grouping, case-folded even if `domain` was set by hand.
    pub fn domain_key(&self) -> String {
        normalize_domain(&self.domain)
    }

    pub fn with_sent_today(mut self, sent_today: u32) -> Self {
        self.sent_today = sent_today;
        self
    }

    /// Whether the account can send at least one more message today.
    pub fn has_capacity(&self) -> bool {
        self.sent_today < self.daily_limit
    }

    /// Messages left before the daily limit.
    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.sent_today)
    }
}

/// Lower-cased domain part of an email address (empty if there is no `@`).
pub fn domain_of(email: &str) -> String {
    email
        .rsplit_once('@')
        .map(|(_, domain)| normalize_domain(domain))
        .unwrap_or_default()
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}

/// Wire shape of [`Account`] before normalization.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    id: String,
    email: String,
    #[serde(default)]
    domain: String,
    first_name: String,
    #[serde(default)]
    sent_today: u32,
    daily_limit: u32,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        let domain = match normalize_domain(&record.domain) {
            d if d.is_empty() => domain_of(&record.email),
            d => d,
        };
        Self {
            id: record.id,
            email: record.email,
            domain,
            first_name: record.first_name,
            sent_today: record.sent_today,
            daily_limit: record.daily_limit,
        }
    }
}

/// The accounts allowed to send on behalf of a campaign, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRef {
    pub id: String,
    pub smtp_account_ids: Vec<String>,
}

impl CampaignRef {
    pub fn new(id: impl Into<String>, smtp_account_ids: &[&str]) -> Self {
        Self {
            id: id.into(),
            smtp_account_ids: smtp_account_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn allows(&self, account_id: &str) -> bool {
        self.smtp_account_ids.iter().any(|id| id == account_id)
    }
}
