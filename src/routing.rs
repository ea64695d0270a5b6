//! Reply routing: which account answers a lead.
//!
//! Replies go out from the identity the lead originally engaged with whenever
//! that account still has quota. Otherwise the first campaign-eligible
//! account with quota takes over, in list order. There is no rotation state
//! here: replies are rare and availability matters more than spreading load.

use tracing::{debug, info};

use crate::accounts::{Account, CampaignRef};

/// Resolve the account that must send a reply on a thread.
///
/// Returns `None` when no eligible account has quota left; the reply then
/// has to be queued or surfaced for manual handling.
pub fn resolve_reply_sender<'a, S: AsRef<str>>(
    original_sender_email: &str,
    all_accounts: &'a [Account],
    campaign_smtp_ids: &[S],
) -> Option<&'a Account> {
    let original = all_accounts
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(original_sender_email));

    if let Some(account) = original {
        if account.has_capacity() {
            debug!(account = %account.email, "Reply keeps thread sender");
            return Some(account);
        }
        info!(
            account = %account.email,
            sent_today = account.sent_today,
            daily_limit = account.daily_limit,
            "Thread sender exhausted, falling back to campaign pool"
        );
    }

    let fallback = all_accounts.iter().find(|a| {
        a.has_capacity()
            && campaign_smtp_ids.iter().any(|id| {
                let id: &str = id.as_ref();
                id == a.id
            })
    });

    match fallback {
        Some(account) => debug!(account = %account.email, "Reply uses fallback sender"),
        None => info!(
            original = %original_sender_email,
            "No eligible reply sender available"
        ),
    }
    fallback
}

/// [`resolve_reply_sender`] against a campaign reference.
pub fn resolve_for_campaign<'a>(
    original_sender_email: &str,
    all_accounts: &'a [Account],
    campaign: &CampaignRef,
) -> Option<&'a Account> {
    resolve_reply_sender(
        original_sender_email,
        all_accounts,
        campaign.smtp_account_ids.as_slice(),
    )
}
