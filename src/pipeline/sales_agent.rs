//! Autonomous sales reply pipeline.
//!
//! A regular (non-bounce, non-unsubscribe) lead reply is analysed by the
//! sentiment service and ends in exactly one of three states:
//!
//! - **Suppressed**: negative, opt-out, or an out-of-office the agent is
//!   configured to ignore. No draft, no send.
//! - **ScheduledAutosend**: positive, autopilot on, draft present. The draft
//!   goes out after a randomized thinking delay unless the thread moves first.
//! - **Drafted**: everything else. The draft waits for a human.
//!
//! Sentiment failures and timeouts never drop a reply: they degrade to a
//! `Needs Human` draft.
//!
//! A scheduled send is persisted as a `Scheduled` draft up front. That same
//! record later becomes `Sent`, `Cancelled` or `NeedsAttention`, so a
//! withdrawn or failed send is never lost.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::autosend::{AutosendOutcome, AutosendScheduler};
use crate::config::{AgentConfig, OutreachConfig, ThinkingTime};
use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, PipelineError};
use crate::inbound::IncomingMessage;
use crate::llm::{Sentiment, SentimentReport, SentimentService};
use crate::random::{RandomSource, ThreadRandom};
use crate::routing::resolve_reply_sender;
use crate::store::{
    AccountRegistry, DraftRecord, DraftStatus, DraftStore, LeadRegistry, LeadStatus,
};

/// Default upper bound on a single dispatch call.
const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default upper bound on one sentiment analysis.
const DEFAULT_SENTIMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Lifecycle of a reply inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyState {
    Received,
    Classified,
    Suppressed,
    Drafted,
    ScheduledAutosend,
}

/// Why a reply was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    Negative,
    Unsubscribe,
    /// Out-of-office with `handle_ooo` off.
    OutOfOffice,
}

/// Terminal result of [`SalesReplyPipeline::handle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Suppressed {
        sentiment: Sentiment,
        reason: SuppressReason,
    },
    Drafted {
        draft_id: Uuid,
        sentiment: Sentiment,
    },
    ScheduledAutosend {
        draft_id: Uuid,
        sentiment: Sentiment,
        delay_secs: u64,
    },
}

impl PipelineOutcome {
    pub fn state(&self) -> ReplyState {
        match self {
            Self::Suppressed { .. } => ReplyState::Suppressed,
            Self::Drafted { .. } => ReplyState::Drafted,
            Self::ScheduledAutosend { .. } => ReplyState::ScheduledAutosend,
        }
    }

    pub fn sentiment(&self) -> Sentiment {
        match self {
            Self::Suppressed { sentiment, .. }
            | Self::Drafted { sentiment, .. }
            | Self::ScheduledAutosend { sentiment, .. } => *sentiment,
        }
    }
}

/// What to do with an analysed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Stop here, optionally moving the lead to a new status.
    Suppress {
        reason: SuppressReason,
        lead_status: Option<LeadStatus>,
    },
    Draft,
    Autosend,
}

/// Pure branching over a sentiment report and the agent switches.
pub fn decide(report: &SentimentReport, config: &AgentConfig) -> Decision {
    match report.sentiment {
        Sentiment::Negative => Decision::Suppress {
            reason: SuppressReason::Negative,
            lead_status: Some(LeadStatus::Inactive),
        },
        Sentiment::Unsubscribe => Decision::Suppress {
            reason: SuppressReason::Unsubscribe,
            lead_status: Some(LeadStatus::Unsubscribed),
        },
        Sentiment::Ooo if !config.handle_ooo => Decision::Suppress {
            reason: SuppressReason::OutOfOffice,
            lead_status: None,
        },
        Sentiment::Positive if config.autopilot && has_draft(report) => Decision::Autosend,
        _ => Decision::Draft,
    }
}

fn has_draft(report: &SentimentReport) -> bool {
    report.draft.as_deref().is_some_and(|d| !d.trim().is_empty())
}

/// Collaborators of the pipeline.
pub struct PipelineDeps {
    pub sentiment: Arc<dyn SentimentService>,
    pub accounts: Arc<dyn AccountRegistry>,
    pub leads: Arc<dyn LeadRegistry>,
    pub drafts: Arc<dyn DraftStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Drives one lead reply from analysis to its terminal state.
pub struct SalesReplyPipeline {
    deps: PipelineDeps,
    scheduler: AutosendScheduler,
    rng: Arc<dyn RandomSource>,
    thinking_time: ThinkingTime,
    sentiment_timeout: Duration,
    dispatch_timeout: Duration,
}

impl SalesReplyPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            deps,
            scheduler: AutosendScheduler::new(),
            rng: Arc::new(ThreadRandom),
            thinking_time: ThinkingTime::default(),
            sentiment_timeout: DEFAULT_SENTIMENT_TIMEOUT,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Apply the timing settings from process configuration.
    pub fn with_config(self, config: &OutreachConfig) -> Self {
        self.with_thinking_time(config.thinking_time)
            .with_sentiment_timeout(config.sentiment_timeout)
            .with_dispatch_timeout(config.dispatch_timeout)
    }

    pub fn with_scheduler(mut self, scheduler: AutosendScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_thinking_time(mut self, thinking_time: ThinkingTime) -> Self {
        self.thinking_time = thinking_time;
        self
    }

    pub fn with_sentiment_timeout(mut self, timeout: Duration) -> Self {
        self.sentiment_timeout = timeout;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// The scheduler holding this pipeline's pending sends.
    ///
    /// Cancel through [`cancel_autosend`](Self::cancel_autosend) so the
    /// scheduled draft is updated too.
    pub fn scheduler(&self) -> &AutosendScheduler {
        &self.scheduler
    }

    /// Withdraw the pending send for a thread and mark its draft `Cancelled`.
    pub async fn cancel_autosend(&self, thread_id: &str) -> Result<bool, PipelineError> {
        if !self.scheduler.cancel(thread_id).await {
            return Ok(false);
        }
        self.mark_scheduled_cancelled(thread_id, None).await?;
        Ok(true)
    }

    /// Withdraw every pending send. Returns how many were cancelled.
    pub async fn cancel_all_autosends(&self) -> Result<usize, PipelineError> {
        let mut cancelled = 0;
        for pending in self.scheduler.pending().await {
            if self.cancel_autosend(&pending.thread_id).await? {
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn mark_scheduled_cancelled(
        &self,
        thread_id: &str,
        keep: Option<Uuid>,
    ) -> Result<(), PipelineError> {
        for record in self.deps.drafts.for_thread(thread_id).await? {
            if record.status != DraftStatus::Scheduled || Some(record.id) == keep {
                continue;
            }
            debug!(thread_id = %thread_id, draft_id = %record.id, "Scheduled draft cancelled");
            self.deps
                .drafts
                .save(record.with_status(DraftStatus::Cancelled))
                .await?;
        }
        Ok(())
    }

    /// Process one regular lead reply.
    pub async fn handle(
        &self,
        msg: &IncomingMessage,
        config: AgentConfig,
    ) -> Result<PipelineOutcome, PipelineError> {
        debug!(
            thread_id = %msg.thread_id,
            lead_id = %msg.lead_id,
            state = ?ReplyState::Received,
            allow_followups = config.allow_followups,
            handle_objections = config.handle_objections,
            "Lead reply received"
        );

        let report = self.analyze(msg).await;
        debug!(
            thread_id = %msg.thread_id,
            state = ?ReplyState::Classified,
            sentiment = %report.sentiment,
            score = report.score,
            "Lead reply classified"
        );

        match decide(&report, &config) {
            Decision::Suppress {
                reason,
                lead_status,
            } => {
                if let Some(status) = lead_status {
                    self.deps.leads.set_status(&msg.lead_id, status).await?;
                }
                info!(
                    thread_id = %msg.thread_id,
                    lead_id = %msg.lead_id,
                    sentiment = %report.sentiment,
                    reason = ?reason,
                    "Reply suppressed"
                );
                Ok(PipelineOutcome::Suppressed {
                    sentiment: report.sentiment,
                    reason,
                })
            }
            Decision::Draft => {
                let record =
                    DraftRecord::new(&msg.thread_id, &msg.lead_id, &msg.campaign_id, &report);
                let draft_id = record.id;
                self.deps.drafts.save(record).await?;
                info!(
                    thread_id = %msg.thread_id,
                    draft_id = %draft_id,
                    sentiment = %report.sentiment,
                    autopilot = config.autopilot,
                    "Reply drafted for review"
                );
                Ok(PipelineOutcome::Drafted {
                    draft_id,
                    sentiment: report.sentiment,
                })
            }
            Decision::Autosend => {
                let delay = self.thinking_delay();
                let record =
                    DraftRecord::new(&msg.thread_id, &msg.lead_id, &msg.campaign_id, &report)
                        .scheduled();
                let draft_id = record.id;
                self.deps.drafts.save(record.clone()).await?;

                let job = AutosendContext {
                    accounts: Arc::clone(&self.deps.accounts),
                    drafts: Arc::clone(&self.deps.drafts),
                    dispatcher: Arc::clone(&self.deps.dispatcher),
                    dispatch_timeout: self.dispatch_timeout,
                    msg: msg.clone(),
                    record,
                };
                let replaced = self
                    .scheduler
                    .schedule(&msg.thread_id, delay, job.run().boxed())
                    .await;
                if replaced {
                    self.mark_scheduled_cancelled(&msg.thread_id, Some(draft_id))
                        .await?;
                }
                Ok(PipelineOutcome::ScheduledAutosend {
                    draft_id,
                    sentiment: report.sentiment,
                    delay_secs: delay.as_secs(),
                })
            }
        }
    }

    async fn analyze(&self, msg: &IncomingMessage) -> SentimentReport {
        let reply = msg.reply_text();
        match tokio::time::timeout(self.sentiment_timeout, self.deps.sentiment.analyze(&reply))
            .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(
                    thread_id = %msg.thread_id,
                    error = %e,
                    "Sentiment analysis failed, routing to a human"
                );
                SentimentReport::needs_human()
            }
            Err(_) => {
                warn!(
                    thread_id = %msg.thread_id,
                    timeout_secs = self.sentiment_timeout.as_secs(),
                    "Sentiment analysis timed out, routing to a human"
                );
                SentimentReport::needs_human()
            }
        }
    }

    /// Whole minutes drawn uniformly from the thinking-time window.
    fn thinking_delay(&self) -> Duration {
        let minutes = self.rng.between(
            self.thinking_time.min_minutes(),
            self.thinking_time.max_minutes(),
        );
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Everything a fired autosend needs, detached from the pipeline.
struct AutosendContext {
    accounts: Arc<dyn AccountRegistry>,
    drafts: Arc<dyn DraftStore>,
    dispatcher: Arc<dyn Dispatcher>,
    dispatch_timeout: Duration,
    msg: IncomingMessage,
    /// The `Scheduled` draft this send settles.
    record: DraftRecord,
}

impl AutosendContext {
    async fn run(self) -> AutosendOutcome {
        let draft = self.record.draft.clone().unwrap_or_default();

        let accounts = match self.accounts.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => return self.fail(format!("account registry unavailable: {e}")).await,
        };
        let campaign_ids = match self.accounts.campaign(&self.msg.campaign_id).await {
            Ok(campaign) => campaign.map(|c| c.smtp_account_ids).unwrap_or_default(),
            Err(e) => return self.fail(format!("campaign lookup failed: {e}")).await,
        };

        // The lead wrote to our account; that identity answers if it can.
        let Some(sender) =
            resolve_reply_sender(&self.msg.receiver_email, &accounts, campaign_ids.as_slice())
        else {
            self.park("no sender account with remaining quota").await;
            return AutosendOutcome::NoSender;
        };

        let subject = self.msg.reply_subject();
        let sent = match tokio::time::timeout(
            self.dispatch_timeout,
            self.dispatcher
                .send(sender, &self.msg.sender_email, &subject, &draft),
        )
        .await
        {
            Ok(sent) => sent,
            // The transport may still finish after we stop waiting.
            Err(_) => {
                let reason = DispatchError::Timeout(self.dispatch_timeout).to_string();
                self.park(&format!(
                    "delivery unconfirmed ({reason}); check the sent folder of {} before re-sending",
                    sender.email
                ))
                .await;
                return AutosendOutcome::DeliveryUnknown { reason };
            }
        };

        if let Err(e) = sent {
            return self.fail(format!("dispatch failed: {e}")).await;
        }

        if let Err(e) = self.accounts.record_send(&sender.id).await {
            error!(account = %sender.id, error = %e, "Sent but failed to record quota usage");
        }
        self.settle(self.record.clone().with_status(DraftStatus::Sent))
            .await;
        AutosendOutcome::Sent {
            account_id: sender.id.clone(),
        }
    }

    async fn fail(&self, reason: String) -> AutosendOutcome {
        self.park(&reason).await;
        AutosendOutcome::Failed { reason }
    }

    /// Hand the unsent draft to a human.
    async fn park(&self, note: &str) {
        self.settle(self.record.clone().needing_attention(note))
            .await;
    }

    async fn settle(&self, record: DraftRecord) {
        let status = record.status;
        if let Err(e) = self.drafts.save(record).await {
            error!(
                thread_id = %self.msg.thread_id,
                draft_id = %self.record.id,
                status = ?status,
                error = %e,
                "Failed to persist scheduled draft update"
            );
        }
    }
}
