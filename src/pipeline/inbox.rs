//! Inbox router: first stop for every inbound lead message.
//!
//! A new message on a thread makes any pending autosend stale, so it is
//! cancelled before anything else. Bounces and opt-outs update the lead and
//! stop there; only regular replies reach the sales pipeline.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::sales_agent::{PipelineOutcome, SalesReplyPipeline};
use crate::classifier::{MessageClassifier, MessageKind};
use crate::config::AgentConfig;
use crate::error::PipelineError;
use crate::inbound::{IncomingMessage, ThreadKeys, parse_raw_message};
use crate::store::{LeadRegistry, LeadStatus};

/// Result of routing one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxOutcome {
    pub kind: MessageKind,
    /// A pending autosend on the thread was cancelled.
    pub cancelled_autosend: bool,
    /// Set for `Regular` messages only.
    pub pipeline: Option<PipelineOutcome>,
}

/// Classifies inbound messages and dispatches them.
pub struct InboxRouter {
    classifier: MessageClassifier,
    leads: Arc<dyn LeadRegistry>,
    pipeline: Arc<SalesReplyPipeline>,
}

impl InboxRouter {
    pub fn new(leads: Arc<dyn LeadRegistry>, pipeline: Arc<SalesReplyPipeline>) -> Self {
        Self {
            classifier: MessageClassifier::default_rules(),
            leads,
            pipeline,
        }
    }

    pub fn with_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn handle(
        &self,
        msg: &IncomingMessage,
        config: AgentConfig,
    ) -> Result<InboxOutcome, PipelineError> {
        let cancelled_autosend = self.pipeline.cancel_autosend(&msg.thread_id).await?;

        let kind = self.classifier.classify(&msg.subject, &msg.body);
        let lead_status = match kind {
            MessageKind::Bounce => Some(LeadStatus::Bounced),
            MessageKind::Unsubscribe => Some(LeadStatus::Unsubscribed),
            MessageKind::Regular => None,
        };

        let pipeline = match lead_status {
            Some(status) => {
                self.leads.set_status(&msg.lead_id, status).await?;
                info!(
                    thread_id = %msg.thread_id,
                    lead_id = %msg.lead_id,
                    kind = kind.label(),
                    status = %status,
                    "Lead status updated from inbound message"
                );
                None
            }
            None => Some(self.pipeline.handle(msg, config).await?),
        };

        Ok(InboxOutcome {
            kind,
            cancelled_autosend,
            pipeline,
        })
    }

    /// Parse an RFC 822 message and route it.
    pub async fn handle_raw(
        &self,
        raw: &[u8],
        keys: ThreadKeys,
        config: AgentConfig,
    ) -> Result<InboxOutcome, PipelineError> {
        let msg = parse_raw_message(raw, keys)?;
        self.handle(&msg, config).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::accounts::Account;
    use crate::dispatch::Dispatcher;
    use crate::error::{DispatchError, LlmError};
    use crate::llm::{Sentiment, SentimentReport, SentimentService};
    use crate::pipeline::sales_agent::PipelineDeps;
    use crate::store::{DraftStatus, DraftStore, InMemoryAccounts, InMemoryDrafts, InMemoryLeads};

    struct CountingSentiment {
        calls: AtomicUsize,
        sentiment: Sentiment,
    }

    #[async_trait]
    impl SentimentService for CountingSentiment {
        async fn analyze(&self, _reply_text: &str) -> Result<SentimentReport, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SentimentReport {
                sentiment: self.sentiment,
                score: 90,
                draft: Some("Happy to chat Thursday.".into()),
                key_points: Vec::new(),
            })
        }
    }

    struct NoopDispatcher;

    #[async_trait]
    impl Dispatcher for NoopDispatcher {
        async fn send(&self, _: &Account, _: &str, _: &str, _: &str) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    struct Setup {
        router: InboxRouter,
        sentiment: Arc<CountingSentiment>,
        leads: Arc<InMemoryLeads>,
        drafts: Arc<InMemoryDrafts>,
        pipeline: Arc<SalesReplyPipeline>,
    }

    fn setup(sentiment: Sentiment) -> Setup {
        let sentiment = Arc::new(CountingSentiment {
            calls: AtomicUsize::new(0),
            sentiment,
        });
        let leads = Arc::new(InMemoryLeads::new());
        let drafts = Arc::new(InMemoryDrafts::new());
        let pipeline = Arc::new(SalesReplyPipeline::new(PipelineDeps {
            sentiment: sentiment.clone(),
            accounts: Arc::new(InMemoryAccounts::new(vec![Account::new(
                "a1",
                "ana@alpha.io",
                "Ana",
                10,
            )])),
            leads: leads.clone(),
            drafts: drafts.clone(),
            dispatcher: Arc::new(NoopDispatcher),
        }));
        Setup {
            router: InboxRouter::new(leads.clone(), pipeline.clone()),
            sentiment,
            leads,
            drafts,
            pipeline,
        }
    }

    fn message(subject: &str, body: &str) -> IncomingMessage {
        IncomingMessage {
            thread_id: "t1".into(),
            lead_id: "lead-1".into(),
            sender_email: "lee@prospect.com".into(),
            receiver_email: "ana@alpha.io".into(),
            subject: subject.into(),
            body: body.into(),
            campaign_id: "c1".into(),
        }
    }

    #[tokio::test]
    async fn bounce_marks_lead_and_skips_pipeline() {
        let s = setup(Sentiment::Positive);
        let outcome = s
            .router
            .handle(
                &message("Undeliverable: Hello", "550 5.1.1 user unknown"),
                AgentConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.kind, MessageKind::Bounce);
        assert!(outcome.pipeline.is_none());
        assert_eq!(s.leads.status("lead-1").await.unwrap(), Some(LeadStatus::Bounced));
        assert_eq!(s.sentiment.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_marks_lead_and_skips_pipeline() {
        let s = setup(Sentiment::Positive);
        let outcome = s
            .router
            .handle(&message("Re: Hello", "Please remove me from your list"), AgentConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.kind, MessageKind::Unsubscribe);
        assert_eq!(
            s.leads.status("lead-1").await.unwrap(),
            Some(LeadStatus::Unsubscribed)
        );
        assert_eq!(s.sentiment.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn regular_reply_reaches_pipeline() {
        let s = setup(Sentiment::Positive);
        let outcome = s
            .router
            .handle(&message("Re: Hello", "Sounds good, when works?"), AgentConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.kind, MessageKind::Regular);
        assert!(!outcome.cancelled_autosend);
        assert!(matches!(
            outcome.pipeline,
            Some(PipelineOutcome::ScheduledAutosend { .. })
        ));
        assert_eq!(s.sentiment.calls.load(Ordering::SeqCst), 1);
        assert!(s.pipeline.scheduler().is_pending("t1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn new_message_cancels_pending_autosend() {
        let s = setup(Sentiment::Positive);
        s.router
            .handle(&message("Re: Hello", "Sounds good, when works?"), AgentConfig::default())
            .await
            .unwrap();
        assert!(s.pipeline.scheduler().is_pending("t1").await);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let outcome = s
            .router
            .handle(&message("Re: Hello", "Actually, unsubscribe me."), AgentConfig::default())
            .await
            .unwrap();

        assert!(outcome.cancelled_autosend);
        assert_eq!(outcome.kind, MessageKind::Unsubscribe);
        assert!(!s.pipeline.scheduler().is_pending("t1").await);

        let drafts = s.drafts.for_thread("t1").await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].status, DraftStatus::Cancelled);
    }

    #[tokio::test]
    async fn raw_messages_are_parsed_then_routed() {
        let s = setup(Sentiment::Neutral);
        let raw = b"From: lee@prospect.com\r\n\
To: ana@alpha.io\r\n\
Subject: Re: Hello\r\n\
\r\n\
Can you send pricing?\r\n";
        let keys = ThreadKeys {
            thread_id: "t9".into(),
            lead_id: "lead-9".into(),
            campaign_id: "c1".into(),
        };
        let outcome = s
            .router
            .handle_raw(raw, keys, AgentConfig::default())
            .await
            .unwrap();
        assert!(matches!(outcome.pipeline, Some(PipelineOutcome::Drafted { .. })));
    }
}
