//! End-to-end flows over the public API with stubbed LLM and dispatch.
//!
//! The LLM stub answers through the real `LlmSentimentService` parser, so
//! these tests exercise the same JSON handling a Gemini response would.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use outreach_core::accounts::{Account, CampaignRef};
use outreach_core::config::AgentConfig;
use outreach_core::dispatch::Dispatcher;
use outreach_core::error::{DispatchError, LlmError};
use outreach_core::inbound::IncomingMessage;
use outreach_core::llm::{
    CompletionRequest, CompletionResponse, LlmProvider, LlmSentimentService,
};
use outreach_core::pipeline::{
    AutosendOutcome, InboxRouter, PipelineDeps, PipelineOutcome, SalesReplyPipeline,
};
use outreach_core::random::SeededRandom;
use outreach_core::rotation::RotationSelector;
use outreach_core::store::{
    AccountRegistry, DraftStatus, InMemoryAccounts, InMemoryDrafts, InMemoryLeads, LeadRegistry,
    LeadStatus,
};
use outreach_core::warmup::WarmupGenerator;

/// Upper bound on waiting for an autosend event (virtual time).
const EVENT_TIMEOUT: Duration = Duration::from_secs(3600);

/// LLM stub returning a canned (markdown-wrapped) answer.
struct StubLlm {
    answer: String,
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            content: self.answer.clone(),
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct CapturingDispatcher {
    sent: Mutex<Vec<(String, String, String, String)>>,
}

#[async_trait]
impl Dispatcher for CapturingDispatcher {
    async fn send(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push((
            account.email.clone(),
            to.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

struct World {
    router: InboxRouter,
    pipeline: Arc<SalesReplyPipeline>,
    accounts: Arc<InMemoryAccounts>,
    leads: Arc<InMemoryLeads>,
    drafts: Arc<InMemoryDrafts>,
    dispatcher: Arc<CapturingDispatcher>,
}

async fn world(llm_answer: &str) -> World {
    let accounts = Arc::new(InMemoryAccounts::new(vec![
        Account::new("a1", "ana@alpha.io", "Ana", 20),
        Account::new("a2", "ben@bravo.dev", "Ben", 20),
    ]));
    accounts
        .add_campaign(CampaignRef::new("spring", &["a1", "a2"]))
        .await;
    let leads = Arc::new(InMemoryLeads::new());
    let drafts = Arc::new(InMemoryDrafts::new());
    let dispatcher = Arc::new(CapturingDispatcher::default());

    let llm = Arc::new(StubLlm {
        answer: llm_answer.to_string(),
    });
    let pipeline = Arc::new(
        SalesReplyPipeline::new(PipelineDeps {
            sentiment: Arc::new(LlmSentimentService::new(llm)),
            accounts: accounts.clone(),
            leads: leads.clone(),
            drafts: drafts.clone(),
            dispatcher: dispatcher.clone(),
        })
        .with_rng(Arc::new(SeededRandom::new(11))),
    );

    World {
        router: InboxRouter::new(leads.clone(), pipeline.clone()),
        pipeline,
        accounts,
        leads,
        drafts,
        dispatcher,
    }
}

fn reply(body: &str) -> IncomingMessage {
    IncomingMessage {
        thread_id: "thread-7".into(),
        lead_id: "lead-7".into(),
        sender_email: "lee@prospect.com".into(),
        receiver_email: "ben@bravo.dev".into(),
        subject: "Quick question about onboarding".into(),
        body: body.into(),
        campaign_id: "spring".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn positive_reply_goes_out_from_thread_sender() {
    let answer = "```json\n{\"sentiment\": \"Positive\", \"score\": 91, \"draft\": \"Great! Does Thursday at 10 work?\", \"keyPoints\": [\"wants a call\"]}\n```";
    let w = world(answer).await;
    let mut events = w.pipeline.scheduler().subscribe();

    let outcome = w
        .router
        .handle(
            &reply("Yes, this sounds useful.\n\n> Hi Lee, ..."),
            AgentConfig::default(),
        )
        .await
        .unwrap();

    let Some(PipelineOutcome::ScheduledAutosend { delay_secs, .. }) = outcome.pipeline else {
        panic!("expected a scheduled autosend, got {outcome:?}");
    };
    assert!((5 * 60..=15 * 60).contains(&delay_secs));
    assert_eq!(delay_secs % 60, 0);

    let event = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.thread_id, "thread-7");
    assert_eq!(event.outcome, AutosendOutcome::Sent { account_id: "a2".into() });

    let sent = w.dispatcher.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let (from, to, subject, body) = &sent[0];
    assert_eq!(from, "ben@bravo.dev");
    assert_eq!(to, "lee@prospect.com");
    assert_eq!(subject, "Re: Quick question about onboarding");
    assert_eq!(body, "Great! Does Thursday at 10 work?");

    let accounts = w.accounts.accounts().await.unwrap();
    assert_eq!(accounts[1].sent_today, 1);
    assert_eq!(accounts[0].sent_today, 0);

    let drafts = w.drafts.all().await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn follow_up_message_cancels_scheduled_reply() {
    let answer = r#"{"sentiment": "Positive", "score": 80, "draft": "Happy to help."}"#;
    let w = world(answer).await;

    w.router
        .handle(&reply("Interesting, tell me more."), AgentConfig::default())
        .await
        .unwrap();
    assert!(w.pipeline.scheduler().is_pending("thread-7").await);

    let outcome = w
        .router
        .handle(&reply("Please remove me from this list."), AgentConfig::default())
        .await
        .unwrap();
    assert!(outcome.cancelled_autosend);
    assert_eq!(
        w.leads.status("lead-7").await.unwrap(),
        Some(LeadStatus::Unsubscribed)
    );

    tokio::time::sleep(EVENT_TIMEOUT).await;
    assert!(w.dispatcher.sent.lock().unwrap().is_empty());

    let drafts = w.drafts.all().await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Cancelled);
    assert_eq!(drafts[0].draft.as_deref(), Some("Happy to help."));
}

#[tokio::test]
async fn garbled_model_output_becomes_a_review_draft() {
    let w = world("I think they are interested!").await;
    let outcome = w
        .router
        .handle(&reply("Could you share pricing?"), AgentConfig::default())
        .await
        .unwrap();

    assert!(matches!(outcome.pipeline, Some(PipelineOutcome::Drafted { .. })));
    let drafts = w.drafts.all().await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Drafted);
    assert_eq!(drafts[0].score, 50);
    assert!(drafts[0].draft.is_none());
}

#[tokio::test]
async fn negative_reply_deactivates_lead() {
    let answer = r#"{"sentiment": "Negative", "score": 5, "draft": "Understood."}"#;
    let w = world(answer).await;
    w.router
        .handle(&reply("We went with another vendor."), AgentConfig::default())
        .await
        .unwrap();

    assert_eq!(
        w.leads.status("lead-7").await.unwrap(),
        Some(LeadStatus::Inactive)
    );
    assert!(w.drafts.is_empty().await);
    assert!(!w.pipeline.scheduler().is_pending("thread-7").await);
}

#[test]
fn warmup_then_rotation_over_one_pool() {
    let accounts = vec![
        Account::new("a1", "ana@alpha.io", "Ana", 2),
        Account::new("a2", "ari@alpha.io", "Ari", 2),
        Account::new("b1", "ben@bravo.dev", "Ben", 2),
        Account::new("c1", "cho@charlie.co", "Cho", 2),
    ];

    let pairings = WarmupGenerator::new()
        .with_rng(Arc::new(SeededRandom::new(3)))
        .generate(&accounts)
        .unwrap();
    assert_eq!(pairings.len(), accounts.len());
    for pairing in &pairings {
        let sender = accounts.iter().find(|a| a.id == pairing.sender_id).unwrap();
        let receiver = accounts
            .iter()
            .find(|a| a.email == pairing.receiver_email)
            .unwrap();
        assert_ne!(sender.domain, receiver.domain);
        assert!(!pairing.body.contains('{'));
        assert!(!pairing.body.contains('|'));
        assert!(pairing.body.contains(&receiver.first_name));
        assert!(pairing.body.contains(&sender.first_name));
    }

    let selector = RotationSelector::new();
    let first_cycle: HashSet<String> = (0..accounts.len())
        .map(|_| selector.next_sender(&accounts).unwrap().id.clone())
        .collect();
    assert_eq!(first_cycle.len(), accounts.len());
}
