//! Cancellable delayed sends, keyed by thread id.
//!
//! Each scheduled send is a tokio task that sleeps for its delay, takes itself
//! out of the pending table, then runs its job. Once a job has started it can
//! no longer be cancelled; before that, a new message on the thread or an
//! explicit [`AutosendScheduler::cancel`] aborts it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Work run when a scheduled send fires.
pub type AutosendJob = BoxFuture<'static, AutosendOutcome>;

/// How a fired send ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AutosendOutcome {
    Sent { account_id: String },
    /// No eligible account had quota left.
    NoSender,
    Failed { reason: String },
    /// The dispatch timed out after handing the message to the transport.
    /// It may or may not have been delivered.
    DeliveryUnknown { reason: String },
}

/// Broadcast to subscribers after every fired send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosendEvent {
    pub thread_id: String,
    #[serde(flatten)]
    pub outcome: AutosendOutcome,
}

/// A send that has not fired yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAutosend {
    pub thread_id: String,
    pub due_at: Instant,
}

struct Entry {
    id: Uuid,
    due_at: Instant,
    handle: JoinHandle<()>,
}

/// Tracks delayed sends. Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct AutosendScheduler {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    tx: broadcast::Sender<AutosendEvent>,
}

impl Default for AutosendScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AutosendScheduler {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            tx,
        }
    }

    /// Subscribe to outcome events.
    pub fn subscribe(&self) -> broadcast::Receiver<AutosendEvent> {
        self.tx.subscribe()
    }

    /// Run `job` after `delay`. A pending send for the same thread is
    /// aborted and replaced; returns `true` when that happened.
    pub async fn schedule(&self, thread_id: &str, delay: Duration, job: AutosendJob) -> bool {
        let id = Uuid::new_v4();
        let due_at = Instant::now() + delay;

        // Held across spawn + insert so the task cannot look itself up early.
        let mut entries = self.entries.write().await;

        let table = Arc::clone(&self.entries);
        let tx = self.tx.clone();
        let key = thread_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(due_at).await;

            {
                let mut entries = table.write().await;
                if !entries.get(&key).is_some_and(|e| e.id == id) {
                    return;
                }
                entries.remove(&key);
            }

            debug!(thread_id = %key, "Autosend firing");
            let outcome = job.await;
            match &outcome {
                AutosendOutcome::Sent { account_id } => {
                    info!(thread_id = %key, account = %account_id, "Autosend delivered")
                }
                AutosendOutcome::NoSender => {
                    warn!(thread_id = %key, "Autosend found no sender with quota")
                }
                AutosendOutcome::Failed { reason } => {
                    warn!(thread_id = %key, reason = %reason, "Autosend failed")
                }
                AutosendOutcome::DeliveryUnknown { reason } => {
                    warn!(thread_id = %key, reason = %reason, "Autosend delivery unconfirmed")
                }
            }
            // Ok if nobody is listening
            let _ = tx.send(AutosendEvent {
                thread_id: key,
                outcome,
            });
        });

        let replaced = match entries.insert(thread_id.to_string(), Entry { id, due_at, handle }) {
            Some(previous) => {
                previous.handle.abort();
                info!(thread_id = %thread_id, "Replaced pending autosend");
                true
            }
            None => false,
        };

        info!(
            thread_id = %thread_id,
            delay_secs = delay.as_secs(),
            "Autosend scheduled"
        );
        replaced
    }

    /// Abort the pending send for a thread. Returns `false` if none was
    /// pending (never scheduled, already fired, or already cancelled).
    pub async fn cancel(&self, thread_id: &str) -> bool {
        match self.entries.write().await.remove(thread_id) {
            Some(entry) => {
                entry.handle.abort();
                info!(thread_id = %thread_id, "Cancelled pending autosend");
                true
            }
            None => false,
        }
    }

    pub async fn is_pending(&self, thread_id: &str) -> bool {
        self.entries.read().await.contains_key(thread_id)
    }

    /// Pending sends, soonest first.
    pub async fn pending(&self) -> Vec<PendingAutosend> {
        let mut pending: Vec<PendingAutosend> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(thread_id, entry)| PendingAutosend {
                thread_id: thread_id.clone(),
                due_at: entry.due_at,
            })
            .collect();
        pending.sort_by_key(|p| p.due_at);
        pending
    }

    /// Abort everything still pending. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        for (_, entry) in entries.drain() {
            entry.handle.abort();
        }
        if count > 0 {
            info!(count, "Cancelled all pending autosends");
        }
        count
    }
}
