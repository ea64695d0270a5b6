//! Inbound reply handling.
//!
//! Every inbound lead message flows through:
//! 1. `InboxRouter::handle()`: cancel stale autosend, classify (no LLM)
//! 2. Bounce / unsubscribe: lead status update, stop
//! 3. `SalesReplyPipeline::handle()`: sentiment, then suppress, draft, or
//!    schedule an autosend
//! 4. `AutosendScheduler`: delayed, cancellable send through the reply router

pub mod autosend;
pub mod inbox;
pub mod sales_agent;

pub use autosend::{AutosendEvent, AutosendOutcome, AutosendScheduler, PendingAutosend};
pub use inbox::{InboxOutcome, InboxRouter};
pub use sales_agent::{
    Decision, PipelineDeps, PipelineOutcome, ReplyState, SalesReplyPipeline, SuppressReason,
    decide,
};
