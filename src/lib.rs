//! Outreach core: cold-email decision engine.
//!
//! Template spinning, warmup pairing, sender rotation, reply routing,
//! inbound classification and the autonomous sales reply pipeline.

pub mod accounts;
pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inbound;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod random;
pub mod rotation;
pub mod routing;
pub mod spintax;
pub mod store;
pub mod warmup;

pub use accounts::{Account, CampaignRef};
pub use classifier::{MessageKind, classify};
pub use config::{AgentConfig, OutreachConfig, ThinkingTime};
pub use error::{Error, Result};
pub use inbound::IncomingMessage;
pub use rotation::{RotationPools, RotationSelector};
pub use routing::resolve_reply_sender;
pub use spintax::{MergeFields, render, spin};
pub use warmup::{WarmupGenerator, WarmupPairing};
