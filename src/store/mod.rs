//! Account, lead and draft registries.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryAccounts, InMemoryDrafts, InMemoryLeads};
pub use traits::{
    AccountRegistry, DraftRecord, DraftStatus, DraftStore, LeadRegistry, LeadStatus,
};
