//! Sender rotation: round-robin selection under daily quotas.
//!
//! A [`RotationSelector`] owns one cursor into the account list the caller
//! passes on every call. Fairness holds only while that list keeps a stable
//! order and membership; a reordered or resized list starts a new cycle from
//! wherever the cursor lands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::accounts::Account;

/// Round-robin sender selector with its own cursor.
#[derive(Debug, Default)]
pub struct RotationSelector {
    /// Index of the last selected account; `None` before the first pick.
    cursor: Mutex<Option<usize>>,
}

impl RotationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next account with remaining quota, or `None` if every
    /// account is exhausted.
    ///
    /// The cursor always advances one position first, then scans forward
    /// (wrapping) to the first account with capacity. The whole
    /// read-modify-write happens under the cursor lock so two concurrent
    /// callers never land on the same slot.
    pub fn next_sender<'a>(&self, accounts: &'a [Account]) -> Option<&'a Account> {
        if !accounts.iter().any(Account::has_capacity) {
            debug!(pool = accounts.len(), "No sender capacity left");
            return None;
        }

        let len = accounts.len();
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let start = match *cursor {
            Some(last) => (last + 1) % len,
            None => 0,
        };

        for offset in 0..len {
            let idx = (start + offset) % len;
            let candidate = &accounts[idx];
            if candidate.has_capacity() {
                *cursor = Some(idx);
                debug!(
                    account = %candidate.email,
                    index = idx,
                    remaining = candidate.remaining(),
                    "Selected sender"
                );
                return Some(candidate);
            }
        }

        // Unreachable while the capacity check above holds.
        warn!("Rotation scan found no sender despite available capacity");
        *cursor = Some(start);
        None
    }

    /// Forget the cursor; the next call starts at index 0.
    pub fn reset(&self) {
        *self.cursor.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// One independent [`RotationSelector`] per pool key (usually a campaign id).
#[derive(Debug, Default)]
pub struct RotationPools {
    selectors: RwLock<HashMap<String, Arc<RotationSelector>>>,
}

impl RotationPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selector for `key`, created on first use.
    pub fn selector(&self, key: &str) -> Arc<RotationSelector> {
        if let Some(selector) = self
            .selectors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Arc::clone(selector);
        }
        let mut selectors = self.selectors.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(selectors.entry(key.to_string()).or_default())
    }

    /// Shorthand for `selector(key).next_sender(accounts)`.
    pub fn next_sender<'a>(&self, key: &str, accounts: &'a [Account]) -> Option<&'a Account> {
        self.selector(key).next_sender(accounts)
    }

    /// Drop the cursor for `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.selectors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }
}
