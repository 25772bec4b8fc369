//! # Stock Locks
//!
//! Exclusive async locks keyed by product id (and by sale id for
//! delete/edit), shared by the stock ledger and the sale manager.
//!
//! ## Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale A: [pan, kuchen]            Sale B: [kuchen, pan]                 │
//! │      │                                │                                 │
//! │      ▼ sort ids                       ▼ sort ids                        │
//! │  lock(kuchen) ── lock(pan)        lock(kuchen) ... waits on A           │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  BEGIN ── read stock ── deduct ── COMMIT ── drop guard                  │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                       B proceeds, sees A's stock        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Multi-key acquisition is always in ascending key order, so two holders
//!   can never wait on each other.
//! - Every acquisition shares one deadline; missing it yields
//!   [`CoreError::ConcurrencyConflict`] and releases whatever was taken.
//! - Locks are taken before a pooled connection is checked out.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forneria_core::CoreError;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Registry of per-key async mutexes.
#[derive(Debug, Default)]
pub struct StockLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held locks. Dropping the guard releases all of them.
#[derive(Debug)]
pub struct LockGuard {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockGuard {
    /// Keys held by this guard, in acquisition order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every product in `product_ids` (duplicates collapsed), in
    /// ascending id order.
    pub async fn lock_products<I, S>(
        &self,
        product_ids: I,
        wait: Duration,
    ) -> Result<LockGuard, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: BTreeSet<String> = product_ids
            .into_iter()
            .map(|id| format!("product:{}", id.as_ref()))
            .collect();
        self.acquire(keys, wait).await
    }

    /// Locks a single sale for delete/edit.
    pub async fn lock_sale(&self, sale_id: &str, wait: Duration) -> Result<LockGuard, CoreError> {
        self.acquire(BTreeSet::from([format!("sale:{sale_id}")]), wait).await
    }

    async fn acquire(
        &self,
        keys: BTreeSet<String>,
        wait: Duration,
    ) -> Result<LockGuard, CoreError> {
        let deadline = Instant::now() + wait;
        let mut guards = Vec::with_capacity(keys.len());

        for key in &keys {
            let slot = self.slot(key);
            match timeout_at(deadline, slot.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    warn!(key = %key, wait_ms = wait.as_millis() as u64, "Lock wait timed out");
                    return Err(CoreError::ConcurrencyConflict {
                        resource: key.clone(),
                    });
                }
            }
        }

        debug!(keys = ?keys, "Locks acquired");
        Ok(LockGuard {
            keys: keys.into_iter().collect(),
            _guards: guards,
        })
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop slots nobody holds or waits on
        if slots.len() > 1024 {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }

        Arc::clone(slots.entry(key.to_string()).or_default())
    }

}
