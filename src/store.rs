use crate::error::SplitpotError;
use crate::models::{GroupKey, GroupTransaction, TransactionState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Slot {
    txn: Arc<Mutex<GroupTransaction>>,
    timer: JoinHandle<()>,
}

/// Registry of live transactions, one slot per group.
///
/// The slot's inner mutex is the unit of mutual exclusion for everything
/// that reads or mutates a transaction; the outer registry lock is only ever
/// held briefly for slot bookkeeping. `create` arms an expiry timer and
/// `remove` aborts it synchronously, so no timer outlives its record.
pub struct TransactionStore {
    slots: Mutex<HashMap<GroupKey, Slot>>,
    ttl: Duration,
}

impl TransactionStore {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(TransactionStore {
            slots: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Registers `txn` for its group and arms the expiry countdown.
    /// Fails with `AlreadyActive` while another transaction holds the slot
    /// and with `NoParticipants` for an empty participant set.
    pub async fn create(
        self: &Arc<Self>,
        txn: GroupTransaction,
    ) -> Result<Arc<Mutex<GroupTransaction>>, SplitpotError> {
        let group_key = txn.group_key();
        // A record without participants could never confirm or settle and
        // would divide shares by zero.
        if txn.participants().is_empty() {
            return Err(SplitpotError::NoParticipants);
        }
        let mut slots = self.slots.lock().await;
        if slots.contains_key(&group_key) {
            warn!(group_key, "Rejecting start: transaction already active");
            return Err(SplitpotError::AlreadyActive(group_key));
        }

        let txn = Arc::new(Mutex::new(txn));
        let timer = {
            let store = Arc::clone(self);
            let ttl = self.ttl;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                store.expire(group_key).await;
            })
        };
        slots.insert(
            group_key,
            Slot {
                txn: Arc::clone(&txn),
                timer,
            },
        );
        info!(group_key, "Transaction registered, expiry timer armed");
        Ok(txn)
    }

    pub async fn get(
        &self,
        group_key: GroupKey,
    ) -> Result<Arc<Mutex<GroupTransaction>>, SplitpotError> {
        let slots = self.slots.lock().await;
        slots
            .get(&group_key)
            .map(|slot| Arc::clone(&slot.txn))
            .ok_or(SplitpotError::NotFound(group_key))
    }

    /// Drops the group's slot and cancels its pending expiry timer.
    /// Idempotent: removing an absent group is a no-op.
    pub async fn remove(&self, group_key: GroupKey) {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.remove(&group_key) {
            slot.timer.abort();
            debug!(group_key, "Transaction removed, expiry timer cancelled");
        }
    }

    /// Expiry path, fired by the armed timer. A transaction that is mid
    /// settlement is not interrupted: expiry is deferred and applied by the
    /// coordinator once the settlement attempt returns.
    pub async fn expire(self: &Arc<Self>, group_key: GroupKey) {
        let txn = {
            let slots = self.slots.lock().await;
            match slots.get(&group_key) {
                Some(slot) => Arc::clone(&slot.txn),
                None => return,
            }
        };

        let mut guard = txn.lock().await;
        if guard.state() == TransactionState::Settling {
            info!(group_key, "Expiry deferred: settlement in flight");
            guard.defer_expiry();
            return;
        }
        guard.mark_expired();
        drop(guard);

        // Only reap the slot we inspected; a cancel/create pair may have
        // replaced it while the registry lock was released.
        let mut slots = self.slots.lock().await;
        let same_record = slots
            .get(&group_key)
            .map(|slot| Arc::ptr_eq(&slot.txn, &txn))
            .unwrap_or(false);
        if same_record {
            if let Some(slot) = slots.remove(&group_key) {
                slot.timer.abort();
                info!(group_key, "Transaction expired and reaped");
            }
        }
    }

    /// Number of live transactions (test support).
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
