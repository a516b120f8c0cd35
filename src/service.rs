use crate::constants::{
    AMOUNT_SET, CATEGORY_SET, CURRENCY_SET, PARTICIPANT_CONFIRMED, SETTLEMENT_FAILED,
    SETTLEMENT_SUCCEEDED, TRANSACTION_CANCELLED, TRANSACTION_EXPIRED, TRANSACTION_STARTED,
};
use crate::directory::ParticipantDirectory;
use crate::error::SplitpotError;
use crate::ledger::LedgerClient;
use crate::logger::{AuditEntry, AuditLogger};
use crate::models::{
    transaction::ConfirmProgress, GroupKey, GroupTransaction, ParticipantId, TransactionKind,
    TransactionStatus,
};
use crate::settlement::{SettlementEngine, SettlementReport};
use crate::store::TransactionStore;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// How an automatic settlement attempt ended, reported alongside the
/// confirmation that triggered it.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled {
        participants: Vec<ParticipantId>,
        categories_provisioned: bool,
    },
    Failed {
        error: SplitpotError,
    },
}

/// Structured result of a `Confirm` event.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// Repeated confirmation from the same participant; nothing changed.
    AlreadyConfirmed,
    /// Confirmation recorded; this many are still pending.
    Recorded { awaiting: usize },
    /// This was the last confirmation; settlement ran automatically.
    Complete { settlement: SettlementOutcome },
}

/// Event-dispatch orchestrator: receives participant actions and timer
/// fires, and drives the store, the per-transaction lifecycle, and the
/// settlement engine.
///
/// Reentrant by design; the per-group slot lock inside the store serializes
/// everything that touches one transaction, so racing confirmations, timer
/// fires, and cancellations resolve deterministically.
pub struct Coordinator<L, D, A>
where
    L: LedgerClient,
    D: ParticipantDirectory,
    A: AuditLogger,
{
    store: Arc<TransactionStore>,
    directory: Arc<D>,
    audit: A,
    engine: SettlementEngine<L>,
}

impl<L, D, A> Coordinator<L, D, A>
where
    L: LedgerClient,
    D: ParticipantDirectory,
    A: AuditLogger,
{
    pub fn new(store: Arc<TransactionStore>, ledger: Arc<L>, directory: Arc<D>, audit: A) -> Self {
        info!("Initializing coordinator");
        Coordinator {
            store,
            directory,
            audit,
            engine: SettlementEngine::new(ledger),
        }
    }

    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    /// `Start` event: creates the group's transaction with the mentioned
    /// participant set and arms its expiry timer.
    pub async fn start(
        &self,
        group_key: GroupKey,
        issuer_id: &str,
        mentioned: Vec<ParticipantId>,
        kind: TransactionKind,
    ) -> Result<TransactionStatus, SplitpotError> {
        info!(group_key, issuer = issuer_id, ?kind, "Start event");
        if self.store.get(group_key).await.is_ok() {
            return Err(SplitpotError::AlreadyActive(group_key));
        }

        let mut participants: Vec<ParticipantId> = Vec::new();
        for id in mentioned {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }
        if participants.is_empty() {
            return Err(SplitpotError::NoParticipants);
        }

        let issuer_credential = self
            .directory
            .resolve(issuer_id)
            .await
            .ok_or_else(|| SplitpotError::Unauthenticated(issuer_id.to_string()))?;

        let txn = GroupTransaction::new(
            group_key,
            kind,
            issuer_id.to_string(),
            issuer_credential,
            participants.clone(),
            self.store.ttl(),
        );
        let txn = self.store.create(txn).await?;
        let status = txn.lock().await.status();

        self.audit
            .log_action(
                TRANSACTION_STARTED,
                group_key,
                json!({ "issuer": issuer_id, "kind": kind, "participants": participants }),
            )
            .await;
        Ok(status)
    }

    /// `SetAmount` event. Invalid numeric input is rejected without touching
    /// the transaction, so the issuer can simply retry.
    pub async fn set_amount(
        &self,
        group_key: GroupKey,
        requester: &str,
        raw_amount: &str,
    ) -> Result<TransactionStatus, SplitpotError> {
        let amount: f64 = raw_amount
            .trim()
            .parse()
            .map_err(|_| SplitpotError::InvalidAmount(raw_amount.to_string()))?;

        let txn = self.store.get(group_key).await?;
        let mut guard = txn.lock().await;
        guard.set_amount(requester, amount)?;
        let status = guard.status();
        drop(guard);

        self.audit
            .log_action(AMOUNT_SET, group_key, json!({ "amount": amount }))
            .await;
        Ok(status)
    }

    /// `SetCurrency` event.
    pub async fn set_currency(
        &self,
        group_key: GroupKey,
        requester: &str,
        currency: &str,
    ) -> Result<TransactionStatus, SplitpotError> {
        let txn = self.store.get(group_key).await?;
        let mut guard = txn.lock().await;
        guard.set_currency(requester, currency)?;
        let status = guard.status();
        drop(guard);

        self.audit
            .log_action(CURRENCY_SET, group_key, json!({ "currency": status.currency }))
            .await;
        Ok(status)
    }

    /// `SetCategory` event. Once the category is in place the transaction
    /// starts awaiting confirmations.
    pub async fn set_category(
        &self,
        group_key: GroupKey,
        requester: &str,
        category: &str,
    ) -> Result<TransactionStatus, SplitpotError> {
        let txn = self.store.get(group_key).await?;
        let mut guard = txn.lock().await;
        guard.set_category(requester, category)?;
        guard.open_confirmations();
        let status = guard.status();
        drop(guard);

        self.audit
            .log_action(CATEGORY_SET, group_key, json!({ "category": status.category }))
            .await;
        Ok(status)
    }

    /// `Confirm` event. The last confirmation flips the transaction to
    /// `Confirmed` and immediately runs settlement; its outcome is reported
    /// as part of the confirm result.
    pub async fn confirm(
        &self,
        group_key: GroupKey,
        participant_id: &str,
    ) -> Result<ConfirmOutcome, SplitpotError> {
        let txn = self.store.get(group_key).await?;
        let mut guard = txn.lock().await;

        if !guard.participants().iter().any(|p| p.id() == participant_id) {
            return Err(SplitpotError::NotAParticipant(participant_id.to_string()));
        }
        if guard
            .participants()
            .iter()
            .any(|p| p.id() == participant_id && p.is_confirmed())
        {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        // Resolution failure leaves the transaction untouched; the user can
        // authenticate out-of-band and press confirm again.
        let credential = self
            .directory
            .resolve(participant_id)
            .await
            .ok_or_else(|| SplitpotError::Unauthenticated(participant_id.to_string()))?;

        let progress = guard.confirm(participant_id, credential)?;
        drop(guard);

        self.audit
            .log_action(
                PARTICIPANT_CONFIRMED,
                group_key,
                json!({ "participant": participant_id }),
            )
            .await;

        match progress {
            ConfirmProgress::AlreadyConfirmed => Ok(ConfirmOutcome::AlreadyConfirmed),
            ConfirmProgress::Recorded { awaiting } => Ok(ConfirmOutcome::Recorded { awaiting }),
            ConfirmProgress::AllConfirmed => {
                info!(group_key, "All participants confirmed, settling");
                let settlement = match self.run_settlement(group_key).await {
                    Ok(report) => SettlementOutcome::Settled {
                        participants: report.settled,
                        categories_provisioned: report.categories_provisioned,
                    },
                    Err(error) => SettlementOutcome::Failed { error },
                };
                Ok(ConfirmOutcome::Complete { settlement })
            }
        }
    }

    /// `Settle` event: issuer-requested retry after a failed run.
    pub async fn settle(
        &self,
        group_key: GroupKey,
        requester: &str,
    ) -> Result<SettlementReport, SplitpotError> {
        let txn = self.store.get(group_key).await?;
        {
            let guard = txn.lock().await;
            if guard.issuer_id() != requester {
                return Err(SplitpotError::NotIssuer(requester.to_string()));
            }
        }
        self.run_settlement(group_key).await
    }

    /// `StatusQuery` event: read-only snapshot.
    pub async fn status(&self, group_key: GroupKey) -> Result<TransactionStatus, SplitpotError> {
        let txn = self.store.get(group_key).await?;
        let guard = txn.lock().await;
        Ok(guard.status())
    }

    /// `Cancel` event: issuer-only; rejected while settlement is in flight.
    pub async fn cancel(&self, group_key: GroupKey, requester: &str) -> Result<(), SplitpotError> {
        let txn = self.store.get(group_key).await?;
        let mut guard = txn.lock().await;
        guard.mark_cancelled(requester)?;
        drop(guard);

        self.store.remove(group_key).await;
        self.audit
            .log_action(
                TRANSACTION_CANCELLED,
                group_key,
                json!({ "requester": requester }),
            )
            .await;
        info!(group_key, "Transaction cancelled");
        Ok(())
    }

    /// `Expire` event; normally fired by the store's own timer, callable
    /// directly for manual reaping.
    pub async fn expire(&self, group_key: GroupKey) {
        self.store.expire(group_key).await;
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries().await
    }

    /// Runs the settlement protocol over a snapshot of the transaction.
    ///
    /// The slot lock is held only to enter and leave the `Settling` state;
    /// the ledger calls themselves run unlocked so status queries and the
    /// expiry timer stay responsive.
    async fn run_settlement(&self, group_key: GroupKey) -> Result<SettlementReport, SplitpotError> {
        let txn = self.store.get(group_key).await?;

        let snapshot = {
            let mut guard = txn.lock().await;
            guard.begin_settlement()?;
            guard.clone()
        };

        let result = self.engine.settle(&snapshot).await;

        let mut guard = txn.lock().await;
        match result {
            Ok(report) => {
                guard.settlement_succeeded();
                drop(guard);
                self.store.remove(group_key).await;
                self.audit
                    .log_action(
                        SETTLEMENT_SUCCEEDED,
                        group_key,
                        json!({
                            "participants": report.settled,
                            "categories_provisioned": report.categories_provisioned,
                        }),
                    )
                    .await;
                Ok(report)
            }
            Err(failure) => {
                guard.settlement_failed(failure.newly_settled);
                let deferred = guard.expiry_deferred();
                if deferred {
                    guard.mark_expired();
                }
                drop(guard);

                self.audit
                    .log_action(
                        SETTLEMENT_FAILED,
                        group_key,
                        json!({ "error": failure.error.to_string() }),
                    )
                    .await;

                if deferred {
                    // The timer fired mid-run; apply the expiry now that the
                    // attempt is over.
                    warn!(group_key, "Applying deferred expiry after failed settlement");
                    self.store.remove(group_key).await;
                    self.audit
                        .log_action(TRANSACTION_EXPIRED, group_key, json!({}))
                        .await;
                }
                Err(failure.error)
            }
        }
    }
}
