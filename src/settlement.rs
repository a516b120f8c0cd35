use crate::constants::PROVISIONED_CATEGORY_BUDGET;
use crate::error::SplitpotError;
use crate::ledger::LedgerClient;
use crate::models::{
    Account, Credential, GroupTransaction, NewExpense, NewTransfer, ParticipantId,
    TransactionKind,
};
use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a fully successful settlement run.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SettlementReport {
    /// Every participant, in settlement order.
    pub settled: Vec<ParticipantId>,
    /// Whether the category had to be created on at least one profile.
    /// Informational for the issuer, not an error.
    pub categories_provisioned: bool,
}

/// A failed run: the error plus the journal of participants whose fund
/// movement landed before the abort. The caller writes the journal back so a
/// retry never charges them again.
#[derive(Clone, Debug)]
pub struct SettlementFailure {
    pub error: SplitpotError,
    pub newly_settled: Vec<ParticipantId>,
}

/// How phase 5 will move funds for this transaction kind.
enum MovementPlan {
    Expenses,
    Transfers { issuer_account: Account },
}

/// A participant with their screened, pinned account for this run.
struct Pinned {
    id: ParticipantId,
    credential: Credential,
    account: Account,
}

/// Executes the multi-phase settlement protocol against the ledger.
///
/// Phases, in order: confirmation re-check, account discovery, balance
/// screening, category provisioning, fund movement. Any failure aborts the
/// remaining phases; there is no cross-call atomicity, so phase 5 keeps a
/// journal instead (see `SettlementFailure`). Errors never name the
/// participant that caused them.
pub struct SettlementEngine<L: LedgerClient> {
    ledger: Arc<L>,
}

impl<L: LedgerClient> SettlementEngine<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        SettlementEngine { ledger }
    }

    pub async fn settle(
        &self,
        txn: &GroupTransaction,
    ) -> Result<SettlementReport, SettlementFailure> {
        let early = |error: SplitpotError| SettlementFailure {
            error,
            newly_settled: Vec::new(),
        };

        // Phase 1: confirmation re-check. Unreachable through the automatic
        // trigger, but manual retries go through here too.
        if !txn.all_confirmed() {
            return Err(early(SplitpotError::IncompleteConfirmation));
        }

        // Phase 2 + 3: discover accounts and pin one per participant.
        let pinned = self.screen_participants(txn).await.map_err(early)?;

        // For a transfer every participant pays the issuer, so the issuer
        // needs a receiving account in the transaction currency as well.
        let plan = match txn.kind() {
            TransactionKind::BillSplit => MovementPlan::Expenses,
            TransactionKind::Transfer => MovementPlan::Transfers {
                issuer_account: self.issuer_receiving_account(txn).await.map_err(early)?,
            },
        };

        // Phase 4: category provisioning.
        let categories_provisioned = self.provision_categories(txn).await.map_err(early)?;

        // Phase 5: fund movement, strictly ordered, no rollback of landed
        // movements on a later failure.
        let outcome = match plan {
            MovementPlan::Expenses => self.move_expenses(txn, &pinned).await,
            MovementPlan::Transfers { issuer_account } => {
                self.move_transfers(txn, &pinned, issuer_account).await
            }
        };

        match outcome {
            Ok(_) => {
                // The report covers the whole transaction: participants
                // settled by earlier partial runs plus this run's.
                let mut settled: Vec<ParticipantId> = txn.settled_participants().to_vec();
                settled.extend(pinned.into_iter().map(|p| p.id));
                info!(
                    group_key = txn.group_key(),
                    participants = settled.len(),
                    "Settlement completed for all participants"
                );
                Ok(SettlementReport {
                    settled,
                    categories_provisioned,
                })
            }
            Err(failure) => Err(failure),
        }
    }

    /// Phases 2 and 3: every unsettled participant must have at least one
    /// account, at least one in the transaction currency, and at least one
    /// of those with balance covering their share. The first sufficient
    /// account (ledger order) is pinned. Participants journaled by an
    /// earlier run are excluded outright: their movement already landed, so
    /// re-screening the debited balance would wrongly fail the retry.
    async fn screen_participants(
        &self,
        txn: &GroupTransaction,
    ) -> Result<Vec<Pinned>, SplitpotError> {
        let currency = txn.currency();
        let share = txn.share();

        let discovered = try_join_all(txn.remaining_participants().map(|participant| {
            let id = participant.id().to_string();
            // Invariant 2: a confirmed participant always carries a credential.
            let credential = participant
                .credential()
                .cloned()
                .ok_or(SplitpotError::IncompleteConfirmation);
            async move {
                let credential = credential?;
                let accounts = self.ledger.list_accounts(&credential).await?;
                Ok::<_, SplitpotError>((id, credential, accounts))
            }
        }))
        .await?;

        let mut pinned = Vec::with_capacity(discovered.len());
        for (id, credential, accounts) in discovered {
            if accounts.is_empty() {
                error!(participant = %id, "Participant has no ledger accounts");
                return Err(SplitpotError::NoAccounts);
            }
            let matching: Vec<Account> = accounts
                .into_iter()
                .filter(|a| a.currency == currency)
                .collect();
            if matching.is_empty() {
                error!(participant = %id, currency, "No account in transaction currency");
                return Err(SplitpotError::NoMatchingCurrency(currency.to_string()));
            }
            let account = matching
                .into_iter()
                .find(|a| a.balance >= share)
                .ok_or_else(|| {
                    error!(participant = %id, currency, share, "Insufficient balance");
                    SplitpotError::InsufficientFunds(currency.to_string())
                })?;
            debug!(participant = %id, account = %account.name, "Pinned settlement account");
            pinned.push(Pinned {
                id,
                credential,
                account,
            });
        }
        Ok(pinned)
    }

    async fn issuer_receiving_account(
        &self,
        txn: &GroupTransaction,
    ) -> Result<Account, SplitpotError> {
        let accounts = self.ledger.list_accounts(txn.issuer_credential()).await?;
        if accounts.is_empty() {
            return Err(SplitpotError::NoAccounts);
        }
        accounts
            .into_iter()
            .find(|a| a.currency == txn.currency())
            .ok_or_else(|| SplitpotError::NoMatchingCurrency(txn.currency().to_string()))
    }

    /// Phase 4: ensure the transaction's category exists on every remaining
    /// participant's profile, creating it with a zero budget where absent.
    async fn provision_categories(
        &self,
        txn: &GroupTransaction,
    ) -> Result<bool, SplitpotError> {
        let category = txn.category();
        let created = try_join_all(txn.remaining_participants().map(|participant| {
            let id = participant.id().to_string();
            let credential = participant
                .credential()
                .cloned()
                .ok_or(SplitpotError::IncompleteConfirmation);
            async move {
                let credential = credential?;
                let categories = self.ledger.list_categories(&credential).await?;
                if categories.iter().any(|c| c == category) {
                    return Ok::<_, SplitpotError>(false);
                }
                debug!(participant = %id, category, "Provisioning missing category");
                self.ledger
                    .create_category(&credential, category, PROVISIONED_CATEGORY_BUDGET)
                    .await
                    .map_err(|e| {
                        error!(participant = %id, category, %e, "Category creation failed");
                        SplitpotError::CategoryProvisionFailed(category.to_string())
                    })?;
                Ok(true)
            }
        }))
        .await?;
        Ok(created.into_iter().any(|c| c))
    }

    /// Phase 5, bill-split variant: book each pinned participant's share as
    /// an expense against their pinned account. Screening already excluded
    /// participants settled by an earlier partial run.
    async fn move_expenses(
        &self,
        txn: &GroupTransaction,
        pinned: &[Pinned],
    ) -> Result<Vec<ParticipantId>, SettlementFailure> {
        let share = txn.share();
        let mut newly_settled = Vec::new();

        for p in pinned {
            let expense = NewExpense {
                amount: share,
                description: txn.description().to_string(),
                category: txn.category().to_string(),
                currency: txn.currency().to_string(),
                date: Utc::now(),
                account: p.account.name.clone(),
            };
            if let Err(e) = self.ledger.create_expense(&p.credential, &expense).await {
                error!(participant = %p.id, %e, "Expense submission failed, aborting run");
                return Err(self.partial_failure(txn, newly_settled));
            }
            newly_settled.push(p.id.clone());
        }
        Ok(newly_settled)
    }

    /// Phase 5, transfer variant: each participant pays the full amount into
    /// the issuer's receiving account. Two legs per participant: a transfer
    /// debiting their pinned account, then an explicit balance update
    /// crediting the issuer (ledger transfers only move within the caller's
    /// own profile). A failed credit leg restores the debited balance before
    /// the run aborts.
    async fn move_transfers(
        &self,
        txn: &GroupTransaction,
        pinned: &[Pinned],
        issuer_account: Account,
    ) -> Result<Vec<ParticipantId>, SettlementFailure> {
        let share = txn.share();
        let mut issuer_balance = issuer_account.balance;
        let mut newly_settled = Vec::new();

        for p in pinned {
            let transfer = NewTransfer {
                source_account: p.account.id.clone(),
                destination_account: issuer_account.id.clone(),
                amount: share,
            };
            if let Err(e) = self.ledger.create_transfer(&p.credential, &transfer).await {
                error!(participant = %p.id, %e, "Transfer submission failed, aborting run");
                return Err(self.partial_failure(txn, newly_settled));
            }

            issuer_balance += share;
            if let Err(e) = self
                .ledger
                .update_account_balance(
                    txn.issuer_credential(),
                    &issuer_account.id,
                    issuer_balance,
                )
                .await
            {
                error!(%e, "Credit leg failed, compensating the debit");
                match self
                    .ledger
                    .update_account_balance(&p.credential, &p.account.id, p.account.balance)
                    .await
                {
                    Ok(()) => {
                        // Debit undone; the participant stays unsettled and a
                        // retry redoes both legs.
                    }
                    Err(comp) => {
                        // The debit stands and cannot be undone here. Record
                        // the participant as settled so a retry does not
                        // charge them twice; the missing credit needs manual
                        // remediation.
                        error!(participant = %p.id, %comp, "Compensation failed, journaling debit");
                        newly_settled.push(p.id.clone());
                    }
                }
                return Err(self.partial_failure(txn, newly_settled));
            }
            newly_settled.push(p.id.clone());
        }
        Ok(newly_settled)
    }

    fn partial_failure(
        &self,
        txn: &GroupTransaction,
        newly_settled: Vec<ParticipantId>,
    ) -> SettlementFailure {
        let settled = txn.settled_participants().len() + newly_settled.len();
        let total = txn.participants().len();
        warn!(
            group_key = txn.group_key(),
            settled, total, "Settlement run aborted partway"
        );
        SettlementFailure {
            error: SplitpotError::SettlementPartialFailure { settled, total },
            newly_settled,
        }
    }
}
