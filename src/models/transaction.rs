use super::participant::{Credential, Participant, ParticipantId};
use crate::constants::{DEFAULT_BILL_SPLIT_CATEGORY, DEFAULT_CURRENCY};
use crate::error::SplitpotError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Chat group identifier (e.g. a group chat id).
pub type GroupKey = i64;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    BillSplit,
    Transfer,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::BillSplit => "Bill split",
            TransactionKind::Transfer => "Group transfer",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransactionState {
    Created,
    AmountSet,
    CurrencySet,
    CategorySet,
    AwaitingConfirmations,
    Confirmed,
    Settling,
    Settled,
    Failed,
    Cancelled,
    Expired,
}

/// Outcome of recording one confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmProgress {
    /// The participant had already confirmed; nothing changed.
    AlreadyConfirmed,
    /// Confirmation recorded; this many participants are still pending.
    Recorded { awaiting: usize },
    /// This was the last pending confirmation; the transaction is `Confirmed`.
    AllConfirmed,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfirmationStatus {
    pub participant: ParticipantId,
    pub confirmed: bool,
}

/// Read model returned for status queries.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionStatus {
    pub group_key: GroupKey,
    pub kind: TransactionKind,
    pub state: TransactionState,
    pub issuer: ParticipantId,
    pub amount: f64,
    pub currency: String,
    pub category: String,
    pub confirmations: Vec<ConfirmationStatus>,
    /// Seconds until expiry; negative once past `expires_at` but not yet reaped.
    pub remaining_secs: i64,
}

/// A pending multi-party transaction, scoped to one chat group.
///
/// Fields are private: after creation, the methods below are the only way to
/// mutate the record, and every one of them enforces the state machine
/// `Created → AmountSet → CurrencySet → CategorySet → AwaitingConfirmations →
/// Confirmed → Settling → {Settled | Failed}`, with `Cancelled` and `Expired`
/// reachable from any non-terminal state.
#[derive(Clone, Debug)]
pub struct GroupTransaction {
    id: Uuid,
    group_key: GroupKey,
    kind: TransactionKind,
    issuer_id: ParticipantId,
    issuer_credential: Credential,
    /// Fixed at creation; entries flip Unresolved -> Resolved, never back.
    participants: Vec<Participant>,
    state: TransactionState,
    amount: f64,
    currency: String,
    category: String,
    description: String,
    /// Participants whose fund movement already landed in an earlier
    /// settlement run. Retries skip them.
    settled: Vec<ParticipantId>,
    /// Set when the expiry timer fired mid-settlement; applied afterwards.
    expiry_deferred: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl GroupTransaction {
    pub fn new(
        group_key: GroupKey,
        kind: TransactionKind,
        issuer_id: ParticipantId,
        issuer_credential: Credential,
        participant_ids: Vec<ParticipantId>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let category = match kind {
            TransactionKind::BillSplit => DEFAULT_BILL_SPLIT_CATEGORY.to_string(),
            TransactionKind::Transfer => "Group Transfer".to_string(),
        };
        GroupTransaction {
            id: Uuid::new_v4(),
            group_key,
            kind,
            issuer_id,
            issuer_credential,
            participants: participant_ids
                .into_iter()
                .map(|id| Participant::Unresolved { id })
                .collect(),
            state: TransactionState::Created,
            amount: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            category,
            description: String::new(),
            settled: Vec::new(),
            expiry_deferred: false,
            created_at: now,
            expires_at: now + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(600)),
        }
    }

    // Read access

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn group_key(&self) -> GroupKey {
        self.group_key
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn issuer_credential(&self) -> &Credential {
        &self.issuer_credential
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn settled_participants(&self) -> &[ParticipantId] {
        &self.settled
    }

    /// Whether this participant's fund movement already landed in an
    /// earlier settlement run.
    pub fn is_settled(&self, participant_id: &str) -> bool {
        self.settled.iter().any(|s| s == participant_id)
    }

    /// Participants a settlement run still has to act on: everyone not in
    /// the journal of earlier partial runs.
    pub fn remaining_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| !self.is_settled(p.id()))
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn expiry_deferred(&self) -> bool {
        self.expiry_deferred
    }

    pub fn all_confirmed(&self) -> bool {
        self.participants.iter().all(Participant::is_confirmed)
    }

    /// Amount owed by a single participant.
    pub fn share(&self) -> f64 {
        match self.kind {
            TransactionKind::BillSplit => self.amount / self.participants.len() as f64,
            TransactionKind::Transfer => self.amount,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus {
            group_key: self.group_key,
            kind: self.kind,
            state: self.state,
            issuer: self.issuer_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            category: self.category.clone(),
            confirmations: self
                .participants
                .iter()
                .map(|p| ConfirmationStatus {
                    participant: p.id().to_string(),
                    confirmed: p.is_confirmed(),
                })
                .collect(),
            remaining_secs: (self.expires_at - Utc::now()).num_seconds(),
        }
    }

    // Issuer-driven term edits

    pub fn set_amount(&mut self, requester: &str, amount: f64) -> Result<(), SplitpotError> {
        self.ensure_issuer(requester)?;
        self.ensure_editable()?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SplitpotError::InvalidAmount(amount.to_string()));
        }
        self.amount = amount;
        self.advance(TransactionState::AmountSet);
        Ok(())
    }

    pub fn set_currency(&mut self, requester: &str, currency: &str) -> Result<(), SplitpotError> {
        self.ensure_issuer(requester)?;
        self.ensure_editable()?;
        let code = currency.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SplitpotError::InvalidCurrency(currency.to_string()));
        }
        self.currency = code;
        self.advance(TransactionState::CurrencySet);
        Ok(())
    }

    pub fn set_category(&mut self, requester: &str, category: &str) -> Result<(), SplitpotError> {
        self.ensure_issuer(requester)?;
        self.ensure_editable()?;
        self.category = category.trim().to_string();
        self.advance(TransactionState::CategorySet);
        Ok(())
    }

    /// Moves `CategorySet` into `AwaitingConfirmations` once the coordinator
    /// has published the confirmation prompts.
    pub fn open_confirmations(&mut self) {
        self.advance(TransactionState::AwaitingConfirmations);
    }

    // Confirmation

    /// Records one participant's confirmation together with their resolved
    /// credential. Monotone: a confirmed participant never reverts.
    pub fn confirm(
        &mut self,
        participant_id: &str,
        credential: Credential,
    ) -> Result<ConfirmProgress, SplitpotError> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.id() == participant_id)
            .ok_or_else(|| SplitpotError::NotAParticipant(participant_id.to_string()))?;

        if self.participants[idx].is_confirmed() {
            return Ok(ConfirmProgress::AlreadyConfirmed);
        }
        if self.state != TransactionState::AwaitingConfirmations {
            return Err(SplitpotError::ConfirmationNotOpen);
        }

        self.participants[idx] = Participant::Resolved {
            id: participant_id.to_string(),
            credential,
        };

        let awaiting = self
            .participants
            .iter()
            .filter(|p| !p.is_confirmed())
            .count();
        if awaiting == 0 {
            self.state = TransactionState::Confirmed;
            Ok(ConfirmProgress::AllConfirmed)
        } else {
            Ok(ConfirmProgress::Recorded { awaiting })
        }
    }

    // Settlement transitions

    /// Enters `Settling`, freezing the terms and deriving the description.
    /// Legal from `Confirmed` (first attempt) and `Failed` (retry).
    pub fn begin_settlement(&mut self) -> Result<(), SplitpotError> {
        match self.state {
            TransactionState::Settling => return Err(SplitpotError::SettlementInProgress),
            TransactionState::Confirmed | TransactionState::Failed => {}
            _ => return Err(SplitpotError::IncompleteConfirmation),
        }
        if !self.all_confirmed() {
            return Err(SplitpotError::IncompleteConfirmation);
        }
        if self.amount <= 0.0 {
            return Err(SplitpotError::InvalidAmount(self.amount.to_string()));
        }
        self.description = format!(
            "{} in group {} issued by {}",
            self.kind, self.group_key, self.issuer_id
        );
        self.state = TransactionState::Settling;
        Ok(())
    }

    pub fn settlement_succeeded(&mut self) {
        self.state = TransactionState::Settled;
    }

    /// Absorbs the journal of a failed run and returns to a retryable state.
    pub fn settlement_failed(&mut self, newly_settled: Vec<ParticipantId>) {
        for id in newly_settled {
            if !self.settled.contains(&id) {
                self.settled.push(id);
            }
        }
        self.state = TransactionState::Failed;
    }

    // Terminal transitions

    pub fn mark_cancelled(&mut self, requester: &str) -> Result<(), SplitpotError> {
        self.ensure_issuer(requester)?;
        if self.state == TransactionState::Settling {
            return Err(SplitpotError::SettlementInProgress);
        }
        self.state = TransactionState::Cancelled;
        Ok(())
    }

    pub fn mark_expired(&mut self) {
        self.state = TransactionState::Expired;
    }

    pub fn defer_expiry(&mut self) {
        self.expiry_deferred = true;
    }

    // Guards

    fn ensure_issuer(&self, requester: &str) -> Result<(), SplitpotError> {
        if requester != self.issuer_id {
            return Err(SplitpotError::NotIssuer(requester.to_string()));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), SplitpotError> {
        if self.state == TransactionState::Settling {
            return Err(SplitpotError::SettlementInProgress);
        }
        Ok(())
    }

    /// Forward-only progress marker for the linear prefix of the state
    /// machine; never regresses and never touches settlement states.
    fn advance(&mut self, to: TransactionState) {
        if to > self.state && self.state < TransactionState::Confirmed {
            self.state = to;
        }
    }
}
