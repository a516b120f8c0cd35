use serde::Serialize;
use thiserror::Error;

/// Crate-wide error kinds.
///
/// Settlement-phase variants (`NoAccounts` through `SettlementPartialFailure`)
/// deliberately never carry a participant identity: the issuer learns what
/// went wrong, not who caused it.
#[derive(Error, Debug, Clone, Serialize)]
pub enum SplitpotError {
    /// A transaction is already live for this group
    #[error("A transaction is already in progress in group {0}")]
    AlreadyActive(i64),

    /// No live transaction for this group
    #[error("No active transaction in group {0}")]
    NotFound(i64),

    /// Start event carried no mentioned participants
    #[error("No participants mentioned for the transaction")]
    NoParticipants,

    /// A non-issuer attempted an issuer-only action
    #[error("User {0} is not the issuer of this transaction")]
    NotIssuer(String),

    /// The acting identity is not in the participant set
    #[error("User {0} is not a participant of this transaction")]
    NotAParticipant(String),

    /// No ledger credential could be resolved for the identity
    #[error("User {0} is not authenticated with the ledger")]
    Unauthenticated(String),

    /// Amount input failed to parse or is not strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Currency is not a 3-letter code
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// Confirm arrived before the transaction terms were finalized
    #[error("Transaction is not awaiting confirmations yet")]
    ConfirmationNotOpen,

    /// Settlement was attempted before every participant confirmed
    #[error("Not all participants have confirmed this transaction")]
    IncompleteConfirmation,

    /// A participant has no ledger accounts at all
    #[error("Some participants have no ledger accounts")]
    NoAccounts,

    /// A participant has no account in the transaction currency
    #[error("Some participants have no account with currency {0}")]
    NoMatchingCurrency(String),

    /// A participant cannot cover their share from any matching account
    #[error("Some participants do not have enough {0} balance in their accounts")]
    InsufficientFunds(String),

    /// Category lookup or creation failed for a participant
    #[error("Failed to provision category {0} for some participants")]
    CategoryProvisionFailed(String),

    /// Fund movement aborted partway; prior movements are not rolled back
    #[error("Settlement incomplete: {settled} of {total} participants were settled")]
    SettlementPartialFailure { settled: usize, total: usize },

    /// Cancel or expire arrived while fund movement was underway
    #[error("Settlement already in progress")]
    SettlementInProgress,

    /// The ledger answered with a non-success status
    #[error("Ledger rejected the request with status {status}: {detail}")]
    LedgerRejected { status: u16, detail: String },

    /// The ledger was unreachable or timed out
    #[error("Ledger unreachable: {0}")]
    TransportError(String),
}
