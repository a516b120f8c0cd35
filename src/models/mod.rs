pub mod ledger;
pub mod participant;
pub mod transaction;

pub use ledger::{Account, NewExpense, NewTransfer};
pub use participant::{Credential, Participant, ParticipantId};
pub use transaction::{
    ConfirmationStatus, GroupKey, GroupTransaction, TransactionKind, TransactionState,
    TransactionStatus,
};
