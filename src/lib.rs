pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod models;
pub mod service;
pub mod settlement;
pub mod store;

pub use directory::in_memory::InMemoryDirectory;
pub use error::SplitpotError;
pub use ledger::in_memory::InMemoryLedger;
pub use logger::in_memory::InMemoryAudit;
pub use service::{ConfirmOutcome, Coordinator, SettlementOutcome};
pub use settlement::{SettlementEngine, SettlementReport};
pub use store::TransactionStore;

#[cfg(test)]
mod tests;
