mod settlement_tests;

use crate::directory::in_memory::InMemoryDirectory;
use crate::ledger::in_memory::InMemoryLedger;
use crate::logger::in_memory::InMemoryAudit;
use crate::models::{Account, Credential};
use crate::service::Coordinator;
use crate::store::TransactionStore;
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub coordinator: Coordinator<InMemoryLedger, InMemoryDirectory, InMemoryAudit>,
    pub ledger: Arc<InMemoryLedger>,
    pub directory: Arc<InMemoryDirectory>,
}

pub fn create_test_coordinator() -> TestHarness {
    create_test_coordinator_with_ttl(Duration::from_secs(600))
}

pub fn create_test_coordinator_with_ttl(ttl: Duration) -> TestHarness {
    let ledger = Arc::new(InMemoryLedger::new());
    let directory = Arc::new(InMemoryDirectory::new());
    let store = TransactionStore::new(ttl);
    let coordinator = Coordinator::new(
        store,
        Arc::clone(&ledger),
        Arc::clone(&directory),
        InMemoryAudit::new(),
    );
    TestHarness {
        coordinator,
        ledger,
        directory,
    }
}

pub fn token_for(name: &str) -> String {
    format!("token-{}", name)
}

pub fn credential_for(name: &str) -> Credential {
    Credential {
        username: name.to_string(),
        token: token_for(name),
    }
}

/// Registers `name` in the directory so confirmation can resolve them.
pub async fn register(harness: &TestHarness, name: &str) {
    harness.directory.register(name, credential_for(name)).await;
}

/// Gives `name` one ledger account in `currency` with the given balance.
pub async fn fund(harness: &TestHarness, name: &str, currency: &str, balance: f64) {
    let token = token_for(name);
    let count = harness.ledger.accounts(&token).await.len();
    harness
        .ledger
        .add_account(
            &token,
            Account {
                id: format!("acct-{}-{}", name, count),
                name: format!("{}'s checking", name),
                currency: currency.to_string(),
                balance,
            },
        )
        .await;
}
