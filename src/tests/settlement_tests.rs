use crate::error::SplitpotError;
use crate::ledger::in_memory::InMemoryLedger;
use crate::models::{Account, GroupTransaction, TransactionKind};
use crate::settlement::SettlementEngine;
use crate::tests::{credential_for, token_for};
use std::sync::Arc;
use std::time::Duration;

fn confirmed_txn(kind: TransactionKind, participants: &[&str], amount: f64) -> GroupTransaction {
    let mut txn = GroupTransaction::new(
        42,
        kind,
        "issuer".to_string(),
        credential_for("issuer"),
        participants.iter().map(|s| s.to_string()).collect(),
        Duration::from_secs(600),
    );
    txn.set_amount("issuer", amount).unwrap();
    txn.set_currency("issuer", "USD").unwrap();
    txn.set_category("issuer", "Dinner").unwrap();
    txn.open_confirmations();
    for p in participants {
        txn.confirm(p, credential_for(p)).unwrap();
    }
    txn.begin_settlement().unwrap();
    txn
}

async fn funded_ledger(entries: &[(&str, f64)]) -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new());
    for (name, balance) in entries {
        ledger
            .add_account(
                &token_for(name),
                Account {
                    id: format!("acct-{}", name),
                    name: format!("{}'s checking", name),
                    currency: "USD".to_string(),
                    balance: *balance,
                },
            )
            .await;
        ledger.add_category(&token_for(name), "Dinner").await;
    }
    ledger
}

#[tokio::test]
async fn test_bill_split_settles_every_participant() {
    let ledger = funded_ledger(&[("alice", 50.0), ("bob", 50.0)]).await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let report = engine.settle(&txn).await.unwrap();
    assert_eq!(report.settled, ["alice".to_string(), "bob".to_string()]);
    assert!(!report.categories_provisioned);

    let alice_expenses = ledger.expenses(&token_for("alice")).await;
    assert_eq!(alice_expenses.len(), 1);
    assert_eq!(alice_expenses[0].amount, 45.0);
    assert_eq!(alice_expenses[0].category, "Dinner");
    assert_eq!(ledger.expenses(&token_for("bob")).await.len(), 1);
}

#[tokio::test]
async fn test_confirmation_recheck_blocks_settlement() {
    let ledger = funded_ledger(&[("alice", 50.0), ("bob", 50.0)]).await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));

    let mut txn = GroupTransaction::new(
        42,
        TransactionKind::BillSplit,
        "issuer".to_string(),
        credential_for("issuer"),
        vec!["alice".to_string(), "bob".to_string()],
        Duration::from_secs(600),
    );
    txn.set_amount("issuer", 90.0).unwrap();
    txn.set_currency("issuer", "USD").unwrap();
    txn.set_category("issuer", "Dinner").unwrap();
    txn.open_confirmations();
    txn.confirm("alice", credential_for("alice")).unwrap();

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(
        failure.error,
        SplitpotError::IncompleteConfirmation
    ));
    assert!(ledger.expenses(&token_for("alice")).await.is_empty());
}

#[tokio::test]
async fn test_participant_without_accounts_fails_redacted() {
    let ledger = funded_ledger(&[("alice", 50.0)]).await; // bob has nothing
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(failure.error, SplitpotError::NoAccounts));
    assert!(!failure.error.to_string().contains("bob"));
}

#[tokio::test]
async fn test_currency_mismatch_fails_redacted() {
    let ledger = funded_ledger(&[("alice", 50.0)]).await;
    ledger
        .add_account(
            &token_for("bob"),
            Account {
                id: "acct-bob".to_string(),
                name: "bob's checking".to_string(),
                currency: "EUR".to_string(),
                balance: 500.0,
            },
        )
        .await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(
        failure.error,
        SplitpotError::NoMatchingCurrency(_)
    ));
    assert!(!failure.error.to_string().contains("bob"));
}

#[tokio::test]
async fn test_insufficient_balance_fails_redacted() {
    let ledger = funded_ledger(&[("alice", 50.0), ("bob", 10.0)]).await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(failure.error, SplitpotError::InsufficientFunds(_)));
    assert!(!failure.error.to_string().contains("bob"));
    // Screening happens before any mutation.
    assert!(ledger.expenses(&token_for("alice")).await.is_empty());
}

#[tokio::test]
async fn test_first_sufficient_account_is_pinned() {
    let ledger = Arc::new(InMemoryLedger::new());
    for (id, balance) in [("acct-alice-small", 10.0), ("acct-alice-big", 100.0)] {
        ledger
            .add_account(
                &token_for("alice"),
                Account {
                    id: id.to_string(),
                    name: id.to_string(),
                    currency: "USD".to_string(),
                    balance,
                },
            )
            .await;
    }
    ledger.add_category(&token_for("alice"), "Dinner").await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice"], 45.0);

    engine.settle(&txn).await.unwrap();
    let expenses = ledger.expenses(&token_for("alice")).await;
    assert_eq!(expenses[0].account, "acct-alice-big");
}

#[tokio::test]
async fn test_missing_category_is_provisioned() {
    // bob's profile has "Dinner" already; alice's does not.
    let ledger = Arc::new(InMemoryLedger::new());
    for name in ["alice", "bob"] {
        ledger
            .add_account(
                &token_for(name),
                Account {
                    id: format!("acct-{}", name),
                    name: format!("{}'s checking", name),
                    currency: "USD".to_string(),
                    balance: 50.0,
                },
            )
            .await;
    }
    ledger.add_category(&token_for("bob"), "Dinner").await;

    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);
    let report = engine.settle(&txn).await.unwrap();
    assert!(report.categories_provisioned);
    assert!(ledger
        .categories(&token_for("alice"))
        .await
        .contains(&"Dinner".to_string()));
}

#[tokio::test]
async fn test_category_provision_failure_aborts_before_movement() {
    let ledger = funded_ledger(&[("alice", 50.0)]).await;
    ledger
        .add_account(
            &token_for("bob"),
            Account {
                id: "acct-bob".to_string(),
                name: "bob's checking".to_string(),
                currency: "USD".to_string(),
                balance: 50.0,
            },
        )
        .await;
    ledger.fail_on("create_category", &token_for("bob")).await;

    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(
        failure.error,
        SplitpotError::CategoryProvisionFailed(_)
    ));
    assert!(!failure.error.to_string().contains("bob"));
    assert!(ledger.expenses(&token_for("alice")).await.is_empty());
}

#[tokio::test]
async fn test_partial_failure_reports_progress_and_keeps_journal() {
    let ledger = funded_ledger(&[("alice", 50.0), ("bob", 50.0)]).await;
    ledger.fail_on("create_expense", &token_for("bob")).await;

    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let mut txn = confirmed_txn(TransactionKind::BillSplit, &["alice", "bob"], 90.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(
        failure.error,
        SplitpotError::SettlementPartialFailure {
            settled: 1,
            total: 2
        }
    ));
    assert_eq!(failure.newly_settled, ["alice".to_string()]);

    // Retry with the cause fixed: alice is journaled, only bob is charged.
    txn.settlement_failed(failure.newly_settled);
    ledger.clear_failure("create_expense", &token_for("bob")).await;
    txn.begin_settlement().unwrap();

    let report = engine.settle(&txn).await.unwrap();
    assert_eq!(report.settled.len(), 2);
    assert_eq!(ledger.expenses(&token_for("alice")).await.len(), 1);
    assert_eq!(ledger.expenses(&token_for("bob")).await.len(), 1);
}

#[tokio::test]
async fn test_transfer_moves_full_amount_to_issuer() {
    let ledger = funded_ledger(&[("alice", 100.0), ("bob", 100.0), ("issuer", 0.0)]).await;
    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::Transfer, &["alice", "bob"], 25.0);

    let report = engine.settle(&txn).await.unwrap();
    assert_eq!(report.settled.len(), 2);

    assert_eq!(ledger.balance(&token_for("alice"), "acct-alice").await, Some(75.0));
    assert_eq!(ledger.balance(&token_for("bob"), "acct-bob").await, Some(75.0));
    // Both credits landed on the issuer's receiving account.
    assert_eq!(ledger.balance(&token_for("issuer"), "acct-issuer").await, Some(50.0));
    assert_eq!(ledger.transfers(&token_for("alice")).await.len(), 1);
}

#[tokio::test]
async fn test_transfer_retry_skips_already_debited_participant() {
    let ledger = funded_ledger(&[("alice", 100.0), ("bob", 100.0), ("issuer", 0.0)]).await;
    ledger.fail_on("create_transfer", &token_for("bob")).await;

    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let mut txn = confirmed_txn(TransactionKind::Transfer, &["alice", "bob"], 80.0);

    // First run: alice's full payment lands, bob's fails.
    let failure = engine.settle(&txn).await.unwrap_err();
    assert_eq!(failure.newly_settled, ["alice".to_string()]);
    assert_eq!(ledger.balance(&token_for("alice"), "acct-alice").await, Some(20.0));

    // Alice's remaining 20 no longer covers the 80 share; the retry must
    // not screen her again.
    txn.settlement_failed(failure.newly_settled);
    ledger.clear_failure("create_transfer", &token_for("bob")).await;
    txn.begin_settlement().unwrap();

    let report = engine.settle(&txn).await.unwrap();
    assert_eq!(report.settled, ["alice".to_string(), "bob".to_string()]);

    // Exactly one payment per participant across both runs.
    assert_eq!(ledger.balance(&token_for("alice"), "acct-alice").await, Some(20.0));
    assert_eq!(ledger.balance(&token_for("bob"), "acct-bob").await, Some(20.0));
    assert_eq!(ledger.balance(&token_for("issuer"), "acct-issuer").await, Some(160.0));
    assert_eq!(ledger.transfers(&token_for("alice")).await.len(), 1);
}

#[tokio::test]
async fn test_transfer_credit_failure_compensates_debit() {
    let ledger = funded_ledger(&[("alice", 100.0), ("issuer", 0.0)]).await;
    ledger
        .fail_on("update_account_balance", &token_for("issuer"))
        .await;

    let engine = SettlementEngine::new(Arc::clone(&ledger));
    let txn = confirmed_txn(TransactionKind::Transfer, &["alice"], 25.0);

    let failure = engine.settle(&txn).await.unwrap_err();
    assert!(matches!(
        failure.error,
        SplitpotError::SettlementPartialFailure {
            settled: 0,
            total: 1
        }
    ));
    assert!(failure.newly_settled.is_empty());
    // The debit leg was rolled back, so a retry starts clean.
    assert_eq!(ledger.balance(&token_for("alice"), "acct-alice").await, Some(100.0));
}
