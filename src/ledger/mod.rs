pub mod http;
pub mod in_memory;

use crate::error::SplitpotError;
use crate::models::{Account, Credential, NewExpense, NewTransfer};
use async_trait::async_trait;

/// Thin request layer over the external ledger service.
///
/// Every call runs under one bearer credential and a bounded timeout, and
/// may fail independently; there is no cross-call atomicity.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn list_accounts(&self, credential: &Credential)
    -> Result<Vec<Account>, SplitpotError>;

    async fn list_categories(&self, credential: &Credential)
    -> Result<Vec<String>, SplitpotError>;

    async fn create_category(
        &self,
        credential: &Credential,
        name: &str,
        monthly_budget: f64,
    ) -> Result<(), SplitpotError>;

    async fn create_expense(
        &self,
        credential: &Credential,
        expense: &NewExpense,
    ) -> Result<(), SplitpotError>;

    async fn create_transfer(
        &self,
        credential: &Credential,
        transfer: &NewTransfer,
    ) -> Result<(), SplitpotError>;

    async fn update_account_balance(
        &self,
        credential: &Credential,
        account_id: &str,
        new_balance: f64,
    ) -> Result<(), SplitpotError>;
}
