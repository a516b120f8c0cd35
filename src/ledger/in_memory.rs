use crate::error::SplitpotError;
use crate::ledger::LedgerClient;
use crate::models::{Account, Credential, NewExpense, NewTransfer};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// One ledger profile, keyed by bearer token.
#[derive(Clone, Debug, Default)]
struct Profile {
    accounts: Vec<Account>,
    categories: Vec<String>,
    expenses: Vec<NewExpense>,
    transfers: Vec<NewTransfer>,
}

/// In-memory stand-in for the ledger service.
///
/// Backs tests and local runs. Individual operations can be made to fail
/// for a given token via `fail_on`, mimicking independent per-call failures
/// of the real service.
pub struct InMemoryLedger {
    profiles: Mutex<HashMap<String, Profile>>,
    failing: Mutex<HashSet<(String, String)>>, // (operation, token)
}

impl InMemoryLedger {
    pub fn new() -> Self {
        InMemoryLedger {
            profiles: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub async fn add_account(&self, token: &str, account: Account) {
        let mut profiles = self.profiles.lock().await;
        profiles.entry(token.to_string()).or_default().accounts.push(account);
    }

    pub async fn add_category(&self, token: &str, name: &str) {
        let mut profiles = self.profiles.lock().await;
        profiles
            .entry(token.to_string())
            .or_default()
            .categories
            .push(name.to_string());
    }

    /// Makes `operation` fail with a transport error for `token` until cleared.
    pub async fn fail_on(&self, operation: &str, token: &str) {
        let mut failing = self.failing.lock().await;
        failing.insert((operation.to_string(), token.to_string()));
    }

    pub async fn clear_failure(&self, operation: &str, token: &str) {
        let mut failing = self.failing.lock().await;
        failing.remove(&(operation.to_string(), token.to_string()));
    }

    pub async fn accounts(&self, token: &str) -> Vec<Account> {
        let profiles = self.profiles.lock().await;
        profiles.get(token).map(|p| p.accounts.clone()).unwrap_or_default()
    }

    pub async fn expenses(&self, token: &str) -> Vec<NewExpense> {
        let profiles = self.profiles.lock().await;
        profiles.get(token).map(|p| p.expenses.clone()).unwrap_or_default()
    }

    pub async fn transfers(&self, token: &str) -> Vec<NewTransfer> {
        let profiles = self.profiles.lock().await;
        profiles.get(token).map(|p| p.transfers.clone()).unwrap_or_default()
    }

    pub async fn categories(&self, token: &str) -> Vec<String> {
        let profiles = self.profiles.lock().await;
        profiles.get(token).map(|p| p.categories.clone()).unwrap_or_default()
    }

    pub async fn balance(&self, token: &str, account_id: &str) -> Option<f64> {
        let profiles = self.profiles.lock().await;
        profiles
            .get(token)?
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| a.balance)
    }

    async fn check_failure(&self, operation: &str, token: &str) -> Result<(), SplitpotError> {
        let failing = self.failing.lock().await;
        if failing.contains(&(operation.to_string(), token.to_string())) {
            return Err(SplitpotError::TransportError(format!(
                "injected failure for {}",
                operation
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn list_accounts(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Account>, SplitpotError> {
        self.check_failure("list_accounts", &credential.token).await?;
        let profiles = self.profiles.lock().await;
        Ok(profiles
            .get(&credential.token)
            .map(|p| p.accounts.clone())
            .unwrap_or_default())
    }

    async fn list_categories(
        &self,
        credential: &Credential,
    ) -> Result<Vec<String>, SplitpotError> {
        self.check_failure("list_categories", &credential.token).await?;
        let profiles = self.profiles.lock().await;
        Ok(profiles
            .get(&credential.token)
            .map(|p| p.categories.clone())
            .unwrap_or_default())
    }

    async fn create_category(
        &self,
        credential: &Credential,
        name: &str,
        _monthly_budget: f64,
    ) -> Result<(), SplitpotError> {
        self.check_failure("create_category", &credential.token).await?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.entry(credential.token.clone()).or_default();
        if !profile.categories.iter().any(|c| c == name) {
            profile.categories.push(name.to_string());
        }
        Ok(())
    }

    async fn create_expense(
        &self,
        credential: &Credential,
        expense: &NewExpense,
    ) -> Result<(), SplitpotError> {
        self.check_failure("create_expense", &credential.token).await?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.entry(credential.token.clone()).or_default();
        profile.expenses.push(expense.clone());
        Ok(())
    }

    async fn create_transfer(
        &self,
        credential: &Credential,
        transfer: &NewTransfer,
    ) -> Result<(), SplitpotError> {
        self.check_failure("create_transfer", &credential.token).await?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .entry(credential.token.clone())
            .or_default();
        let source = profile
            .accounts
            .iter_mut()
            .find(|a| a.id == transfer.source_account)
            .ok_or(SplitpotError::LedgerRejected {
                status: 404,
                detail: "source account not found".to_string(),
            })?;
        if source.balance < transfer.amount {
            return Err(SplitpotError::LedgerRejected {
                status: 400,
                detail: "insufficient balance".to_string(),
            });
        }
        source.balance -= transfer.amount;
        // Destination is credited only when the caller owns it; cross-profile
        // credits go through update_account_balance.
        if let Some(dest) = profile
            .accounts
            .iter_mut()
            .find(|a| a.id == transfer.destination_account)
        {
            dest.balance += transfer.amount;
        }
        profile.transfers.push(transfer.clone());
        Ok(())
    }

    async fn update_account_balance(
        &self,
        credential: &Credential,
        account_id: &str,
        new_balance: f64,
    ) -> Result<(), SplitpotError> {
        self.check_failure("update_account_balance", &credential.token)
            .await?;
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.entry(credential.token.clone()).or_default();
        let account = profile
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or(SplitpotError::LedgerRejected {
                status: 404,
                detail: "account not found".to_string(),
            })?;
        account.balance = new_balance;
        Ok(())
    }
}
