use crate::error::SplitpotError;
use crate::ledger::LedgerClient;
use crate::models::{Account, Credential, NewExpense, NewTransfer};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// `LedgerClient` over the ledger service's REST API.
///
/// The credential's bearer token travels in a `token` header; every request
/// carries the configured timeout.
pub struct HttpLedgerClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct AccountsEnvelope {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct CategoriesEnvelope {
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    detail: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SplitpotError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SplitpotError::TransportError(e.to_string()))?;
        Ok(HttpLedgerClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SplitpotError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response
            .json::<ErrorEnvelope>()
            .await
            .map(|e| e.detail)
            .unwrap_or_default();
        Err(SplitpotError::LedgerRejected {
            status: status.as_u16(),
            detail,
        })
    }

    fn transport(e: reqwest::Error) -> SplitpotError {
        SplitpotError::TransportError(e.to_string())
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn list_accounts(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Account>, SplitpotError> {
        debug!(username = %credential.username, "Fetching ledger accounts");
        let response = self
            .client
            .get(self.url("/accounts/"))
            .header("token", &credential.token)
            .send()
            .await
            .map_err(Self::transport)?;
        let envelope: AccountsEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;
        Ok(envelope.accounts)
    }

    async fn list_categories(
        &self,
        credential: &Credential,
    ) -> Result<Vec<String>, SplitpotError> {
        debug!(username = %credential.username, "Fetching ledger categories");
        let response = self
            .client
            .get(self.url("/categories/"))
            .header("token", &credential.token)
            .send()
            .await
            .map_err(Self::transport)?;
        let envelope: CategoriesEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(Self::transport)?;
        Ok(envelope.categories)
    }

    async fn create_category(
        &self,
        credential: &Credential,
        name: &str,
        monthly_budget: f64,
    ) -> Result<(), SplitpotError> {
        debug!(username = %credential.username, category = name, "Creating ledger category");
        let response = self
            .client
            .post(self.url("/categories/"))
            .header("token", &credential.token)
            .json(&json!({ "name": name, "monthly_budget": monthly_budget }))
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_expense(
        &self,
        credential: &Credential,
        expense: &NewExpense,
    ) -> Result<(), SplitpotError> {
        debug!(username = %credential.username, amount = expense.amount, "Recording expense");
        let response = self
            .client
            .post(self.url("/expenses/"))
            .header("token", &credential.token)
            .json(expense)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_transfer(
        &self,
        credential: &Credential,
        transfer: &NewTransfer,
    ) -> Result<(), SplitpotError> {
        debug!(username = %credential.username, amount = transfer.amount, "Submitting transfer");
        let response = self
            .client
            .post(self.url("/accounts/transfer"))
            .header("token", &credential.token)
            .json(transfer)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_account_balance(
        &self,
        credential: &Credential,
        account_id: &str,
        new_balance: f64,
    ) -> Result<(), SplitpotError> {
        debug!(username = %credential.username, account_id, "Updating account balance");
        let response = self
            .client
            .put(self.url(&format!("/accounts/{}", account_id)))
            .header("token", &credential.token)
            .json(&json!({ "balance": new_balance }))
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;
        Ok(())
    }
}
