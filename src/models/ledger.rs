use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account as reported by the ledger service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub currency: String,
    pub balance: f64,
}

/// Payload for recording an expense against a participant's account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub currency: String,
    pub date: DateTime<Utc>,
    /// Name of the account the expense is booked against.
    pub account: String,
}

/// Payload for moving funds between two accounts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTransfer {
    pub source_account: String,
    pub destination_account: String,
    pub amount: f64,
}
