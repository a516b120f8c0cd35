pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One audit record: a coordinator action plus its JSON payload.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub group_key: i64,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn log_action(&self, action: &str, group_key: i64, details: serde_json::Value);
    async fn entries(&self) -> Vec<AuditEntry>;
}
