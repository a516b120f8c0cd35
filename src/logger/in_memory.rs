use crate::logger::{AuditEntry, AuditLogger};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub struct InMemoryAudit {
    entries: tokio::sync::Mutex<Vec<AuditEntry>>,
}

impl InMemoryAudit {
    pub fn new() -> Self {
        InMemoryAudit {
            entries: tokio::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAudit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAudit {
    async fn log_action(&self, action: &str, group_key: i64, details: serde_json::Value) {
        let mut entries = self.entries.lock().await;
        entries.push(AuditEntry {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            group_key,
            details,
            timestamp: Utc::now(),
        });
    }

    async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}
