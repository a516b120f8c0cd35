use crate::directory::ParticipantDirectory;
use crate::models::Credential;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct InMemoryDirectory {
    entries: Mutex<HashMap<String, Credential>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        InMemoryDirectory {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn register(&self, chat_identity: &str, credential: Credential) {
        let mut entries = self.entries.lock().await;
        entries.insert(chat_identity.to_string(), credential);
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParticipantDirectory for InMemoryDirectory {
    async fn resolve(&self, chat_identity: &str) -> Option<Credential> {
        self.entries.lock().await.get(chat_identity).cloned()
    }
}
