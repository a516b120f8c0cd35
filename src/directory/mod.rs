pub mod in_memory;

use crate::models::Credential;
use async_trait::async_trait;

/// Maps a chat identity to a ledger credential.
///
/// Returns `None` for identities that never authenticated with the ledger;
/// the caller is expected to tell the user to log in out-of-band and let
/// them retry.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn resolve(&self, chat_identity: &str) -> Option<Credential>;
}
