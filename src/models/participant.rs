use serde::{Deserialize, Serialize};

/// Chat-side identity of a participant (e.g. a chat username).
pub type ParticipantId = String;

/// A ledger credential resolved for a chat identity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Username on the ledger side.
    pub username: String,
    /// Bearer token usable against the ledger service.
    pub token: String,
}

/// One entry of a transaction's participant set.
///
/// A participant starts out `Unresolved` and becomes `Resolved` the moment
/// they confirm: confirmation and credential resolution happen together, so
/// a resolved participant is by construction a confirmed one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Participant {
    Unresolved { id: ParticipantId },
    Resolved { id: ParticipantId, credential: Credential },
}

impl Participant {
    pub fn id(&self) -> &str {
        match self {
            Participant::Unresolved { id } => id,
            Participant::Resolved { id, .. } => id,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Participant::Resolved { .. })
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Participant::Unresolved { .. } => None,
            Participant::Resolved { credential, .. } => Some(credential),
        }
    }
}
