//! Session identity shared by the client views.
//!
//! `SessionContext` is created once per client session and handed to every
//! component that needs to address the server on behalf of the participant.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::{JoinedParticipant, OpaqueId};

/// Game id and participant id that scope the client to one participant of one game
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub public_id: Option<OpaqueId>,
    pub participant_id: Option<OpaqueId>,
}

impl From<&JoinedParticipant> for SessionIdentity {
    fn from(participant: &JoinedParticipant) -> Self {
        Self {
            public_id: participant.game.clone(),
            participant_id: participant.uuid_p.clone(),
        }
    }
}

/// Injectable holder of the [`SessionIdentity`].
///
/// Cloning shares the same underlying identity. Writers replace the whole
/// pair at once so readers never observe a half-updated identity.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    identity: Arc<RwLock<SessionIdentity>>,
}

impl SessionContext {
    /// Create an empty session context
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the identity carried by a joined participant.
    ///
    /// Both fields are overwritten, including with `None` when the record
    /// lacks them.
    pub async fn set_participant(&self, participant: &JoinedParticipant) {
        let identity = SessionIdentity::from(participant);
        tracing::debug!(
            "Session identity set: game={:?}, participant={:?}",
            identity.public_id,
            identity.participant_id
        );
        *self.identity.write().await = identity;
    }

    /// Game id of the current session
    pub async fn public_id(&self) -> Option<OpaqueId> {
        self.identity.read().await.public_id.clone()
    }

    /// Participant id of the current session
    pub async fn participant_id(&self) -> Option<OpaqueId> {
        self.identity.read().await.participant_id.clone()
    }

    /// Both ids read under one lock
    pub async fn identity(&self) -> SessionIdentity {
        self.identity.read().await.clone()
    }
}
