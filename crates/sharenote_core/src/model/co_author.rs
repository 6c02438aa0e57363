//! Sharing grant between a note and a user.

use crate::model::lifecycle::{EntityKind, Lifecycle, StatusId};
use crate::model::note::{Note, NoteId};
use crate::model::user::{User, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CoAuthorId = Uuid;

/// Co-author grant. At most one active grant exists per `(note_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoAuthor {
    pub id: CoAuthorId,
    pub note_id: NoteId,
    pub user_id: UserId,
    pub status_id: StatusId,
    pub created: i64,
    pub updated: i64,
    /// Grant subject, populated by enrichment.
    #[serde(default)]
    pub user: Option<User>,
    /// Parent note, populated by invite/revoke results only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Box<Note>>,
}

impl Lifecycle for CoAuthor {
    const KIND: EntityKind = EntityKind::CoAuthor;

    fn lifecycle_id(&self) -> Uuid {
        self.id
    }

    fn status_id(&self) -> StatusId {
        self.status_id
    }

    fn set_status_id(&mut self, status_id: StatusId) {
        self.status_id = status_id;
    }
}
