//! Shared soft-delete lifecycle.
//!
//! Notes, list items and co-author grants all carry a `status_id` that points
//! at the `statuses` reference table. Removal and restore are the same
//! operation for every one of them: flip the status and let storage stamp
//! `updated_at`. This module holds the model half of that contract; the SQL
//! half lives in `repo::lifecycle`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of a row in the `statuses` reference table.
pub type StatusId = i64;

/// Kind of entity that follows the status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Note,
    ListItem,
    CoAuthor,
    User,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::ListItem => "list_item",
            Self::CoAuthor => "co_author",
            Self::User => "user",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity whose visibility is governed by a status reference.
pub trait Lifecycle {
    /// Which table/kind this entity belongs to.
    const KIND: EntityKind;

    /// Stable row identity.
    fn lifecycle_id(&self) -> Uuid;

    /// Current status reference.
    fn status_id(&self) -> StatusId;

    /// Overwrites the in-memory status after a committed transition.
    fn set_status_id(&mut self, status_id: StatusId);

    fn has_status(&self, status_id: StatusId) -> bool {
        self.status_id() == status_id
    }
}
