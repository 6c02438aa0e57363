//! Reference rows seeded by migrations: lifecycle statuses and note types.

use crate::model::lifecycle::StatusId;
use serde::{Deserialize, Serialize};

/// Identifier of a row in the `note_types` reference table.
pub type NoteTypeId = i64;

/// Lifecycle status row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub name: String,
}

impl Status {
    pub const ACTIVE: &'static str = "active";
    pub const INACTIVE: &'static str = "inactive";
}

/// Note presentation type row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteType {
    pub id: NoteTypeId,
    pub name: String,
}

impl NoteType {
    /// Checklist note. Default for new notes.
    pub const LIST: &'static str = "list";
    /// Free text note.
    pub const TEXT: &'static str = "text";
}

/// Reference rows that can be resolved by their well-known name.
pub trait NamedReference {
    fn reference_id(&self) -> i64;
    fn reference_name(&self) -> &str;
}

impl NamedReference for Status {
    fn reference_id(&self) -> i64 {
        self.id
    }

    fn reference_name(&self) -> &str {
        &self.name
    }
}

impl NamedReference for NoteType {
    fn reference_id(&self) -> i64 {
        self.id
    }

    fn reference_name(&self) -> &str {
        &self.name
    }
}
