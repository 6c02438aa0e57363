//! Note aggregate.
//!
//! # Invariants
//! - `list` holds only active items, sorted by `order ASC`.
//! - `co_authors` holds only active grants.
//! - `owner_id` never changes after creation.

use crate::model::co_author::CoAuthor;
use crate::model::lifecycle::{EntityKind, Lifecycle, StatusId};
use crate::model::list_item::{ListItem, NewListItem};
use crate::model::reference::NoteTypeId;
use crate::model::user::{User, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;

pub const NOTE_TITLE_MAX_CHARS: usize = 512;
pub const NOTE_TEXT_MAX_CHARS: usize = 65_536;

/// Note read model, enriched with its items, grants and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub text: String,
    pub type_id: NoteTypeId,
    pub status_id: StatusId,
    #[serde(rename = "userId")]
    pub owner_id: UserId,
    pub is_completed_list_expanded: bool,
    /// Epoch milliseconds assigned by storage.
    pub created: i64,
    /// Epoch milliseconds assigned by storage.
    pub updated: i64,
    pub list: Vec<ListItem>,
    pub co_authors: Vec<CoAuthor>,
    #[serde(rename = "user")]
    pub owner: Option<User>,
}

impl Note {
    /// Returns whether `user_id` owns this note.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Returns whether `user_id` holds one of the loaded active grants.
    pub fn has_co_author(&self, user_id: UserId) -> bool {
        self.co_authors.iter().any(|grant| grant.user_id == user_id)
    }

    /// Ids of the loaded active items in display order.
    pub fn item_ids(&self) -> Vec<Uuid> {
        self.list.iter().map(|item| item.id).collect()
    }
}

impl Lifecycle for Note {
    const KIND: EntityKind = EntityKind::Note;

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

/// Input for note creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Falls back to the `list` note type.
    #[serde(default)]
    pub type_id: Option<NoteTypeId>,
    /// Falls back to `true`.
    #[serde(default)]
    pub is_completed_list_expanded: Option<bool>,
    /// Initial checklist, inserted together with the note.
    #[serde(default)]
    pub list: Vec<NewListItem>,
}

impl NewNote {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Full replacement of editable note fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Keeps the stored type when absent.
    #[serde(default)]
    pub type_id: Option<NoteTypeId>,
    /// Falls back to `true` when absent.
    #[serde(default)]
    pub is_completed_list_expanded: Option<bool>,
}

/// Validates title/text bounds shared by create and update.
pub fn validate_note_text(title: &str, text: &str) -> Result<(), String> {
    if title.chars().count() > NOTE_TITLE_MAX_CHARS {
        return Err(format!(
            "note title exceeds {NOTE_TITLE_MAX_CHARS} characters"
        ));
    }
    if text.chars().count() > NOTE_TEXT_MAX_CHARS {
        return Err(format!("note text exceeds {NOTE_TEXT_MAX_CHARS} characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_note_text, NewNote, NOTE_TITLE_MAX_CHARS};

    #[test]
    fn new_note_deserializes_with_defaults() {
        let note: NewNote = serde_json::from_str(r#"{"title":"Groceries"}"#).unwrap();
        assert_eq!(note.title, "Groceries");
        assert!(note.text.is_empty());
        assert!(note.type_id.is_none());
        assert!(note.list.is_empty());
    }

    #[test]
    fn overlong_title_is_rejected() {
        let title = "x".repeat(NOTE_TITLE_MAX_CHARS + 1);
        let err = validate_note_text(&title, "").unwrap_err();
        assert!(err.contains("title"));
    }
}
