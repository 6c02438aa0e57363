//! Checklist item owned by exactly one note.

use crate::model::lifecycle::{EntityKind, Lifecycle, StatusId};
use crate::model::note::NoteId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ListItemId = Uuid;

pub const LIST_ITEM_TEXT_MAX_CHARS: usize = 4_096;

/// Checklist item read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: ListItemId,
    pub note_id: NoteId,
    pub text: String,
    /// Position inside the note's active items, starting at 1.
    pub order: u32,
    pub checked: bool,
    pub completed: bool,
    pub status_id: StatusId,
    pub created: i64,
    pub updated: i64,
}

impl Lifecycle for ListItem {
    const KIND: EntityKind = EntityKind::ListItem;

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

/// Input for item creation. `note_id` is ignored inside `NewNote::list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListItem {
    #[serde(default)]
    pub note_id: Option<NoteId>,
    #[serde(default)]
    pub text: String,
    /// Appends after the last active item when absent.
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub completed: bool,
}

impl NewListItem {
    pub fn for_note(note_id: NoteId, text: impl Into<String>) -> Self {
        Self {
            note_id: Some(note_id),
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Full replacement of editable item fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemPatch {
    pub text: String,
    pub order: u32,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub completed: bool,
}

impl ListItemPatch {
    /// Builds a patch that keeps every field of `item`.
    pub fn from_item(item: &ListItem) -> Self {
        Self {
            text: item.text.clone(),
            order: item.order,
            checked: item.checked,
            completed: item.completed,
        }
    }
}

/// Validates item text and order bounds.
pub fn validate_list_item(text: &str, order: Option<u32>) -> Result<(), String> {
    if text.chars().count() > LIST_ITEM_TEXT_MAX_CHARS {
        return Err(format!(
            "list item text exceeds {LIST_ITEM_TEXT_MAX_CHARS} characters"
        ));
    }
    if order == Some(0) {
        return Err("list item order must be a positive integer".to_string());
    }
    Ok(())
}
