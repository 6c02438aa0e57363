//! Checklist item use-case service.
//!
//! # Invariants
//! - Every operation re-resolves the parent note through
//!   `NoteService::find_authorized` with the acting user; a note id taken
//!   from input or from the stored item is never trusted on its own.
//! - Results are read back after the write.

use crate::model::lifecycle::EntityKind;
use crate::model::list_item::{
    validate_list_item, ListItem, ListItemId, ListItemPatch, NewListItem,
};
use crate::model::note::Note;
use crate::model::user::User;
use crate::repo::lifecycle::transition;
use crate::repo::list_item_repo::{ListItemDraft, ListItemRepository, SqliteListItemRepository};
use crate::repo::RepoError;
use crate::service::error::{CollabError, CollabResult};
use crate::service::note_service::NoteService;
use crate::service::ServiceContext;
use serde::Serialize;
use uuid::Uuid;

/// An item together with its freshly enriched parent note.
///
/// Serializes as the bare item; the note is carried for audience resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItemResult {
    pub item: ListItem,
    pub note: Note,
}

impl Serialize for ListItemResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.item.serialize(serializer)
    }
}

pub struct ListItemService<'a> {
    ctx: ServiceContext<'a>,
    notes: NoteService<'a>,
    items: SqliteListItemRepository<'a>,
}

impl<'a> ListItemService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self {
            ctx,
            notes: NoteService::new(ctx),
            items: SqliteListItemRepository::new(ctx.conn),
        }
    }

    /// Adds an active item to a note visible to `user`.
    pub fn create(&self, data: NewListItem, user: &User) -> CollabResult<ListItemResult> {
        let note_id = data
            .note_id
            .ok_or_else(|| CollabError::Validation("noteId is required".to_string()))?;
        validate_list_item(&data.text, data.order).map_err(CollabError::Validation)?;
        let note = self.notes.find_authorized(note_id, user.id)?;
        let active = self.ctx.statuses.active;

        let order = match data.order {
            Some(order) => order,
            None => self.items.next_order(note.id, active)?,
        };
        let draft = ListItemDraft {
            id: Uuid::new_v4(),
            note_id: note.id,
            text: data.text,
            order,
            checked: data.checked,
            completed: data.completed,
            status_id: active,
        };
        let item_id = self.items.insert_item(&draft)?;
        self.result(item_id, note.id)
    }

    /// Replaces editable fields of an active item.
    pub fn update(
        &self,
        id: ListItemId,
        data: ListItemPatch,
        user: &User,
    ) -> CollabResult<ListItemResult> {
        let item = self.active_item(id)?;
        let note = self.notes.find_authorized(item.note_id, user.id)?;
        validate_list_item(&data.text, Some(data.order)).map_err(CollabError::Validation)?;

        self.items.update_item(item.id, &data)?;
        self.result(item.id, note.id)
    }

    /// Soft-deletes an active item.
    pub fn remove(&self, id: ListItemId, user: &User) -> CollabResult<ListItemResult> {
        let mut item = self.active_item(id)?;
        let note = self.notes.find_authorized(item.note_id, user.id)?;

        transition(self.ctx.conn, &mut item, self.ctx.statuses.inactive)?;
        self.result(item.id, note.id)
    }

    /// Reactivates a removed item.
    pub fn restore_by_id(&self, id: ListItemId, user: &User) -> CollabResult<ListItemResult> {
        let mut item = self
            .items
            .get_item(id, Some(self.ctx.statuses.inactive))?
            .ok_or_else(|| CollabError::not_found(EntityKind::ListItem, id))?;
        let note = self.notes.find_authorized(item.note_id, user.id)?;

        transition(self.ctx.conn, &mut item, self.ctx.statuses.active)?;
        self.result(item.id, note.id)
    }

    fn active_item(&self, id: ListItemId) -> CollabResult<ListItem> {
        self.items
            .get_item(id, Some(self.ctx.statuses.active))?
            .ok_or_else(|| CollabError::not_found(EntityKind::ListItem, id))
    }

    fn result(&self, item_id: ListItemId, note_id: Uuid) -> CollabResult<ListItemResult> {
        let item = self.items.get_item(item_id, None)?.ok_or_else(|| {
            CollabError::Storage(RepoError::InvalidData(format!(
                "list item {item_id} missing on read-back"
            )))
        })?;
        let note = self.notes.reload(note_id)?;
        Ok(ListItemResult { item, note })
    }
}
