//! Note use-case service.
//!
//! # Responsibility
//! - Authorize every note read/write against owner + active co-author grants.
//! - Create, update, reorder, remove and restore notes.
//! - Enrich notes with active items, active co-authors and owner.
//!
//! # Invariants
//! - Callers without access get `NotFound`, never a distinguishable denial.
//! - Every write re-reads the note so timestamps come from storage.
//! - `set_order` is all-or-nothing.

use crate::model::lifecycle::{EntityKind, Lifecycle};
use crate::model::list_item::{validate_list_item, ListItemId};
use crate::model::note::{validate_note_text, NewNote, Note, NoteId, NotePatch};
use crate::model::reference::NoteTypeId;
use crate::model::user::{User, UserId};
use crate::repo::co_author_repo::{CoAuthorRepository, SqliteCoAuthorRepository};
use crate::repo::lifecycle::transition;
use crate::repo::list_item_repo::{ListItemDraft, ListItemRepository, SqliteListItemRepository};
use crate::repo::note_repo::{NoteDraft, NoteRepository, SqliteNoteRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::error::{CollabError, CollabResult};
use crate::service::ServiceContext;
use std::collections::HashSet;
use uuid::Uuid;

/// Note service facade over the SQLite repositories.
pub struct NoteService<'a> {
    ctx: ServiceContext<'a>,
    notes: SqliteNoteRepository<'a>,
    items: SqliteListItemRepository<'a>,
    grants: SqliteCoAuthorRepository<'a>,
    users: SqliteUserRepository<'a>,
}

impl<'a> NoteService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self {
            ctx,
            notes: SqliteNoteRepository::new(ctx.conn),
            items: SqliteListItemRepository::new(ctx.conn),
            grants: SqliteCoAuthorRepository::new(ctx.conn),
            users: SqliteUserRepository::new(ctx.conn),
        }
    }

    /// Active notes owned by or shared with `user`, newest first, enriched.
    pub fn list(&self, user: &User) -> CollabResult<Vec<Note>> {
        let mut notes = self
            .notes
            .list_visible(user.id, self.ctx.statuses.active)?;
        for note in &mut notes {
            self.enrich(note)?;
        }
        Ok(notes)
    }

    /// Creates a note owned by `user`, with its initial checklist.
    pub fn create(&self, data: NewNote, user: &User) -> CollabResult<Note> {
        validate_note_text(&data.title, &data.text).map_err(CollabError::Validation)?;
        let type_id = self.resolve_type(data.type_id)?;
        let statuses = self.ctx.statuses;
        let note_id = Uuid::new_v4();

        let mut items = Vec::with_capacity(data.list.len());
        for (index, item) in data.list.into_iter().enumerate() {
            validate_list_item(&item.text, item.order).map_err(CollabError::Validation)?;
            let fallback = u32::try_from(index + 1)
                .map_err(|_| CollabError::Validation("too many list items".to_string()))?;
            items.push(ListItemDraft {
                id: Uuid::new_v4(),
                note_id,
                text: item.text,
                order: item.order.unwrap_or(fallback),
                checked: item.checked,
                completed: item.completed,
                status_id: statuses.active,
            });
        }

        let draft = NoteDraft {
            id: note_id,
            title: data.title,
            text: data.text,
            type_id,
            status_id: statuses.active,
            owner_id: user.id,
            is_completed_list_expanded: data.is_completed_list_expanded.unwrap_or(true),
        };
        self.notes.insert_note(&draft, &items)?;
        self.reload(note_id)
    }

    /// Replaces editable fields of a note visible to `user`.
    pub fn update(&self, id: NoteId, data: NotePatch, user: &User) -> CollabResult<Note> {
        let note = self.find_authorized(id, user.id)?;
        validate_note_text(&data.title, &data.text).map_err(CollabError::Validation)?;
        let type_id = match data.type_id {
            Some(type_id) => self.resolve_type(Some(type_id))?,
            None => note.type_id,
        };

        self.notes.update_note(
            note.id,
            &data.title,
            &data.text,
            type_id,
            data.is_completed_list_expanded.unwrap_or(true),
        )?;
        self.reload(note.id)
    }

    /// Assigns `order = position + 1` to each listed item, atomically.
    pub fn set_order(
        &self,
        id: NoteId,
        ordered_item_ids: &[ListItemId],
        user: &User,
    ) -> CollabResult<Note> {
        let note = self.find_authorized(id, user.id)?;
        let mut seen = HashSet::with_capacity(ordered_item_ids.len());
        if let Some(repeated) = ordered_item_ids.iter().find(|item_id| !seen.insert(**item_id)) {
            return Err(CollabError::Validation(format!(
                "list item {repeated} appears more than once in the order"
            )));
        }

        self.notes
            .set_item_order(note.id, ordered_item_ids, self.ctx.statuses.active)?;
        self.reload(note.id)
    }

    /// Soft-deletes an active note.
    pub fn remove(&self, id: NoteId, user: &User) -> CollabResult<Note> {
        let mut note = self.find_authorized(id, user.id)?;
        transition(self.ctx.conn, &mut note, self.ctx.statuses.inactive)?;
        self.reload(note.id)
    }

    /// Reactivates a removed note. Authorization ignores the note status;
    /// a note that is not removed is `NotFound`.
    pub fn restore(&self, id: NoteId, user: &User) -> CollabResult<Note> {
        let mut note = self
            .notes
            .find_visible(id, user.id, self.ctx.statuses.active, true)?
            .filter(|note| note.has_status(self.ctx.statuses.inactive))
            .ok_or_else(|| CollabError::not_found(EntityKind::Note, id))?;
        transition(self.ctx.conn, &mut note, self.ctx.statuses.active)?;
        self.reload(note.id)
    }

    /// Active note visible to `user_id`, without enrichment.
    pub fn find_authorized(&self, id: NoteId, user_id: UserId) -> CollabResult<Note> {
        self.notes
            .find_visible(id, user_id, self.ctx.statuses.active, false)?
            .ok_or_else(|| CollabError::not_found(EntityKind::Note, id))
    }

    /// Active note visible to `user_id`, enriched.
    pub fn get(&self, id: NoteId, user_id: UserId) -> CollabResult<Note> {
        let mut note = self.find_authorized(id, user_id)?;
        self.enrich(&mut note)?;
        Ok(note)
    }

    /// Reads a note back from storage (any status) and enriches it.
    pub fn reload(&self, id: NoteId) -> CollabResult<Note> {
        let mut note = self.notes.get_note(id)?.ok_or_else(|| {
            CollabError::Storage(RepoError::InvalidData(format!(
                "note {id} missing on read-back"
            )))
        })?;
        self.enrich(&mut note)?;
        Ok(note)
    }

    /// Fills `list`, `co_authors` and `owner` from storage.
    pub fn enrich(&self, note: &mut Note) -> CollabResult<()> {
        let active = self.ctx.statuses.active;
        note.list = self.items.list_for_note(note.id, active)?;
        note.co_authors = self.grants.list_for_note(note.id, active)?;
        note.owner = self.users.get_user(note.owner_id)?;
        Ok(())
    }

    fn resolve_type(&self, requested: Option<NoteTypeId>) -> CollabResult<NoteTypeId> {
        match requested {
            None => Ok(self.ctx.default_type()?.id),
            Some(type_id) if self.ctx.types.contains(self.ctx.conn, type_id)? => Ok(type_id),
            Some(type_id) => Err(CollabError::Validation(format!(
                "unknown note type id {type_id}"
            ))),
        }
    }
}
