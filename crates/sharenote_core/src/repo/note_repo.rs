//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist note rows and answer visibility-scoped note queries.
//! - Own the transactional checklist reorder (`set_item_order`).
//!
//! # Invariants
//! - A note is visible to a user iff the user owns it or holds an active
//!   co-author grant for it. Owned and shared notes come from one statement.
//! - `insert_note` writes the note and its initial items in one transaction.
//! - `set_item_order` applies every position or none.

use crate::model::lifecycle::{EntityKind, StatusId};
use crate::model::list_item::ListItemId;
use crate::model::note::{Note, NoteId};
use crate::model::reference::NoteTypeId;
use crate::model::user::UserId;
use crate::repo::list_item_repo::{insert_item_row, ListItemDraft};
use crate::repo::{bool_to_int, int_to_bool, parse_uuid, RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::{named_params, params, Connection, Row, Transaction, TransactionBehavior};

const NOTE_SELECT_SQL: &str = "SELECT
    n.uuid,
    n.title,
    n.text,
    n.type_id,
    n.status_id,
    n.owner_uuid,
    n.is_completed_list_expanded,
    n.created_at,
    n.updated_at
FROM notes n";

/// Visibility predicate. Binds `:user_uuid` and `:active`.
const NOTE_VISIBLE_SQL: &str = "(
    n.owner_uuid = :user_uuid
    OR EXISTS (
        SELECT 1
        FROM note_co_authors c
        WHERE c.note_uuid = n.uuid
          AND c.user_uuid = :user_uuid
          AND c.status_id = :active
    )
)";

/// Row to insert for a new note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub id: NoteId,
    pub title: String,
    pub text: String,
    pub type_id: NoteTypeId,
    pub status_id: StatusId,
    pub owner_id: UserId,
    pub is_completed_list_expanded: bool,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts one note plus its initial items atomically.
    fn insert_note(&self, note: &NoteDraft, items: &[ListItemDraft]) -> RepoResult<NoteId>;
    /// Replaces editable fields of one note.
    fn update_note(
        &self,
        id: NoteId,
        title: &str,
        text: &str,
        type_id: NoteTypeId,
        is_completed_list_expanded: bool,
    ) -> RepoResult<()>;
    /// Gets one note regardless of status or visibility.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Gets one note if `user_id` may see it.
    ///
    /// With `include_inactive = false` only active notes are returned.
    fn find_visible(
        &self,
        id: NoteId,
        user_id: UserId,
        active: StatusId,
        include_inactive: bool,
    ) -> RepoResult<Option<Note>>;
    /// Lists active notes owned by or shared with `user_id`, newest first.
    fn list_visible(&self, user_id: UserId, active: StatusId) -> RepoResult<Vec<Note>>;
    /// Assigns `order = position + 1` to each id, all-or-nothing.
    fn set_item_order(
        &self,
        note_id: NoteId,
        ordered_ids: &[ListItemId],
        active: StatusId,
    ) -> RepoResult<()>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        // Callers hold the core connection lock, so no other transaction can
        // be open on this connection.
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &NoteDraft, items: &[ListItemDraft]) -> RepoResult<NoteId> {
        let tx = self.begin()?;
        tx.execute(
            "INSERT INTO notes (
                uuid,
                title,
                text,
                type_id,
                status_id,
                owner_uuid,
                is_completed_list_expanded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                note.id.to_string(),
                note.title.as_str(),
                note.text.as_str(),
                note.type_id,
                note.status_id,
                note.owner_id.to_string(),
                bool_to_int(note.is_completed_list_expanded),
            ],
        )?;
        for item in items {
            insert_item_row(&tx, item)?;
        }
        tx.commit()?;
        Ok(note.id)
    }

    fn update_note(
        &self,
        id: NoteId,
        title: &str,
        text: &str,
        type_id: NoteTypeId,
        is_completed_list_expanded: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE notes
                 SET
                    title = ?2,
                    text = ?3,
                    type_id = ?4,
                    is_completed_list_expanded = ?5,
                    updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![
                id.to_string(),
                title,
                text,
                type_id,
                bool_to_int(is_completed_list_expanded),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Note, id));
        }
        Ok(())
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE n.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_note_row(row)?)),
            None => Ok(None),
        }
    }

    fn find_visible(
        &self,
        id: NoteId,
        user_id: UserId,
        active: StatusId,
        include_inactive: bool,
    ) -> RepoResult<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE n.uuid = :note_uuid
               AND (:include_inactive = 1 OR n.status_id = :active)
               AND {NOTE_VISIBLE_SQL};"
        ))?;
        let mut rows = stmt.query(named_params! {
            ":note_uuid": id.to_string(),
            ":user_uuid": user_id.to_string(),
            ":active": active,
            ":include_inactive": bool_to_int(include_inactive),
        })?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_note_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_visible(&self, user_id: UserId, active: StatusId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE n.status_id = :active
               AND {NOTE_VISIBLE_SQL}
             ORDER BY n.created_at DESC, n.uuid ASC;"
        ))?;
        let mut rows = stmt.query(named_params! {
            ":user_uuid": user_id.to_string(),
            ":active": active,
        })?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn set_item_order(
        &self,
        note_id: NoteId,
        ordered_ids: &[ListItemId],
        active: StatusId,
    ) -> RepoResult<()> {
        let tx = self.begin()?;
        let note_text = note_id.to_string();
        for (position, item_id) in ordered_ids.iter().enumerate() {
            let order = i64::try_from(position + 1).map_err(|_| {
                RepoError::InvalidData(format!("order position {position} out of range"))
            })?;
            let changed = tx.execute(
                &format!(
                    "UPDATE list_items
                     SET sort_order = ?1,
                         updated_at = {NOW_MS_SQL}
                     WHERE uuid = ?2
                       AND note_uuid = ?3
                       AND status_id = ?4;"
                ),
                params![order, item_id.to_string(), note_text.as_str(), active],
            )?;
            if changed == 0 {
                // Dropping `tx` rolls back every assignment made so far.
                return Err(RepoError::NotFound(EntityKind::ListItem, *item_id));
            }
        }
        tx.execute(
            &format!("UPDATE notes SET updated_at = {NOW_MS_SQL} WHERE uuid = ?1;"),
            [note_text.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    Ok(Note {
        id: parse_uuid(&uuid_text, "notes.uuid")?,
        title: row.get("title")?,
        text: row.get("text")?,
        type_id: row.get("type_id")?,
        status_id: row.get("status_id")?,
        owner_id: parse_uuid(&owner_text, "notes.owner_uuid")?,
        is_completed_list_expanded: int_to_bool(
            row.get("is_completed_list_expanded")?,
            "notes.is_completed_list_expanded",
        )?,
        created: row.get("created_at")?,
        updated: row.get("updated_at")?,
        list: Vec::new(),
        co_authors: Vec::new(),
        owner: None,
    })
}

