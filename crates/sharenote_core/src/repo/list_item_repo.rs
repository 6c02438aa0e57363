//! Checklist item repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Items are always scoped to one note via `note_uuid`.
//! - Listing is deterministic: `sort_order ASC, created_at ASC, uuid ASC`.

use crate::model::lifecycle::{EntityKind, StatusId};
use crate::model::list_item::{ListItem, ListItemId, ListItemPatch};
use crate::model::note::NoteId;
use crate::repo::{bool_to_int, int_to_bool, parse_uuid, RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::{params, Connection, Row};

const LIST_ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    note_uuid,
    text,
    sort_order,
    checked,
    completed,
    status_id,
    created_at,
    updated_at
FROM list_items";

/// Row to insert for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItemDraft {
    pub id: ListItemId,
    pub note_id: NoteId,
    pub text: String,
    pub order: u32,
    pub checked: bool,
    pub completed: bool,
    pub status_id: StatusId,
}

/// Repository interface for checklist items.
pub trait ListItemRepository {
    fn insert_item(&self, item: &ListItemDraft) -> RepoResult<ListItemId>;
    /// Replaces text/order/checked/completed on one item.
    fn update_item(&self, id: ListItemId, patch: &ListItemPatch) -> RepoResult<()>;
    /// Gets one item, optionally constrained to one status.
    fn get_item(&self, id: ListItemId, status: Option<StatusId>) -> RepoResult<Option<ListItem>>;
    /// Lists a note's items in the given status, in display order.
    fn list_for_note(&self, note_id: NoteId, status: StatusId) -> RepoResult<Vec<ListItem>>;
    /// Next free position after the note's items in the given status.
    fn next_order(&self, note_id: NoteId, status: StatusId) -> RepoResult<u32>;
}

/// SQLite-backed checklist item repository.
pub struct SqliteListItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ListItemRepository for SqliteListItemRepository<'_> {
    fn insert_item(&self, item: &ListItemDraft) -> RepoResult<ListItemId> {
        insert_item_row(self.conn, item)?;
        Ok(item.id)
    }

    fn update_item(&self, id: ListItemId, patch: &ListItemPatch) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE list_items
                 SET
                    text = ?2,
                    sort_order = ?3,
                    checked = ?4,
                    completed = ?5,
                    updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![
                id.to_string(),
                patch.text.as_str(),
                patch.order,
                bool_to_int(patch.checked),
                bool_to_int(patch.completed),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::ListItem, id));
        }
        Ok(())
    }

    fn get_item(&self, id: ListItemId, status: Option<StatusId>) -> RepoResult<Option<ListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_ITEM_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 IS NULL OR status_id = ?2);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), status])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_list_item_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_for_note(&self, note_id: NoteId, status: StatusId) -> RepoResult<Vec<ListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LIST_ITEM_SELECT_SQL}
             WHERE note_uuid = ?1
               AND status_id = ?2
             ORDER BY sort_order ASC, created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![note_id.to_string(), status])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_list_item_row(row)?);
        }
        Ok(items)
    }

    fn next_order(&self, note_id: NoteId, status: StatusId) -> RepoResult<u32> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), 0) + 1
             FROM list_items
             WHERE note_uuid = ?1
               AND status_id = ?2;",
            params![note_id.to_string(), status],
            |row| row.get(0),
        )?;
        u32::try_from(next)
            .map_err(|_| RepoError::InvalidData(format!("next list item order {next} overflows")))
    }
}

/// Inserts one item row. Shared by item creation and note creation.
pub(crate) fn insert_item_row(conn: &Connection, item: &ListItemDraft) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO list_items (
            uuid,
            note_uuid,
            text,
            sort_order,
            checked,
            completed,
            status_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            item.id.to_string(),
            item.note_id.to_string(),
            item.text.as_str(),
            item.order,
            bool_to_int(item.checked),
            bool_to_int(item.completed),
            item.status_id,
        ],
    )?;
    Ok(())
}

fn parse_list_item_row(row: &Row<'_>) -> RepoResult<ListItem> {
    let uuid_text: String = row.get("uuid")?;
    let note_text: String = row.get("note_uuid")?;
    let order: i64 = row.get("sort_order")?;
    Ok(ListItem {
        id: parse_uuid(&uuid_text, "list_items.uuid")?,
        note_id: parse_uuid(&note_text, "list_items.note_uuid")?,
        text: row.get("text")?,
        order: u32::try_from(order).map_err(|_| {
            RepoError::InvalidData(format!("invalid sort_order `{order}` in list_items"))
        })?,
        checked: int_to_bool(row.get("checked")?, "list_items.checked")?,
        completed: int_to_bool(row.get("completed")?, "list_items.completed")?,
        status_id: row.get("status_id")?,
        created: row.get("created_at")?,
        updated: row.get("updated_at")?,
    })
}
