//! Loaders for the seeded reference tables.

use crate::model::reference::{NoteType, Status};
use crate::repo::RepoResult;
use rusqlite::Connection;

/// Loads the whole `statuses` table.
pub fn load_statuses(conn: &Connection) -> RepoResult<Vec<Status>> {
    let mut stmt = conn.prepare("SELECT id, name FROM statuses ORDER BY id ASC;")?;
    let rows = stmt.query_map([], |row| {
        Ok(Status {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Loads the whole `note_types` table.
pub fn load_note_types(conn: &Connection) -> RepoResult<Vec<NoteType>> {
    let mut stmt = conn.prepare("SELECT id, name FROM note_types ORDER BY id ASC;")?;
    let rows = stmt.query_map([], |row| {
        Ok(NoteType {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
