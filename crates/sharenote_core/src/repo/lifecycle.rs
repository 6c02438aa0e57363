//! One SQL path for every status transition.

use crate::model::lifecycle::{EntityKind, Lifecycle, StatusId};
use crate::repo::{RepoError, RepoResult, NOW_MS_SQL};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn table_for(kind: EntityKind) -> RepoResult<&'static str> {
    match kind {
        EntityKind::Note => Ok("notes"),
        EntityKind::ListItem => Ok("list_items"),
        EntityKind::CoAuthor => Ok("note_co_authors"),
        EntityKind::User => Err(RepoError::InvalidData(
            "users do not follow the status lifecycle".to_string(),
        )),
    }
}

/// Sets `status_id` on one row and stamps `updated_at`.
pub fn set_status(conn: &Connection, kind: EntityKind, id: Uuid, to: StatusId) -> RepoResult<()> {
    let table = table_for(kind)?;
    let changed = conn.execute(
        &format!(
            "UPDATE {table}
             SET status_id = ?1,
                 updated_at = {NOW_MS_SQL}
             WHERE uuid = ?2;"
        ),
        params![to, id.to_string()],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound(kind, id));
    }
    Ok(())
}

/// Persists a transition of `entity` to `to` and mirrors it in memory.
///
/// The in-memory status only changes after the row update succeeded.
pub fn transition<T: Lifecycle>(conn: &Connection, entity: &mut T, to: StatusId) -> RepoResult<()> {
    set_status(conn, T::KIND, entity.lifecycle_id(), to)?;
    entity.set_status_id(to);
    Ok(())
}
