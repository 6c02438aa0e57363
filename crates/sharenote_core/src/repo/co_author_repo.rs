//! Co-author grant repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Every read helper takes the status to filter on; callers pass the
//!   active status so revoked grants stay invisible.
//! - `idx_note_co_authors_active_pair` rejects a second active grant for the
//!   same `(note, user)`; that surfaces as `RepoError::Duplicate`.

use crate::model::co_author::{CoAuthor, CoAuthorId};
use crate::model::lifecycle::{EntityKind, StatusId};
use crate::model::note::NoteId;
use crate::model::user::{User, UserId};
use crate::repo::{map_unique_violation, parse_uuid, RepoResult};
use rusqlite::{params, Connection, Row};

const CO_AUTHOR_SELECT_SQL: &str = "SELECT
    c.uuid,
    c.note_uuid,
    c.user_uuid,
    c.status_id,
    c.created_at,
    c.updated_at
FROM note_co_authors c";

/// Repository interface for sharing grants.
pub trait CoAuthorRepository {
    fn insert_grant(
        &self,
        id: CoAuthorId,
        note_id: NoteId,
        user_id: UserId,
        status: StatusId,
    ) -> RepoResult<CoAuthorId>;
    /// Grant for `(note_id, user_id)` in `status`.
    fn find(&self, note_id: NoteId, user_id: UserId, status: StatusId)
        -> RepoResult<Option<CoAuthor>>;
    fn find_by_id(&self, id: CoAuthorId, status: StatusId) -> RepoResult<Option<CoAuthor>>;
    fn find_by_user_id(&self, user_id: UserId, status: StatusId) -> RepoResult<Vec<CoAuthor>>;
    /// Grants of one note with their users populated.
    fn list_for_note(&self, note_id: NoteId, status: StatusId) -> RepoResult<Vec<CoAuthor>>;
}

/// SQLite-backed co-author repository.
pub struct SqliteCoAuthorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCoAuthorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_grants(
        &self,
        filter_sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<CoAuthor>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CO_AUTHOR_SELECT_SQL} {filter_sql}"))?;
        let mut rows = stmt.query(params)?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next()? {
            grants.push(parse_co_author_row(row)?);
        }
        Ok(grants)
    }
}

impl CoAuthorRepository for SqliteCoAuthorRepository<'_> {
    fn insert_grant(
        &self,
        id: CoAuthorId,
        note_id: NoteId,
        user_id: UserId,
        status: StatusId,
    ) -> RepoResult<CoAuthorId> {
        self.conn
            .execute(
                "INSERT INTO note_co_authors (uuid, note_uuid, user_uuid, status_id)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    id.to_string(),
                    note_id.to_string(),
                    user_id.to_string(),
                    status
                ],
            )
            .map_err(|err| map_unique_violation(err, EntityKind::CoAuthor))?;
        Ok(id)
    }

    fn find(
        &self,
        note_id: NoteId,
        user_id: UserId,
        status: StatusId,
    ) -> RepoResult<Option<CoAuthor>> {
        let grants = self.query_grants(
            "WHERE c.note_uuid = ?1 AND c.user_uuid = ?2 AND c.status_id = ?3 LIMIT 1;",
            params![note_id.to_string(), user_id.to_string(), status],
        )?;
        Ok(grants.into_iter().next())
    }

    fn find_by_id(&self, id: CoAuthorId, status: StatusId) -> RepoResult<Option<CoAuthor>> {
        let grants = self.query_grants(
            "WHERE c.uuid = ?1 AND c.status_id = ?2;",
            params![id.to_string(), status],
        )?;
        Ok(grants.into_iter().next())
    }

    fn find_by_user_id(&self, user_id: UserId, status: StatusId) -> RepoResult<Vec<CoAuthor>> {
        self.query_grants(
            "WHERE c.user_uuid = ?1 AND c.status_id = ?2 ORDER BY c.created_at ASC, c.uuid ASC;",
            params![user_id.to_string(), status],
        )
    }

    fn list_for_note(&self, note_id: NoteId, status: StatusId) -> RepoResult<Vec<CoAuthor>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.uuid,
                c.note_uuid,
                c.user_uuid,
                c.status_id,
                c.created_at,
                c.updated_at,
                u.name AS user_name,
                u.email AS user_email
             FROM note_co_authors c
             INNER JOIN users u ON u.uuid = c.user_uuid
             WHERE c.note_uuid = ?1
               AND c.status_id = ?2
             ORDER BY c.created_at ASC, c.uuid ASC;",
        )?;
        let mut rows = stmt.query(params![note_id.to_string(), status])?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next()? {
            let mut grant = parse_co_author_row(row)?;
            grant.user = Some(User {
                id: grant.user_id,
                name: row.get("user_name")?,
                email: row.get("user_email")?,
            });
            grants.push(grant);
        }
        Ok(grants)
    }
}

fn parse_co_author_row(row: &Row<'_>) -> RepoResult<CoAuthor> {
    let uuid_text: String = row.get("uuid")?;
    let note_text: String = row.get("note_uuid")?;
    let user_text: String = row.get("user_uuid")?;
    Ok(CoAuthor {
        id: parse_uuid(&uuid_text, "note_co_authors.uuid")?,
        note_id: parse_uuid(&note_text, "note_co_authors.note_uuid")?,
        user_id: parse_uuid(&user_text, "note_co_authors.user_uuid")?,
        status_id: row.get("status_id")?,
        created: row.get("created_at")?,
        updated: row.get("updated_at")?,
        user: None,
        note: None,
    })
}
