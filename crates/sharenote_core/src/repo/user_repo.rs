//! Local mirror of identities supplied by the identity provider.
//!
//! # Invariants
//! - Emails are unique case-insensitively (`idx_users_email`).
//! - Upserts are keyed by user id; the provider is the source of truth for
//!   name and email.

use crate::model::lifecycle::EntityKind;
use crate::model::user::{normalize_email, User, UserId};
use crate::repo::{map_unique_violation, parse_uuid, RepoResult, NOW_MS_SQL};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for user lookups.
pub trait UserRepository {
    /// Inserts or refreshes one user row.
    fn upsert_user(&self, user: &User) -> RepoResult<()>;
    /// Gets one user by id.
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Gets one user by email, ignoring case and surrounding whitespace.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn upsert_user(&self, user: &User) -> RepoResult<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO users (uuid, name, email)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (uuid) DO UPDATE SET
                        name = excluded.name,
                        email = excluded.email,
                        updated_at = {NOW_MS_SQL};"
                ),
                params![user.id.to_string(), user.name.trim(), user.email.trim()],
            )
            .map_err(|err| map_unique_violation(err, EntityKind::User))?;
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, name, email FROM users WHERE uuid = ?1;",
                [id.to_string()],
                read_user_columns,
            )
            .optional()?;
        row.map(into_user).transpose()
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, name, email FROM users WHERE email = ?1 COLLATE NOCASE;",
                [normalize_email(email)],
                read_user_columns,
            )
            .optional()?;
        row.map(into_user).transpose()
    }
}

type UserColumns = (String, String, String);

fn read_user_columns(row: &Row<'_>) -> rusqlite::Result<UserColumns> {
    Ok((row.get("uuid")?, row.get("name")?, row.get("email")?))
}

fn into_user((uuid, name, email): UserColumns) -> RepoResult<User> {
    Ok(User {
        id: parse_uuid(&uuid, "users.uuid")?,
        name,
        email,
    })
}
