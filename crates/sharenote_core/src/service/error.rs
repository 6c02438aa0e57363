//! Public error taxonomy of the collaboration core.
//!
//! # Invariants
//! - Authorization failures on reads/writes are reported as `NotFound`;
//!   `Forbidden` is reserved for invite/revoke permission checks on a note
//!   the caller can already see.
//! - `Storage` keeps the full source error for logs; `public_message()`
//!   never exposes it.

use crate::db::DbError;
use crate::model::lifecycle::EntityKind;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
pub type CollabResult<T> = Result<T, CollabError>;

/// Errors surfaced to the request-handling layer.
#[derive(Debug)]
pub enum CollabError {
    /// Input failed validation.
    Validation(String),
    /// Target is absent or not visible to the caller. Carries the lookup key.
    NotFound(EntityKind, String),
    /// Caller can see the note but may not perform this sharing action.
    Forbidden(&'static str),
    /// Invitee email equals the inviter's email.
    SelfInvite,
    /// An active record with the same identity already exists.
    AlreadyExists(EntityKind),
    /// Persistence-layer failure.
    Storage(RepoError),
    /// Seeded reference data is missing.
    Misconfiguration(String),
}

impl CollabError {
    pub fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        Self::NotFound(kind, key.to_string())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::NotFound(..) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::SelfInvite => "self_invite",
            Self::AlreadyExists(_) => "already_exists",
            Self::Storage(_) => "storage_failure",
            Self::Misconfiguration(_) => "misconfiguration",
        }
    }

    /// Message safe to hand to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(_) => "storage failure".to_string(),
            Self::Misconfiguration(_) => "service misconfigured".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error indicates a server-side fault rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Misconfiguration(_))
    }
}

impl Display for CollabError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::NotFound(kind, key) => write!(f, "{kind} not found: {key}"),
            Self::Forbidden(message) => write!(f, "forbidden: {message}"),
            Self::SelfInvite => write!(f, "cannot invite the note author's own email"),
            Self::AlreadyExists(kind) => write!(f, "{kind} already exists"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Misconfiguration(message) => write!(f, "misconfiguration: {message}"),
        }
    }
}

impl Error for CollabError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CollabError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(kind, id) => Self::not_found(kind, id),
            RepoError::Duplicate(kind) => Self::AlreadyExists(kind),
            other => Self::Storage(other),
        }
    }
}

impl From<DbError> for CollabError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for CollabError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}
