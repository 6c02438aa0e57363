//! Co-author (sharing grant) use-case service.
//!
//! # Responsibility
//! - Invite a user to a note by email and revoke grants.
//! - Serve active-only grant lookups.
//!
//! # Invariants
//! - Only the owner may invite.
//! - Invite failures follow a fixed order: self, visibility, ownership, invitee.
//! - The owner or the grant subject may revoke.
//! - Revocation flips status; grant rows are never deleted.

use crate::model::co_author::{CoAuthor, CoAuthorId};
use crate::model::lifecycle::EntityKind;
use crate::model::note::NoteId;
use crate::model::user::{normalize_email, User, UserId};
use crate::repo::co_author_repo::{CoAuthorRepository, SqliteCoAuthorRepository};
use crate::repo::lifecycle::transition;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::error::{CollabError, CollabResult};
use crate::service::note_service::NoteService;
use crate::service::ServiceContext;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

pub struct CoAuthorService<'a> {
    ctx: ServiceContext<'a>,
    notes: NoteService<'a>,
    grants: SqliteCoAuthorRepository<'a>,
    users: SqliteUserRepository<'a>,
}

impl<'a> CoAuthorService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self {
            ctx,
            notes: NoteService::new(ctx),
            grants: SqliteCoAuthorRepository::new(ctx.conn),
            users: SqliteUserRepository::new(ctx.conn),
        }
    }

    /// Grants `invitee_email` shared access to a note owned by `user`.
    ///
    /// Returns the grant with `user` and the refreshed `note` populated.
    pub fn create(
        &self,
        note_id: NoteId,
        invitee_email: &str,
        user: &User,
    ) -> CollabResult<CoAuthor> {
        let invitee_key = normalize_email(invitee_email);
        if invitee_key == user.email_key() {
            return Err(CollabError::SelfInvite);
        }
        let note = self.notes.find_authorized(note_id, user.id)?;
        if !note.is_owned_by(user.id) {
            return Err(CollabError::Forbidden(
                "co-authors can be added only by the note author",
            ));
        }

        // A malformed address cannot belong to anyone.
        let invitee = EMAIL_RE
            .is_match(&invitee_key)
            .then(|| self.users.find_by_email(&invitee_key))
            .transpose()?
            .flatten()
            .ok_or_else(|| CollabError::not_found(EntityKind::User, invitee_key.as_str()))?;
        let active = self.ctx.statuses.active;
        if self.grants.find(note.id, invitee.id, active)?.is_some() {
            return Err(CollabError::AlreadyExists(EntityKind::CoAuthor));
        }

        let grant_id = self
            .grants
            .insert_grant(Uuid::new_v4(), note.id, invitee.id, active)?;
        let mut grant = self
            .grants
            .find_by_id(grant_id, active)?
            .ok_or_else(|| CollabError::not_found(EntityKind::CoAuthor, grant_id))?;
        grant.user = Some(invitee);
        grant.note = Some(Box::new(self.notes.reload(note.id)?));
        Ok(grant)
    }

    /// Revokes a grant. Allowed for the note owner and the grant subject.
    pub fn delete(&self, id: CoAuthorId, user: &User) -> CollabResult<CoAuthor> {
        let mut grant = self.find_by_id(id)?;
        let note = self.notes.find_authorized(grant.note_id, user.id)?;
        let subject = self
            .users
            .get_user(grant.user_id)?
            .ok_or_else(|| CollabError::not_found(EntityKind::User, grant.user_id))?;

        if !(note.is_owned_by(user.id) || grant.user_id == user.id) {
            return Err(CollabError::Forbidden(
                "co-authors can be removed only by the note author or themselves",
            ));
        }

        transition(self.ctx.conn, &mut grant, self.ctx.statuses.inactive)?;
        grant.user = Some(subject);
        grant.note = Some(Box::new(self.notes.reload(note.id)?));
        Ok(grant)
    }

    /// Active grant for `(note_id, user_id)`.
    pub fn find(&self, note_id: NoteId, user_id: UserId) -> CollabResult<Option<CoAuthor>> {
        Ok(self
            .grants
            .find(note_id, user_id, self.ctx.statuses.active)?)
    }

    /// Active grant by id.
    pub fn find_by_id(&self, id: CoAuthorId) -> CollabResult<CoAuthor> {
        self.grants
            .find_by_id(id, self.ctx.statuses.active)?
            .ok_or_else(|| CollabError::not_found(EntityKind::CoAuthor, id))
    }

    /// Active grants held by `user_id`.
    pub fn find_by_user_id(&self, user_id: UserId) -> CollabResult<Vec<CoAuthor>> {
        Ok(self
            .grants
            .find_by_user_id(user_id, self.ctx.statuses.active)?)
    }
}

#[cfg(test)]
mod tests {
    use super::EMAIL_RE;

    #[test]
    fn email_pattern_accepts_plain_addresses_only() {
        assert!(EMAIL_RE.is_match("bob@example.com"));
        assert!(!EMAIL_RE.is_match("bob"));
        assert!(!EMAIL_RE.is_match("bob@example"));
        assert!(!EMAIL_RE.is_match("bob smith@example.com"));
    }
}
