//! Audience resolution for one note event.

use crate::model::note::Note;
use crate::model::user::UserId;
use std::collections::BTreeSet;

/// Users whose live connections receive an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience {
    users: BTreeSet<UserId>,
}

impl Audience {
    /// Originating user, the note owner and every loaded active co-author.
    pub fn for_note(note: &Note, originating_user: UserId) -> Self {
        let mut users = BTreeSet::new();
        users.insert(originating_user);
        users.insert(note.owner_id);
        users.extend(note.co_authors.iter().map(|grant| grant.user_id));
        Self { users }
    }

    /// Adds one more recipient, e.g. a user whose grant was just revoked.
    pub fn with_member(mut self, user_id: UserId) -> Self {
        self.users.insert(user_id);
        self
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
