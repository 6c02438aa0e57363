//! Users as supplied by the external identity provider.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Verified identity `{userId, name, email}`.
///
/// The core never authenticates anyone; callers hand it an identity that the
/// identity provider already verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Email comparison key: trimmed, ASCII letters lowercased.
    pub fn email_key(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Normalizes an email for lookups and self-invite checks.
///
/// Folds ASCII only, the same folding SQLite applies under `COLLATE NOCASE`.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn normalize_email_folds_ascii_only() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
        assert_eq!(normalize_email("ÉMILE@Example.com"), "Émile@example.com");
    }
}
