//! Collaboration core: the single surface the request layer talks to.
//!
//! # Responsibility
//! - Own the storage connection, both reference caches and the fanout.
//! - Run each store operation under the connection lock, then publish the
//!   resulting event after the lock is released.
//!
//! # Invariants
//! - Events are published only for committed writes.
//! - A failed publish is logged and never turns a successful mutation into
//!   an error.

use crate::config::CoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::co_author::{CoAuthor, CoAuthorId};
use crate::model::list_item::{ListItemId, ListItemPatch, NewListItem};
use crate::model::note::{NewNote, Note, NoteId, NotePatch};
use crate::model::reference::{NoteType, Status};
use crate::model::user::{User, UserId};
use crate::realtime::{Audience, ConnectionSink, EventKind, Fanout, FanoutError, Subscription};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoError;
use crate::service::co_author_service::CoAuthorService;
use crate::service::error::{CollabError, CollabResult};
use crate::service::list_item_service::{ListItemResult, ListItemService};
use crate::service::note_service::NoteService;
use crate::service::reference_registry::{StatusRegistry, TypeRegistry};
use crate::service::ServiceContext;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Acting user of a mutation plus the live connection it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub user: User,
    /// Salt of the caller's own live connection. Connections opened with the
    /// same salt do not receive the resulting event.
    pub salt: Option<String>,
}

impl Origin {
    pub fn new(user: User) -> Self {
        Self { user, salt: None }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }
}

pub struct CollabCore {
    conn: Mutex<Connection>,
    statuses: StatusRegistry,
    types: TypeRegistry,
    fanout: Fanout,
}

impl CollabCore {
    /// Opens storage and builds the fanout from `config`.
    pub fn open(config: &CoreConfig) -> CollabResult<Self> {
        config
            .validate()
            .map_err(|err| CollabError::Misconfiguration(err.to_string()))?;
        let conn = match &config.storage.db_path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        let fanout = Fanout::new(config.heartbeat_interval())
            .map_err(|err| CollabError::Misconfiguration(err.to_string()))?;
        Ok(Self::with_fanout(conn, fanout))
    }

    /// Wraps an already migrated connection, with default heartbeat.
    pub fn with_connection(conn: Connection) -> Self {
        Self::with_fanout(conn, Fanout::default())
    }

    pub fn with_fanout(conn: Connection, fanout: Fanout) -> Self {
        Self {
            conn: Mutex::new(conn),
            statuses: StatusRegistry::new(),
            types: TypeRegistry::new(),
            fanout,
        }
    }

    pub fn fanout(&self) -> &Fanout {
        &self.fanout
    }

    pub fn status_registry(&self) -> &StatusRegistry {
        &self.statuses
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.types
    }

    /// Mirrors a verified identity into the local user directory.
    pub fn register_identity(&self, user: &User) -> CollabResult<()> {
        self.run("register_identity", |ctx| {
            Ok(SqliteUserRepository::new(ctx.conn).upsert_user(user)?)
        })
    }

    pub fn statuses(&self) -> CollabResult<Vec<Status>> {
        self.run("statuses", |ctx| Ok(self.statuses.list(ctx.conn)?.to_vec()))
    }

    pub fn note_types(&self) -> CollabResult<Vec<NoteType>> {
        self.run("note_types", |ctx| Ok(self.types.list(ctx.conn)?.to_vec()))
    }

    pub fn notes_list(&self, user: &User) -> CollabResult<Vec<Note>> {
        self.run("notes_list", |ctx| NoteService::new(ctx).list(user))
    }

    pub fn note_get(&self, id: NoteId, user: &User) -> CollabResult<Note> {
        self.run("note_get", |ctx| NoteService::new(ctx).get(id, user.id))
    }

    /// Creates a note owned by the origin user.
    pub fn note_create(&self, data: NewNote, origin: &Origin) -> CollabResult<Note> {
        let note = self.run("note_create", |ctx| {
            SqliteUserRepository::new(ctx.conn).upsert_user(&origin.user)?;
            NoteService::new(ctx).create(data, &origin.user)
        })?;
        self.notify(EventKind::NoteAdded, &note, &note, origin, None);
        Ok(note)
    }

    pub fn note_update(&self, id: NoteId, data: NotePatch, origin: &Origin) -> CollabResult<Note> {
        let note = self.run("note_update", |ctx| {
            NoteService::new(ctx).update(id, data, &origin.user)
        })?;
        self.notify(EventKind::NoteChanged, &note, &note, origin, None);
        Ok(note)
    }

    pub fn note_set_order(
        &self,
        id: NoteId,
        ordered_item_ids: &[ListItemId],
        origin: &Origin,
    ) -> CollabResult<Note> {
        let note = self.run("note_set_order", |ctx| {
            NoteService::new(ctx).set_order(id, ordered_item_ids, &origin.user)
        })?;
        self.notify(EventKind::NoteOrderSet, &note, &note, origin, None);
        Ok(note)
    }

    pub fn note_remove(&self, id: NoteId, origin: &Origin) -> CollabResult<Note> {
        let note = self.run("note_remove", |ctx| {
            NoteService::new(ctx).remove(id, &origin.user)
        })?;
        self.notify(EventKind::NoteRemoved, &note, &note, origin, None);
        Ok(note)
    }

    /// Restores a removed note; collaborators see it as newly added.
    pub fn note_restore(&self, id: NoteId, origin: &Origin) -> CollabResult<Note> {
        let note = self.run("note_restore", |ctx| {
            NoteService::new(ctx).restore(id, &origin.user)
        })?;
        self.notify(EventKind::NoteAdded, &note, &note, origin, None);
        Ok(note)
    }

    pub fn list_item_create(
        &self,
        data: NewListItem,
        origin: &Origin,
    ) -> CollabResult<ListItemResult> {
        let result = self.run("list_item_create", |ctx| {
            ListItemService::new(ctx).create(data, &origin.user)
        })?;
        self.notify(EventKind::ListItemAdded, &result.note, &result.item, origin, None);
        Ok(result)
    }

    pub fn list_item_update(
        &self,
        id: ListItemId,
        data: ListItemPatch,
        origin: &Origin,
    ) -> CollabResult<ListItemResult> {
        let result = self.run("list_item_update", |ctx| {
            ListItemService::new(ctx).update(id, data, &origin.user)
        })?;
        self.notify(EventKind::ListItemChanged, &result.note, &result.item, origin, None);
        Ok(result)
    }

    pub fn list_item_remove(&self, id: ListItemId, origin: &Origin) -> CollabResult<ListItemResult> {
        let result = self.run("list_item_remove", |ctx| {
            ListItemService::new(ctx).remove(id, &origin.user)
        })?;
        self.notify(EventKind::ListItemRemoved, &result.note, &result.item, origin, None);
        Ok(result)
    }

    pub fn list_item_restore(
        &self,
        id: ListItemId,
        origin: &Origin,
    ) -> CollabResult<ListItemResult> {
        let result = self.run("list_item_restore", |ctx| {
            ListItemService::new(ctx).restore_by_id(id, &origin.user)
        })?;
        self.notify(EventKind::ListItemAdded, &result.note, &result.item, origin, None);
        Ok(result)
    }

    /// Invites `invitee_email` to a note owned by the origin user.
    pub fn co_author_create(
        &self,
        note_id: NoteId,
        invitee_email: &str,
        origin: &Origin,
    ) -> CollabResult<CoAuthor> {
        let grant = self.run("co_author_create", |ctx| {
            CoAuthorService::new(ctx).create(note_id, invitee_email, &origin.user)
        })?;
        if let Some(note) = grant.note.as_deref() {
            self.notify(EventKind::NoteChanged, note, note, origin, None);
        }
        Ok(grant)
    }

    /// Revokes a grant; the revoked user is notified along with the note's
    /// remaining collaborators.
    pub fn co_author_delete(&self, id: CoAuthorId, origin: &Origin) -> CollabResult<CoAuthor> {
        let grant = self.run("co_author_delete", |ctx| {
            CoAuthorService::new(ctx).delete(id, &origin.user)
        })?;
        if let Some(note) = grant.note.as_deref() {
            self.notify(EventKind::NoteChanged, note, note, origin, Some(grant.user_id));
        }
        Ok(grant)
    }

    pub fn co_author_find(&self, note_id: NoteId, user_id: UserId) -> CollabResult<Option<CoAuthor>> {
        self.run("co_author_find", |ctx| {
            CoAuthorService::new(ctx).find(note_id, user_id)
        })
    }

    pub fn co_author_find_by_id(&self, id: CoAuthorId) -> CollabResult<CoAuthor> {
        self.run("co_author_find_by_id", |ctx| {
            CoAuthorService::new(ctx).find_by_id(id)
        })
    }

    pub fn co_authors_for_user(&self, user_id: UserId) -> CollabResult<Vec<CoAuthor>> {
        self.run("co_authors_for_user", |ctx| {
            CoAuthorService::new(ctx).find_by_user_id(user_id)
        })
    }

    /// Opens a live subscription for `user_id` on `salt`.
    pub fn subscribe(
        &self,
        user_id: UserId,
        salt: &str,
        sink: Arc<dyn ConnectionSink>,
    ) -> Result<Subscription, FanoutError> {
        self.fanout.subscribe(user_id, salt, sink)
    }

    /// Closes every live subscription.
    pub fn shutdown(&self) -> usize {
        self.fanout.shutdown()
    }

    fn lock_conn(&self) -> CollabResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CollabError::Storage(RepoError::Db(DbError::ConnectionPoisoned)))
    }

    fn run<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(ServiceContext<'_>) -> CollabResult<T>,
    ) -> CollabResult<T> {
        let started = Instant::now();
        let result = self.lock_conn().and_then(|conn| {
            let statuses = self.statuses.lifecycle(&conn)?;
            f(ServiceContext::new(&conn, statuses, &self.types))
        });
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(_) => debug!("event=core_op module=core status=ok op={op} duration_ms={duration_ms}"),
            Err(err) if err.is_internal() => error!(
                "event=core_op module=core status=error op={op} duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            ),
            Err(err) => info!(
                "event=core_op module=core status=error op={op} duration_ms={duration_ms} error_code={}",
                err.code()
            ),
        }
        result
    }

    fn notify<P: Serialize + ?Sized>(
        &self,
        kind: EventKind,
        note: &Note,
        payload: &P,
        origin: &Origin,
        extra_member: Option<UserId>,
    ) {
        let mut audience = Audience::for_note(note, origin.user.id);
        if let Some(user_id) = extra_member {
            audience = audience.with_member(user_id);
        }
        if let Err(err) = self
            .fanout
            .publish_to(kind, &audience, payload, origin.salt())
        {
            warn!(
                "event=fanout_publish module=core status=error kind={kind} note_id={} error={err}",
                note.id
            );
        }
    }
}
