//! Core of the sharenote collaborative notes backend.
//! Notes with ordered checklists, co-author sharing, soft delete and live
//! change fanout. This crate is the single source of truth for their invariants.

pub mod app;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod realtime;
pub mod repo;
pub mod service;

pub use app::{CollabCore, Origin};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::co_author::{CoAuthor, CoAuthorId};
pub use model::list_item::{ListItem, ListItemId, ListItemPatch, NewListItem};
pub use model::note::{NewNote, Note, NoteId, NotePatch};
pub use model::reference::{NoteType, Status};
pub use model::user::{User, UserId};
pub use realtime::{
    ChannelSink, ConnectionSink, EventKind, Fanout, FanoutError, PublishReport, Subscription,
    WriterSink,
};
pub use repo::{RepoError, RepoResult};
pub use service::error::{CollabError, CollabResult};
pub use service::list_item_service::ListItemResult;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
