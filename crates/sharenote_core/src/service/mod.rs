//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into authorized use-case APIs.
//! - Keep callers decoupled from SQL and from status/type ids.
//!
//! # Invariants
//! - Every service borrows one `ServiceContext`, built while the caller holds
//!   the connection lock, so one operation never interleaves with another.

use crate::model::reference::NoteType;
use crate::service::reference_registry::{LifecycleStatuses, TypeRegistry};
use rusqlite::Connection;

pub mod co_author_service;
pub mod error;
pub mod list_item_service;
pub mod note_service;
pub mod reference_registry;

/// Borrowed state shared by the stores for one operation.
#[derive(Clone, Copy)]
pub struct ServiceContext<'a> {
    pub conn: &'a Connection,
    pub statuses: LifecycleStatuses,
    pub types: &'a TypeRegistry,
}

impl<'a> ServiceContext<'a> {
    pub fn new(conn: &'a Connection, statuses: LifecycleStatuses, types: &'a TypeRegistry) -> Self {
        Self {
            conn,
            statuses,
            types,
        }
    }

    pub(crate) fn default_type(&self) -> error::CollabResult<&'a NoteType> {
        self.types.default_type(self.conn)
    }
}
