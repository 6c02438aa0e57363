//! Process-lifetime caches for seeded reference tables.
//!
//! # Responsibility
//! - Load `statuses` and `note_types` once and serve lookups from memory.
//! - Resolve well-known names (`active`, `inactive`, `list`) to ids.
//!
//! # Invariants
//! - Concurrent first use runs exactly one load; other callers block on the
//!   in-flight `OnceCell` initialization and then read its result.
//! - A failed load leaves the cache empty so the next caller retries.
//! - A missing well-known row is `Misconfiguration`, never a silent default.

use crate::model::lifecycle::StatusId;
use crate::model::reference::{NamedReference, NoteType, NoteTypeId, Status};
use crate::repo::reference_repo::{load_note_types, load_statuses};
use crate::repo::RepoResult;
use crate::service::error::{CollabError, CollabResult};
use log::{error, info};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Single-flight cache over one reference table.
struct ReferenceCache<T> {
    table: &'static str,
    rows: OnceCell<Vec<T>>,
    loads: AtomicUsize,
}

impl<T: NamedReference> ReferenceCache<T> {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            rows: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    fn get_or_load(&self, load: impl FnOnce() -> RepoResult<Vec<T>>) -> CollabResult<&[T]> {
        let rows = self.rows.get_or_try_init(|| {
            self.loads.fetch_add(1, Ordering::AcqRel);
            match load() {
                Ok(rows) => {
                    info!(
                        "event=reference_load module=registry status=ok table={} rows={}",
                        self.table,
                        rows.len()
                    );
                    Ok(rows)
                }
                Err(err) => {
                    error!(
                        "event=reference_load module=registry status=error table={} error={}",
                        self.table, err
                    );
                    Err(CollabError::from(err))
                }
            }
        })?;
        Ok(rows.as_slice())
    }

    fn find_by_name<'a>(&self, rows: &'a [T], name: &str) -> CollabResult<&'a T> {
        rows.iter()
            .find(|row| row.reference_name() == name)
            .ok_or_else(|| {
                error!(
                    "event=reference_lookup module=registry status=error table={} name={}",
                    self.table, name
                );
                CollabError::Misconfiguration(format!(
                    "{} row `{name}` is missing",
                    self.table
                ))
            })
    }

    fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }
}

/// Resolved ids of the two lifecycle statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStatuses {
    pub active: StatusId,
    pub inactive: StatusId,
}

/// Cache of the `statuses` reference table.
pub struct StatusRegistry {
    cache: ReferenceCache<Status>,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self {
            cache: ReferenceCache::new("statuses"),
        }
    }

    /// Returns the full status table, loading it on first use.
    pub fn list(&self, conn: &Connection) -> CollabResult<&[Status]> {
        self.cache.get_or_load(|| load_statuses(conn))
    }

    pub fn active(&self, conn: &Connection) -> CollabResult<&Status> {
        let rows = self.list(conn)?;
        self.cache.find_by_name(rows, Status::ACTIVE)
    }

    pub fn inactive(&self, conn: &Connection) -> CollabResult<&Status> {
        let rows = self.list(conn)?;
        self.cache.find_by_name(rows, Status::INACTIVE)
    }

    /// Resolves both lifecycle ids in one call.
    pub fn lifecycle(&self, conn: &Connection) -> CollabResult<LifecycleStatuses> {
        Ok(LifecycleStatuses {
            active: self.active(conn)?.id,
            inactive: self.inactive(conn)?.id,
        })
    }

    /// Number of table loads performed so far.
    pub fn load_count(&self) -> usize {
        self.cache.load_count()
    }
}

/// Cache of the `note_types` reference table.
pub struct TypeRegistry {
    cache: ReferenceCache<NoteType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            cache: ReferenceCache::new("note_types"),
        }
    }

    pub fn list(&self, conn: &Connection) -> CollabResult<&[NoteType]> {
        self.cache.get_or_load(|| load_note_types(conn))
    }

    /// Type assigned to notes created without an explicit type.
    pub fn default_type(&self, conn: &Connection) -> CollabResult<&NoteType> {
        let rows = self.list(conn)?;
        self.cache.find_by_name(rows, NoteType::LIST)
    }

    pub fn contains(&self, conn: &Connection, id: NoteTypeId) -> CollabResult<bool> {
        Ok(self.list(conn)?.iter().any(|row| row.reference_id() == id))
    }

    pub fn load_count(&self) -> usize {
        self.cache.load_count()
    }
}
