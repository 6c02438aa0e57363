//! Domain model for shared notes, checklist items and co-author grants.
//!
//! # Responsibility
//! - Define canonical data structures used by stores, fanout and callers.
//! - Keep one serialized shape for storage read-back and live-channel payloads.
//!
//! # Invariants
//! - Every persisted object is identified by a stable UUID.
//! - Deletion is a status transition (`active` -> `inactive`), never a row delete.

pub mod co_author;
pub mod lifecycle;
pub mod list_item;
pub mod note;
pub mod reference;
pub mod user;
