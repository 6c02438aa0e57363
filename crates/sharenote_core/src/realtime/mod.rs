//! Live push channel for shared note changes.
//!
//! # Responsibility
//! - Track OPEN per-connection subscriptions keyed by `(user_id, salt)`.
//! - Push one serialized frame per state change to every audience connection.
//! - Keep idle connections alive with periodic keepalive frames.
//!
//! # Invariants
//! - Delivery is best-effort and at-most-once; nothing is queued for replay.
//! - The originating connection never receives its own event.
//! - A subscription's heartbeat is cancelled together with its deregistration.

pub mod audience;
pub mod event;
pub mod fanout;
pub mod sink;

pub use audience::Audience;
pub use event::EventKind;
pub use fanout::{Fanout, FanoutError, PublishReport, Subscription, SubscriptionKey};
pub use sink::{ChannelSink, ConnectionSink, WriterSink};
