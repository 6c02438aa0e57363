//! Connection registry and event fanout.
//!
//! # Responsibility
//! - Own the only map of live connections keyed by `(user_id, salt)`.
//! - Run one heartbeat thread per connection.
//! - Deliver event frames to the audience of a note, skipping the origin.
//!
//! # Invariants
//! - Frames are written outside the registry lock.
//! - A connection is removed at most once; removal always stops its heartbeat.
//! - Write failures prune the connection and never reach the caller as errors.

use super::audience::Audience;
use super::event::{event_frame, initialized_frame, keepalive_frame, EventKind};
use super::sink::ConnectionSink;
use crate::model::note::Note;
use crate::model::user::UserId;
use crossbeam::channel::{Receiver, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Identity of one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub user_id: UserId,
    pub salt: String,
}

impl SubscriptionKey {
    pub fn new(user_id: UserId, salt: impl Into<String>) -> Self {
        Self {
            user_id,
            salt: salt.into(),
        }
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.salt)
    }
}

/// Error type for subscription and publish setup.
#[derive(Debug)]
pub enum FanoutError {
    /// Session salt is empty or whitespace.
    InvalidKey(String),
    /// Heartbeat interval must be positive.
    InvalidInterval,
    /// The initial frame could not be written; nothing was registered.
    Write(io::Error),
    /// Payload could not be serialized into a frame.
    Encode(serde_json::Error),
    /// Heartbeat thread could not be started.
    Spawn(io::Error),
}

impl Display for FanoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(reason) => write!(f, "invalid subscription key: {reason}"),
            Self::InvalidInterval => write!(f, "heartbeat interval must be greater than zero"),
            Self::Write(err) => write!(f, "connection write failed: {err}"),
            Self::Encode(err) => write!(f, "event payload encoding failed: {err}"),
            Self::Spawn(err) => write!(f, "heartbeat thread spawn failed: {err}"),
        }
    }
}

impl std::error::Error for FanoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(err) | Self::Spawn(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::InvalidKey(_) | Self::InvalidInterval => None,
        }
    }
}

impl From<serde_json::Error> for FanoutError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections that accepted the frame.
    pub delivered: usize,
    /// Connections removed because the write failed.
    pub pruned: usize,
}

struct Connection {
    id: u64,
    sink: Arc<dyn ConnectionSink>,
    // Dropping the sender disconnects the heartbeat's cancel receiver.
    cancel: Sender<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Connection {
    fn stop(mut self) {
        drop(self.cancel);
        if let Some(handle) = self.heartbeat.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("event=heartbeat_stop module=realtime status=error error=thread_panicked");
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    connections: HashMap<SubscriptionKey, Connection>,
}

impl Registry {
    fn remove_if(&mut self, key: &SubscriptionKey, id: u64) -> Option<Connection> {
        match self.connections.get(key) {
            Some(connection) if connection.id == id => self.connections.remove(key),
            _ => None,
        }
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Fanout component owning the connection registry.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone)]
pub struct Fanout {
    registry: Arc<Mutex<Registry>>,
    heartbeat_interval: Duration,
}

impl Default for Fanout {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl Fanout {
    pub fn new(heartbeat_interval: Duration) -> Result<Self, FanoutError> {
        if heartbeat_interval.is_zero() {
            return Err(FanoutError::InvalidInterval);
        }
        Ok(Self {
            heartbeat_interval,
            ..Self::default()
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Registers a live connection and starts its heartbeat.
    ///
    /// The `initialized` frame is written before the connection becomes
    /// visible to publishers. An existing subscription under the same key is
    /// replaced and stopped.
    ///
    /// # Errors
    /// - [`FanoutError::InvalidKey`] for an empty salt.
    /// - [`FanoutError::Write`] when the initial frame cannot be written.
    pub fn subscribe(
        &self,
        user_id: UserId,
        salt: &str,
        sink: Arc<dyn ConnectionSink>,
    ) -> Result<Subscription, FanoutError> {
        let salt = salt.trim();
        if salt.is_empty() {
            return Err(FanoutError::InvalidKey("salt must not be empty".to_string()));
        }
        let key = SubscriptionKey::new(user_id, salt);
        sink.write_frame(&initialized_frame())
            .map_err(FanoutError::Write)?;

        let (cancel_tx, cancel_rx) = crossbeam::channel::bounded::<()>(0);
        let (id, replaced) = {
            let mut registry = lock_registry(&self.registry);
            registry.next_id = registry.next_id.wrapping_add(1);
            let id = registry.next_id;
            let replaced = registry.connections.insert(
                key.clone(),
                Connection {
                    id,
                    sink: Arc::clone(&sink),
                    cancel: cancel_tx,
                    heartbeat: None,
                },
            );
            (id, replaced)
        };
        if let Some(old) = replaced {
            debug!("event=fanout_replace module=realtime status=ok key={key}");
            old.stop();
        }

        let spawned = spawn_heartbeat(
            Arc::downgrade(&self.registry),
            key.clone(),
            id,
            sink,
            cancel_rx,
            self.heartbeat_interval,
        );
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                let removed = lock_registry(&self.registry).remove_if(&key, id);
                if let Some(connection) = removed {
                    connection.stop();
                }
                return Err(FanoutError::Spawn(err));
            }
        };
        {
            let mut registry = lock_registry(&self.registry);
            match registry.connections.get_mut(&key) {
                Some(connection) if connection.id == id => connection.heartbeat = Some(handle),
                // Closed or replaced while spawning; the heartbeat has already
                // been cancelled through its dropped sender.
                _ => drop(handle),
            }
        }

        info!(
            "event=fanout_subscribe module=realtime status=ok user_id={} connections={}",
            user_id,
            self.connection_count()
        );
        Ok(Subscription {
            registry: Arc::downgrade(&self.registry),
            key,
            id,
            closed: false,
        })
    }

    /// Removes the connection under `key`, if any, and stops its heartbeat.
    pub fn unsubscribe(&self, key: &SubscriptionKey) -> bool {
        let removed = lock_registry(&self.registry).connections.remove(key);
        match removed {
            Some(connection) => {
                connection.stop();
                info!("event=fanout_unsubscribe module=realtime status=ok key={key}");
                true
            }
            None => false,
        }
    }

    /// Pushes `payload` to every connection of the note's audience except
    /// connections opened with `originating_salt`.
    pub fn publish<P: Serialize + ?Sized>(
        &self,
        kind: EventKind,
        note: &Note,
        payload: &P,
        originating_user: UserId,
        originating_salt: Option<&str>,
    ) -> Result<PublishReport, FanoutError> {
        let audience = Audience::for_note(note, originating_user);
        self.publish_to(kind, &audience, payload, originating_salt)
    }

    /// Pushes `payload` to an explicit audience.
    pub fn publish_to<P: Serialize + ?Sized>(
        &self,
        kind: EventKind,
        audience: &Audience,
        payload: &P,
        originating_salt: Option<&str>,
    ) -> Result<PublishReport, FanoutError> {
        let frame = event_frame(kind, payload)?;
        let targets: Vec<(SubscriptionKey, u64, Arc<dyn ConnectionSink>)> = {
            let registry = lock_registry(&self.registry);
            registry
                .connections
                .iter()
                .filter(|(key, _)| audience.contains(key.user_id))
                .filter(|(key, _)| originating_salt != Some(key.salt.as_str()))
                .map(|(key, connection)| (key.clone(), connection.id, Arc::clone(&connection.sink)))
                .collect()
        };

        let mut report = PublishReport::default();
        let mut failed = Vec::new();
        for (key, id, sink) in targets {
            match sink.write_frame(&frame) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        "event=fanout_write module=realtime status=error kind={kind} key={key} error={err}"
                    );
                    failed.push((key, id));
                }
            }
        }

        if !failed.is_empty() {
            let removed: Vec<Connection> = {
                let mut registry = lock_registry(&self.registry);
                failed
                    .iter()
                    .filter_map(|(key, id)| registry.remove_if(key, *id))
                    .collect()
            };
            report.pruned = removed.len();
            for connection in removed {
                connection.stop();
            }
        }

        debug!(
            "event=fanout_publish module=realtime status=ok kind={kind} audience={} delivered={} pruned={}",
            audience.len(),
            report.delivered,
            report.pruned
        );
        Ok(report)
    }

    /// Closes every live connection.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Connection> = {
            let mut registry = lock_registry(&self.registry);
            registry.connections.drain().map(|(_, connection)| connection).collect()
        };
        let closed = drained.len();
        for connection in drained {
            connection.stop();
        }
        info!("event=fanout_shutdown module=realtime status=ok closed={closed}");
        closed
    }

    pub fn connection_count(&self) -> usize {
        lock_registry(&self.registry).connections.len()
    }

    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        lock_registry(&self.registry).connections.contains_key(key)
    }
}

/// Handle for one registered connection.
///
/// Closing or dropping the handle deregisters the connection. A handle whose
/// key was since taken over by a newer subscription leaves that one alone.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    key: SubscriptionKey,
    id: u64,
    closed: bool,
}

impl Subscription {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Whether this handle's connection is still registered.
    pub fn is_open(&self) -> bool {
        if self.closed {
            return false;
        }
        self.registry
            .upgrade()
            .map(|registry| {
                lock_registry(&registry)
                    .connections
                    .get(&self.key)
                    .is_some_and(|connection| connection.id == self.id)
            })
            .unwrap_or(false)
    }

    /// Deregisters the connection; returns whether this call removed it.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = lock_registry(&registry).remove_if(&self.key, self.id);
        match removed {
            Some(connection) => {
                connection.stop();
                info!(
                    "event=fanout_unsubscribe module=realtime status=ok key={}",
                    self.key
                );
                true
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_heartbeat(
    registry: Weak<Mutex<Registry>>,
    key: SubscriptionKey,
    id: u64,
    sink: Arc<dyn ConnectionSink>,
    cancel: Receiver<()>,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sharenote-heartbeat".to_string())
        .spawn(move || {
            let ticker = crossbeam::channel::tick(interval);
            loop {
                crossbeam::select! {
                    recv(cancel) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(err) = sink.write_frame(&keepalive_frame()) {
                            warn!(
                                "event=heartbeat_write module=realtime status=error key={key} error={err}"
                            );
                            prune_self(&registry, &key, id);
                            break;
                        }
                    }
                }
            }
        })
}

fn prune_self(registry: &Weak<Mutex<Registry>>, key: &SubscriptionKey, id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = lock_registry(&registry).remove_if(key, id);
    if let Some(connection) = removed {
        // Runs on the heartbeat thread itself, so `stop` skips the join.
        connection.stop();
    }
}
