//! Transport adapters that receive serialized frames.

use crossbeam::channel::Sender;
use std::io::{self, Write};
use std::sync::Mutex;

/// Write half of one live connection.
///
/// An error means the transport is gone; the fanout prunes the connection.
pub trait ConnectionSink: Send + Sync {
    fn write_frame(&self, frame: &str) -> io::Result<()>;
}

/// Sink over any blocking writer, e.g. a socket or response body.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> ConnectionSink for WriterSink<W> {
    fn write_frame(&self, frame: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "writer lock poisoned"))?;
        writer.write_all(frame.as_bytes())?;
        writer.flush()
    }
}

/// Sink that hands frames to a channel drained by the transport task.
///
/// Dropping the receiver closes the connection from the fanout's view.
pub struct ChannelSink {
    sender: Sender<String>,
}

impl ChannelSink {
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }
}

impl ConnectionSink for ChannelSink {
    fn write_frame(&self, frame: &str) -> io::Result<()> {
        self.sender
            .send(frame.to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "connection receiver closed"))
    }
}
