//! Event kinds and text frame encoding.
//!
//! Frames follow the event-stream layout: an optional `event: <name>` line,
//! a `data: <payload>` line and a blank line.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Kind of shared state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteAdded,
    NoteChanged,
    NoteRemoved,
    NoteOrderSet,
    ListItemAdded,
    ListItemChanged,
    ListItemRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::NoteAdded,
        Self::NoteChanged,
        Self::NoteRemoved,
        Self::NoteOrderSet,
        Self::ListItemAdded,
        Self::ListItemChanged,
        Self::ListItemRemoved,
    ];

    /// Name written on the `event:` line.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NoteAdded => "EVENT_NOTE_ADDED",
            Self::NoteChanged => "EVENT_NOTE_CHANGED",
            Self::NoteRemoved => "EVENT_NOTE_REMOVED",
            Self::NoteOrderSet => "EVENT_NOTE_ORDER_SET",
            Self::ListItemAdded => "EVENT_LIST_ITEM_ADDED",
            Self::ListItemChanged => "EVENT_LIST_ITEM_CHANGED",
            Self::ListItemRemoved => "EVENT_LIST_ITEM_REMOVED",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Serialize)]
struct Initialized {
    initialized: bool,
}

/// Named event frame with a JSON payload.
pub fn event_frame<P: Serialize + ?Sized>(
    kind: EventKind,
    payload: &P,
) -> serde_json::Result<String> {
    let data = serde_json::to_string(payload)?;
    Ok(format!("event: {}\n{}", kind.wire_name(), data_frame(&data)))
}

/// First frame written on every new subscription.
pub fn initialized_frame() -> String {
    // Serializing a plain bool struct cannot fail.
    let data = serde_json::to_string(&Initialized { initialized: true })
        .unwrap_or_else(|_| r#"{"initialized":true}"#.to_string());
    data_frame(&data)
}

/// Unnamed keepalive frame carrying the current UTC time.
pub fn keepalive_frame() -> String {
    format!(
        "data: {} \n\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

fn data_frame(data: &str) -> String {
    format!("data: {data}\n\n")
}

#[cfg(test)]
mod tests {
    use super::{event_frame, initialized_frame, keepalive_frame, EventKind};
    use serde_json::json;

    #[test]
    fn event_frame_has_name_line_then_data_line() {
        let frame = event_frame(EventKind::ListItemAdded, &json!({"text": "Milk"})).unwrap();
        assert_eq!(
            frame,
            "event: EVENT_LIST_ITEM_ADDED\ndata: {\"text\":\"Milk\"}\n\n"
        );
    }

    #[test]
    fn initialized_and_keepalive_frames_are_unnamed() {
        assert_eq!(initialized_frame(), "data: {\"initialized\":true}\n\n");
        let keepalive = keepalive_frame();
        assert!(keepalive.starts_with("data: "));
        assert!(keepalive.ends_with("Z \n\n"));
        assert!(!keepalive.contains("event:"));
    }

    #[test]
    fn wire_names_are_unique() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.wire_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }
}
