//! Messages and their log entry layout.
//!
//! A log entry is a flat string map. This module is the only place that knows
//! the field names; everything past [`Message::from_entry`] works with a
//! fixed-shape record and never sees a missing field.

use chanlog_store::{Entry, EntryId, Fields};

/// Author recorded on bus-generated messages.
pub const SYSTEM_AUTHOR: &str = "System";

const FIELD_TYPE: &str = "type";
const FIELD_AUTHOR: &str = "username";
const FIELD_BODY: &str = "message";
const FIELD_TIMESTAMP: &str = "timestamp";

const TYPE_SYSTEM: &str = "system";
const TYPE_USER: &str = "message";

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Bus-generated: channel creation, nickname change.
    System,
    /// Published by a participant.
    UserMessage,
}

impl MessageKind {
    fn as_wire(self) -> &'static str {
        match self {
            Self::System => TYPE_SYSTEM,
            Self::UserMessage => TYPE_USER,
        }
    }

    /// Anything other than the system tag reads as a user message.
    fn from_wire(tag: Option<&str>) -> Self {
        match tag {
            Some(TYPE_SYSTEM) => Self::System,
            _ => Self::UserMessage,
        }
    }
}

/// One delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Store-assigned id; ordered within the channel.
    pub id: EntryId,
    /// System or user message.
    pub kind: MessageKind,
    /// Display name; [`SYSTEM_AUTHOR`] for system messages.
    pub author: String,
    /// Text payload.
    pub body: String,
    /// Publish time, seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Message {
    /// Decode a log entry, defaulting absent or unusable fields.
    ///
    /// Missing type reads as a user message, missing author as
    /// [`SYSTEM_AUTHOR`], missing body as empty, and a missing or non-finite
    /// timestamp as `now`.
    pub fn from_entry(entry: Entry, now: f64) -> Self {
        let Entry { id, mut fields } = entry;

        let kind = MessageKind::from_wire(fields.get(FIELD_TYPE).map(String::as_str));
        let author = fields.remove(FIELD_AUTHOR).unwrap_or_else(|| SYSTEM_AUTHOR.to_string());
        let body = fields.remove(FIELD_BODY).unwrap_or_default();
        let timestamp = fields
            .get(FIELD_TIMESTAMP)
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|secs| secs.is_finite())
            .unwrap_or(now);

        Self { id, kind, author, body, timestamp }
    }

    /// Whether the bus generated this message.
    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

/// Field map for a system message. System entries carry no author field.
pub(crate) fn system_fields(body: &str, timestamp: f64) -> Fields {
    let mut fields = base_fields(MessageKind::System, body, timestamp);
    fields.remove(FIELD_AUTHOR);
    fields
}

/// Field map for a participant's message.
pub(crate) fn user_fields(author: &str, body: &str, timestamp: f64) -> Fields {
    let mut fields = base_fields(MessageKind::UserMessage, body, timestamp);
    fields.insert(FIELD_AUTHOR.to_string(), author.to_string());
    fields
}

fn base_fields(kind: MessageKind, body: &str, timestamp: f64) -> Fields {
    Fields::from([
        (FIELD_TYPE.to_string(), kind.as_wire().to_string()),
        (FIELD_BODY.to_string(), body.to_string()),
        (FIELD_TIMESTAMP.to_string(), timestamp.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fields: Fields) -> Entry {
        Entry { id: EntryId::new(10, 0), fields }
    }

    #[test]
    fn user_fields_decode_to_user_message() {
        let message = Message::from_entry(entry(user_fields("Alice", "hi", 1.5)), 99.0);

        assert_eq!(message.kind, MessageKind::UserMessage);
        assert_eq!(message.author, "Alice");
        assert_eq!(message.body, "hi");
        assert!((message.timestamp - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn system_fields_decode_with_system_author() {
        let fields = system_fields("Canal geral criado", 2.0);
        assert!(!fields.contains_key(FIELD_AUTHOR));

        let message = Message::from_entry(entry(fields), 99.0);
        assert!(message.is_system());
        assert_eq!(message.author, SYSTEM_AUTHOR);
        assert_eq!(message.body, "Canal geral criado");
    }

    #[test]
    fn empty_entry_decodes_to_defaults() {
        let message = Message::from_entry(entry(Fields::new()), 42.0);

        assert_eq!(message.kind, MessageKind::UserMessage);
        assert_eq!(message.author, SYSTEM_AUTHOR);
        assert_eq!(message.body, "");
        assert!((message.timestamp - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unusable_timestamp_falls_back_to_now() {
        for raw in ["soon", "NaN", "inf"] {
            let fields = Fields::from([(FIELD_TIMESTAMP.to_string(), raw.to_string())]);
            let message = Message::from_entry(entry(fields), 7.0);
            assert!((message.timestamp - 7.0).abs() < f64::EPSILON, "timestamp {raw:?}");
        }
    }

    #[test]
    fn unknown_type_reads_as_user_message() {
        let fields = Fields::from([(FIELD_TYPE.to_string(), "reaction".to_string())]);
        assert_eq!(Message::from_entry(entry(fields), 0.0).kind, MessageKind::UserMessage);
    }
}
