//! Classifies framed lines into typed stream events.

use serde_json::{Map, Value};

use crate::error::StreamErrorEvent;

/// Prefix of every payload-carrying line
pub const DATA_PREFIX: &str = "data:";

/// Message used when an `error` event carries none
pub const DEFAULT_ERROR_MESSAGE: &str = "Dify error";

/// A typed event decoded from one `data:` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Answer fragment produced by an agent app
    AgentMessage {
        /// Text to append (may be empty)
        answer: String,
        /// Conversation id, when the provider sends a non-empty one
        conversation_id: Option<String>,
    },
    /// Answer fragment produced by a chat app
    Message {
        /// Text to append (may be empty)
        answer: String,
        /// Conversation id, when the provider sends a non-empty one
        conversation_id: Option<String>,
    },
    /// The provider finished the message; more lines may still follow
    MessageEnd {
        /// Final conversation id
        conversation_id: Option<String>,
    },
    /// The provider reported a failure inside the stream
    Error(StreamErrorEvent),
    /// Any other event kind (`ping`, `agent_thought`, workflow events, ...)
    Unknown {
        /// The `event` field as sent, empty if absent
        event: String,
    },
}

impl StreamEvent {
    /// The answer fragment carried by this event, if any
    #[must_use]
    pub fn answer_fragment(&self) -> Option<&str> {
        match self {
            Self::AgentMessage { answer, .. } | Self::Message { answer, .. } => {
                Some(answer.as_str())
            }
            _ => None,
        }
    }
}

/// Why a line produced no event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a `data:` line: blank keep-alive, comment, or another SSE field
    NotData,
    /// A `data:` line whose payload is not a JSON object
    Malformed(String),
}

/// Outcome of decoding one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The line carried an event
    Event(StreamEvent),
    /// The line carried nothing to act on
    Skip(SkipReason),
}

/// Decode one line into an event
///
/// A malformed payload is never fatal: it yields [`Decoded::Skip`] with
/// [`SkipReason::Malformed`] so the stream can continue.
#[must_use]
pub fn decode(line: &str) -> Decoded {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Decoded::Skip(SkipReason::NotData);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    let object = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            return Decoded::Skip(SkipReason::Malformed(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            )));
        }
        Err(e) => return Decoded::Skip(SkipReason::Malformed(e.to_string())),
    };

    Decoded::Event(classify(&object))
}

/// Decode a line, logging and dropping anything that is not an event
pub(crate) fn decode_or_skip(line: &str) -> Option<StreamEvent> {
    match decode(line) {
        Decoded::Event(event) => {
            tracing::trace!(?event, "stream event");
            Some(event)
        }
        Decoded::Skip(SkipReason::Malformed(reason)) => {
            tracing::warn!(%reason, "skipping malformed data line");
            None
        }
        Decoded::Skip(SkipReason::NotData) => None,
    }
}

fn classify(object: &Map<String, Value>) -> StreamEvent {
    let text = |key: &str| object.get(key).and_then(Value::as_str);
    let conversation_id = || {
        text("conversation_id")
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
    };
    let answer = || text("answer").unwrap_or_default().to_owned();

    match text("event").unwrap_or_default() {
        "agent_message" => StreamEvent::AgentMessage {
            answer: answer(),
            conversation_id: conversation_id(),
        },
        "message" => StreamEvent::Message {
            answer: answer(),
            conversation_id: conversation_id(),
        },
        "message_end" => StreamEvent::MessageEnd {
            conversation_id: conversation_id(),
        },
        "error" => StreamEvent::Error(StreamErrorEvent {
            message: text("message")
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_ERROR_MESSAGE)
                .to_owned(),
            code: text("code").map(str::to_owned),
            status: object
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok()),
        }),
        other => StreamEvent::Unknown {
            event: other.to_owned(),
        },
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
