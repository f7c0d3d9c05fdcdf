//! Classifies worker lines into [`ParsedEvent`]s.
//!
//! Provider payloads come in several JSON shapes. Rather than a strict
//! schema, each shape has an extractor in [`EXTRACTORS`], tried in order;
//! the first one that recognizes the record wins. Anything nobody
//! recognizes falls through to [`ParsedEvent::Unrecognized`] so the user
//! still sees it.

use drip_protocol::wire::{
    COMMENT_PREFIX, DATA_PREFIX, DONE_SENTINEL, EVENT_PREFIX, NON_SUCCESS_MARKER,
};
use drip_protocol::ParsedEvent;
use serde_json::Value;
use tracing::{debug, warn};

/// Text carried by one provider record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
    pub reasoning: Option<String>,
    /// The record closes the current choice.
    pub finished: bool,
}

impl Delta {
    fn into_event(self) -> ParsedEvent {
        match self {
            Delta {
                content: Some(text),
                ..
            } if !text.is_empty() => ParsedEvent::ContentDelta(text),
            Delta {
                reasoning: Some(text),
                ..
            } if !text.is_empty() => ParsedEvent::ReasoningDelta(text),
            Delta { finished: true, .. } => ParsedEvent::ContentDelta("\n".to_string()),
            // Some providers send keep-alive records with no text at all.
            // A placeholder keeps the thinking indicator alive.
            _ => ParsedEvent::ReasoningDelta(ParsedEvent::HEARTBEAT.to_string()),
        }
    }
}

/// Recognizes one provider payload shape.
pub type Extractor = fn(&Value) -> Option<Delta>;

/// Payload shapes, in priority order.
pub const EXTRACTORS: &[Extractor] = &[
    choices_delta,
    candidate_parts,
    block_delta,
    content_blocks,
];

/// `{"choices":[{"delta":{"content":..,"reasoning_content":..},"finish_reason":..}]}`
fn choices_delta(value: &Value) -> Option<Delta> {
    let choice = value.get("choices")?.get(0)?;
    let delta = choice.get("delta");
    let field = |name: &str| {
        delta
            .and_then(|d| d.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(Delta {
        content: field("content"),
        reasoning: field("reasoning_content").or_else(|| field("reasoning")),
        finished: is_set(choice.get("finish_reason")),
    })
}

/// `{"candidates":[{"content":{"parts":[{"text":..,"thought":bool}]},"finishReason":..}]}`
fn candidate_parts(value: &Value) -> Option<Delta> {
    let candidate = value.get("candidates")?.get(0)?;
    let mut content = String::new();
    let mut reasoning = String::new();

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);
    for part in parts.into_iter().flatten() {
        let Some(text) = part.get("text").and_then(Value::as_str) else {
            continue;
        };
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            reasoning.push_str(text);
        } else {
            content.push_str(text);
        }
    }

    Some(Delta {
        content: Some(content),
        reasoning: Some(reasoning),
        finished: is_set(candidate.get("finishReason")),
    })
}

/// `{"type":"content_block_delta","delta":{"text":..}}` and its `thinking` twin.
/// A `message_stop` record or a `delta.stop_reason` ends the answer.
fn block_delta(value: &Value) -> Option<Delta> {
    if value.get("type").and_then(Value::as_str) == Some("message_stop") {
        return Some(Delta {
            finished: true,
            ..Delta::default()
        });
    }
    let delta = value.get("delta")?.as_object()?;
    let field = |name: &str| delta.get(name).and_then(Value::as_str).map(str::to_string);

    Some(Delta {
        content: field("text"),
        reasoning: field("thinking"),
        finished: is_set(delta.get("stop_reason")),
    })
}

/// `{"content":[{"text":..}]}`
fn content_blocks(value: &Value) -> Option<Delta> {
    let text = value.get("content")?.get(0)?.get("text")?.as_str()?;
    Some(Delta {
        content: Some(text.to_string()),
        ..Delta::default()
    })
}

fn is_set(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

/// Pull an error message out of a provider error object.
///
/// Accepts `{"error":{"message":..}}` and `{"error":".."}`.
pub fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(message) => Some(message.clone()),
        error => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Turn a raw non-200 body into something a person can read.
///
/// Bodies often end with a JSON error object after a status line or an
/// HTML preamble. The first `{` from which the rest parses as an error
/// object supplies the message; otherwise the trimmed body is returned.
pub fn extract_error_message(body: &str) -> String {
    for (pos, _) in body.match_indices('{') {
        let Ok(value) = serde_json::from_str::<Value>(body[pos..].trim_end()) else {
            continue;
        };
        let message = error_message(&value)
            .or_else(|| value.get("message").and_then(Value::as_str).map(str::to_string));
        if let Some(message) = message {
            return message;
        }
    }
    body.trim().to_string()
}

/// Line classifier.
///
/// Stateful only in one respect: after a non-200 marker, every further line
/// is raw error body and is never interpreted as an event.
#[derive(Debug, Default)]
pub struct EventParser {
    in_error_body: bool,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one line. `None` means the line carries no event.
    pub fn parse_line(&mut self, line: &str) -> Option<ParsedEvent> {
        if self.in_error_body {
            return Some(ParsedEvent::ProtocolError(line.to_string()));
        }

        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            let payload = rest.trim();
            if payload == DONE_SENTINEL {
                return Some(ParsedEvent::StreamDone);
            }
            if payload.is_empty() {
                return None;
            }
            return Some(parse_data(payload, line));
        }

        if line.trim_start().starts_with('{') {
            return Some(parse_bare_json(line));
        }

        if let Some(rest) = line.strip_prefix(NON_SUCCESS_MARKER) {
            debug!(status = rest, "non-200 marker, switching to raw body");
            self.in_error_body = true;
            return Some(ParsedEvent::ProtocolError(rest.to_string()));
        }

        if line.trim().is_empty()
            || line.starts_with(EVENT_PREFIX)
            || line.starts_with(COMMENT_PREFIX)
        {
            return None;
        }

        Some(ParsedEvent::Unrecognized(line.to_string()))
    }
}

fn parse_data(payload: &str, line: &str) -> ParsedEvent {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "undecodable data frame, passing through");
            return ParsedEvent::Unrecognized(line.to_string());
        }
    };

    if let Some(message) = error_message(&value) {
        return ParsedEvent::ErrorPayload(message);
    }

    EXTRACTORS
        .iter()
        .find_map(|extract| extract(&value))
        .unwrap_or_default()
        .into_event()
}

fn parse_bare_json(line: &str) -> ParsedEvent {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => match error_message(&value) {
            Some(message) => ParsedEvent::ErrorPayload(message),
            None => ParsedEvent::Unrecognized(line.to_string()),
        },
        Err(e) => {
            warn!(error = %e, "undecodable JSON line, passing through");
            ParsedEvent::Unrecognized(line.to_string())
        }
    }
}
