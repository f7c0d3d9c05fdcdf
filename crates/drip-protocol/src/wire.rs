//! Framing constants shared by the worker and the ingestion parser.
//!
//! The worker writes newline-delimited text frames to its stdout:
//!
//! ```text
//! data: <json>
//! data: [DONE]
//! {"error": {"message": "..."}}
//! @@non-200@@HTTP/1.1 500
//! <raw body lines...>
//! event: <name>
//! : <comment>
//! ```

/// Prefix of a provider data frame.
pub const DATA_PREFIX: &str = "data:";

/// Prefix of an SSE event-name frame.
pub const EVENT_PREFIX: &str = "event:";

/// Prefix of an SSE comment frame.
pub const COMMENT_PREFIX: &str = ":";

/// Payload of the end-of-stream data frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Marks a transport-level failure; everything after it is raw body text.
pub const NON_SUCCESS_MARKER: &str = "@@non-200@@";
