//! Events decoded from the worker's text frames.

/// One decoded line of the worker stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A chunk of answer text.
    ContentDelta(String),

    /// A chunk of reasoning ("thinking") text, surfaced only at finalize.
    ReasoningDelta(String),

    /// A structured error object sent by the provider.
    ErrorPayload(String),

    /// Raw text following a non-200 marker.
    ProtocolError(String),

    /// The provider's end-of-stream sentinel.
    StreamDone,

    /// A line no rule could interpret; shown verbatim.
    Unrecognized(String),
}

impl ParsedEvent {
    /// Heartbeat placeholder emitted for deltas that carry no text.
    pub const HEARTBEAT: &'static str = ".";

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, ParsedEvent::ReasoningDelta(t) if t == Self::HEARTBEAT)
    }
}
