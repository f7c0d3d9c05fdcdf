//! Mock worker output for testing.
//!
//! Produces the exact wire frames a real worker writes, so tests at every
//! layer can drive the decoder and the session without a network.

use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use drip_protocol::wire::{DONE_SENTINEL, NON_SUCCESS_MARKER};
use futures::Stream;
use serde_json::json;
use tokio::time::sleep;

/// Configurable mock frames.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A `choices[0].delta.content` frame.
    Content { content: String },
    /// A `choices[0].delta.reasoning_content` frame.
    Reasoning { content: String },
    /// An empty delta (decodes to a heartbeat).
    Heartbeat,
    /// A `finish_reason: "stop"` frame.
    Finish,
    /// A bare JSON error object.
    Error { message: String },
    /// A non-200 marker, status line and raw body.
    Failure { status: u16, body: String },
    /// An arbitrary line, written as-is.
    Raw { line: String },
    /// Delay before next frame (for timing tests).
    Delay { ms: u64 },
}

/// Configuration for a mock stream.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Sequence of frames to emit.
    pub responses: Vec<MockResponse>,
    /// Optional delay between each frame (ms).
    pub chunk_delay_ms: Option<u64>,
    /// Finish with `data: [DONE]`.
    pub send_done: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            responses: Vec::new(),
            chunk_delay_ms: None,
            send_done: true,
        }
    }
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }

    pub fn without_done(mut self) -> Self {
        self.send_done = false;
        self
    }
}

/// Wire text for one mock frame.
pub fn frame_for(response: &MockResponse) -> Option<String> {
    let frame = match response {
        MockResponse::Content { content } => data_frame(json!({
            "choices": [{ "delta": { "content": content } }]
        })),
        MockResponse::Reasoning { content } => data_frame(json!({
            "choices": [{ "delta": { "reasoning_content": content } }]
        })),
        MockResponse::Heartbeat => data_frame(json!({
            "choices": [{ "delta": {} }]
        })),
        MockResponse::Finish => data_frame(json!({
            "choices": [{ "delta": {}, "finish_reason": "stop" }]
        })),
        MockResponse::Error { message } => {
            format!("{}\n", json!({ "error": { "message": message } }))
        }
        MockResponse::Failure { status, body } => {
            format!("{NON_SUCCESS_MARKER}HTTP/1.1 {status}\n{body}\n")
        }
        MockResponse::Raw { line } => format!("{line}\n"),
        MockResponse::Delay { .. } => return None,
    };
    Some(frame)
}

fn data_frame(value: serde_json::Value) -> String {
    format!("data: {value}\n\n")
}

/// Create a stream of wire chunks from mock config, one chunk per frame.
pub fn mock_frames(config: MockConfig) -> impl Stream<Item = Bytes> {
    stream! {
        for response in config.responses {
            // Apply inter-frame delay if configured
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            if let MockResponse::Delay { ms } = response {
                sleep(Duration::from_millis(ms)).await;
                continue;
            }

            if let Some(frame) = frame_for(&response) {
                yield Bytes::from(frame);
            }
        }

        if config.send_done {
            yield Bytes::from(format!("data: {DONE_SENTINEL}\n\n"));
        }
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// A plain answer streamed in pieces.
    pub fn streaming_text(chunks: &[&str]) -> MockConfig {
        let responses = chunks
            .iter()
            .map(|chunk| MockResponse::Content {
                content: (*chunk).to_string(),
            })
            .collect();

        MockConfig::new().with_responses(responses)
    }

    /// Reasoning, a couple of heartbeats, then the answer.
    pub fn reasoning_then_text(reasoning: &str, answer: &str) -> MockConfig {
        MockConfig::new().with_responses(vec![
            MockResponse::Heartbeat,
            MockResponse::Heartbeat,
            MockResponse::Reasoning {
                content: reasoning.to_string(),
            },
            MockResponse::Content {
                content: answer.to_string(),
            },
            MockResponse::Finish,
        ])
    }

    /// `n` content deltas with no delay between them.
    pub fn burst(n: usize, piece: &str) -> MockConfig {
        let responses = (0..n)
            .map(|_| MockResponse::Content {
                content: piece.to_string(),
            })
            .collect();

        MockConfig::new().with_responses(responses)
    }

    /// Some text, then a provider error object.
    pub fn error_mid_stream(text_before: &str, error: &str) -> MockConfig {
        MockConfig::new().with_responses(vec![
            MockResponse::Content {
                content: text_before.to_string(),
            },
            MockResponse::Error {
                message: error.to_string(),
            },
        ])
    }

    /// A non-200 response with a raw body.
    pub fn http_failure(status: u16, body: &str) -> MockConfig {
        MockConfig::new()
            .with_responses(vec![MockResponse::Failure {
                status,
                body: body.to_string(),
            }])
            .without_done()
    }
}
