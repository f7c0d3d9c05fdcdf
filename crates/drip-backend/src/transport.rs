//! Worker-side HTTP transport for OpenAI-compatible streaming endpoints.
//!
//! Runs inside the worker process. Provider bytes are copied verbatim to
//! the output; failures are framed so the parent's parser can classify
//! them:
//!
//! - non-success status: the non-200 marker, a status line, then the body
//! - connection or mid-stream failure: a bare JSON error object line

use std::time::Duration;

use drip_protocol::wire::NON_SUCCESS_MARKER;
use drip_protocol::QueryRequest;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streams one query from the provider to a writer.
pub struct ProviderClient {
    http: Client,
}

/// Build an HTTP client with appropriate timeouts and connection limits.
fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(1)
        .build()
}

impl ProviderClient {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            http: build_http_client()?,
        })
    }

    /// Run the request and copy the response stream to `out`.
    ///
    /// Only failures to write `out` are returned as errors; provider and
    /// network failures are written into the stream as frames.
    pub async fn stream_to<W>(
        &self,
        request: &QueryRequest,
        out: &mut W,
    ) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
    {
        let response = match self.send(request).await {
            Ok(r) => r,
            Err(e) => {
                write_error_line(out, &e.to_string()).await?;
                return Ok(());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let frame = non_success_frame(status, &body);
            out.write_all(frame.as_bytes()).await?;
            out.flush().await?;
            return Ok(());
        }

        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    out.write_all(&chunk).await?;
                    out.flush().await?;
                }
                Err(e) => {
                    write_error_line(out, &format!("stream error: {e}")).await?;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn send(&self, request: &QueryRequest) -> Result<reqwest::Response, TransportError> {
        let mut builder = self
            .http
            .post(&request.provider.endpoint)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream");
        for (name, value) in &request.provider.headers {
            builder = builder.header(name, value);
        }

        Ok(builder.json(&build_body(request)).send().await?)
    }
}

/// Frame a non-success response: marker, status line, raw body.
pub fn non_success_frame(status: StatusCode, body: &str) -> String {
    let mut frame = format!("\n{NON_SUCCESS_MARKER}HTTP/1.1 {status}\n{body}");
    if !frame.ends_with('\n') {
        frame.push('\n');
    }
    frame
}

/// Write a bare JSON error object on its own line.
pub async fn write_error_line<W>(out: &mut W, message: &str) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(&serde_json::json!({ "error": { "message": message } }))?;
    // Leading newline ends any half-written frame; empty lines are ignored.
    out.write_all(format!("\n{line}\n").as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

fn build_body(request: &QueryRequest) -> ChatRequest {
    let mut messages = Vec::new();
    if let Some(ref system) = request.system_prompt {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.prompt.clone(),
    });

    ChatRequest {
        model: request.provider.model.clone(),
        stream: true,
        messages,
    }
}

// API request types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}
