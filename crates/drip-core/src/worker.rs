//! Worker mode (`drip --worker`).
//!
//! Reads a [`QueryRequest`] as JSON from stdin and writes the provider's
//! response stream to stdout. Anything that goes wrong before streaming
//! starts is reported on stdout as a bare JSON error line, which the
//! parent shows as an error notice.

use drip_backend::transport::write_error_line;
use drip_backend::ProviderClient;
use drip_protocol::QueryRequest;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error};

/// Run one query from `input` to `out`. Returns the process exit code.
pub async fn run_worker<R, W>(mut input: R, out: &mut W) -> i32
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    if let Err(e) = input.read_to_end(&mut raw).await {
        return fail(out, &format!("failed to read request: {e}")).await;
    }

    let request: QueryRequest = match serde_json::from_slice(&raw) {
        Ok(r) => r,
        Err(e) => return fail(out, &format!("invalid request: {e}")).await,
    };
    debug!(provider = %request.provider.name, model = %request.provider.model, "worker request");

    let client = match ProviderClient::new() {
        Ok(c) => c,
        Err(e) => return fail(out, &e.to_string()).await,
    };

    match client.stream_to(&request, out).await {
        Ok(()) => 0,
        Err(e) => {
            // The parent is gone or stdout is broken; nobody to tell.
            error!(error = %e, "worker output failed");
            1
        }
    }
}

async fn fail<W>(out: &mut W, message: &str) -> i32
where
    W: AsyncWrite + Unpin,
{
    error!(%message, "worker failed");
    let _ = write_error_line(out, message).await;
    1
}
