/**
 * Long-Poll Stream Encoding
 *
 * A held response is an NDJSON stream: each payload is one JSON string literal
 * (the full rendered page) followed by `\n`, and a heartbeat is a bare `\n`.
 * The body is fed from an mpsc channel the same way SSE bodies are built:
 * `stream::unfold` over the receiver, wrapped in `Body::from_stream`.
 */

use crate::backend::error::BackendError;
use crate::shared::LIVE_STREAM_CONTENT_TYPE;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A blank line; keeps intermediaries from timing the stream out
pub const HEARTBEAT: &[u8] = b"\n";

/// Encode one page as a stream line
pub fn encode_line(body: &str) -> Result<Bytes, BackendError> {
    let mut line = serde_json::to_vec(body)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Body that yields queued chunks until `cancel` fires or every sender is gone
///
/// `guard` lives inside the stream state and is dropped with the body, so
/// cleanup runs however the stream ends: client disconnect, server close, or
/// shutdown.
pub fn channel_body<G>(
    receiver: mpsc::UnboundedReceiver<Bytes>,
    cancel: CancellationToken,
    guard: G,
) -> Body
where
    G: Send + 'static,
{
    let chunks = stream::unfold(
        (receiver, cancel, guard),
        |(mut receiver, cancel, guard)| async move {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = receiver.recv() => chunk,
            };
            next.map(|chunk| (Ok::<_, Infallible>(chunk), (receiver, cancel, guard)))
        },
    );
    Body::from_stream(chunks)
}

/// Wrap a stream body in the long-poll response headers
pub fn streaming_response(body: Body, version: &str) -> Result<Response, BackendError> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, LIVE_STREAM_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache, no-transform, no-store")
        .header("X-Accel-Buffering", "no");

    if let Ok(value) = HeaderValue::from_str(version) {
        builder = builder.header(crate::shared::VERSION_HEADER, value);
    }

    builder.body(body).map_err(|e| {
        BackendError::handler(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to build stream response: {}", e),
        )
    })
}
