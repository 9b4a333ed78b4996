/**
 * Live Connection Middleware
 *
 * Wraps the page router and turns ordinary page requests into live ones.
 *
 * # Request Handling
 *
 * 1. `Live-Connection-Abort: <nonce>` on any request: close the named
 *    connection wherever it is held and delete its row, then carry on.
 * 2. No `Live-Connection` header: serve normally. Successful HTML GETs get a
 *    fresh nonce, registered unattached for the request URL and returned in
 *    the `Live-Connection` response header.
 * 3. `Live-Connection: <nonce>`: attach. Rejected attaches answer 422. An
 *    accepted attach renders the page once, sends it as the first stream
 *    line, and holds the response open as an NDJSON stream.
 *
 * Every response carries the `Version` header.
 */

use crate::backend::error::BackendError;
use crate::backend::live::render::{read_page, LiveContext, RequestTemplate};
use crate::backend::live::stream::{encode_line, streaming_response};
use crate::backend::live::LiveState;
use crate::backend::registry::AttachOutcome;
use crate::shared::{
    Nonce, SharedError, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER, VERSION_HEADER,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::Instrument;

/// Axum middleware entry point; install with `from_fn_with_state`
pub async fn live_connection_middleware(
    State(live): State<LiveState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = match handle_request(&live, request, next).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    if let Ok(version) = HeaderValue::from_str(&live.config().version) {
        response.headers_mut().insert(VERSION_HEADER, version);
    }
    response
}

async fn handle_request(
    live: &LiveState,
    request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    if let Some(value) = request.headers().get(LIVE_CONNECTION_ABORT_HEADER) {
        match header_nonce(value) {
            Ok(nonce) => {
                if let Err(e) = live.abort_connection(&nonce).await {
                    tracing::warn!("[Live] Abort of {} failed: {}", nonce, e);
                }
            }
            Err(e) => tracing::warn!("[Live] Ignoring malformed abort header: {}", e),
        }
    }

    match request.headers().get(LIVE_CONNECTION_HEADER) {
        Some(value) => {
            let nonce = header_nonce(value)?;
            attach(live, nonce, request, next).await
        }
        None => Ok(serve_and_register(live, request, next).await),
    }
}

fn header_nonce(value: &HeaderValue) -> Result<Nonce, SharedError> {
    let text = value
        .to_str()
        .map_err(|_| SharedError::validation("nonce", "header is not visible ASCII"))?;
    Nonce::parse(text)
}

/// URL a connection is registered under: path plus query
pub fn request_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/html"))
        .unwrap_or(false)
}

async fn serve_and_register(live: &LiveState, request: Request, next: Next) -> Response {
    let registrable = request.method() == Method::GET;
    let url = request_url(request.uri());
    let mut response = next.run(request).await;

    if !registrable || !response.status().is_success() || !is_html(&response) {
        return response;
    }

    let nonce = Nonce::generate();
    let expiry = chrono::Duration::from_std(live.config().unattached_expiry)
        .unwrap_or_else(|_| chrono::Duration::minutes(5));

    match live.registry().register_unattached(&nonce, &url, Utc::now() + expiry).await {
        Ok(()) => {
            if let Ok(value) = HeaderValue::from_str(nonce.as_str()) {
                response.headers_mut().insert(LIVE_CONNECTION_HEADER, value);
            }
            tracing::debug!("[Live] Registered {} for {}", nonce, url);
        }
        // the page is still good without live updates
        Err(e) => tracing::warn!("[Live] Failed to register connection for {}: {}", url, e),
    }
    response
}

async fn attach(
    live: &LiveState,
    nonce: Nonce,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let url = request_url(request.uri());

    match live.registry().attach(&nonce, &url, live.process()).await? {
        AttachOutcome::Rejected(reason) => {
            tracing::warn!("[Live] Rejected attach of {} to {}: {}", nonce, url, reason);
            return Err(BackendError::attach_rejected(nonce, reason));
        }
        outcome => tracing::debug!("[Live] Attach of {} to {}: {:?}", nonce, url, outcome),
    }

    let template = RequestTemplate::from_request(&request);
    let (handle, body) = live.open_connection(nonce.clone(), url, template);

    // Any early return below drops `body`, which closes the connection and
    // deletes its row.
    request.extensions_mut().insert(LiveContext::attach(nonce));
    let response = next.run(request).instrument(handle.span.clone()).await;
    if !response.status().is_success() {
        handle.span.in_scope(|| {
            tracing::info!("[Live] Page answered {}; not holding", response.status())
        });
        return Ok(response);
    }

    let page = read_page(response, live.config().max_render_bytes).await?;
    handle.send(encode_line(&page)?)?;
    streaming_response(body, &live.config().version)
}
