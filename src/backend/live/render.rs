/**
 * Page Rendering
 *
 * Pushes re-run the ordinary page pipeline: the attach request is kept as a
 * template and replayed through a `Renderer` whenever the connection needs a
 * fresh page. The default renderer drives the page router in-process with
 * `tower::ServiceExt::oneshot`, so pushed bodies are exactly what a plain GET
 * of the same URL would return.
 */

use crate::backend::error::BackendError;
use crate::shared::{Nonce, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER};
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, Method, Uri},
    response::Response,
    Router,
};
use futures_util::future::BoxFuture;
use tower::ServiceExt;

/// Request extension carried by attach and re-render requests
///
/// Page handlers may read it to tell a live render from a plain GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveContext {
    pub nonce: Nonce,
    /// `true` for pushes, `false` for the attach request itself
    pub rerender: bool,
}

impl LiveContext {
    pub fn attach(nonce: Nonce) -> Self {
        Self { nonce, rerender: false }
    }

    pub fn rerender(nonce: Nonce) -> Self {
        Self { nonce, rerender: true }
    }
}

/// Method, URI and headers of an attach request
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestTemplate {
    /// Build a template; live-connection headers are dropped so a replay is
    /// never mistaken for another attach
    pub fn new(method: Method, uri: Uri, mut headers: HeaderMap) -> Self {
        headers.remove(LIVE_CONNECTION_HEADER);
        headers.remove(LIVE_CONNECTION_ABORT_HEADER);
        Self { method, uri, headers }
    }

    pub fn from_request(request: &Request) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Rebuild a body-less request tagged with `context`
    pub fn to_request(&self, context: LiveContext) -> Request {
        let mut request = Request::new(Body::empty());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request.extensions_mut().insert(context);
        request
    }
}

/// Produces the page for a replayed request
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, request: Request) -> BoxFuture<'static, Result<Response, BackendError>>;
}

/// Renders by calling the page router in-process
#[derive(Clone)]
pub struct RouterRenderer {
    router: Router,
}

impl RouterRenderer {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Renderer for RouterRenderer {
    fn render(&self, request: Request) -> BoxFuture<'static, Result<Response, BackendError>> {
        let router = self.router.clone();
        Box::pin(async move {
            let response = router
                .oneshot(request)
                .await
                .unwrap_or_else(|never| match never {});
            Ok(response)
        })
    }
}

/// Collect a page response into its HTML text
///
/// Non-2xx responses and bodies over `limit` bytes are render errors; a
/// push must never ship an error page as if it were the current state.
pub async fn read_page(response: Response, limit: usize) -> Result<String, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::render(format!("page answered {}", status)));
    }

    let bytes = axum::body::to_bytes(response.into_body(), limit)
        .await
        .map_err(|e| BackendError::render(format!("failed to read page body: {}", e)))?;

    String::from_utf8(bytes.to_vec())
        .map_err(|_| BackendError::render("page body is not valid UTF-8"))
}

/// Replay `request` through `renderer` and collect the page
pub async fn render_page(
    renderer: &dyn Renderer,
    request: Request,
    limit: usize,
) -> Result<String, BackendError> {
    let response = renderer.render(request).await?;
    read_page(response, limit).await
}
