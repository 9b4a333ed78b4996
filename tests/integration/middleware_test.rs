//! Live connection middleware tests
//!
//! Drive the public router in-process: registration on page loads, attach,
//! rejection, abort and pushes.

use crate::common::{single_app, TEST_VERSION};
use assert_matches::assert_matches;
use axum::body::{Body, BodyDataStream};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::StreamExt;
use live_updates::shared::{
    Nonce, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER, LIVE_STREAM_CONTENT_TYPE,
    VERSION_HEADER,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("router is infallible")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn attach_request(uri: &str, nonce: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(LIVE_CONNECTION_HEADER, nonce)
        .body(Body::empty())
        .unwrap()
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn next_line(frames: &mut BodyDataStream) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("timed out waiting for a stream line")
            .expect("stream ended")
            .expect("stream failed");
        let text = std::str::from_utf8(&frame).unwrap().trim();
        if !text.is_empty() {
            return serde_json::from_str(text).unwrap();
        }
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_page_load_registers_unattached_nonce() {
    let server = single_app().await;
    let response = send(&server.app, get("/topics/1?sort=new")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, VERSION_HEADER).as_deref(), Some(TEST_VERSION));
    let nonce = Nonce::parse(&header_value(&response, LIVE_CONNECTION_HEADER).unwrap()).unwrap();

    let record = server.live.registry().get(&nonce).await.unwrap().unwrap();
    assert_eq!(record.url, "/topics/1?sort=new");
    assert!(!record.is_attached());
    assert!(record.expires_at.is_some());
}

#[tokio::test]
async fn test_non_page_responses_are_not_registered() {
    let server = single_app().await;

    let missing = send(&server.app, get("/topics/999")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(header_value(&missing, LIVE_CONNECTION_HEADER).is_none());
    assert_eq!(header_value(&missing, VERSION_HEADER).as_deref(), Some(TEST_VERSION));

    let post = Request::builder()
        .method(Method::POST)
        .uri("/topics/1/posts")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("author=ada&body=hello"))
        .unwrap();
    let response = send(&server.app, post).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(header_value(&response, LIVE_CONNECTION_HEADER).is_none());

    assert_eq!(server.live.registry().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_attach_streams_first_render() {
    let server = single_app().await;
    let page = send(&server.app, get("/topics/1")).await;
    let nonce = header_value(&page, LIVE_CONNECTION_HEADER).unwrap();
    let html = body_text(page).await;

    let response = send(&server.app, attach_request("/topics/1", &nonce)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_value(&response, header::CONTENT_TYPE.as_str()).as_deref(),
        Some(LIVE_STREAM_CONTENT_TYPE)
    );
    assert_eq!(header_value(&response, VERSION_HEADER).as_deref(), Some(TEST_VERSION));

    let mut frames = response.into_body().into_data_stream();
    assert_eq!(next_line(&mut frames).await, html);

    let nonce = Nonce::parse(&nonce).unwrap();
    let record = server.live.registry().get(&nonce).await.unwrap().unwrap();
    assert_eq!(record.owner_process.as_ref(), Some(server.live.process()));
    assert!(record.expires_at.is_none());
    assert!(server.live.table().contains(&nonce));
}

#[tokio::test]
async fn test_unregistered_nonce_attaches_as_new_connection() {
    let server = single_app().await;
    let html = body_text(send(&server.app, get("/topics/1")).await).await;

    // a reconnecting client mints its own nonce, so it is never registered
    let nonce = Nonce::generate();
    assert!(server.live.registry().get(&nonce).await.unwrap().is_none());

    let response = send(&server.app, attach_request("/topics/1", nonce.as_str())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();
    assert_eq!(next_line(&mut frames).await, html);

    let record = server.live.registry().get(&nonce).await.unwrap().unwrap();
    assert_eq!(record.url, "/topics/1");
    assert_eq!(record.owner_process.as_ref(), Some(server.live.process()));
    assert!(record.expires_at.is_none());
    assert!(server.live.table().contains(&nonce));

    // the same nonce is now taken; replaying it opens nothing new
    let replay = send(&server.app, attach_request("/topics/1", nonce.as_str())).await;
    assert_eq!(replay.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(server.live.table().len(), 1);
}

#[tokio::test]
async fn test_attach_with_mismatched_url_is_rejected() {
    let server = single_app().await;
    let page = send(&server.app, get("/topics/1")).await;
    let nonce = header_value(&page, LIVE_CONNECTION_HEADER).unwrap();

    let response = send(&server.app, attach_request("/topics/2", &nonce)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(header_value(&response, VERSION_HEADER).as_deref(), Some(TEST_VERSION));
    assert!(server.live.table().is_empty());

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], 422);
}

#[tokio::test]
async fn test_attaching_an_attached_nonce_is_rejected() {
    let server = single_app().await;

    let first = send(&server.app, attach_request("/topics/1", "n2")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let _held = first.into_body();

    let second = send(&server.app, attach_request("/topics/1", "n2")).await;
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(server.live.table().len(), 1);
}

#[tokio::test]
async fn test_connections_on_one_url_are_independent() {
    let server = single_app().await;
    let a = send(&server.app, attach_request("/topics/1", "tab-a")).await;
    let b = send(&server.app, attach_request("/topics/1", "tab-b")).await;
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    let _b = b.into_body();

    drop(a);
    let gone = Nonce::parse("tab-a").unwrap();
    for _ in 0..100 {
        if server.live.registry().get(&gone).await.unwrap().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(server.live.registry().get(&gone).await.unwrap().is_none());
    assert!(server.live.table().contains(&Nonce::parse("tab-b").unwrap()));
}

#[tokio::test]
async fn test_malformed_nonce_is_bad_request() {
    let server = single_app().await;
    let response = send(&server.app, attach_request("/topics/1", "not a nonce")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.live.table().is_empty());
}

#[tokio::test]
async fn test_attach_to_missing_page_is_not_held() {
    let server = single_app().await;
    let response = send(&server.app, attach_request("/topics/999", "lost")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(server.live.table().is_empty());

    let nonce = Nonce::parse("lost").unwrap();
    for _ in 0..100 {
        if server.live.registry().get(&nonce).await.unwrap().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("row for a refused attach was kept");
}

#[tokio::test]
async fn test_abort_header_releases_connection() {
    let server = single_app().await;
    let response = send(&server.app, attach_request("/topics/1", "leaving")).await;
    let mut frames = response.into_body().into_data_stream();
    next_line(&mut frames).await;

    let abort = Request::builder()
        .method(Method::HEAD)
        .uri("/topics/1")
        .header(LIVE_CONNECTION_ABORT_HEADER, "leaving")
        .body(Body::empty())
        .unwrap();
    let answer = send(&server.app, abort).await;
    assert!(answer.status().is_success());
    assert!(header_value(&answer, LIVE_CONNECTION_HEADER).is_none());

    let nonce = Nonce::parse("leaving").unwrap();
    assert!(server.live.registry().get(&nonce).await.unwrap().is_none());
    assert!(server.live.table().is_empty());
    let end = tokio::time::timeout(Duration::from_secs(2), frames.next()).await.unwrap();
    assert_matches!(end, None);
}

#[tokio::test]
async fn test_new_post_pushes_rerender() {
    let server = single_app().await;
    let response = send(&server.app, attach_request("/topics/2", "watcher")).await;
    let mut frames = response.into_body().into_data_stream();
    let before = next_line(&mut frames).await;
    assert!(before.contains("0 post(s)"));

    let post = Request::builder()
        .method(Method::POST)
        .uri("/topics/2/posts")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("author=grace&body=first+reply"))
        .unwrap();
    assert_eq!(send(&server.app, post).await.status(), StatusCode::SEE_OTHER);

    let report = server.live.drain_pending().await.unwrap();
    assert_eq!(report.pushed, 1);

    let after = next_line(&mut frames).await;
    assert!(after.contains("1 post(s)"));
    assert!(after.contains("first reply"));

    let fresh = body_text(send(&server.app, get("/topics/2")).await).await;
    assert_eq!(after, fresh);
}
