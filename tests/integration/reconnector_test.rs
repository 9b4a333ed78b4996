//! Reconnector edge cases against mock servers

use crate::common::{drain_events, wait_for_event};
use assert_matches::assert_matches;
use live_updates::client::{
    ClientEvent, LivePage, Notice, Phase, Reconnector, ReconnectorConfig, ReconnectorExit,
};
use live_updates::shared::{
    JitterRange, Nonce, LIVE_CONNECTION_ABORT_HEADER, LIVE_CONNECTION_HEADER, VERSION_HEADER,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PAGE: &str = "<html><body><ul id=\"posts\"><li key=\"post-1\">one</li></ul></body></html>";
const PUSHED: &str =
    "<html><body><ul id=\"posts\"><li key=\"post-1\">one</li><li key=\"post-2\">two</li></ul></body></html>";

fn stream_line(html: &str) -> String {
    format!("\n{}\n\n", serde_json::to_string(html).unwrap())
}

fn setup(server: &MockServer) -> (
    Reconnector<LivePage>,
    live_updates::client::ReconnectorHandle,
    tokio::sync::mpsc::UnboundedReceiver<ClientEvent>,
    Arc<Mutex<LivePage>>,
) {
    let page = Arc::new(Mutex::new(LivePage::from_html("/topics/1", PAGE, None, "v1").unwrap()));
    let mut config = ReconnectorConfig::new(server.uri(), "/topics/1", "v1");
    config.backoff = JitterRange::from_millis(10, 20);
    config.idle_timeout = Duration::from_millis(300);
    let (reconnector, handle, events) = Reconnector::new(
        config,
        reqwest::Client::new(),
        page.clone(),
        Nonce::parse("first").unwrap(),
    );
    (reconnector, handle, events, page)
}

fn attach_nonces(requests: &[Request]) -> Vec<String> {
    requests
        .iter()
        .filter(|request| request.method.as_str() == "GET")
        .filter_map(|request| request.headers.get(LIVE_CONNECTION_HEADER))
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_rejected_attach_requires_reload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topics/1"))
        .respond_with(ResponseTemplate::new(422).set_body_string("connection is already attached"))
        .mount(&server)
        .await;

    let (reconnector, _handle, mut events, _page) = setup(&server);
    let exit = reconnector.run().await;

    assert_eq!(exit, ReconnectorExit::ReloadRequired);
    let seen = drain_events(&mut events);
    assert!(seen.contains(&ClientEvent::Notice(Notice::ReloadRequired {
        reason: "connection is already attached".to_string()
    })));
    assert_eq!(seen.last(), Some(&ClientEvent::Phase(Phase::Closed)));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(attach_nonces(&requests), vec!["first".to_string()]);
}

#[tokio::test]
async fn test_version_skew_applies_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(VERSION_HEADER, "v2")
                .set_body_raw(stream_line(PUSHED), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let (reconnector, _handle, mut events, page) = setup(&server);
    let exit = reconnector.run().await;

    assert_eq!(exit, ReconnectorExit::NewVersion);
    let seen = drain_events(&mut events);
    assert!(seen.contains(&ClientEvent::Notice(Notice::NewVersion {
        page: "v1".to_string(),
        server: "v2".to_string(),
    })));
    assert!(!seen.iter().any(|e| matches!(e, ClientEvent::Applied(_))));
    assert_eq!(page.lock().unwrap().to_html(), PAGE);
}

#[tokio::test]
async fn test_failures_retry_with_fresh_nonce_then_apply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topics/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topics/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(VERSION_HEADER, "v1")
                .set_body_raw(stream_line(PUSHED), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let (reconnector, handle, mut events, page) = setup(&server);
    let run = tokio::spawn(reconnector.run());

    let seen = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Applied(_))).await;
    assert!(seen.contains(&ClientEvent::Notice(Notice::Offline)));
    assert!(seen.contains(&ClientEvent::Phase(Phase::Reconnecting)));
    assert_matches!(seen.last(), Some(ClientEvent::Applied(stats)) if stats.nodes_inserted == 1);
    assert_eq!(page.lock().unwrap().to_html(), PUSHED);

    handle.close();
    let exit = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(exit, ReconnectorExit::Closed);

    let requests = server.received_requests().await.unwrap();
    let nonces = attach_nonces(&requests);
    assert_eq!(nonces[0], "first");
    assert!(nonces.len() >= 2);
    assert_ne!(nonces[1], nonces[0]);

    let aborts: Vec<&Request> = requests
        .iter()
        .filter(|request| request.method.as_str() == "HEAD")
        .collect();
    assert_eq!(aborts.len(), 1);
    assert!(aborts[0].headers.get(LIVE_CONNECTION_ABORT_HEADER).is_some());
}

#[tokio::test]
async fn test_idle_stream_times_out_and_goes_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists(LIVE_CONNECTION_HEADER))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(VERSION_HEADER, "v1")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let (reconnector, handle, mut events, _page) = setup(&server);
    let run = tokio::spawn(reconnector.run());

    wait_for_event(&mut events, |e| *e == ClientEvent::Notice(Notice::Offline)).await;
    handle.close();
    let exit = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(exit, ReconnectorExit::Closed);
}
