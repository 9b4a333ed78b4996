//! Two-process tests
//!
//! Both processes serve on loopback and share one registry file. A real
//! client loads a page from process 0 and holds its stream there; the
//! change is posted to process 1, which has to reach the socket through the
//! registry and a control ping.

use crate::common::{spawn_cluster, wait_for_event};
use assert_matches::assert_matches;
use live_updates::client::dom::parse_document;
use live_updates::client::{
    ClientEvent, LivePage, Phase, Reconnector, ReconnectorConfig, ReconnectorExit,
};
use live_updates::shared::Nonce;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_change_on_sibling_reaches_client() {
    let cluster = spawn_cluster(2).await;
    let owner = cluster.process(0);
    let sibling = cluster.process(1);
    let http = http();

    let mut page = LivePage::load(&http, &owner.base_url, "/topics/2").await.unwrap();
    let nonce = page.nonce().cloned().expect("page load registers a nonce");
    let posts = page.document().find_by_attribute("id", "posts").unwrap();
    page.document_mut().focus(posts);

    let page = Arc::new(Mutex::new(page));
    let config = ReconnectorConfig::for_page(owner.base_url.clone(), &page.lock().unwrap());
    let (reconnector, handle, mut events) =
        Reconnector::new(config, http.clone(), page.clone(), nonce.clone());
    let run = tokio::spawn(reconnector.run());

    // the first line is the current page; applying it changes nothing
    let first = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Applied(_))).await;
    assert!(first.contains(&ClientEvent::Phase(Phase::Streaming)));
    assert_matches!(first.last(), Some(ClientEvent::Applied(stats)) if stats.is_noop());

    let record = cluster.registry.get(&nonce).await.unwrap().unwrap();
    assert_eq!(record.owner_process.as_ref(), Some(owner.live.process()));

    let response = http
        .post(format!("{}/topics/2/posts", sibling.base_url))
        .form(&[("author", "ada"), ("body", "pushed across processes")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);

    let applied = wait_for_event(&mut events, |e| {
        matches!(e, ClientEvent::Applied(stats) if stats.nodes_inserted > 0)
    })
    .await;
    assert_matches!(applied.last(), Some(ClientEvent::Applied(stats)) if stats.nodes_replaced == 0);

    let fresh = http
        .get(format!("{}/topics/2", owner.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    {
        let page = page.lock().unwrap();
        assert_eq!(page.to_html(), parse_document(&fresh).unwrap().to_html());
        assert!(page.to_html().contains("pushed across processes"));
        assert_eq!(page.document().focused(), Some(posts));
        assert_eq!(page.document().find_by_attribute("id", "posts"), Some(posts));
    }

    let record = cluster.registry.get(&nonce).await.unwrap().unwrap();
    assert!(record.pending_update_at.is_none());

    handle.close();
    let exit = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert_eq!(exit, ReconnectorExit::Closed);
    assert!(cluster.registry.get(&nonce).await.unwrap().is_none());

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_abort_reaches_the_owning_process() {
    let cluster = spawn_cluster(2).await;
    let owner = cluster.process(0);
    let sibling = cluster.process(1);
    let http = http();

    let page = LivePage::load(&http, &owner.base_url, "/topics/1").await.unwrap();
    let nonce = page.nonce().cloned().unwrap();
    let config = ReconnectorConfig::for_page(owner.base_url.clone(), &page);
    let (reconnector, handle, mut events) =
        Reconnector::new(config, http.clone(), Arc::new(Mutex::new(page)), nonce.clone());
    let run = tokio::spawn(reconnector.run());
    wait_for_event(&mut events, |e| matches!(e, ClientEvent::Applied(_))).await;

    // the abort lands on the sibling, which only holds the row
    let response = http
        .head(format!("{}/topics/1", sibling.base_url))
        .header(live_updates::shared::LIVE_CONNECTION_ABORT_HEADER, nonce.as_str())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(cluster.registry.get(&nonce).await.unwrap().is_none());

    // the owner closes the socket once pinged; the client reconnects with a new nonce
    let events_seen = wait_for_event(&mut events, |e| *e == ClientEvent::Phase(Phase::Reconnecting)).await;
    assert!(!events_seen.is_empty());
    wait_for_event(&mut events, |e| *e == ClientEvent::Phase(Phase::Streaming)).await;
    assert!(owner.live.table().get(&nonce).is_none());

    handle.close();
    tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_expired_registrations_are_reaped() {
    let cluster = spawn_cluster(2).await;
    let owner = cluster.process(0);
    let http = http();

    let page = LivePage::load(&http, &owner.base_url, "/").await.unwrap();
    let loaded = page.nonce().cloned().unwrap();

    let stale = Nonce::parse("never-attached").unwrap();
    cluster
        .registry
        .register_unattached(&stale, "/", chrono::Utc::now() - chrono::Duration::seconds(1))
        .await
        .unwrap();

    let reaped = owner.live.reap_expired().await.unwrap();
    assert_eq!(reaped, vec![stale.clone()]);
    assert!(cluster.registry.get(&stale).await.unwrap().is_none());
    assert!(cluster.registry.get(&loaded).await.unwrap().is_some());

    cluster.shutdown().await;
}
