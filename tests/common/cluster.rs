//! Test servers
//!
//! `single_app` builds one process on a private in-memory registry for
//! driving the router with `oneshot`. `spawn_cluster` starts real processes
//! on ephemeral loopback ports that share one registry file, the way a
//! deployment's processes share one database.

use live_updates::backend::registry::ConnectionRegistry;
use live_updates::backend::server::{create_app_with_registry, LiveServer};
use live_updates::backend::LiveState;
use live_updates::shared::{JitterRange, LiveConfig, LiveConfigBuilder};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const TEST_VERSION: &str = "test-build";

/// Configuration with timers short enough for tests
pub fn test_config() -> LiveConfigBuilder {
    LiveConfig::builder()
        .version(TEST_VERSION)
        .push_spacing(JitterRange::from_millis(1, 2))
        .notify_debounce(Duration::from_millis(20))
        .ping_timeout(Duration::from_secs(1))
}

/// One process on an in-memory registry, not listening anywhere
pub async fn single_app() -> LiveServer {
    let registry = ConnectionRegistry::in_memory()
        .await
        .expect("Failed to open in-memory registry");
    let config = test_config().build().expect("Invalid test config");
    create_app_with_registry(config, registry)
        .await
        .expect("Failed to create app")
}

pub struct TestProcess {
    pub base_url: String,
    pub live: LiveState,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestProcess {
    pub async fn shutdown(self) {
        self.live.shutdown().await.expect("Failed to shut down");
        self.task
            .await
            .expect("Server task panicked")
            .expect("Server failed");
    }
}

pub struct TestCluster {
    pub processes: Vec<TestProcess>,
    pub registry: ConnectionRegistry,
    _dir: TempDir,
}

impl TestCluster {
    pub fn process(&self, index: usize) -> &TestProcess {
        &self.processes[index]
    }

    pub async fn shutdown(self) {
        for process in self.processes {
            process.shutdown().await;
        }
    }
}

/// Start `count` processes sharing a registry file
pub async fn spawn_cluster(count: u16) -> TestCluster {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("registry.db").display());
    let registry = ConnectionRegistry::connect(&database_url)
        .await
        .expect("Failed to open registry");

    let mut listeners = Vec::new();
    for _ in 0..count {
        let public = TcpListener::bind("127.0.0.1:0").await.expect("bind public");
        let control = TcpListener::bind("127.0.0.1:0").await.expect("bind control");
        listeners.push((public, control));
    }
    let control_urls: Vec<String> = listeners
        .iter()
        .map(|(_, control)| format!("http://{}/live-updates", control.local_addr().unwrap()))
        .collect();

    let mut processes = Vec::new();
    for (index, (public, control)) in listeners.into_iter().enumerate() {
        let config = test_config()
            .database_url(database_url.clone())
            .process_index(index as u16)
            .process_count(count)
            .control_urls(control_urls.clone())
            .build()
            .expect("Invalid cluster config");
        let registry = ConnectionRegistry::connect(&config.database_url)
            .await
            .expect("Failed to open registry");
        let server = create_app_with_registry(config, registry)
            .await
            .expect("Failed to create process");

        let base_url = format!("http://{}", public.local_addr().unwrap());
        let live = server.live.clone();
        let task = tokio::spawn(server.serve(public, control));
        processes.push(TestProcess { base_url, live, task });
    }

    TestCluster {
        processes,
        registry,
        _dir: dir,
    }
}
