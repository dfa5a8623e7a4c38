//! Test helpers for end-to-end tests.
//!
//! Spawns the broker service on a loopback port over a temporary object
//! store, and builds controllers wired to it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use filedeck::config::{ClientConfig, ServerConfig};
use filedeck::file::{ObjectStore, UrlSigner};
use filedeck::web::{create_router, AppState};
use filedeck::{session, Notification, UploadController, UploadStatus};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// A broker service running in the background.
pub struct TestBroker {
    pub addr: SocketAddr,
    pub base_url: String,
    pub store: ObjectStore,
    _dir: TempDir,
}

/// Start the broker service on an ephemeral port.
pub async fn spawn_broker() -> TestBroker {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let config = ServerConfig {
        port: addr.port(),
        public_url: base_url.clone(),
        signing_secret: TEST_SECRET.to_string(),
        ..Default::default()
    };
    let store = ObjectStore::new(dir.path())
        .await
        .expect("Failed to open test store");
    let signer = UrlSigner::new(TEST_SECRET, &base_url, config.signed_url_ttl_secs)
        .expect("Failed to create signer");
    let router = create_router(Arc::new(AppState::new(store.clone(), signer)), &config);

    serve(listener, router);

    TestBroker {
        addr,
        base_url,
        store,
        _dir: dir,
    }
}

/// Serve an arbitrary router on an ephemeral port, returning its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    serve(listener, router);
    base_url
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server failed");
    });
}

/// Client configuration pointing at `base_url`.
pub fn client_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        chunk_size_bytes: 64 * 1024,
        ..Default::default()
    }
}

/// A controller talking to `base_url`, with its notifications captured.
pub fn create_controller(
    base_url: &str,
) -> (Arc<UploadController>, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = UploadController::from_config(
        &client_config(base_url),
        session::from_token(""),
        Arc::new(tx),
    )
    .expect("Failed to build controller");
    (Arc::new(controller), rx)
}

/// Drain every notification received so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

/// Poll the controller until `pred` holds.
pub async fn wait_for_status(controller: &UploadController, pred: impl Fn(&UploadStatus) -> bool) {
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while !pred(&controller.status()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for upload status");
}
