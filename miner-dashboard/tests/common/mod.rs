#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::net::TcpListener;

use miner_dashboard::{
    api::{self, AppState},
    config::Config,
    control::{ControlOutcome, MinerControl},
    probe::{MinerLiveness, ProcessProbe},
};

pub const INDEX_HTML: &str = "<!doctype html><title>dashboard</title>";

/// Probe that always reports the same thing.
pub struct FixedProbe(pub MinerLiveness);

#[async_trait]
impl ProcessProbe for FixedProbe {
    async fn probe(&self) -> MinerLiveness {
        self.0
    }
}

/// Miner control whose every action fails.
pub struct RefusingControl;

#[async_trait]
impl MinerControl for RefusingControl {
    async fn start(&self) -> ControlOutcome {
        ControlOutcome::failure("Miner binary not found")
    }

    async fn stop(&self) -> ControlOutcome {
        ControlOutcome::failure("Miner not running")
    }
}

/// A temporary static directory holding `index.html`, removed on drop.
pub struct StaticDir(PathBuf);

impl StaticDir {
    pub fn new() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "miner-dashboard-test-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), INDEX_HTML).unwrap();
        Self(dir)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for StaticDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Config for a local test server. Keep the returned directory alive for as
/// long as the server runs.
pub fn test_config() -> (Config, StaticDir) {
    let site = StaticDir::new();
    let config = Config {
        host: "127.0.0.1".into(),
        port: "0".into(),
        static_dir: site.path().to_path_buf(),
        push_interval: Duration::from_millis(100),
        ..Config::default()
    };
    (config, site)
}

/// Serve `state` on an ephemeral local port.
pub async fn spawn(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(api::serve(listener, state));
    addr
}

async fn serve_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

/// A miner HTTP API answering with `body`. Returns its stats URL.
pub async fn serve_miner_api(body: &'static str) -> String {
    let app = Router::new().route(
        "/summary",
        get(move || async move { ([("content-type", "application/json")], body) }),
    );
    format!("http://{}/summary", serve_router(app).await)
}

/// A node that answers every call with its method name as the result.
pub async fn serve_fake_node() -> String {
    async fn handle(Json(request): Json<Value>) -> Json<Value> {
        Json(json!({"jsonrpc": "2.0", "id": request["id"], "result": request["method"]}))
    }
    let app = Router::new().route("/", post(handle));
    format!("http://{}/", serve_router(app).await)
}
