//! API client library.
//!
//! A small reqwest-based client for the dashboard's HTTP API, used by the
//! CLI. Responses decode into the same types the server encodes.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use time::OffsetDateTime;

use crate::{
    api::handlers::{HealthStatus, MetricsSnapshot, MinerStatus},
    control::ControlOutcome,
    error::{Error, Result},
    stats::{BlockList, MiningStats},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one dashboard server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for the server at `base_url` (e.g.
    /// `http://localhost:3000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "dashboard URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("/api/health").await
    }

    pub async fn stats(&self) -> Result<MiningStats> {
        self.get("/api/stats").await
    }

    pub async fn validated_blocks(&self) -> Result<BlockList> {
        self.get("/api/blocks/validated").await
    }

    pub async fn miner_status(&self) -> Result<MinerStatus> {
        self.get("/api/miner/status").await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot> {
        self.get("/api/metrics").await
    }

    pub async fn start_miner(&self) -> Result<ControlOutcome> {
        self.post("/api/miner/start", None).await
    }

    pub async fn stop_miner(&self) -> Result<ControlOutcome> {
        self.post("/api/miner/stop", None).await
    }

    /// Send a raw envelope through the dashboard's node RPC relay.
    pub async fn node_rpc(&self, envelope: &Value) -> Result<Value> {
        self.post("/api/node/rpc", Some(envelope)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T> {
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(request.send().await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: message.trim().to_string(),
        });
    }
    Ok(response.json().await?)
}

/// Build a JSON-RPC 2.0 request envelope.
///
/// The id is the current Unix time in milliseconds, which is unique enough
/// for interactive use.
pub fn rpc_envelope(method: &str, params: Value) -> Value {
    let id = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id,
    })
}
