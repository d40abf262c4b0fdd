//! API endpoint handlers.
//!
//! Each handler is a function of the request and [`AppState`]. The response
//! types double as the client-side decoding types in [`crate::api_client`].

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{OpenApi, ToSchema};

use super::AppState;
use crate::{
    control::ControlOutcome,
    metrics::{Exposition, PROMETHEUS_CONTENT_TYPE},
    probe::{MinerLiveness, MinerRunState},
    stats::{BlockList, BlockRecord, MiningStats},
    tracing::prelude::*,
    types::Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum HealthState {
    #[serde(rename = "ok")]
    Healthy,
}

/// Health check payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: Timestamp,
    /// Tasks currently alive on the async runtime
    pub live_tasks: usize,
    /// Whole seconds since the server started
    pub uptime: u64,
}

/// Miner liveness payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MinerStatus {
    pub status: MinerRunState,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: Timestamp,
}

/// Reply to a request body over the size limit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestTooLarge {
    pub error: String,
    pub message: String,
    /// Limit in bytes
    pub max_size: usize,
}

impl RequestTooLarge {
    pub fn new(max_size: usize) -> Self {
        Self {
            error: "Request too large".into(),
            message: format!("Request size exceeds maximum of {max_size} bytes"),
            max_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryUsage {
    /// Resident bytes of the dashboard process
    pub used: u64,
    /// Physical memory of the host in bytes
    pub total: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CpuUsage {
    /// Percent of one core since the previous sample
    pub usage: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total: u64,
    pub errors: u64,
    pub mean_duration_ms: f64,
}

/// Process and request metrics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub requests: RequestSummary,
    /// Seconds since the server started
    pub uptime: f64,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: Timestamp,
}

/// Health check.
///
/// Always `ok` while the server is able to answer.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Server is up", body = HealthStatus))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let live_tasks = tokio::runtime::Handle::current().metrics().num_alive_tasks();
    // Never report a time before startup, even if the wall clock stepped back.
    let timestamp = Timestamp::now().max(state.started_at);

    Json(HealthStatus {
        status: HealthState::Healthy,
        timestamp,
        live_tasks,
        uptime: state.started.elapsed().as_secs(),
    })
}

/// Current mining statistics.
#[utoipa::path(
    get,
    path = "/api/stats",
    responses((status = 200, description = "Latest snapshot", body = MiningStats))
)]
pub async fn stats(State(state): State<AppState>) -> Json<MiningStats> {
    Json(state.stats.snapshot().await)
}

/// Blocks found by this rig and validated by the network.
#[utoipa::path(
    get,
    path = "/api/blocks/validated",
    responses((status = 200, description = "Validated blocks", body = BlockList))
)]
pub async fn validated_blocks(State(state): State<AppState>) -> Json<BlockList> {
    Json(BlockList::from(state.stats.validated_blocks().await))
}

/// Whether the miner process is running.
#[utoipa::path(
    get,
    path = "/api/miner/status",
    responses((status = 200, description = "Miner process state", body = MinerStatus))
)]
pub async fn miner_status(State(state): State<AppState>) -> Json<MinerStatus> {
    let liveness = state.probe.probe().await;
    if liveness == MinerLiveness::Unknown {
        warn!("Miner liveness unknown, reporting stopped");
    }

    Json(MinerStatus {
        status: liveness.into(),
        timestamp: Timestamp::now(),
    })
}

/// Start the miner.
#[utoipa::path(
    post,
    path = "/api/miner/start",
    responses((status = 200, description = "Start acknowledged", body = ControlOutcome))
)]
pub async fn start_miner(State(state): State<AppState>) -> Json<ControlOutcome> {
    let outcome = state.control.start().await;
    info!(success = outcome.success, message = %outcome.message, "Miner start");
    Json(outcome)
}

/// Stop the miner.
#[utoipa::path(
    post,
    path = "/api/miner/stop",
    responses((status = 200, description = "Stop acknowledged", body = ControlOutcome))
)]
pub async fn stop_miner(State(state): State<AppState>) -> Json<ControlOutcome> {
    let outcome = state.control.stop().await;
    info!(success = outcome.success, message = %outcome.message, "Miner stop");
    Json(outcome)
}

/// Process and request metrics as JSON.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses((status = 200, description = "Current metrics", body = MetricsSnapshot))
)]
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    let usage = state.process.sample();
    let requests = &state.requests;

    Json(MetricsSnapshot {
        memory: MemoryUsage {
            used: usage.resident_bytes,
            total: usage.total_memory_bytes,
            percentage: usage.memory_percent(),
        },
        cpu: CpuUsage {
            usage: usage.cpu_percent,
        },
        requests: RequestSummary {
            total: requests.requests_total(),
            errors: requests.errors_total(),
            mean_duration_ms: requests.mean_duration().as_secs_f64() * 1000.0,
        },
        uptime: state.started.elapsed().as_secs_f64(),
        timestamp: Timestamp::now(),
    })
}

/// Process and request metrics for a Prometheus scraper.
#[utoipa::path(
    get,
    path = "/api/metrics/prometheus",
    responses((status = 200, description = "Text exposition format", body = String, content_type = "text/plain"))
)]
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = Exposition {
        requests: &state.requests,
        usage: state.process.sample(),
        uptime: state.started.elapsed(),
        push_connections: state.push_tasks.len(),
    }
    .render();

    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// Relay a JSON-RPC envelope to the node.
///
/// The body must be a JSON object; anything else is rejected with 400.
/// Bodies over the configured size limit get a JSON 413.
///
/// # Example
/// ```bash
/// curl -X POST http://localhost:3000/api/node/rpc \
///    -H "Content-Type: application/json" \
///    -d '{"jsonrpc": "2.0", "id": 1, "method": "quai_blockNumber", "params": []}'
/// ```
#[utoipa::path(
    post,
    path = "/api/node/rpc",
    request_body(content = Object, content_type = "application/json"),
    responses(
        (status = 200, description = "Reply envelope from the node"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 413, description = "Body over the size limit", body = RequestTooLarge)
    )
)]
pub async fn node_rpc(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let max_size = state.config.max_body_bytes;
            warn!(max_size, "Rejecting oversized RPC body");
            let reply = RequestTooLarge::new(max_size);
            return (StatusCode::PAYLOAD_TOO_LARGE, Json(reply)).into_response();
        }
        Err(rejection) => return rejection.into_response(),
    };

    let request: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejecting malformed RPC body");
            return (StatusCode::BAD_REQUEST, "Invalid request").into_response();
        }
    };

    Json(state.rpc.forward(request).await).into_response()
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Miner dashboard API"),
    paths(
        health,
        stats,
        validated_blocks,
        miner_status,
        start_miner,
        stop_miner,
        metrics,
        prometheus_metrics,
        node_rpc
    ),
    components(schemas(
        HealthStatus,
        HealthState,
        MiningStats,
        BlockList,
        BlockRecord,
        MinerStatus,
        MinerRunState,
        ControlOutcome,
        MetricsSnapshot,
        MemoryUsage,
        CpuUsage,
        RequestSummary,
        RequestTooLarge
    ))
)]
pub struct ApiDoc;

/// OpenAPI description of the endpoints above.
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
