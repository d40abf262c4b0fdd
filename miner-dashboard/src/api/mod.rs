//! HTTP API server.
//!
//! Serves the JSON endpoints under `/api`, the realtime stats push at `/ws`,
//! and the dashboard frontend from the static directory for every other
//! path. Built on Axum; handlers receive everything they need through
//! [`AppState`].

pub mod handlers;
pub mod push;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    control::{MinerControl, PlaceholderControl},
    error::{Error, Result},
    metrics::{ProcessSampler, RequestMetrics},
    probe::{ProcessProbe, SystemProbe},
    rpc::{HttpNodeRpc, NodeRpc, UnimplementedRpc},
    stats::{MinerApiStats, PlaceholderStats, StatsProvider},
    tracing::prelude::*,
    types::Timestamp,
};

/// Shared application state for API endpoints.
///
/// Cloned into every handler. Everything behind it is either immutable or
/// internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stats: Arc<dyn StatsProvider>,
    pub probe: Arc<dyn ProcessProbe>,
    pub control: Arc<dyn MinerControl>,
    pub rpc: Arc<dyn NodeRpc>,
    /// Wall-clock start, for health timestamps
    pub started_at: Timestamp,
    /// Monotonic start, for uptime
    pub started: Instant,
    /// Cancelled when the daemon shuts down
    pub shutdown: CancellationToken,
    /// One entry per open push channel
    pub push_tasks: TaskTracker,
    pub requests: Arc<RequestMetrics>,
    pub process: Arc<ProcessSampler>,
}

impl AppState {
    /// State with the placeholder stats, control and RPC providers and a
    /// system process probe.
    pub fn new(config: Config) -> Self {
        let probe = SystemProbe::new(&config.miner_process_pattern);
        Self {
            config: Arc::new(config),
            stats: Arc::new(PlaceholderStats),
            probe: Arc::new(probe),
            control: Arc::new(PlaceholderControl),
            rpc: Arc::new(UnimplementedRpc),
            started_at: Timestamp::now(),
            started: Instant::now(),
            shutdown: CancellationToken::new(),
            push_tasks: TaskTracker::new(),
            requests: Arc::new(RequestMetrics::new()),
            process: Arc::new(ProcessSampler::new()),
        }
    }

    /// State wired to the integrations the configuration enables.
    pub fn from_config(config: Config) -> Result<Self> {
        let stats: Arc<dyn StatsProvider> = match &config.miner_api_url {
            Some(url) => {
                info!(url = %url, "Reading stats from miner API");
                Arc::new(MinerApiStats::new(url.clone(), config.upstream_timeout)?)
            }
            None => {
                info!("No MINER_API_URL set, reporting placeholder stats");
                Arc::new(PlaceholderStats)
            }
        };

        let rpc: Arc<dyn NodeRpc> = if config.rpc_forwarding {
            info!(url = %config.node_rpc_url, "Forwarding node RPC");
            Arc::new(HttpNodeRpc::new(
                config.node_rpc_url.clone(),
                config.upstream_timeout,
            )?)
        } else {
            Arc::new(UnimplementedRpc)
        };

        Ok(Self::new(config).with_stats(stats).with_rpc(rpc))
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_control(mut self, control: Arc<dyn MinerControl>) -> Self {
        self.control = control;
        self
    }

    pub fn with_rpc(mut self, rpc: Arc<dyn NodeRpc>) -> Self {
        self.rpc = rpc;
        self
    }
}

/// Build the complete application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/blocks/validated", get(handlers::validated_blocks))
        .route("/miner/status", get(handlers::miner_status))
        .route("/miner/start", post(handlers::start_miner))
        .route("/miner/stop", post(handlers::stop_miner))
        .route("/node/rpc", post(handlers::node_rpc))
        .route("/metrics", get(handlers::metrics))
        .route("/metrics/prometheus", get(handlers::prometheus_metrics))
        .route("/openapi.json", get(handlers::openapi));

    let static_files = ServeDir::new(&state.config.static_dir);
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);
    let timing = middleware::from_fn_with_state(state.requests.clone(), time_request);

    Router::new()
        .nest("/api", api)
        .route("/ws", get(push::upgrade))
        .fallback_service(static_files)
        .layer(body_limit)
        .layer(timing)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Requests slower than this are logged.
const SLOW_REQUEST: Duration = Duration::from_secs(1);

/// Count every request and stamp its duration on `X-Response-Time`.
async fn time_request(
    State(requests): State<Arc<RequestMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(request).await;

    let elapsed = started.elapsed();
    requests.record(response.status().as_u16(), elapsed);
    if elapsed > SLOW_REQUEST {
        warn!(%method, path = %path, elapsed_ms = elapsed.as_millis() as u64, "Slow request");
    }

    let value = format!("{}ms", elapsed.as_millis());
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert("x-response-time", value);
    }
    response
}

/// Bind the configured listen address.
///
/// Failing to bind is fatal for the daemon; the error carries the address
/// so the operator can see which port was taken.
pub async fn bind(config: &Config) -> Result<TcpListener> {
    let addr = config.bind_addr();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(source) => {
            error!(addr = %addr, error = %source, "Failed to bind.");
            Err(Error::Bind { addr, source })
        }
    }
}

/// Serve on `listener` until the state's shutdown token is cancelled.
///
/// Returns once the listener is closed and in-flight requests have
/// finished. Open push channels end on their own when they observe the
/// token; wait on [`AppState::push_tasks`] to be sure they are gone.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    debug!("HTTP server stopped");
    Ok(())
}
