//! Realtime stats push over WebSocket.
//!
//! Each connection gets its own loop and timer; connections share nothing.
//! A loop ends on the first failed write, when the client closes, or when
//! the server shuts down. Nothing is retried; clients reconnect.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::AppState;
use crate::{stats::MiningStats, tracing::prelude::*, types::Timestamp};

/// One pushed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFrame {
    pub hash_rate: f64,
    pub timestamp: Timestamp,
}

impl From<&MiningStats> for PushFrame {
    fn from(stats: &MiningStats) -> Self {
        Self {
            hash_rate: stats.hash_rate,
            timestamp: stats.timestamp,
        }
    }
}

/// Upgrade handler for `/ws`.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let tracker = state.push_tasks.clone();
    ws.on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| tracker.track_future(push_stats(socket, state)))
}

async fn push_stats(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let period = state.config.push_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(period_ms = period.as_millis() as u64, "Push channel opened");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                // Best effort; the peer may already be gone.
                let _ = sender.send(Message::Close(None)).await;
                debug!("Push channel closed for shutdown");
                break;
            }

            // Client data is ignored. Reading it is how close frames and
            // dropped connections are noticed between ticks.
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Push channel closed by client");
                    break;
                }
                Some(Err(e)) => {
                    debug!(error = %e, "Push channel read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },

            _ = ticker.tick() => {
                let stats = state.stats.snapshot().await;
                let frame = match serde_json::to_string(&PushFrame::from(&stats)) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!(error = %e, "Failed to encode push frame");
                        break;
                    }
                };
                if let Err(e) = sender.send(Message::Text(frame)).await {
                    debug!(error = %e, "Push write failed, closing channel");
                    break;
                }
            }
        }
    }
}
