//! Mining statistics snapshots.
//!
//! A [`StatsProvider`] hands out point-in-time [`MiningStats`] and the list
//! of blocks the rig has had validated. Providers never fail: when their
//! source is unreachable they answer with the idle snapshot, so callers
//! (HTTP handlers, push loops) have no error path to handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

use crate::{error::Result, tracing::prelude::*, types::Timestamp};

/// One reading of the miner's performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    /// Hashes per second
    pub hash_rate: f64,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    /// Watts
    pub power_usage: f64,
    /// Degrees Celsius
    pub temperature: f64,
    pub is_mining: bool,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: Timestamp,
}

impl MiningStats {
    /// The all-zero snapshot: not mining, nothing counted.
    pub fn idle(timestamp: Timestamp) -> Self {
        Self {
            hash_rate: 0.0,
            accepted_shares: 0,
            rejected_shares: 0,
            power_usage: 0.0,
            temperature: 0.0,
            is_mining: false,
            timestamp,
        }
    }
}

/// A block found by this rig and accepted by the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub number: u64,
    pub hash: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: Timestamp,
}

/// Validated blocks with their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BlockList {
    pub blocks: Vec<BlockRecord>,
    /// Always `blocks.len()`
    pub total: usize,
}

impl From<Vec<BlockRecord>> for BlockList {
    fn from(blocks: Vec<BlockRecord>) -> Self {
        let total = blocks.len();
        Self { blocks, total }
    }
}

/// Source of mining statistics.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Current statistics. Must not fail; degrade to [`MiningStats::idle`].
    async fn snapshot(&self) -> MiningStats;

    /// Blocks validated so far, oldest first.
    async fn validated_blocks(&self) -> Vec<BlockRecord> {
        Vec::new()
    }
}

/// Provider used when no miner API is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderStats;

#[async_trait]
impl StatsProvider for PlaceholderStats {
    async fn snapshot(&self) -> MiningStats {
        MiningStats::idle(Timestamp::now())
    }
}

/// Miner status document as served by the miner's local API.
///
/// Every field is optional; absent ones read as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MinerReport {
    #[serde(alias = "hash_rate", alias = "hashrate")]
    hash_rate: Option<f64>,
    #[serde(alias = "accepted_shares", alias = "accepted")]
    accepted_shares: Option<u64>,
    #[serde(alias = "rejected_shares", alias = "rejected")]
    rejected_shares: Option<u64>,
    #[serde(alias = "power_usage", alias = "power")]
    power_usage: Option<f64>,
    #[serde(alias = "temp")]
    temperature: Option<f64>,
    #[serde(alias = "is_mining")]
    is_mining: Option<bool>,
}

impl MinerReport {
    fn into_stats(self, timestamp: Timestamp) -> MiningStats {
        let non_negative = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0);
        let hash_rate = non_negative(self.hash_rate);
        MiningStats {
            hash_rate,
            accepted_shares: self.accepted_shares.unwrap_or(0),
            rejected_shares: self.rejected_shares.unwrap_or(0),
            power_usage: non_negative(self.power_usage),
            temperature: self.temperature.filter(|t| t.is_finite()).unwrap_or(0.0),
            is_mining: self.is_mining.unwrap_or(hash_rate > 0.0),
            timestamp,
        }
    }
}

/// Provider that polls the miner's HTTP status API on every snapshot.
#[derive(Debug, Clone)]
pub struct MinerApiStats {
    url: String,
    client: reqwest::Client,
}

impl MinerApiStats {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn fetch(&self) -> Result<MiningStats> {
        let report: MinerReport = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(report.into_stats(Timestamp::now()))
    }
}

#[async_trait]
impl StatsProvider for MinerApiStats {
    async fn snapshot(&self) -> MiningStats {
        match self.fetch().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Miner API unavailable, reporting idle stats");
                MiningStats::idle(Timestamp::now())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve_miner_api(body: &'static str) -> String {
        let app = Router::new().route(
            "/summary",
            get(move || async move { ([("content-type", "application/json")], body) }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/summary")
    }

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/summary")
    }

    #[tokio::test]
    async fn test_placeholder_is_idle() {
        let stats = PlaceholderStats.snapshot().await;
        assert_eq!(stats, MiningStats::idle(stats.timestamp));
        assert!(PlaceholderStats.validated_blocks().await.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let stats = MiningStats::idle(Timestamp::parse("2024-01-01T00:00:00Z").unwrap());
        let json = serde_json::to_value(&stats).unwrap();
        for key in [
            "hashRate",
            "acceptedShares",
            "rejectedShares",
            "powerUsage",
            "temperature",
            "isMining",
            "timestamp",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_block_list_total_matches_len() {
        let ts = Timestamp::now();
        let list = BlockList::from(vec![
            BlockRecord { number: 1, hash: "0xaa".into(), timestamp: ts },
            BlockRecord { number: 2, hash: "0xbb".into(), timestamp: ts },
        ]);
        assert_eq!(list.total, 2);
        assert_eq!(BlockList::from(Vec::new()).total, 0);
    }

    #[tokio::test]
    async fn test_miner_api_report_decoded() {
        let url = serve_miner_api(
            r#"{"hashRate": 41.5e6, "acceptedShares": 12, "rejectedShares": 1,
                "powerUsage": 180, "temperature": 64.5}"#,
        )
        .await;
        let provider = MinerApiStats::new(url, Duration::from_secs(2)).unwrap();
        let stats = provider.snapshot().await;
        assert_eq!(stats.hash_rate, 41.5e6);
        assert_eq!(stats.accepted_shares, 12);
        assert_eq!(stats.rejected_shares, 1);
        assert_eq!(stats.power_usage, 180.0);
        assert_eq!(stats.temperature, 64.5);
        assert!(stats.is_mining);
    }

    #[tokio::test]
    async fn test_miner_api_partial_report() {
        let url = serve_miner_api(r#"{"hashrate": -5, "is_mining": false}"#).await;
        let provider = MinerApiStats::new(url, Duration::from_secs(2)).unwrap();
        let stats = provider.snapshot().await;
        assert_eq!(stats.hash_rate, 0.0);
        assert_eq!(stats.accepted_shares, 0);
        assert!(!stats.is_mining);
    }

    #[tokio::test]
    async fn test_unreachable_miner_api_degrades_to_idle() {
        let provider = MinerApiStats::new(closed_port_url().await, Duration::from_secs(2)).unwrap();
        let stats = provider.snapshot().await;
        assert_eq!(stats, MiningStats::idle(stats.timestamp));
    }

    #[tokio::test]
    async fn test_malformed_miner_api_degrades_to_idle() {
        let url = serve_miner_api("<html>not json</html>").await;
        let provider = MinerApiStats::new(url, Duration::from_secs(2)).unwrap();
        let stats = provider.snapshot().await;
        assert_eq!(stats, MiningStats::idle(stats.timestamp));
    }
}
