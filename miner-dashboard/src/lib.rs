//! Dashboard backend for a mining rig.
//!
//! Serves miner status and statistics over HTTP, pushes periodic stat
//! snapshots over WebSocket, relays JSON-RPC to a blockchain node, and
//! hosts the browser frontend's static files.

pub mod api;
pub mod api_client;
pub mod config;
pub mod control;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod rpc;
pub mod stats;
pub mod tracing;
pub mod types;
