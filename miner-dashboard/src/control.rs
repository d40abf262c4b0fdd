//! Miner start/stop.
//!
//! Nothing here launches or signals a process yet. [`MinerControl`] is the
//! seam a real launcher plugs into; [`PlaceholderControl`] acknowledges
//! every request without acting on it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::tracing::prelude::*;

/// Outcome of a start or stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ControlOutcome {
    pub success: bool,
    pub message: String,
}

impl ControlOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Start and stop the miner.
#[async_trait]
pub trait MinerControl: Send + Sync {
    async fn start(&self) -> ControlOutcome;
    async fn stop(&self) -> ControlOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderControl;

#[async_trait]
impl MinerControl for PlaceholderControl {
    async fn start(&self) -> ControlOutcome {
        debug!("Miner start requested; no launcher configured");
        ControlOutcome::success("Miner started")
    }

    async fn stop(&self) -> ControlOutcome {
        debug!("Miner stop requested; no launcher configured");
        ControlOutcome::success("Miner stopped")
    }
}
