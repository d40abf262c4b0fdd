//! Relay of JSON-RPC envelopes to the blockchain node.
//!
//! The dashboard treats envelopes as opaque JSON objects. It neither checks
//! `jsonrpc`/`method`/`id` nor rewrites the reply.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::{error::Result, tracing::prelude::*};

/// Forward a request envelope and produce the reply envelope.
///
/// Implementations never fail outright. Transport problems come back as a
/// JSON-RPC style error object.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn forward(&self, request: Map<String, Value>) -> Value;
}

/// Reply used while forwarding is switched off.
pub fn not_implemented() -> Value {
    json!({ "result": null, "error": "Not implemented" })
}

fn transport_error(message: impl Into<String>) -> Value {
    json!({ "result": null, "error": { "message": message.into() } })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedRpc;

#[async_trait]
impl NodeRpc for UnimplementedRpc {
    async fn forward(&self, _request: Map<String, Value>) -> Value {
        not_implemented()
    }
}

/// Forwards envelopes to the node over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNodeRpc {
    url: String,
    client: reqwest::Client,
}

impl HttpNodeRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn call(&self, request: &Map<String, Value>) -> Result<Value> {
        let reply = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .json::<Value>()
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl NodeRpc for HttpNodeRpc {
    async fn forward(&self, request: Map<String, Value>) -> Value {
        let method = request.get("method").and_then(Value::as_str).unwrap_or("?").to_owned();
        match self.call(&request).await {
            Ok(reply) => {
                debug!(method = %method, "Node RPC forwarded");
                reply
            }
            Err(e) => {
                warn!(url = %self.url, method = %method, error = %e, "Node RPC failed");
                transport_error(e.to_string())
            }
        }
    }
}
