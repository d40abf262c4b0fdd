//! Configuration for the dashboard daemon.
//!
//! Settings come from environment variables, read once at startup into an
//! immutable [`Config`] that handlers receive through shared state. Loading
//! never fails: a missing or empty variable takes its default, and an
//! unparsable one takes its default with a warning.

use regex::Regex;
use std::{env, path::PathBuf, sync::OnceLock, time::Duration};

use crate::tracing::prelude::*;

pub const DEFAULT_PORT: &str = "3000";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_NODE_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_STATIC_DIR: &str = "./public";
pub const DEFAULT_MINER_PROCESS_PATTERN: &str = "quai-gpu-miner";
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Dashboard configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Interface to bind (`HOST`)
    pub host: String,

    /// Port to bind (`PORT`), kept as given
    pub port: String,

    /// Blockchain node JSON-RPC endpoint (`NODE_RPC_URL`)
    pub node_rpc_url: String,

    /// Miner status API (`MINER_API_URL`); `None` when unset
    pub miner_api_url: Option<String>,

    /// Directory served for every non-API path (`STATIC_DIR`)
    pub static_dir: PathBuf,

    /// Regular expression matched against process command lines to detect
    /// the miner (`MINER_PROCESS_PATTERN`)
    pub miner_process_pattern: String,

    /// Period between WebSocket stat frames (`PUSH_INTERVAL_SECS`)
    pub push_interval: Duration,

    /// Timeout for calls to the miner API and node (`UPSTREAM_TIMEOUT_SECS`)
    pub upstream_timeout: Duration,

    /// Largest accepted request body (`MAX_REQUEST_SIZE`, e.g. `512kb`)
    pub max_body_bytes: usize,

    /// Forward `/api/node/rpc` to the node instead of answering
    /// "Not implemented" (`NODE_RPC_FORWARD`)
    pub rpc_forwarding: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let push_interval = get("PUSH_INTERVAL_SECS")
            .map(|v| parse_secs("PUSH_INTERVAL_SECS", &v, DEFAULT_PUSH_INTERVAL))
            .unwrap_or(DEFAULT_PUSH_INTERVAL);

        let upstream_timeout = get("UPSTREAM_TIMEOUT_SECS")
            .map(|v| parse_secs("UPSTREAM_TIMEOUT_SECS", &v, DEFAULT_UPSTREAM_TIMEOUT))
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT);

        let max_body_bytes = match get("MAX_REQUEST_SIZE") {
            Some(v) => parse_size(&v).unwrap_or_else(|| {
                warn!(value = %v, "Unrecognized MAX_REQUEST_SIZE, using 1mb");
                DEFAULT_MAX_BODY_BYTES
            }),
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let rpc_forwarding = match get("NODE_RPC_FORWARD") {
            Some(v) => parse_flag(&v).unwrap_or_else(|| {
                warn!(value = %v, "Unrecognized NODE_RPC_FORWARD, leaving forwarding off");
                false
            }),
            None => false,
        };

        Self {
            host: or("HOST", DEFAULT_HOST),
            port: or("PORT", DEFAULT_PORT),
            node_rpc_url: or("NODE_RPC_URL", DEFAULT_NODE_RPC_URL),
            miner_api_url: get("MINER_API_URL"),
            static_dir: PathBuf::from(or("STATIC_DIR", DEFAULT_STATIC_DIR)),
            miner_process_pattern: or("MINER_PROCESS_PATTERN", DEFAULT_MINER_PROCESS_PATTERN),
            push_interval,
            upstream_timeout,
            max_body_bytes,
            rpc_forwarding,
        }
    }

    /// Socket address string to bind, `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_secs(key: &str, value: &str, default: Duration) -> Duration {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            warn!(key, value, default_secs = default.as_secs(), "Invalid duration, using default");
            default
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a human byte size such as `1mb`, `512kb` or `2048`.
///
/// Units are binary (`kb` is 1024 bytes). Returns `None` for anything else.
pub fn parse_size(value: &str) -> Option<usize> {
    static SIZE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE.get_or_init(|| Regex::new(r"^(\d+)\s*([a-z]*)$").expect("valid size regex"));

    let lower = value.trim().to_ascii_lowercase();
    let caps = re.captures(&lower)?;
    let n: usize = caps[1].parse().ok()?;
    let unit = match &caps[2] {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    n.checked_mul(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, "3000");
        assert_eq!(config.node_rpc_url, "http://localhost:8545");
        assert_eq!(config.miner_api_url, None);
        assert_eq!(config.static_dir, PathBuf::from("./public"));
        assert_eq!(config.miner_process_pattern, "quai-gpu-miner");
        assert_eq!(config.push_interval, Duration::from_secs(5));
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert!(!config.rpc_forwarding);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("NODE_RPC_URL", "http://node:9001"),
            ("MINER_API_URL", "http://rig:4067/summary"),
            ("STATIC_DIR", "/srv/www"),
            ("MINER_PROCESS_PATTERN", "teamredminer"),
            ("PUSH_INTERVAL_SECS", "2"),
            ("UPSTREAM_TIMEOUT_SECS", "3"),
            ("MAX_REQUEST_SIZE", "64kb"),
            ("NODE_RPC_FORWARD", "true"),
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.node_rpc_url, "http://node:9001");
        assert_eq!(config.miner_api_url.as_deref(), Some("http://rig:4067/summary"));
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.miner_process_pattern, "teamredminer");
        assert_eq!(config.push_interval, Duration::from_secs(2));
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
        assert_eq!(config.max_body_bytes, 64 * 1024);
        assert!(config.rpc_forwarding);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", ""), ("HOST", "  "), ("MINER_API_URL", "")]);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.miner_api_url, None);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("PUSH_INTERVAL_SECS", "soon"),
            ("UPSTREAM_TIMEOUT_SECS", "0"),
            ("MAX_REQUEST_SIZE", "lots"),
            ("NODE_RPC_FORWARD", "maybe"),
        ]);
        assert_eq!(config.push_interval, DEFAULT_PUSH_INTERVAL);
        assert_eq!(config.upstream_timeout, DEFAULT_UPSTREAM_TIMEOUT);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(!config.rpc_forwarding);
    }

    #[test_case("1mb", Some(1024 * 1024) ; "megabytes")]
    #[test_case("512KB", Some(512 * 1024) ; "kilobytes uppercase")]
    #[test_case("2gb", Some(2 * 1024 * 1024 * 1024) ; "gigabytes")]
    #[test_case("100b", Some(100) ; "explicit bytes")]
    #[test_case("4096", Some(4096) ; "bare number")]
    #[test_case("10 mb", Some(10 * 1024 * 1024) ; "space before unit")]
    #[test_case("1tb", None ; "unknown unit")]
    #[test_case("mb", None ; "missing number")]
    #[test_case("-1mb", None ; "negative")]
    fn test_parse_size(input: &str, expected: Option<usize>) {
        assert_eq!(parse_size(input), expected);
    }
}
