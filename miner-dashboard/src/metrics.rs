//! Request and process metrics.
//!
//! [`RequestMetrics`] is fed by the HTTP layer after every response.
//! [`ProcessSampler`] reads the dashboard's own memory and CPU figures from
//! the OS on demand. Both are rendered by the `/api/metrics` endpoints, as
//! JSON or in the Prometheus text exposition format.

use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use sysinfo::{MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Number of recent requests the mean duration is taken over.
pub const DURATION_WINDOW: usize = 1000;

/// Content type of the Prometheus text format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Counters for the HTTP requests served so far.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    durations: Mutex<VecDeque<Duration>>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished request. Statuses of 400 and above count as
    /// errors.
    pub fn record(&self, status: u16, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        let mut durations = self.durations.lock();
        if durations.len() == DURATION_WINDOW {
            durations.pop_front();
        }
        durations.push_back(elapsed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn errors_total(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Mean duration of the last [`DURATION_WINDOW`] requests, zero before
    /// the first one.
    pub fn mean_duration(&self) -> Duration {
        let durations = self.durations.lock();
        if durations.is_empty() {
            return Duration::ZERO;
        }
        durations.iter().sum::<Duration>() / durations.len() as u32
    }
}

/// Resource usage of the dashboard process at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessUsage {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
    /// Percent of one core since the previous sample
    pub cpu_percent: f32,
    pub total_memory_bytes: u64,
}

impl ProcessUsage {
    /// Resident memory as a percentage of physical memory.
    pub fn memory_percent(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 0.0;
        }
        self.resident_bytes as f64 / self.total_memory_bytes as f64 * 100.0
    }
}

/// Reads the current process's usage figures.
///
/// Keeps one `System` between samples: CPU usage is a delta, so the first
/// sample always reports zero.
pub struct ProcessSampler {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl ProcessSampler {
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            system: Mutex::new(System::new()),
        }
    }

    pub fn sample(&self) -> ProcessUsage {
        let mut system = self.system.lock();
        system.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total_memory_bytes = system.total_memory();

        let Some(pid) = self.pid else {
            return ProcessUsage {
                total_memory_bytes,
                ..ProcessUsage::default()
            };
        };

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        match system.process(pid) {
            Some(process) => ProcessUsage {
                resident_bytes: process.memory(),
                virtual_bytes: process.virtual_memory(),
                cpu_percent: process.cpu_usage(),
                total_memory_bytes,
            },
            None => ProcessUsage {
                total_memory_bytes,
                ..ProcessUsage::default()
            },
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the Prometheus endpoint reports.
#[derive(Debug, Clone, Copy)]
pub struct Exposition<'a> {
    pub requests: &'a RequestMetrics,
    pub usage: ProcessUsage,
    pub uptime: Duration,
    pub push_connections: usize,
}

impl Exposition<'_> {
    /// Render in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut metric = |name: &str, kind: &str, help: &str, samples: &[(&str, String)]| {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            for (labels, value) in samples {
                let _ = writeln!(out, "{name}{labels} {value}");
            }
        };

        metric(
            "http_requests_total",
            "counter",
            "Total number of HTTP requests",
            &[("", self.requests.requests_total().to_string())],
        );
        metric(
            "http_request_duration_seconds",
            "gauge",
            "Mean HTTP request duration over recent requests",
            &[("", self.requests.mean_duration().as_secs_f64().to_string())],
        );
        metric(
            "http_errors_total",
            "counter",
            "HTTP responses with status 400 or above",
            &[("", self.requests.errors_total().to_string())],
        );
        metric(
            "process_memory_bytes",
            "gauge",
            "Memory used by the dashboard process",
            &[
                ("{type=\"rss\"}", self.usage.resident_bytes.to_string()),
                ("{type=\"virtual\"}", self.usage.virtual_bytes.to_string()),
            ],
        );
        metric(
            "process_cpu_usage_percent",
            "gauge",
            "CPU used by the dashboard process, percent of one core",
            &[("", self.usage.cpu_percent.to_string())],
        );
        metric(
            "process_uptime_seconds",
            "gauge",
            "Seconds since the dashboard started",
            &[("", self.uptime.as_secs_f64().to_string())],
        );
        metric(
            "websocket_active_connections",
            "gauge",
            "Open stats push channels",
            &[("", self.push_connections.to_string())],
        );
        out
    }
}
