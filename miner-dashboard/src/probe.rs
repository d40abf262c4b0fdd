//! Miner liveness detection.
//!
//! The dashboard has no channel to the miner beyond the OS process table:
//! the miner counts as running when some process's command line matches a
//! configured pattern, the same test `pgrep -f` applies. Like `pgrep`, the
//! scan never counts the dashboard itself, whose own command line may well
//! contain the pattern.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use utoipa::ToSchema;

use crate::tracing::prelude::*;

/// Result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerLiveness {
    /// At least one matching process exists.
    Running,
    /// The scan succeeded and nothing matched.
    Stopped,
    /// The process table could not be read.
    Unknown,
}

/// Miner state as reported to API clients.
///
/// The wire format only distinguishes two states, so [`MinerLiveness::Unknown`]
/// reads as `stopped` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MinerRunState {
    Running,
    Stopped,
}

impl From<MinerLiveness> for MinerRunState {
    fn from(liveness: MinerLiveness) -> Self {
        match liveness {
            MinerLiveness::Running => MinerRunState::Running,
            MinerLiveness::Stopped | MinerLiveness::Unknown => MinerRunState::Stopped,
        }
    }
}

/// Source of miner liveness.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn probe(&self) -> MinerLiveness;

    async fn is_running(&self) -> bool {
        self.probe().await == MinerLiveness::Running
    }
}

/// Probe backed by the operating system's process table.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    pattern: Regex,
}

impl SystemProbe {
    /// Create a probe for command lines matching `pattern`.
    ///
    /// `pattern` is a regular expression. If it does not compile it is
    /// matched literally instead.
    pub fn new(pattern: &str) -> Self {
        let pattern = Regex::new(pattern).unwrap_or_else(|e| {
            warn!(pattern, error = %e, "Miner pattern is not a valid regex, matching literally");
            // An escaped literal always compiles.
            Regex::new(&regex::escape(pattern)).expect("escaped pattern compiles")
        });
        Self { pattern }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

#[async_trait]
impl ProcessProbe for SystemProbe {
    async fn probe(&self) -> MinerLiveness {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            warn!("Process listing is not supported on this platform");
            return MinerLiveness::Unknown;
        }

        let pattern = self.pattern.clone();
        match tokio::task::spawn_blocking(move || scan_processes(&pattern)).await {
            Ok(true) => MinerLiveness::Running,
            Ok(false) => MinerLiveness::Stopped,
            Err(e) => {
                warn!(error = %e, "Process scan failed");
                MinerLiveness::Unknown
            }
        }
    }
}

// Blocking: walks /proc (or the platform equivalent) once.
fn scan_processes(pattern: &Regex) -> bool {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
    );

    let own_pid = sysinfo::get_current_pid().ok();
    let found = system.processes().values().any(|process| {
        // Threads show up as tasks sharing their parent's command line.
        if Some(process.pid()) == own_pid || process.thread_kind().is_some() {
            return false;
        }
        let cmdline = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        if cmdline.is_empty() {
            pattern.is_match(&process.name().to_string_lossy())
        } else {
            pattern.is_match(&cmdline)
        }
    });

    trace!(pattern = pattern.as_str(), found, "Scanned process table");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    struct Fixed(MinerLiveness);

    #[async_trait]
    impl ProcessProbe for Fixed {
        async fn probe(&self) -> MinerLiveness {
            self.0
        }
    }

    #[test_case(MinerLiveness::Running, MinerRunState::Running ; "running")]
    #[test_case(MinerLiveness::Stopped, MinerRunState::Stopped ; "stopped")]
    #[test_case(MinerLiveness::Unknown, MinerRunState::Stopped ; "unknown reads as stopped")]
    fn test_run_state_from_liveness(liveness: MinerLiveness, expected: MinerRunState) {
        assert_eq!(MinerRunState::from(liveness), expected);
    }

    #[test]
    fn test_run_state_wire_names() {
        assert_eq!(serde_json::to_string(&MinerRunState::Running).unwrap(), "\"running\"");
        assert_eq!(serde_json::to_string(&MinerRunState::Stopped).unwrap(), "\"stopped\"");
    }

    #[tokio::test]
    async fn test_is_running_only_for_running() {
        assert!(Fixed(MinerLiveness::Running).is_running().await);
        assert!(!Fixed(MinerLiveness::Stopped).is_running().await);
        assert!(!Fixed(MinerLiveness::Unknown).is_running().await);
    }

    #[test]
    fn test_invalid_regex_matched_literally() {
        let probe = SystemProbe::new("miner[");
        assert_eq!(probe.pattern(), r"miner\[");
    }

    #[tokio::test]
    async fn test_finds_matching_process() {
        let marker = format!("dashboard-test-miner-{}", std::process::id());
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(format!("sleep 30; : {marker}"))
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let probe = SystemProbe::new(&marker);
        let mut liveness = probe.probe().await;
        for _ in 0..20 {
            if liveness == MinerLiveness::Running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            liveness = probe.probe().await;
        }
        assert_eq!(liveness, MinerLiveness::Running);

        child.kill().await.unwrap();
        assert_eq!(probe.probe().await, MinerLiveness::Stopped);
    }

    #[tokio::test]
    async fn test_ignores_own_process() {
        let exe = std::env::current_exe().unwrap();
        let probe = SystemProbe::new(&regex::escape(&exe.to_string_lossy()));
        assert_eq!(probe.probe().await, MinerLiveness::Stopped);
    }

    #[tokio::test]
    async fn test_absent_process_is_stopped() {
        let probe = SystemProbe::new("^no-such-miner-7f3a9c1e --definitely-absent$");
        assert_eq!(probe.probe().await, MinerLiveness::Stopped);
    }
}
