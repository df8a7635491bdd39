// ── WiFi network discovery ──
//
// Scanners return whatever the radio reported; `discover()` turns that
// into the list an operator picks from. Scanning never runs on the
// caller's thread: both shipped scanners await a child process.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::provision::shell_quote;
use crate::remote::{RemoteExecutor, RemoteTarget};

/// Source of raw SSIDs.
pub trait NetworkScanner: Send + Sync {
    /// Scan once. An empty list is a valid result; radio or tool
    /// failures are [`CoreError::DiscoveryUnavailable`].
    fn scan(&self) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send;
}

/// Scan and normalize: deduplicated, case-insensitively sorted SSIDs.
pub async fn discover<S: NetworkScanner>(scanner: &S) -> Result<Vec<String>, CoreError> {
    let raw = scanner.scan().await?;
    let networks = normalize(raw);
    debug!(count = networks.len(), "networks discovered");
    Ok(networks)
}

/// Drop unusable names, collapse case-insensitive duplicates (the first
/// spelling seen wins) and sort case-insensitively.
///
/// Hidden networks show up as NUL bytes, either raw or as the `\x00`
/// escape `iwlist` prints; both are dropped.
pub fn normalize(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut networks: Vec<String> = raw
        .into_iter()
        .filter(|ssid| !ssid.is_empty() && !ssid.contains('\0') && !ssid.contains(r"\x00"))
        .filter(|ssid| seen.insert(ssid.to_lowercase()))
        .collect();
    networks.sort_by_cached_key(|ssid| ssid.to_lowercase());
    networks
}

fn unavailable(reason: impl Into<String>) -> CoreError {
    CoreError::DiscoveryUnavailable {
        reason: reason.into(),
    }
}

// ── NetworkManager ───────────────────────────────────────────────────

/// Scans with the local NetworkManager CLI.
#[derive(Debug, Clone, Default)]
pub struct NmcliScanner;

impl NetworkScanner for NmcliScanner {
    async fn scan(&self) -> Result<Vec<String>, CoreError> {
        let output = Command::new("nmcli")
            .args(["-t", "-f", "SSID", "device", "wifi", "list"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| unavailable(format!("cannot run nmcli: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), "nmcli scan failed");
            return Err(unavailable(format!("nmcli failed: {}", stderr.trim())));
        }

        Ok(parse_nmcli(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse terse `nmcli -t -f SSID` output: one SSID per line, with `:`
/// and `\` escaped by a backslash.
pub fn parse_nmcli(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| {
            let mut ssid = String::with_capacity(line.len());
            let mut chars = line.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        ssid.push(escaped);
                    }
                } else {
                    ssid.push(c);
                }
            }
            ssid
        })
        .collect()
}

// ── On-device iwlist ─────────────────────────────────────────────────

/// Scans from the lamp's own radio over the remote-execution channel.
pub struct IwlistScanner<E> {
    executor: E,
    target: RemoteTarget,
    key: PathBuf,
    interface: String,
}

impl<E: RemoteExecutor> IwlistScanner<E> {
    pub fn new(
        executor: E,
        target: RemoteTarget,
        key: impl Into<PathBuf>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            target,
            key: key.into(),
            interface: interface.into(),
        }
    }
}

impl<E: RemoteExecutor> NetworkScanner for IwlistScanner<E> {
    async fn scan(&self) -> Result<Vec<String>, CoreError> {
        let command = format!("sudo iwlist {} scan", shell_quote(&self.interface));
        let output = self
            .executor
            .execute(&self.target, &self.key, &command, None)
            .await
            .map_err(|e| unavailable(format!("cannot reach {}: {e}", self.target)))?;

        if !output.success() {
            return Err(unavailable(format!(
                "iwlist on {} failed ({})",
                self.target,
                output.describe_failure()
            )));
        }

        Ok(parse_iwlist(&output.stdout))
    }
}

/// Extract SSIDs from `iwlist <iface> scan` output.
pub fn parse_iwlist(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ESSID:"))
        .filter_map(|rest| rest.strip_prefix('"')?.strip_suffix('"'))
        .map(str::to_owned)
        .collect()
}
