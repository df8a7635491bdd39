// ── Remote execution ──
//
// Provisioning and on-device scanning both run shell commands on the
// lamp's host. `RemoteExecutor` is the seam; `SshExecutor` drives the
// system `ssh` client, and tests substitute a recorder.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

/// Login destination for remote commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
}

impl RemoteTarget {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short human-readable failure description.
    pub fn describe_failure(&self) -> String {
        let status = self
            .code
            .map_or_else(|| "killed by signal".to_owned(), |c| format!("exit code {c}"));
        let detail = self.stderr.trim();
        if detail.is_empty() {
            status
        } else {
            format!("{status}: {detail}")
        }
    }
}

/// Runs a shell command on a remote host, authenticated by a private key.
///
/// An `Err` means the command could not be run at all (the ssh client is
/// missing, for instance). A command that ran and failed is `Ok` with a
/// non-zero [`RemoteOutput::code`].
pub trait RemoteExecutor: Send + Sync {
    fn execute(
        &self,
        target: &RemoteTarget,
        key: &Path,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> impl Future<Output = std::io::Result<RemoteOutput>> + Send;
}

// ── ssh(1) ───────────────────────────────────────────────────────────

/// Executes commands with the system OpenSSH client in batch mode.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    program: String,
    connect_timeout_secs: u64,
}

impl SshExecutor {
    pub fn new() -> Self {
        Self {
            program: "ssh".into(),
            connect_timeout_secs: 10,
        }
    }

    /// Use a different ssh binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, target: &RemoteTarget, key: &Path, command: &str) -> Vec<String> {
        vec![
            "-i".into(),
            key.display().to_string(),
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            "StrictHostKeyChecking=accept-new".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            target.to_string(),
            command.into(),
        ]
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        target: &RemoteTarget,
        key: &Path,
        command: &str,
        stdin: Option<&[u8]>,
    ) -> std::io::Result<RemoteOutput> {
        debug!(%target, command, "running remote command");

        let mut child = Command::new(&self.program)
            .args(self.args(target, key, command))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let result = RemoteOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(%target, command, code = ?result.code, "remote command finished");
        Ok(result)
    }
}
