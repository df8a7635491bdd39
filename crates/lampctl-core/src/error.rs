// ── Core error types ──
//
// User-facing errors from lampctl-core. Consumers never see WebSocket
// or codec errors directly; the `From<lampctl_api::Error>` impl folds
// them into the session-level taxonomy below.

use std::path::PathBuf;

use lampctl_api::Owner;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Cannot connect to lamp at {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("Lamp rejected ownership declaration for {owner}")]
    HandshakeRejected { owner: Owner },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Lamp disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("No active session")]
    NoSession,

    #[error("Another command is already in flight")]
    Busy,

    // ── Command errors ───────────────────────────────────────────────
    #[error("Lamp rejected {command}")]
    Rejected { command: &'static str },

    #[error("Lamp is not powered on")]
    NotPowered,

    #[error("Lamp did not confirm pairing within {timeout_secs}s")]
    PairingTimeout { timeout_secs: u64 },

    // ── Discovery ────────────────────────────────────────────────────
    #[error("WiFi discovery unavailable: {reason}")]
    DiscoveryUnavailable { reason: String },

    // ── Provisioning ─────────────────────────────────────────────────
    #[error("No credential for {owner} at {}", path.display())]
    CredentialMissing { owner: Owner, path: PathBuf },

    #[error("Cannot restrict permissions on {}: {source}", path.display())]
    CredentialPermission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Provisioning failed during {step}: {reason}")]
    ProvisioningFailed { step: &'static str, reason: String },

    #[error("Invalid {field}: {reason}")]
    InvalidRequest { field: &'static str, reason: String },
}

impl CoreError {
    /// Returns `true` if the error tore down the session.
    ///
    /// Session-fatal errors always leave the device state at `NotConnected`.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::HandshakeRejected { .. }
                | Self::Protocol { .. }
                | Self::Disconnected { .. }
        )
    }

    /// Returns `true` if simply trying again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::Disconnected { .. }
                | Self::Busy
                | Self::DiscoveryUnavailable { .. }
                | Self::ProvisioningFailed { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lampctl_api::Error> for CoreError {
    fn from(err: lampctl_api::Error) -> Self {
        match err {
            lampctl_api::Error::ConnectFailed { address, reason } => {
                CoreError::ConnectFailed { address, reason }
            }
            lampctl_api::Error::InvalidAddress(e) => CoreError::ConnectFailed {
                address: String::new(),
                reason: format!("invalid address: {e}"),
            },
            lampctl_api::Error::Transport(reason) => CoreError::Disconnected { reason },
            lampctl_api::Error::Closed => CoreError::Disconnected {
                reason: "connection closed by lamp".into(),
            },
            lampctl_api::Error::Protocol(e) => CoreError::Protocol {
                message: e.to_string(),
            },
        }
    }
}

impl From<lampctl_api::ProtocolError> for CoreError {
    fn from(err: lampctl_api::ProtocolError) -> Self {
        CoreError::Protocol {
            message: err.to_string(),
        }
    }
}
