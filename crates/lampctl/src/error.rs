//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use lampctl_config::ConfigError;
use lampctl_core::{CoreError, Owner};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the lamp at {address}")]
    #[diagnostic(
        code(lampctl::connection_failed),
        help(
            "Check that the lamp is powered and on this network.\n\
             Reason: {reason}\n\
             Override the address with --address ws://<host>:8182"
        )
    )]
    ConnectionFailed { address: String, reason: String },

    #[error("Lost the connection to the lamp: {reason}")]
    #[diagnostic(code(lampctl::disconnected), help("Run the command again to reconnect."))]
    Disconnected { reason: String },

    #[error("Lamp sent something unexpected: {message}")]
    #[diagnostic(code(lampctl::protocol))]
    Protocol { message: String },

    // ── Lamp ─────────────────────────────────────────────────────────
    #[error("The lamp refused owner {owner}")]
    #[diagnostic(
        code(lampctl::owner_rejected),
        help("The lamp only accepts the owners it was set up for. Try --owner.")
    )]
    OwnerRejected { owner: Owner },

    #[error("The lamp rejected {command}")]
    #[diagnostic(code(lampctl::rejected))]
    Rejected { command: String },

    #[error("{message}")]
    #[diagnostic(code(lampctl::lamp_state))]
    LampState { message: String },

    #[error("No pairing confirmation within {seconds}s")]
    #[diagnostic(
        code(lampctl::pairing_timeout),
        help("The lamp stays on and keeps waiting for its partner.")
    )]
    PairingTimeout { seconds: u64 },

    // ── Discovery ────────────────────────────────────────────────────
    #[error("Cannot scan for WiFi networks: {reason}")]
    #[diagnostic(
        code(lampctl::discovery_unavailable),
        help("Try --remote to scan from the lamp, or pass --ssid directly.")
    )]
    DiscoveryUnavailable { reason: String },

    // ── Provisioning ─────────────────────────────────────────────────
    #[error("No ssh key for {owner}")]
    #[diagnostic(
        code(lampctl::credential_missing),
        help("Expected at: {path}\nSet provisioning.credentials_dir to change the location.")
    )]
    CredentialMissing { owner: Owner, path: String },

    #[error("Cannot restrict permissions on {path}: {reason}")]
    #[diagnostic(code(lampctl::credential_permission))]
    CredentialPermission { path: String, reason: String },

    #[error("Provisioning failed during {step}")]
    #[diagnostic(
        code(lampctl::provisioning_failed),
        help("{reason}\nNothing is rolled back; running provision again is safe.")
    )]
    ProvisioningFailed { step: String, reason: String },

    // ── Usage ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lampctl::validation))]
    Validation { field: String, reason: String },

    #[error("No owner selected")]
    #[diagnostic(
        code(lampctl::no_owner),
        help("Pass --owner <arni|ian>, or save one with: lampctl owner set <arni|ian>")
    )]
    NoOwner,

    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(lampctl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Cancelled")]
    #[diagnostic(code(lampctl::cancelled))]
    Cancelled,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(code(lampctl::config), help("Config file: {path}"))]
    Config { message: String, path: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected { .. } => exit_code::CONNECTION,
            Self::OwnerRejected { .. } => exit_code::AUTH,
            Self::CredentialMissing { .. } => exit_code::NOT_FOUND,
            Self::CredentialPermission { .. } => exit_code::PERMISSION,
            Self::Rejected { .. } | Self::LampState { .. } => exit_code::CONFLICT,
            Self::PairingTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoOwner | Self::NonInteractiveRequiresYes { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                message: other.to_string(),
                path: path.display().to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectFailed { address, reason } => {
                CliError::ConnectionFailed { address, reason }
            }
            CoreError::Disconnected { reason } => CliError::Disconnected { reason },
            CoreError::Protocol { message } => CliError::Protocol { message },
            CoreError::HandshakeRejected { owner } => CliError::OwnerRejected { owner },
            CoreError::Rejected { command } => CliError::Rejected {
                command: command.into(),
            },
            e @ (CoreError::NoSession | CoreError::Busy | CoreError::NotPowered) => {
                CliError::LampState {
                    message: e.to_string(),
                }
            }
            CoreError::PairingTimeout { timeout_secs } => CliError::PairingTimeout {
                seconds: timeout_secs,
            },
            CoreError::DiscoveryUnavailable { reason } => {
                CliError::DiscoveryUnavailable { reason }
            }
            CoreError::CredentialMissing { owner, path } => CliError::CredentialMissing {
                owner,
                path: path.display().to_string(),
            },
            CoreError::CredentialPermission { path, source } => CliError::CredentialPermission {
                path: path.display().to_string(),
                reason: source.to_string(),
            },
            CoreError::ProvisioningFailed { step, reason } => CliError::ProvisioningFailed {
                step: step.into(),
                reason,
            },
            CoreError::InvalidRequest { field, reason } => CliError::Validation {
                field: field.into(),
                reason,
            },
        }
    }
}
