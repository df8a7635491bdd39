//! Session management and device workflows on top of `lampctl-api`.
//!
//! - **[`LampClient`]**: connection manager. [`open_session()`](LampClient::open_session)
//!   connects and declares the owner, [`power_on()`](LampClient::power_on) and
//!   [`power_off()`](LampClient::power_off) issue one command at a time, and
//!   [`subscribe()`](LampClient::subscribe) hands out a `watch` receiver for
//!   the [`DeviceState`].
//!
//! - **Device state machine** ([`state`]): pure transition table driven by
//!   command acknowledgments and device pushes. A per-session background
//!   task is its only writer.
//!
//! - **Discovery** ([`discovery`]): [`NetworkScanner`] implementations plus
//!   [`discover()`], which deduplicates and sorts SSIDs.
//!
//! - **Provisioning** ([`provision`]): [`Provisioner`] pushes WiFi
//!   credentials to the device over a [`RemoteExecutor`] (ssh by default).
//!
//! Configuration arrives as plain values ([`ClientConfig`],
//! [`ProvisioningConfig`]); this crate never reads config files.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod provision;
pub mod remote;
pub mod state;

mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::LampClient;
pub use config::{ClientConfig, DEFAULT_ADDRESS, ProvisioningConfig};
pub use discovery::{IwlistScanner, NetworkScanner, NmcliScanner, discover};
pub use error::CoreError;
pub use provision::{Provisioner, ProvisioningRequest, credential_path, prepare_credential};
pub use remote::{RemoteExecutor, RemoteOutput, RemoteTarget, SshExecutor};
pub use state::{DeviceState, Trigger};

// Wire-level types callers need without depending on lampctl-api.
pub use lampctl_api::{LampState, Owner};
