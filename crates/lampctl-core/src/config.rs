// ── Runtime configuration ──
//
// These types describe *where* the lamp and its provisioning host live
// and how patient to be with them. They never touch disk: the config
// crate (or a test) builds them and hands them in.

use std::path::PathBuf;
use std::time::Duration;

/// Default device server address.
pub const DEFAULT_ADDRESS: &str = "ws://raspberrypi.local:8182";

/// Configuration for a [`LampClient`](crate::LampClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Device WebSocket address (e.g., `ws://raspberrypi.local:8182`).
    pub address: String,
    /// Upper bound on opening the transport.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for any acknowledgment, including the
    /// handshake. Expiry is treated as a transport failure.
    pub command_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for the [`Provisioner`](crate::Provisioner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// Login user on the provisioning host.
    pub user: String,
    /// Directory holding the per-owner private keys.
    pub credentials_dir: PathBuf,
    /// File created on the device once provisioning completed.
    pub sentinel_path: String,
    /// Remote wpa_supplicant configuration file.
    pub wpa_config_path: String,
    /// Wireless interface on the device.
    pub interface: String,
    /// Regulatory country code written into the supplicant config.
    pub country: String,
    /// Ask wpa_supplicant to reload after writing the config.
    pub reconfigure: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            user: "pi".into(),
            credentials_dir: PathBuf::from("keys"),
            sentinel_path: "/home/pi/.lamp_provisioned".into(),
            wpa_config_path: "/etc/wpa_supplicant/wpa_supplicant.conf".into(),
            interface: "wlan0".into(),
            country: "US".into(),
            reconfigure: true,
        }
    }
}
