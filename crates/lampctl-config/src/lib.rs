//! Configuration for lampctl.
//!
//! One TOML file in the platform config directory, overlaid with
//! `LAMPCTL_`-prefixed environment variables (`__` separates sections,
//! e.g. `LAMPCTL_DEVICE__ADDRESS`). Holds the persisted owner preference
//! and translates into the runtime configs `lampctl-core` consumes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

use lampctl_core::{ClientConfig, DEFAULT_ADDRESS, Owner, ProvisioningConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Preferred lamp owner (`Arni` or `Ian`).
    pub lamp_user: Option<String>,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub provisioning: ProvisioningSettings,
}

/// Where the lamp's WebSocket server lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSettings {
    #[serde(default = "default_address")]
    pub address: String,

    /// Seconds.
    #[serde(default = "default_timeout")]
    pub connect_timeout: u64,

    /// Seconds.
    #[serde(default = "default_timeout")]
    pub command_timeout: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_timeout: default_timeout(),
            command_timeout: default_timeout(),
        }
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.into()
}
fn default_timeout() -> u64 {
    10
}

/// SSH target and remote paths for WiFi provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProvisioningSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_user")]
    pub user: String,

    /// Directory with `<owner>_id_rsa` keys. Defaults to `keys/` under
    /// the platform data directory.
    pub credentials_dir: Option<PathBuf>,

    #[serde(default = "default_sentinel_path")]
    pub sentinel_path: String,

    #[serde(default = "default_wpa_config_path")]
    pub wpa_config_path: String,

    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_country")]
    pub country: String,

    #[serde(default = "default_reconfigure")]
    pub reconfigure: bool,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_user(),
            credentials_dir: None,
            sentinel_path: default_sentinel_path(),
            wpa_config_path: default_wpa_config_path(),
            interface: default_interface(),
            country: default_country(),
            reconfigure: default_reconfigure(),
        }
    }
}

fn default_host() -> String {
    "raspberrypi.local".into()
}
fn default_user() -> String {
    ProvisioningConfig::default().user
}
fn default_sentinel_path() -> String {
    ProvisioningConfig::default().sentinel_path
}
fn default_wpa_config_path() -> String {
    ProvisioningConfig::default().wpa_config_path
}
fn default_interface() -> String {
    ProvisioningConfig::default().interface
}
fn default_country() -> String {
    ProvisioningConfig::default().country
}
fn default_reconfigure() -> bool {
    true
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "lampctl", "lampctl")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the owner keys.
pub fn default_credentials_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("keys"),
        |dirs| dirs.data_dir().join("keys"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lampctl");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the config from `path` plus environment. A missing file is not
/// an error; defaults fill every gap.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LAMPCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Owner preference ────────────────────────────────────────────────

impl Config {
    /// The persisted owner, if one is set.
    pub fn preferred_owner(&self) -> Result<Option<Owner>, ConfigError> {
        self.lamp_user
            .as_deref()
            .map(|name| {
                name.parse::<Owner>().map_err(|_| ConfigError::Validation {
                    field: "lamp_user".into(),
                    reason: format!(
                        "unknown owner '{name}' (expected one of: {})",
                        owner_names()
                    ),
                })
            })
            .transpose()
    }

    /// Persist (or with `None`, forget) the owner preference.
    pub fn set_preferred_owner(&mut self, owner: Option<Owner>) {
        self.lamp_user = owner.map(|o| o.to_string());
    }
}

fn owner_names() -> String {
    Owner::iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Translation to runtime configs ──────────────────────────────────

impl Config {
    /// Build the [`ClientConfig`] for the lamp connection.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        let device = &self.device;
        let url: url::Url = device
            .address
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "device.address".into(),
                reason: format!("invalid URL: {}", device.address),
            })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Validation {
                field: "device.address".into(),
                reason: format!("expected a ws:// or wss:// URL, got '{}'", device.address),
            });
        }

        Ok(ClientConfig {
            address: device.address.clone(),
            connect_timeout: positive_secs("device.connect_timeout", device.connect_timeout)?,
            command_timeout: positive_secs("device.command_timeout", device.command_timeout)?,
        })
    }

    /// Build the [`ProvisioningConfig`] (the host travels with each request).
    pub fn to_provisioning_config(&self) -> ProvisioningConfig {
        let p = &self.provisioning;
        ProvisioningConfig {
            user: p.user.clone(),
            credentials_dir: p
                .credentials_dir
                .clone()
                .unwrap_or_else(default_credentials_dir),
            sentinel_path: p.sentinel_path.clone(),
            wpa_config_path: p.wpa_config_path.clone(),
            interface: p.interface.clone(),
            country: p.country.clone(),
            reconfigure: p.reconfigure,
        }
    }
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.to_client_config().unwrap(), ClientConfig::default());

        let prov = cfg.to_provisioning_config();
        let core = ProvisioningConfig::default();
        assert_eq!(prov.user, core.user);
        assert_eq!(prov.sentinel_path, core.sentinel_path);
        assert_eq!(prov.wpa_config_path, core.wpa_config_path);
        assert_eq!(prov.interface, "wlan0");
        assert_eq!(prov.country, "US");
        assert!(prov.reconfigure);
        assert_eq!(cfg.provisioning.host, "raspberrypi.local");
    }

    #[test]
    fn owner_preference_parses_any_case() {
        let mut cfg = Config {
            lamp_user: Some("ian".into()),
            ..Config::default()
        };
        assert_eq!(cfg.preferred_owner().unwrap(), Some(Owner::Ian));

        cfg.set_preferred_owner(Some(Owner::Arni));
        assert_eq!(cfg.lamp_user.as_deref(), Some("Arni"));

        cfg.set_preferred_owner(None);
        assert_eq!(cfg.preferred_owner().unwrap(), None);
    }

    #[test]
    fn unknown_owner_rejected() {
        let cfg = Config {
            lamp_user: Some("mallory".into()),
            ..Config::default()
        };
        let Err(ConfigError::Validation { reason, .. }) = cfg.preferred_owner() else {
            panic!("expected a validation error");
        };
        assert!(reason.contains("mallory"), "{reason}");
        assert!(reason.contains("Arni, Ian"), "{reason}");
    }

    #[test]
    fn bad_addresses_and_timeouts_rejected() {
        let mut cfg = Config::default();
        cfg.device.address = "http://raspberrypi.local:8182".into();
        assert!(cfg.to_client_config().is_err());

        cfg.device.address = "not a url".into();
        assert!(cfg.to_client_config().is_err());

        cfg.device.address = "ws://10.0.0.2:8182".into();
        cfg.device.command_timeout = 0;
        assert!(cfg.to_client_config().is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_preferred_owner(Some(Owner::Ian));
        cfg.device.address = "ws://lamp.example:9000".into();
        cfg.provisioning.credentials_dir = Some(dir.path().join("keys"));
        cfg.provisioning.reconfigure = false;
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.lamp_user, cfg.lamp_user);
        assert_eq!(loaded.device, cfg.device);
        assert_eq!(loaded.provisioning, cfg.provisioning);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provisioning]\ncountry = \"DE\"\n").unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.provisioning.country, "DE");
        assert_eq!(loaded.provisioning.interface, "wlan0");
        assert_eq!(loaded.device.command_timeout, 10);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device\naddress = ").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }
}
