//! CLI-aware wrappers around `lampctl-config`: `--config`, `--owner` and
//! `--address` take precedence over the file.

use std::path::PathBuf;

use lampctl_config::Config;
use lampctl_core::{ClientConfig, Owner};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect for this invocation.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lampctl_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    lampctl_config::load_config_from(&path).map_err(|e| CliError::from_config(e, &path))
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    let path = config_path(global);
    lampctl_config::save_config_to(cfg, &path).map_err(|e| CliError::from_config(e, &path))
}

/// `--owner`, else the saved preference.
pub fn resolve_owner(global: &GlobalOpts, cfg: &Config) -> Result<Owner, CliError> {
    if let Some(owner) = global.owner {
        return Ok(owner);
    }
    let path = config_path(global);
    cfg.preferred_owner()
        .map_err(|e| CliError::from_config(e, &path))?
        .ok_or(CliError::NoOwner)
}

pub fn client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let mut cfg = cfg.clone();
    if let Some(ref address) = global.address {
        cfg.device.address.clone_from(address);
    }
    let path = config_path(global);
    cfg.to_client_config()
        .map_err(|e| CliError::from_config(e, &path))
}

/// Provisioning host: the command's `--host`, else the config.
pub fn provisioning_host(host: Option<&str>, cfg: &Config) -> String {
    host.map_or_else(|| cfg.provisioning.host.clone(), str::to_owned)
}
