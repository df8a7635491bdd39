use lampctl_config::Config;
use lampctl_core::{
    IwlistScanner, NmcliScanner, RemoteTarget, SshExecutor, discover, prepare_credential,
};

use super::util;
use crate::cli::{GlobalOpts, ScanArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: ScanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let networks = scan_networks(&cfg, global, args.remote, args.host.as_deref()).await?;

    if networks.is_empty() {
        eprintln!("No networks found");
    }
    for ssid in networks {
        println!("{ssid}");
    }
    Ok(())
}

/// Discover networks locally, or from the lamp's radio when `remote`.
pub async fn scan_networks(
    cfg: &Config,
    global: &GlobalOpts,
    remote: bool,
    host: Option<&str>,
) -> Result<Vec<String>, CliError> {
    if !remote {
        let pb = util::spinner("Scanning for WiFi networks");
        let result = discover(&NmcliScanner).await;
        pb.finish_and_clear();
        return Ok(result?);
    }

    let owner = config::resolve_owner(global, cfg)?;
    let prov = cfg.to_provisioning_config();
    let key = prepare_credential(owner, &prov.credentials_dir).await?;

    let target = RemoteTarget::new(prov.user, config::provisioning_host(host, cfg));
    let pb = util::spinner(format!("Scanning for WiFi networks from {target}"));
    let scanner = IwlistScanner::new(SshExecutor::new(), target, key, prov.interface);
    let result = discover(&scanner).await;
    pb.finish_and_clear();
    Ok(result?)
}
