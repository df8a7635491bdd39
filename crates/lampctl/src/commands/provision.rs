use dialoguer::{Input, Select};
use owo_colors::OwoColorize;
use secrecy::SecretString;

use lampctl_config::Config;
use lampctl_core::{Provisioner, ProvisioningRequest, SshExecutor};

use super::{scan, util};
use crate::cli::{GlobalOpts, ProvisionArgs};
use crate::config;
use crate::error::CliError;

const OTHER_NETWORK: &str = "Other network...";

pub async fn handle(args: ProvisionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let owner = config::resolve_owner(global, &cfg)?;
    let host = config::provisioning_host(args.host.as_deref(), &cfg);

    let ssid = match args.ssid {
        Some(ssid) => ssid,
        None => pick_network(&cfg, global, args.remote_scan, args.host.as_deref()).await?,
    };
    let password = if args.open {
        None
    } else {
        prompt_password(&ssid)?
    };

    let request = ProvisioningRequest::new(owner, ssid, password, host);
    request.validate()?;

    let provisioner = Provisioner::new(cfg.to_provisioning_config(), SshExecutor::new());
    let question = format!(
        "Write WiFi settings for '{}' to {}@{}?",
        request.ssid,
        provisioner.config().user,
        request.host
    );
    if !util::confirm("provision", &question, global.yes)? {
        return Err(CliError::Cancelled);
    }

    let pb = util::spinner(format!("Provisioning {}", request.host));
    let result = provisioner.provision(&request).await;
    pb.finish_and_clear();
    result?;

    println!(
        "{} {} is set up for '{}'",
        "✓".green(),
        request.host,
        request.ssid
    );
    Ok(())
}

/// Let the operator choose from a scan, or type a name.
async fn pick_network(
    cfg: &Config,
    global: &GlobalOpts,
    remote: bool,
    host: Option<&str>,
) -> Result<String, CliError> {
    if !util::interactive() {
        return Err(CliError::Validation {
            field: "ssid".into(),
            reason: "pass --ssid when not running interactively".into(),
        });
    }

    // A failed scan still leaves manual entry.
    let mut choices = match scan::scan_networks(cfg, global, remote, host).await {
        Ok(networks) => networks,
        Err(e) => {
            eprintln!("{} {e}", "!".yellow().bold());
            Vec::new()
        }
    };
    choices.push(OTHER_NETWORK.into());

    let selection = Select::new()
        .with_prompt("WiFi network")
        .items(&choices)
        .default(0)
        .interact()
        .map_err(util::prompt_err)?;

    if selection + 1 == choices.len() {
        let ssid: String = Input::new()
            .with_prompt("Network name")
            .interact_text()
            .map_err(util::prompt_err)?;
        return Ok(ssid);
    }
    Ok(choices.swap_remove(selection))
}

/// Ask for the passphrase; an empty answer means an open network.
fn prompt_password(ssid: &str) -> Result<Option<SecretString>, CliError> {
    if !util::interactive() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "cannot prompt without a terminal; use --open for networks without one"
                .into(),
        });
    }
    let password = rpassword::prompt_password(format!(
        "Password for '{ssid}' (empty for an open network): "
    ))
    .map_err(util::prompt_err)?;

    Ok((!password.is_empty()).then(|| SecretString::from(password)))
}
