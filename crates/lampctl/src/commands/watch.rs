use owo_colors::OwoColorize;

use lampctl_core::{DeviceState, LampClient};

use super::util;
use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Print every state change until the lamp goes away or Ctrl-C.
pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let owner = config::resolve_owner(global, &cfg)?;
    let client = LampClient::new(config::client_config(global, &cfg)?);

    util::open_session(&client, owner, global).await?;
    let mut rx = client.subscribe();
    println!("{}", util::paint_state(*rx.borrow_and_update()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{}", "interrupted".dimmed());
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *rx.borrow_and_update();
                println!("{}", util::paint_state(state));
                if state == DeviceState::NotConnected {
                    break;
                }
            }
        }
    }

    client.close_session().await;
    Ok(())
}
