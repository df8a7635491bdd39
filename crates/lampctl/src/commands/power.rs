use std::time::Duration;

use lampctl_core::LampClient;

use super::util;
use crate::cli::{GlobalOpts, PowerArgs, PowerCommand};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: PowerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let owner = config::resolve_owner(global, &cfg)?;
    let client = LampClient::new(config::client_config(global, &cfg)?);

    util::open_session(&client, owner, global).await?;
    let result = run(&client, args.command).await;
    client.close_session().await;
    result
}

async fn run(client: &LampClient, command: PowerCommand) -> Result<(), CliError> {
    match command {
        PowerCommand::On { wait_paired } => {
            client.power_on().await?;
            println!("{}", util::paint_state(client.state()));

            if let Some(secs) = wait_paired {
                let pb = util::spinner("Waiting for the other lamp");
                let waited = client.wait_for_pairing(Duration::from_secs(secs)).await;
                pb.finish_and_clear();
                waited?;
                println!("{}", util::paint_state(client.state()));
            }
        }
        PowerCommand::Off => {
            client.power_off().await?;
            println!("{}", util::paint_state(client.state()));
        }
    }
    Ok(())
}
