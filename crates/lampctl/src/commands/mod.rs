//! Command dispatch: bridges CLI args to the core client, scanners and
//! provisioner.

pub mod owner;
pub mod power;
pub mod provision;
pub mod scan;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Power(args) => power::handle(args, global).await,
        Command::Watch => watch::handle(global).await,
        Command::Scan(args) => scan::handle(args, global).await,
        Command::Provision(args) => provision::handle(args, global).await,
        Command::Owner(args) => owner::handle(args, global),
    }
}
